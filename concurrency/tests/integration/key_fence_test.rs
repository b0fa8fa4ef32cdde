use std::collections::HashMap;
use std::sync::Arc;

use concurrency::error::ConcurrencyError;
use concurrency::fence::{KeyFence, KeySet};
use concurrency::test_utils::{init_test_tracing, within};
use parking_lot::Mutex;

/// Record keys written by a simulated datastore, guarded by the fence.
fn record_keys() -> Vec<&'static str> {
    vec!["deployment/a", "deployment/b", "deployment/c", "node/a", "node/b"]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_writers_are_serialized() {
    init_test_tracing();

    let fence = KeyFence::new();
    // Tracks, per record key, how many writers currently hold it.
    let holders: Arc<Mutex<HashMap<&'static str, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let violations = Arc::new(Mutex::new(Vec::new()));

    let key_sets = vec![
        (KeySet::prefix("deployment/"), vec!["deployment/a", "deployment/b", "deployment/c"]),
        (KeySet::range("deployment/b", "node/a"), vec!["deployment/b", "deployment/c", "node/a"]),
        (KeySet::discrete(["node/a", "node/b"]), vec!["node/a", "node/b"]),
        (KeySet::entire(), record_keys()),
        (KeySet::prefix("node/"), vec!["node/a", "node/b"]),
    ];

    let mut writers = Vec::new();
    for round in 0..60 {
        let (keys, touched) = key_sets[round % key_sets.len()].clone();
        let fence = fence.clone();
        let holders = holders.clone();
        let violations = violations.clone();

        writers.push(tokio::spawn(async move {
            fence
                .do_status_with_lock(keys, || async {
                    {
                        let mut holders = holders.lock();
                        for &key in &touched {
                            let count = holders.entry(key).or_default();
                            *count += 1;
                            if *count > 1 {
                                violations.lock().push(key);
                            }
                        }
                    }

                    tokio::task::yield_now().await;

                    let mut holders = holders.lock();
                    for key in &touched {
                        if let Some(count) = holders.get_mut(key) {
                            *count -= 1;
                        }
                    }

                    Ok::<_, ConcurrencyError>(())
                })
                .await
        }));
    }

    for writer in writers {
        within(writer).await.unwrap().unwrap();
    }

    assert!(violations.lock().is_empty(), "{:?}", violations.lock());
    assert_eq!(fence.held_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn disjoint_writers_hold_the_fence_together() {
    let fence = KeyFence::new();

    let deployments = within(fence.acquire(KeySet::prefix("deployment/"))).await;
    let nodes = within(fence.acquire(KeySet::prefix("node/"))).await;
    assert_eq!(fence.held_count(), 2);

    // Released in a different order than acquired.
    drop(deployments);
    assert!(fence.try_lock(&KeySet::discrete(["deployment/a"])));
    drop(nodes);
    assert_eq!(fence.held_count(), 1);
}
