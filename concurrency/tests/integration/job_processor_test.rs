use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use concurrency::config::JobProcessorConfig;
use concurrency::error::ErrorKind;
use concurrency::job::JobProcessor;
use concurrency::test_utils::{TimedDone, init_test_tracing};
use parking_lot::Mutex;

/// Metadata of a per-node scan job.
#[derive(Debug, Clone)]
struct ScanJob {
    node: usize,
    sequence: usize,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scans_of_the_same_node_never_overlap() {
    init_test_tracing();

    const NODES: usize = 4;
    const SCANS_PER_NODE: usize = 10;

    let processor = JobProcessor::new(JobProcessorConfig { num_workers: 3 }).unwrap();
    let active = Arc::new((0..NODES).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
    let overlaps = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(vec![Vec::new(); NODES]));

    for sequence in 0..SCANS_PER_NODE {
        for node in 0..NODES {
            let active = active.clone();
            let overlaps = overlaps.clone();
            let order = order.clone();

            processor
                .add_job(
                    ScanJob { node, sequence },
                    move |other: &ScanJob| other.node == node && other.sequence < sequence,
                    move || async move {
                        if active[node].fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        order.lock()[node].push(sequence);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        active[node].fetch_sub(1, Ordering::SeqCst);
                    },
                )
                .unwrap();
        }
    }

    processor.graceful_stop();
    TimedDone::new(&processor.stopped_signal()).wait().await;

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    let expected: Vec<usize> = (0..SCANS_PER_NODE).collect();
    for per_node in order.lock().iter() {
        assert_eq!(per_node, &expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn graceful_stop_runs_every_admitted_job() {
    init_test_tracing();

    let processor = Arc::new(JobProcessor::with_workers(2).unwrap());
    let completed = Arc::new(AtomicUsize::new(0));
    let admitted = Arc::new(AtomicUsize::new(0));

    // Submitters race the graceful stop; whatever was admitted must still run.
    let submitters: Vec<_> = (0..4)
        .map(|node| {
            let processor = processor.clone();
            let completed = completed.clone();
            let admitted = admitted.clone();
            tokio::spawn(async move {
                for sequence in 0..50 {
                    let completed = completed.clone();
                    let result = processor.add_job(
                        ScanJob { node, sequence },
                        move |other: &ScanJob| other.node == node && other.sequence < sequence,
                        move || async move {
                            completed.fetch_add(1, Ordering::SeqCst);
                        },
                    );

                    match result {
                        Ok(()) => {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(err) => {
                            assert_eq!(err.kind(), ErrorKind::AlreadyStopped);
                            return;
                        }
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    tokio::task::yield_now().await;
    processor.graceful_stop();

    for submitter in submitters {
        submitter.await.unwrap();
    }

    TimedDone::new(&processor.stopped_signal()).wait().await;
    assert!(processor.stopped());
    assert_eq!(
        completed.load(Ordering::SeqCst),
        admitted.load(Ordering::SeqCst)
    );
}
