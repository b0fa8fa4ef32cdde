use std::sync::Arc;

use concurrency::signal::{Done, Signal};
use concurrency::stream::{ValueIter, ValueStream, subscribe_channel};
use concurrency::test_utils::{init_test_tracing, within};
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread")]
async fn strict_and_skip_iterators_over_pushed_values() {
    init_test_tracing();

    let stream = ValueStream::new(0);
    let strict = stream.iterator(true);
    let skip = stream.iterator(false);

    let (_, at_one) = stream.push(1);
    for value in 2..=4 {
        stream.push(value);
    }

    // Four steps from the initial value visit every pushed value.
    let mut iter = strict;
    let mut seen = Vec::new();
    for _ in 0..4 {
        iter = within(iter.next(&Done::never())).await.unwrap();
        seen.push(*iter.value());
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);

    // The iterator handed back by the first push starts at that value.
    let mut iter = at_one;
    let mut seen = vec![*iter.value()];
    while let Some(next) = iter.try_next() {
        seen.push(*next.value());
        iter = next;
    }
    assert_eq!(seen, vec![1, 2, 3, 4]);

    // A skip iterator stepped once after all pushes lands on the latest value.
    let skipped = within(skip.next(&Done::never())).await.unwrap();
    assert_eq!(*skipped.value(), 4);
}

/// Steps `iter` until it reaches `last`, recording every value it visits.
async fn collect_until(mut iter: ValueIter<u64>, last: u64) -> Vec<u64> {
    let mut seen = vec![*iter.value()];
    while *iter.value() != last {
        iter = iter.next(&Done::never()).await.unwrap();
        seen.push(*iter.value());
    }

    seen
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn strict_observers_see_every_value_in_order() {
    init_test_tracing();

    const LAST: u64 = 2_000;
    let stream = Arc::new(ValueStream::new(0u64));

    let observers: Vec<_> = (0..8)
        .map(|_| tokio::spawn(collect_until(stream.iterator(true), LAST)))
        .collect();

    let producer = {
        let stream = stream.clone();
        tokio::spawn(async move {
            for value in 1..=LAST {
                stream.push(value);
                if value % 100 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    within(producer).await.unwrap();
    let expected: Vec<u64> = (0..=LAST).collect();
    for observer in observers {
        assert_eq!(within(observer).await.unwrap(), expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn skip_observers_are_monotone() {
    init_test_tracing();

    const LAST: u64 = 2_000;
    let stream = Arc::new(ValueStream::new(0u64));

    let observers: Vec<_> = (0..8)
        .map(|_| tokio::spawn(collect_until(stream.iterator(false), LAST)))
        .collect();

    for value in 1..=LAST {
        stream.push(value);
        if value % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }

    for observer in observers {
        let seen = within(observer).await.unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "{seen:?}");
        assert_eq!(seen.last(), Some(&LAST));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn read_only_view_follows_the_writer() {
    let stream = ValueStream::new("initial".to_string());
    let reader = stream.read_only();
    let iter = reader.iterator(true);

    stream.push("first".to_string());
    stream.push("second".to_string());

    assert_eq!(reader.current(), "second");
    let forwarded = within(reader.fast_forward(&iter, &Done::never()))
        .await
        .unwrap();
    assert_eq!(forwarded.value(), "second");
    assert!(forwarded.is_strict());
}

#[tokio::test(flavor = "multi_thread")]
async fn subscription_forwards_settings_until_cancelled() {
    init_test_tracing();

    let stream = Arc::new(ValueStream::new(0u32));
    let cancel = Arc::new(Signal::new());
    let (tx, mut rx) = mpsc::channel(4);

    let subscription = {
        let start = stream.iterator(true);
        let cancel = cancel.clone();
        tokio::spawn(async move { subscribe_channel(&cancel, tx, start).await })
    };

    let producer = {
        let stream = stream.clone();
        tokio::spawn(async move {
            for value in 1..=50 {
                stream.push(value);
            }
        })
    };

    let mut received = Vec::new();
    while received.last() != Some(&50) {
        received.push(within(rx.recv()).await.unwrap());
    }
    assert_eq!(received, (0..=50).collect::<Vec<_>>());

    within(producer).await.unwrap();
    cancel.signal();
    let err = within(subscription).await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
}
