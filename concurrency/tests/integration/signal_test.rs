use std::sync::Arc;
use std::time::Duration;

use concurrency::concurrency_error;
use concurrency::error::ErrorKind;
use concurrency::signal::{
    Done, ErrorSignal, Signal, Stopper, WaitGroup, Waitable, timeout_after, wait_for_error,
    wait_with_cancel,
};
use concurrency::stream::ValueStream;
use concurrency::test_utils::{TimedDone, init_test_tracing, within};

#[tokio::test(flavor = "multi_thread")]
async fn waits_multiplex_across_primitives() {
    init_test_tracing();

    let signal = Signal::new();
    let stream = ValueStream::new(0);
    let iter = stream.iterator(true);
    let timeout = timeout_after(Duration::from_secs(30)).unwrap();

    stream.push(1);

    let (signal_done, stream_done, timeout_done) = (signal.done(), iter.done(), timeout.done());
    let winner = within(async {
        tokio::select! {
            _ = signal_done.wait() => "signal",
            _ = stream_done.wait() => "stream",
            _ = timeout_done.wait() => "timeout",
        }
    })
    .await;

    assert_eq!(winner, "stream");
}

#[tokio::test(flavor = "multi_thread")]
async fn waiters_hold_the_generation_they_started_on() {
    let signal = Arc::new(Signal::new());
    let first = signal.done();

    assert!(signal.signal());
    TimedDone::new(&first).wait().await;

    assert!(signal.reset());
    let second = signal.done();
    assert!(!second.is_done());
    assert!(first.is_done());

    TimedDone::with_timeout(&second, Duration::from_millis(20))
        .assert_pending()
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wait_group_tracks_background_loops() {
    let group = Arc::new(WaitGroup::new(0));
    let loops: Vec<_> = (0..8)
        .map(|_| {
            group.add(1);
            let group = group.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                group.add(-1);
            })
        })
        .collect();

    TimedDone::new(&*group).wait().await;
    assert_eq!(group.count(), 0);
    for handle in loops {
        handle.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stopper_reports_the_stop_error_back() {
    init_test_tracing();

    let stopper = Arc::new(Stopper::new());
    let background = {
        let stopper = stopper.clone();
        tokio::spawn(async move {
            stopper.stop_requested().wait().await;
            stopper.report_stopped()
        })
    };

    assert!(stopper.stop_with_error(concurrency_error!(
        ErrorKind::Application,
        "Audit log sync failed"
    )));
    assert!(within(background).await.unwrap());

    let err = within(wait_for_error(stopper.stopped(), &Done::never()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(err.description(), "Audit log sync failed");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_wait_carries_the_cancel_error() {
    let primary = Signal::new();
    let cancel = ErrorSignal::new();
    cancel.signal_with_error(concurrency_error!(ErrorKind::Application, "Shutting down"));

    let err = within(wait_with_cancel(&primary, &cancel))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.description(), "Shutting down");
}
