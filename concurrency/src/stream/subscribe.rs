use tokio::sync::mpsc;
use tracing::debug;

use crate::bail;
use crate::error::{ConcurrencyResult, ErrorKind};
use crate::signal::Waitable;
use crate::stream::ValueIter;

/// Forwards every value from `start` onward into `output` until `cancel` completes.
///
/// Values are sent in the order `start`'s discipline yields them: all of them for a strict
/// iterator, the latest at each step for a skip iterator. Returns the cancel condition's
/// cancellation error once it completes, or [`ErrorKind::ChannelClosed`] when the receiver
/// is dropped. Never returns `Ok`.
pub async fn subscribe_channel<T, C>(
    cancel: &C,
    output: mpsc::Sender<T>,
    start: ValueIter<T>,
) -> ConcurrencyResult<()>
where
    T: Clone,
    C: Waitable + ?Sized,
{
    let cancel_done = cancel.done();
    let mut iter = start;
    let mut forwarded = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel_done.wait() => {
                debug!(forwarded, "value stream subscription cancelled");
                return Err(cancel.cancellation_error());
            }
            sent = output.send(iter.value().clone()) => {
                if sent.is_err() {
                    debug!(forwarded, "value stream subscriber dropped its receiver");
                    bail!(ErrorKind::ChannelClosed, "Subscription receiver dropped");
                }
            }
        }

        forwarded += 1;
        iter = iter.next(cancel).await?;
    }
}
