use crate::{MutationError, MutationResult};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves once the payload it was enqueued with (or a later payload it
/// was coalesced into) has been written, or the write cycle failed.
///
/// Dropping the handle does not cancel the write.
#[derive(Debug)]
#[must_use = "dropping a MutationHandle ignores the write outcome"]
pub struct MutationHandle {
    rx: oneshot::Receiver<MutationResult<()>>,
}

impl MutationHandle {
    pub(crate) fn new(rx: oneshot::Receiver<MutationResult<()>>) -> Self {
        Self { rx }
    }
}

impl Future for MutationHandle {
    type Output = MutationResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MutationError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}
