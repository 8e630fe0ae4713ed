//! Push subscriptions.

use crate::Document;
use tokio::sync::mpsc;

/// One push from the store: the current content of a watched document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePush {
    pub collection: String,
    pub id: String,
    /// `None` when the document does not exist (deleted or never written).
    pub data: Option<Document>,
}

/// Receiving end of a document watch.
///
/// Dropping it unsubscribes: the store notices the closed channel on its
/// next push and forgets the subscriber.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<RemotePush>,
}

impl Subscription {
    /// Wrap the receiving half of a push channel. Adapters keep the sender.
    pub fn new(receiver: mpsc::UnboundedReceiver<RemotePush>) -> Self {
        Self { receiver }
    }

    /// Create a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<RemotePush>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Wait for the next push. `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<RemotePush> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<RemotePush> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving pushes.
    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}
