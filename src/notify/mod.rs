//! Change Notification Channel
//!
//! Delivers the current access token, or its absence, to at most one
//! subscriber. Subscribing replaces the previous subscriber, whose stream ends.

use futures::Stream;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

use crate::types::TokenEvent;

/// Single-slot publisher owned by the engine.
#[derive(Debug, Default)]
pub struct TokenNotifier {
    sender: Mutex<Option<mpsc::UnboundedSender<TokenEvent>>>,
}

impl TokenNotifier {
    /// Create notifier without a subscriber.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new subscriber. `current` is the first event it receives.
    pub fn subscribe(&self, current: TokenEvent) -> TokenSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Receiver is alive, send cannot fail.
        let _ = sender.send(current);

        let previous = self.sender().replace(sender);
        if previous.is_some() {
            trace!("Replaced token subscriber");
        }
        TokenSubscription { receiver }
    }

    /// Deliver `event` to the subscriber. Returns `false` if nobody listens.
    pub fn publish(&self, event: TokenEvent) -> bool {
        let mut sender = self.sender();
        match sender.as_ref() {
            Some(tx) if tx.send(event).is_ok() => true,
            Some(_) => {
                *sender = None;
                false
            }
            None => false,
        }
    }

    /// Check if a live subscriber is installed.
    pub fn has_subscriber(&self) -> bool {
        self.sender().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Drop the current subscriber, ending its stream.
    pub fn unsubscribe(&self) {
        self.sender().take();
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<TokenEvent>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Stream of token change events, in commit order.
#[derive(Debug)]
pub struct TokenSubscription {
    receiver: mpsc::UnboundedReceiver<TokenEvent>,
}

impl TokenSubscription {
    /// Wait for the next event. `None` once replaced by a newer subscriber.
    pub async fn recv(&mut self) -> Option<TokenEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<TokenEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for TokenSubscription {
    type Item = TokenEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
