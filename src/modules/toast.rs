use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// A transient "show this to the user" request raised anywhere in the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastSignal {
    #[serde(rename = "type")]
    pub severity: String,
    pub title: String,
    pub message: String,
}

impl ToastSignal {
    pub fn new(severity: &str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: severity.to_string(),
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: Vec<(u64, UnboundedSender<ToastSignal>)>,
}

/// Shared fan-out point for toast signals.
///
/// One dispatcher is built at start-up and cloned into every producer; clones
/// publish to the same subscriber set. Signals are queued per subscriber until
/// drained, and nothing is retained for subscribers that join later.
#[derive(Clone, Default)]
pub struct ToastDispatcher {
    inner: Arc<Mutex<Subscribers>>,
}

impl ToastDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `signal` to every live subscriber and returns how many got it.
    pub fn publish(&self, signal: ToastSignal) -> usize {
        let mut subs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        subs.senders.retain(|(_, tx)| !tx.is_closed());
        let mut delivered = 0;
        for (_, tx) in &subs.senders {
            if tx.send(signal.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(severity = %signal.severity, delivered, "toast published");
        delivered
    }

    pub fn subscribe(&self) -> ToastSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.senders.push((id, tx));
        ToastSubscription {
            id,
            receiver: rx,
            dispatcher: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let subs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        subs.senders.iter().filter(|(_, tx)| !tx.is_closed()).count()
    }
}

/// Receiving end of a dispatcher registration. Dropping it unsubscribes.
pub struct ToastSubscription {
    id: u64,
    receiver: UnboundedReceiver<ToastSignal>,
    dispatcher: Weak<Mutex<Subscribers>>,
}

impl ToastSubscription {
    /// Next queued signal, if any. Never blocks.
    pub fn try_next(&mut self) -> Option<ToastSignal> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ToastSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.dispatcher.upgrade() {
            let mut subs = inner.lock().unwrap_or_else(PoisonError::into_inner);
            subs.senders.retain(|(id, _)| *id != self.id);
        }
    }
}
