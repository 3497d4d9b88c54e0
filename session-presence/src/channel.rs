use crate::message::PresenceMessage;
use log::trace;
use tokio::sync::broadcast::{self, error::RecvError};

const CHANNEL_CAPACITY: usize = 64;

/// The per-origin multicast hub every context connects to. Delivery is
/// best-effort and at-most-once: a suspended receiver that falls behind
/// loses messages, and nothing is retried.
#[derive(Clone)]
pub struct ChannelHub {
    tx: broadcast::Sender<String>,
}

impl ChannelHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        ChannelHub { tx }
    }

    /// Opens one context's handle onto the hub.
    pub fn open(&self) -> BroadcastChannel {
        BroadcastChannel {
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's connection to the broadcast transport.
pub struct BroadcastChannel {
    tx: broadcast::Sender<String>,
    rx: broadcast::Receiver<String>,
}

impl BroadcastChannel {
    /// Fire-and-forget send; a hub with no other listeners is not an error.
    pub fn post(&self, message: &PresenceMessage) {
        let _ = self.tx.send(message.encode());
    }

    /// Receives the next raw payload. `None` means the hub is gone; a
    /// lagged receiver skips ahead, losing the missed messages silently.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            match self.rx.recv().await {
                Ok(raw) => return Some(raw),
                Err(RecvError::Lagged(missed)) => {
                    trace!("Broadcast receiver lagged, {missed} messages lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
