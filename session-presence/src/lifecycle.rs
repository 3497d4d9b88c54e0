use crate::channel::BroadcastChannel;
use crate::host::EntryRedirect;
use crate::message::PresenceMessage;
use crate::session::{self, TeardownMarker};
use crate::store::FactStore;
use crate::terminate::SessionTerminator;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// What caused a teardown. `PeerSignal` means another context already asked
/// the backend to revoke the session, so this context must not ask again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownReason {
    Expired,
    UserLogout,
    InvalidSession,
    PeerSignal,
}

/// The single authority that ends the session, exactly once, and propagates
/// that fact to every peer and to the fact store.
pub struct LifecycleController {
    peer_id: String,
    store: Arc<dyn FactStore>,
    terminator: Arc<dyn SessionTerminator>,
    redirect: Arc<dyn EntryRedirect>,
    torn_down: AtomicBool,
    occupied_tx: watch::Sender<bool>,
}

impl LifecycleController {
    pub fn new(
        peer_id: String,
        store: Arc<dyn FactStore>,
        terminator: Arc<dyn SessionTerminator>,
        redirect: Arc<dyn EntryRedirect>,
    ) -> (LifecycleController, watch::Receiver<bool>) {
        let (occupied_tx, occupied_rx) = watch::channel(true);
        (
            LifecycleController {
                peer_id,
                store,
                terminator,
                redirect,
                torn_down: AtomicBool::new(false),
                occupied_tx,
            },
            occupied_rx,
        )
    }

    pub fn torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Runs the teardown procedure. Safe to invoke from any number of
    /// triggers; only the first invocation does anything.
    pub fn teardown(&self, reason: TeardownReason, channel: Option<&BroadcastChannel>) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Tearing down session ({reason:?})");

        let subject = self.store.get(session::SUBJECT_KEY);

        // Fire-and-forget: the remote call must never block local cleanup.
        // The originating peer has already revoked the session server-side
        // when the trigger was a peer signal.
        if reason != TeardownReason::PeerSignal {
            if let Some(subject) = subject {
                let terminator = self.terminator.clone();
                tokio::spawn(async move {
                    if let Err(err) = terminator.terminate(&subject).await {
                        warn!("Remote session termination failed: {err}");
                    }
                });
            }
        }

        for key in self.store.keys_with_prefix(session::PEER_KEY_PREFIX) {
            self.store.remove(&key);
        }
        self.store.remove(session::SUBJECT_KEY);
        self.store.remove(session::STARTED_AT_KEY);
        self.store.remove(session::AUTHORIZED_KEY);

        let marker = TeardownMarker {
            peer_id: self.peer_id.clone(),
            at: session::now_ms(),
        };
        self.store.set(
            session::TEARDOWN_KEY,
            &serde_json::to_string(&marker).expect("Could not encode teardown marker"),
        );

        if let Some(channel) = channel {
            channel.post(&PresenceMessage::SessionTornDown {
                peer_id: self.peer_id.clone(),
            });
        }

        let _ = self.occupied_tx.send(false);
        self.redirect.redirect_to_entry();
        true
    }
}
