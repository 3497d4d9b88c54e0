use crate::channel::{BroadcastChannel, ChannelHub};
use crate::config::PresenceConfig;
use crate::errors::session_error::SessionError;
use crate::host::{EntryRedirect, UserPrompt};
use crate::lifecycle::{LifecycleController, TeardownReason};
use crate::message::PresenceMessage;
use crate::registry::PeerRegistry;
use crate::session::{self, PersistedPeerRecord, Session, TeardownMarker};
use crate::store::{FactStore, StoreEvent};
use crate::terminate::SessionTerminator;
use guid_create::GUID;
use log::{debug, info, trace};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Announcing,
    Steady,
}

enum EngineCommand {
    Logout,
    Resume,
    Terminate,
}

/// Control surface handed to the host page. The engine task owns all other
/// state; nothing here is a second source of truth.
#[derive(Clone)]
pub struct PresenceHandle {
    peer_id: String,
    commands: mpsc::Sender<EngineCommand>,
    occupied: watch::Receiver<bool>,
    live_peers: watch::Receiver<usize>,
}

impl PresenceHandle {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// The "session still occupied" query surface polled by the dashboard
    /// to decide whether to keep showing authenticated views.
    pub fn occupied(&self) -> bool {
        *self.occupied.borrow()
    }

    /// Waits until the session is torn down or the engine is gone.
    pub async fn closed(&mut self) {
        loop {
            if !*self.occupied.borrow_and_update() {
                return;
            }
            if self.occupied.changed().await.is_err() {
                return;
            }
        }
    }

    /// Live peer count as last published by the engine. Informational only;
    /// false negatives are expected while heartbeats are in flight.
    pub fn live_peers(&self) -> usize {
        *self.live_peers.borrow()
    }

    /// Explicit user-initiated logout, gated on the confirmation prompt.
    /// Returns false when the user declined or the engine is gone.
    pub async fn logout(&self, prompt: &dyn UserPrompt) -> bool {
        if !prompt.confirm("Log out", "End this session in every tab?") {
            return false;
        }
        self.commands.send(EngineCommand::Logout).await.is_ok()
    }

    /// Host `onResume` hook: peers may have come and gone while this
    /// context was suspended, so ask them to identify themselves again.
    pub async fn resume(&self) {
        let _ = self.commands.send(EngineCommand::Resume).await;
    }

    /// Host `onTerminate` hook, best-effort. The host may never get to call
    /// this; correctness never depends on it running.
    pub async fn terminate(&self) {
        let _ = self.commands.send(EngineCommand::Terminate).await;
    }
}

/// Presence protocol engine for one execution context: announces itself,
/// heartbeats, tracks its peers, and applies the lifecycle decisions.
pub struct PresenceEngine {
    peer_id: String,
    config: PresenceConfig,
    session: Session,
    store: Arc<dyn FactStore>,
    channel: Option<BroadcastChannel>,
    registry: PeerRegistry,
    state: EngineState,
    lifecycle: LifecycleController,
    store_events: broadcast::Receiver<StoreEvent>,
    commands: mpsc::Receiver<EngineCommand>,
    // Held so the command stream never reports closed when all handles drop.
    _commands_tx: mpsc::Sender<EngineCommand>,
    live_peers_tx: watch::Sender<usize>,
}

impl PresenceEngine {
    /// Builds the engine for one context. Refuses to start without a valid,
    /// already-established session, scrubbing whatever partial state it
    /// finds; the engine tracks sessions, it never creates them. Must be
    /// called from within the tokio runtime.
    pub fn initialize(
        store: Arc<dyn FactStore>,
        hub: Option<&ChannelHub>,
        config: PresenceConfig,
        terminator: Arc<dyn SessionTerminator>,
        redirect: Arc<dyn EntryRedirect>,
    ) -> Result<(PresenceEngine, PresenceHandle), SessionError> {
        let peer_id = GUID::rand().to_string().to_lowercase();
        let channel = hub.map(ChannelHub::open);
        let (lifecycle, occupied_rx) =
            LifecycleController::new(peer_id.clone(), store.clone(), terminator, redirect);

        let session = match Session::load(store.as_ref()) {
            Ok(session) => session,
            Err(err) => {
                // Fail safe toward logged-out.
                lifecycle.teardown(TeardownReason::InvalidSession, channel.as_ref());
                return Err(err);
            }
        };

        let (commands_tx, commands) = mpsc::channel(8);
        let (live_peers_tx, live_peers_rx) = watch::channel(0);
        let store_events = store.subscribe();

        let handle = PresenceHandle {
            peer_id: peer_id.clone(),
            commands: commands_tx.clone(),
            occupied: occupied_rx,
            live_peers: live_peers_rx,
        };

        let engine = PresenceEngine {
            registry: PeerRegistry::new(peer_id.clone()),
            peer_id,
            config,
            session,
            store,
            channel,
            state: EngineState::Announcing,
            lifecycle,
            store_events,
            commands,
            _commands_tx: commands_tx,
            live_peers_tx,
        };

        Ok((engine, handle))
    }

    pub fn live_peer_count(&self) -> usize {
        self.registry.live_count()
    }

    /// Drives this context until teardown or host termination.
    pub async fn run(mut self) {
        info!("Peer {} announcing", self.peer_id);
        self.post(PresenceMessage::Announce {
            peer_id: self.peer_id.clone(),
        });
        self.write_own_record(false);

        let mut ticker = time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let init_deadline = Instant::now() + self.config.init_window;

        loop {
            tokio::select! {
                raw = recv_or_pending(self.channel.as_mut()) => {
                    match raw {
                        Some(raw) => self.handle_wire(&raw),
                        // Hub gone: degrade to store-only signalling.
                        None => self.channel = None,
                    }
                }

                event = self.store_events.recv() => {
                    match event {
                        Ok(event) => self.handle_store_event(&event.key),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            trace!("Store event feed lagged, {missed} notifications lost");
                        }
                        Err(broadcast::error::RecvError::Closed) => {}
                    }
                }

                command = self.commands.recv() => {
                    match command {
                        Some(EngineCommand::Logout) => {
                            self.teardown(TeardownReason::UserLogout);
                        }
                        Some(EngineCommand::Resume) => {
                            self.post(PresenceMessage::QueryPeers {
                                peer_id: self.peer_id.clone(),
                            });
                        }
                        Some(EngineCommand::Terminate) => {
                            self.shutdown();
                            return;
                        }
                        None => {}
                    }
                }

                _ = ticker.tick() => {
                    self.on_tick();
                }

                _ = time::sleep_until(init_deadline), if self.state == EngineState::Announcing => {
                    debug!(
                        "Peer {}: no replies within the discovery window, possibly alone",
                        self.peer_id
                    );
                    self.state = EngineState::Steady;
                }
            }

            if self.lifecycle.torn_down() {
                self.channel = None;
                return;
            }
        }
    }

    /// One heartbeat tick: emit liveness, refresh the fallback record,
    /// reap silent peers, and evaluate the lifecycle inputs.
    fn on_tick(&mut self) {
        let now = session::now_ms();

        if self.observe_missed_teardown() {
            return;
        }

        self.post(PresenceMessage::Heartbeat {
            peer_id: self.peer_id.clone(),
        });
        self.write_own_record(false);

        if self.channel.is_none() {
            self.scan_peer_records(now);
        }

        for peer_id in self.registry.sweep(now, self.config.peer_timeout_ms()) {
            debug!("Peer {} reaped {peer_id} after silence", self.peer_id);
        }
        self.prune_stale_records(now);
        self.publish_peer_count();

        // Computed but deliberately not acted on: zero responsive peers is
        // a normal transient while a tab reloads, and acting on it has
        // logged users out prematurely before.
        if self.registry.live_count() == 0 {
            trace!("Peer {} sees no other live peers", self.peer_id);
        }

        if self.session.expired(now, self.config.max_lifetime_ms()) {
            info!("Session lifetime exceeded");
            self.teardown(TeardownReason::Expired);
        }
    }

    /// Both notification feeds are lossy, so every tick re-reads the store:
    /// a teardown whose notification was dropped is observed here within
    /// one heartbeat cycle instead of never.
    fn observe_missed_teardown(&mut self) -> bool {
        if let Some(raw) = self.store.get(session::TEARDOWN_KEY) {
            if let Ok(marker) = serde_json::from_str::<TeardownMarker>(&raw) {
                if marker.peer_id != self.peer_id {
                    info!("Observed teardown marker from {} on tick", marker.peer_id);
                    self.teardown(TeardownReason::PeerSignal);
                    return true;
                }
            }
        }
        if self.store.get(session::AUTHORIZED_KEY).is_none() {
            info!("Session keys vanished from the store");
            self.teardown(TeardownReason::PeerSignal);
            return true;
        }
        false
    }

    fn handle_wire(&mut self, raw: &str) {
        let Some(message) = PresenceMessage::decode(raw) else {
            trace!("Ignoring unknown broadcast payload");
            return;
        };
        if message.peer_id() == self.peer_id {
            return;
        }

        let now = session::now_ms();
        match message {
            PresenceMessage::Announce { peer_id } | PresenceMessage::QueryPeers { peer_id } => {
                self.registry.record_seen(&peer_id, now);
                self.post(PresenceMessage::Present {
                    peer_id: self.peer_id.clone(),
                });
                self.publish_peer_count();
            }

            PresenceMessage::Present { peer_id } => {
                if self.state == EngineState::Announcing {
                    self.state = EngineState::Steady;
                }
                self.registry.record_seen(&peer_id, now);
                self.publish_peer_count();
            }

            PresenceMessage::Heartbeat { peer_id } => {
                self.registry.record_seen(&peer_id, now);
                self.publish_peer_count();
            }

            PresenceMessage::Departing { peer_id } => {
                if self.registry.drop_peer(&peer_id, now) {
                    debug!("Peer {peer_id} departed");
                }
                self.publish_peer_count();
            }

            PresenceMessage::SessionTornDown { peer_id } => {
                info!("Peer {peer_id} tore the session down");
                self.teardown(TeardownReason::PeerSignal);
            }
        }
    }

    fn handle_store_event(&mut self, key: &str) {
        if key == session::TEARDOWN_KEY {
            // Removal of the marker (a fresh login scrubbing) is not a
            // teardown.
            let Some(raw) = self.store.get(key) else {
                return;
            };
            let Ok(marker) = serde_json::from_str::<TeardownMarker>(&raw) else {
                return;
            };
            if marker.peer_id == self.peer_id {
                return;
            }
            if session::now_ms() - marker.at > self.config.record_ttl_ms() {
                return;
            }
            info!("Observed teardown marker from {}", marker.peer_id);
            self.teardown(TeardownReason::PeerSignal);
            return;
        }

        if let Some(peer_id) = key.strip_prefix(session::PEER_KEY_PREFIX) {
            if peer_id == self.peer_id {
                return;
            }
            let Some(raw) = self.store.get(key) else {
                // The record was removed: that peer cleaned up after itself.
                self.registry.drop_peer(peer_id, session::now_ms());
                self.publish_peer_count();
                return;
            };
            match serde_json::from_str::<PersistedPeerRecord>(&raw) {
                Ok(record) => {
                    self.registry.record_seen(&record.peer_id, record.timestamp);
                    if record.closing {
                        self.registry.mark_closing(&record.peer_id);
                    }
                }
                // Malformed entries are treated as absent and dropped.
                Err(_) => self.store.remove(key),
            }
            self.publish_peer_count();
        }
    }

    /// Store-only approximation of the registry refresh, for contexts
    /// running without broadcast support.
    fn scan_peer_records(&mut self, now: i64) {
        for key in self.store.keys_with_prefix(session::PEER_KEY_PREFIX) {
            let Some(raw) = self.store.get(&key) else {
                continue;
            };
            let Ok(record) = serde_json::from_str::<PersistedPeerRecord>(&raw) else {
                self.store.remove(&key);
                continue;
            };
            if record.peer_id == self.peer_id {
                continue;
            }
            if now - record.timestamp > self.config.peer_timeout_ms() {
                continue;
            }
            self.registry.record_seen(&record.peer_id, record.timestamp);
            if record.closing {
                self.registry.mark_closing(&record.peer_id);
            }
        }
    }

    /// Any peer prunes records old enough that their writer must be gone.
    fn prune_stale_records(&mut self, now: i64) {
        for key in self.store.keys_with_prefix(session::PEER_KEY_PREFIX) {
            let Some(raw) = self.store.get(&key) else {
                continue;
            };
            let stale = match serde_json::from_str::<PersistedPeerRecord>(&raw) {
                Ok(record) => now - record.timestamp > self.config.record_ttl_ms(),
                Err(_) => true,
            };
            if stale {
                self.store.remove(&key);
            }
        }
    }

    fn write_own_record(&self, closing: bool) {
        let record = PersistedPeerRecord {
            peer_id: self.peer_id.clone(),
            timestamp: session::now_ms(),
            closing,
        };
        self.store.set(
            &session::peer_key(&self.peer_id),
            &serde_json::to_string(&record).expect("Could not encode peer record"),
        );
    }

    fn post(&self, message: PresenceMessage) {
        if let Some(channel) = &self.channel {
            channel.post(&message);
        }
    }

    fn publish_peer_count(&self) {
        let _ = self.live_peers_tx.send(self.registry.live_count());
    }

    fn teardown(&mut self, reason: TeardownReason) {
        self.lifecycle.teardown(reason, self.channel.as_ref());
    }

    /// Best-effort shutdown: announce the departure and remove the fallback
    /// record. The session itself stays alive; closing the last tab does
    /// not end it.
    fn shutdown(&mut self) {
        self.write_own_record(true);
        self.post(PresenceMessage::Departing {
            peer_id: self.peer_id.clone(),
        });
        self.store.remove(&session::peer_key(&self.peer_id));
        self.channel = None;
        info!("Peer {} closed", self.peer_id);
    }
}

async fn recv_or_pending(channel: Option<&mut BroadcastChannel>) -> Option<String> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
