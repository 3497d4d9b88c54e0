use std::collections::HashMap;

/// One live peer as seen by the owning context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    pub last_seen: i64,
    pub closing: bool,
}

/// This context's best-effort view of currently-live peers. Never contains
/// the owning context's own id, and never authoritative by itself: a peer
/// may be alive while its heartbeat is delayed or lost in transit.
pub struct PeerRegistry {
    own_id: String,
    peers: HashMap<String, PeerEntry>,
    departed: HashMap<String, i64>,
}

impl PeerRegistry {
    pub fn new(own_id: String) -> Self {
        PeerRegistry {
            own_id,
            peers: HashMap::new(),
            departed: HashMap::new(),
        }
    }

    /// Upserts a liveness signal. Signals from this context itself, and
    /// signals not newer than a recorded departure, are discarded, which
    /// keeps the registry insensitive to message arrival order.
    pub fn record_seen(&mut self, peer_id: &str, at: i64) {
        if peer_id == self.own_id {
            return;
        }
        if let Some(departed_at) = self.departed.get(peer_id) {
            if at <= *departed_at {
                return;
            }
            self.departed.remove(peer_id);
        }
        let entry = self.peers.entry(peer_id.to_string()).or_insert(PeerEntry {
            last_seen: i64::MIN,
            closing: false,
        });
        if at > entry.last_seen {
            entry.last_seen = at;
        }
    }

    /// Flags a peer that announced the start of its shutdown sequence.
    pub fn mark_closing(&mut self, peer_id: &str) {
        if let Some(entry) = self.peers.get_mut(peer_id) {
            entry.closing = true;
        }
    }

    /// Removes a departed peer, remembering the departure so that stragglers
    /// from before it cannot resurrect the entry.
    pub fn drop_peer(&mut self, peer_id: &str, at: i64) -> bool {
        self.departed.insert(peer_id.to_string(), at);
        self.peers.remove(peer_id).is_some()
    }

    /// Reaps peers unheard from for longer than `timeout_ms`, returning the
    /// reaped ids. Old departure records are forgotten on the same pass.
    pub fn sweep(&mut self, now: i64, timeout_ms: i64) -> Vec<String> {
        let stale: Vec<String> = self
            .peers
            .iter()
            .filter(|(_, entry)| now - entry.last_seen > timeout_ms)
            .map(|(peer_id, _)| peer_id.clone())
            .collect();
        for peer_id in &stale {
            self.peers.remove(peer_id);
        }
        self.departed.retain(|_, at| now - *at <= timeout_ms);
        stale
    }

    /// Count of live peers excluding self and peers already closing.
    pub fn live_count(&self) -> usize {
        self.peers.values().filter(|entry| !entry.closing).count()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }
}
