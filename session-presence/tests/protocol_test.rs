use session_presence::{PeerRegistry, PresenceMessage};

#[test]
fn decode_accepts_every_known_shape() {
    let messages = [
        PresenceMessage::Announce {
            peer_id: "a".to_string(),
        },
        PresenceMessage::Present {
            peer_id: "a".to_string(),
        },
        PresenceMessage::Heartbeat {
            peer_id: "a".to_string(),
        },
        PresenceMessage::Departing {
            peer_id: "a".to_string(),
        },
        PresenceMessage::QueryPeers {
            peer_id: "a".to_string(),
        },
        PresenceMessage::SessionTornDown {
            peer_id: "a".to_string(),
        },
    ];

    for message in messages {
        assert_eq!(PresenceMessage::decode(&message.encode()), Some(message));
    }

    assert_eq!(
        PresenceMessage::decode(r#"{"kind":"query-peers","peer_id":"b"}"#),
        Some(PresenceMessage::QueryPeers {
            peer_id: "b".to_string()
        })
    );
}

#[test]
fn decode_rejects_unknown_shapes() {
    assert_eq!(PresenceMessage::decode("not json at all"), None);
    assert_eq!(PresenceMessage::decode("{}"), None);
    assert_eq!(PresenceMessage::decode("[1,2,3]"), None);
    assert_eq!(
        PresenceMessage::decode(r#"{"kind":"mystery","peer_id":"a"}"#),
        None
    );
    assert_eq!(PresenceMessage::decode(r#"{"kind":"announce"}"#), None);
}

#[test]
fn registry_never_contains_self() {
    let mut registry = PeerRegistry::new("me".to_string());
    registry.record_seen("me", 100);
    registry.record_seen("other", 100);

    assert!(!registry.contains("me"));
    assert!(registry.contains("other"));
    assert_eq!(registry.live_count(), 1);
}

#[derive(Clone, Copy)]
enum Op {
    Seen(&'static str),
    Departed(&'static str),
}

fn apply(registry: &mut PeerRegistry, op: Op, at: i64) {
    match op {
        Op::Seen(peer_id) => registry.record_seen(peer_id, at),
        Op::Departed(peer_id) => {
            registry.drop_peer(peer_id, at);
        }
    }
}

fn permutations(ops: &[Op]) -> Vec<Vec<Op>> {
    if ops.len() <= 1 {
        return vec![ops.to_vec()];
    }
    let mut all = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        let mut rest = ops.to_vec();
        rest.remove(index);
        for mut tail in permutations(&rest) {
            tail.insert(0, *op);
            all.push(tail);
        }
    }
    all
}

#[test]
fn registry_is_order_insensitive() {
    // A fixed set of signals, all carrying the same timestamp, must leave
    // the registry in the same state no matter the arrival order.
    let ops = [
        Op::Seen("b"),
        Op::Seen("b"),
        Op::Departed("b"),
        Op::Seen("c"),
        Op::Seen("c"),
    ];

    for permutation in permutations(&ops) {
        let mut registry = PeerRegistry::new("a".to_string());
        for op in permutation {
            apply(&mut registry, op, 1_000);
        }
        assert!(!registry.contains("b"), "departed peer resurrected");
        assert!(registry.contains("c"));
        assert_eq!(registry.live_count(), 1);
    }
}

#[test]
fn sweep_reaps_no_sooner_than_the_timeout() {
    let timeout = 200;
    let mut registry = PeerRegistry::new("a".to_string());
    registry.record_seen("b", 1_000);

    assert!(registry.sweep(1_000 + timeout, timeout).is_empty());
    assert!(registry.contains("b"));

    let reaped = registry.sweep(1_000 + timeout + 1, timeout);
    assert_eq!(reaped, vec!["b".to_string()]);
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn stale_signal_cannot_resurrect_a_departed_peer() {
    let mut registry = PeerRegistry::new("a".to_string());
    registry.record_seen("b", 1_000);
    registry.drop_peer("b", 1_500);

    // A heartbeat delayed from before the departure arrives late.
    registry.record_seen("b", 1_200);
    assert!(!registry.contains("b"));

    // A genuinely newer signal is accepted again.
    registry.record_seen("b", 2_000);
    assert!(registry.contains("b"));
}

#[test]
fn heartbeats_keep_the_newest_timestamp() {
    let mut registry = PeerRegistry::new("a".to_string());
    registry.record_seen("b", 2_000);
    registry.record_seen("b", 1_000);

    // The older signal must not roll the entry back.
    assert!(registry.sweep(2_100, 500).is_empty());
    assert!(registry.contains("b"));
}
