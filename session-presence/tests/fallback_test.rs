mod common;

use common::{CountingTerminator, spawn_tab, test_config};
use session_presence::{AutoConfirm, ChannelHub, FactStore, MemoryStore, Session, session};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn occupied_store() -> Arc<dyn FactStore> {
    let store = MemoryStore::new();
    Session::login(&store, "alice@example.com");
    Arc::new(store)
}

#[tokio::test]
async fn peers_discover_each_other_through_the_store_alone() {
    let store = occupied_store();
    let config = test_config();
    let terminator = CountingTerminator::new();

    // No broadcast hub at all: store records are the only signal.
    let (task_a, a) = spawn_tab(&store, None, &config, &terminator);
    let (task_b, b) = spawn_tab(&store, None, &config, &terminator);

    sleep(config.heartbeat_interval * 4).await;

    assert_eq!(a.live_peers(), 1);
    assert_eq!(b.live_peers(), 1);

    task_a.abort();
    task_b.abort();
}

#[tokio::test]
async fn teardown_marker_reaches_peers_without_broadcast() {
    let store = occupied_store();
    let config = test_config();
    let terminator = CountingTerminator::new();

    let (task_a, a) = spawn_tab(&store, None, &config, &terminator);
    let (task_b, mut b) = spawn_tab(&store, None, &config, &terminator);

    sleep(config.heartbeat_interval * 4).await;

    assert!(a.logout(&AutoConfirm).await);
    b.closed().await;
    task_a.await.expect("Tab task failed");
    task_b.await.expect("Tab task failed");

    assert!(!b.occupied());
    sleep(Duration::from_millis(50)).await;
    assert_eq!(terminator.count(), 1);
}

#[tokio::test]
async fn malformed_peer_records_are_ignored_and_pruned() {
    let store = occupied_store();
    let config = test_config();
    let terminator = CountingTerminator::new();

    store.set("presence/peer/bogus", "{ this is not json");
    store.set("presence/peer/shaped", r#"{"foo": 1}"#);

    let (task_a, a) = spawn_tab(&store, None, &config, &terminator);
    sleep(config.heartbeat_interval * 4).await;

    // No phantom peers, and the garbage is gone.
    assert_eq!(a.live_peers(), 0);
    assert_eq!(store.get("presence/peer/bogus"), None);
    assert_eq!(store.get("presence/peer/shaped"), None);

    task_a.abort();
}

#[tokio::test]
async fn silent_peer_is_reaped_in_fallback_mode() {
    let store = occupied_store();
    let config = test_config();
    let terminator = CountingTerminator::new();

    let (task_a, a) = spawn_tab(&store, None, &config, &terminator);
    let (task_b, _b) = spawn_tab(&store, None, &config, &terminator);

    sleep(config.heartbeat_interval * 4).await;
    assert_eq!(a.live_peers(), 1);

    task_b.abort();
    sleep(config.peer_timeout + config.heartbeat_interval * 3).await;
    assert_eq!(a.live_peers(), 0);

    task_a.abort();
}

#[tokio::test]
async fn teardown_missed_by_the_event_feed_is_observed_on_a_tick() {
    let store = occupied_store();
    let config = test_config();
    let terminator = CountingTerminator::new();

    let (task_a, a) = spawn_tab(&store, None, &config, &terminator);
    sleep(config.heartbeat_interval * 2).await;
    assert!(a.occupied());

    // Another context tears the session down, and a burst of unrelated
    // writes pushes the marker notification out of the bounded event feed
    // before this context gets to read it.
    store.remove(session::SUBJECT_KEY);
    store.remove(session::STARTED_AT_KEY);
    store.remove(session::AUTHORIZED_KEY);
    store.set(
        session::TEARDOWN_KEY,
        &format!(
            r#"{{"peer_id":"some-other-tab","at":{}}}"#,
            session::now_ms()
        ),
    );
    for index in 0..200 {
        store.set(&format!("noise/{index}"), "x");
    }

    // The per-tick store re-read must still catch the teardown.
    sleep(config.heartbeat_interval * 4).await;
    assert!(!a.occupied());
    task_a.await.expect("Tab task failed");

    // The tab that wrote the marker already revoked the session remotely.
    assert_eq!(terminator.count(), 0);
}

async fn run_session_to_teardown(with_channel: bool) -> BTreeSet<String> {
    let store = occupied_store();
    let hub = ChannelHub::new();
    let hub = with_channel.then_some(&hub);
    let config = test_config();
    let terminator = CountingTerminator::new();

    let (task_a, a) = spawn_tab(&store, hub, &config, &terminator);
    let (task_b, mut b) = spawn_tab(&store, hub, &config, &terminator);

    sleep(config.heartbeat_interval * 4).await;
    assert!(a.logout(&AutoConfirm).await);
    b.closed().await;
    task_a.await.expect("Tab task failed");
    task_b.await.expect("Tab task failed");

    let mut keys: BTreeSet<String> = store.keys_with_prefix("").into_iter().collect();
    // The marker payload differs by peer id; only its presence matters.
    assert!(keys.remove(session::TEARDOWN_KEY));
    keys
}

#[tokio::test]
async fn fallback_converges_to_the_same_final_store_state() {
    let with_channel = run_session_to_teardown(true).await;
    let without_channel = run_session_to_teardown(false).await;

    assert!(with_channel.is_empty());
    assert_eq!(with_channel, without_channel);
}
