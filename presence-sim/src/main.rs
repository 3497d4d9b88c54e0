use dotenvy::dotenv;
use env_logger::Env;
use log::{error, info};
use session_presence::{
    AutoConfirm, ChannelHub, FactStore, FileStore, HttpTerminator, LogRedirect, NoopTerminator,
    PresenceConfig, PresenceEngine, PresenceHandle, Session, SessionTerminator, UserPrompt,
};
use std::env;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Simulates several tabs of one browser profile sharing a session: three
/// tabs open, one is killed without cleanup, one closes gracefully, and the
/// last one logs out explicitly.
#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("debug")).init();

    let config = PresenceConfig::from_env().expect("Invalid presence configuration");

    let store_path = env::var("STORE_PATH").unwrap_or_else(|_| {
        env::temp_dir()
            .join("session-presence.json")
            .display()
            .to_string()
    });
    let store: Arc<dyn FactStore> =
        Arc::new(FileStore::open(&store_path).expect("Could not open fact store"));
    info!("Fact store at {store_path}");

    let hub = ChannelHub::new();

    let terminator: Arc<dyn SessionTerminator> = match &config.terminate_url {
        Some(url) => Arc::new(HttpTerminator::new(url.clone())),
        None => Arc::new(NoopTerminator),
    };

    let session = Session::login(store.as_ref(), "agent@example-realty.test");
    info!("Session for {} started at {}", session.subject, session.started_at);

    let mut tabs: Vec<(JoinHandle<()>, PresenceHandle)> = Vec::new();
    for _ in 0..3 {
        let (engine, handle) = PresenceEngine::initialize(
            store.clone(),
            Some(&hub),
            config.clone(),
            terminator.clone(),
            Arc::new(LogRedirect),
        )
        .expect("Could not initialize presence engine");
        tabs.push((tokio::spawn(engine.run()), handle));
    }

    sleep(config.heartbeat_interval * 2).await;
    for (_, handle) in &tabs {
        info!("Tab {} sees {} peer(s)", handle.peer_id(), handle.live_peers());
    }

    // This tab dies without running any cleanup code; the survivors only
    // notice once its heartbeats stop.
    let (task, handle) = tabs.remove(2);
    task.abort();
    info!("Killed tab {} abruptly", handle.peer_id());

    sleep(config.peer_timeout + config.heartbeat_interval * 2).await;
    for (_, handle) in &tabs {
        info!(
            "Tab {} sees {} peer(s) after the reaping window",
            handle.peer_id(),
            handle.live_peers()
        );
    }

    let (task, handle) = tabs.remove(1);
    handle.terminate().await;
    if let Err(err) = task.await {
        error!("Closed tab task failed: {err}");
    }
    info!("Tab {} closed gracefully", handle.peer_id());

    sleep(config.heartbeat_interval).await;

    let (task, mut handle) = tabs.remove(0);
    let prompt = AutoConfirm;
    if handle.logout(&prompt).await {
        handle.closed().await;
        prompt.alert("Signed out", "The session has ended in every tab");
    }
    if let Err(err) = task.await {
        if !err.is_cancelled() {
            error!("Tab task failed: {err}");
        }
    }

    info!("Simulation complete");
}
