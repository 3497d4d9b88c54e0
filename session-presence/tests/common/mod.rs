#![allow(dead_code)]

use async_trait::async_trait;
use session_presence::errors::terminate_error::TerminateError;
use session_presence::{
    ChannelHub, EntryRedirect, FactStore, PresenceConfig, PresenceEngine, PresenceHandle,
    SessionTerminator,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

pub fn test_config() -> PresenceConfig {
    PresenceConfig {
        heartbeat_interval: Duration::from_millis(50),
        peer_timeout: Duration::from_millis(200),
        init_window: Duration::from_millis(80),
        max_lifetime: Duration::from_secs(60),
        terminate_url: None,
    }
    .validate()
    .expect("Invalid test configuration")
}

/// Records how often the backend was asked to revoke the session.
pub struct CountingTerminator {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingTerminator {
    pub fn new() -> Arc<CountingTerminator> {
        Arc::new(CountingTerminator {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    /// A terminator whose endpoint always answers with a server error.
    pub fn failing() -> Arc<CountingTerminator> {
        Arc::new(CountingTerminator {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionTerminator for CountingTerminator {
    async fn terminate(&self, _subject: &str) -> Result<(), TerminateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TerminateError::Status(500));
        }
        Ok(())
    }
}

pub struct SilentRedirect;

impl EntryRedirect for SilentRedirect {
    fn redirect_to_entry(&self) {}
}

pub fn spawn_tab(
    store: &Arc<dyn FactStore>,
    hub: Option<&ChannelHub>,
    config: &PresenceConfig,
    terminator: &Arc<CountingTerminator>,
) -> (JoinHandle<()>, PresenceHandle) {
    let terminator: Arc<dyn SessionTerminator> = terminator.clone();
    let (engine, handle) = PresenceEngine::initialize(
        store.clone(),
        hub,
        config.clone(),
        terminator,
        Arc::new(SilentRedirect),
    )
    .expect("Could not initialize presence engine");
    (tokio::spawn(engine.run()), handle)
}
