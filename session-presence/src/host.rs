use log::info;

/// Blocking yes/no and acknowledgement prompts, used only around explicit
/// user-initiated logout, never in any automated path.
pub trait UserPrompt: Send + Sync {
    fn confirm(&self, title: &str, message: &str) -> bool;
    fn alert(&self, title: &str, message: &str);
}

/// The navigation side effect at the end of teardown: send this context to
/// the unauthenticated entry point.
pub trait EntryRedirect: Send + Sync {
    fn redirect_to_entry(&self);
}

/// Headless prompt that approves everything; for simulations and tests.
pub struct AutoConfirm;

impl UserPrompt for AutoConfirm {
    fn confirm(&self, title: &str, message: &str) -> bool {
        info!("Confirm [{title}]: {message} -> yes");
        true
    }

    fn alert(&self, title: &str, message: &str) {
        info!("Alert [{title}]: {message}");
    }
}

/// Logs the redirect instead of navigating; the simulation has no browser.
pub struct LogRedirect;

impl EntryRedirect for LogRedirect {
    fn redirect_to_entry(&self) {
        info!("Redirecting to the unauthenticated entry point");
    }
}
