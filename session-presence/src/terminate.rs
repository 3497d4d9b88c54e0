use crate::errors::terminate_error::TerminateError;
use async_trait::async_trait;

/// Best-effort remote revocation of the server-side session. Called at most
/// once per logical teardown; every failure is tolerated and only logged,
/// because the local decision is authoritative for the local context.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self, subject: &str) -> Result<(), TerminateError>;
}

/// POSTs `{ "subject": … }` to the configured termination endpoint.
pub struct HttpTerminator {
    client: reqwest::Client,
    url: String,
}

impl HttpTerminator {
    pub fn new(url: String) -> Self {
        HttpTerminator {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl SessionTerminator for HttpTerminator {
    async fn terminate(&self, subject: &str) -> Result<(), TerminateError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "subject": subject }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TerminateError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no endpoint is configured.
pub struct NoopTerminator;

#[async_trait]
impl SessionTerminator for NoopTerminator {
    async fn terminate(&self, _subject: &str) -> Result<(), TerminateError> {
        Ok(())
    }
}
