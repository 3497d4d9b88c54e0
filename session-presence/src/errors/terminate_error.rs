use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminateError {
    #[error("Could not reach termination endpoint: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Termination endpoint answered with status {0}")]
    Status(u16),
}
