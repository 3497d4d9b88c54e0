use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is not authorized")]
    NotAuthorized,
    #[error("No subject identity in store")]
    MissingSubject,
    #[error("No session start time in store")]
    MissingStartTime,
    #[error("Session was already torn down")]
    TornDown,
}
