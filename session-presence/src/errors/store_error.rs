use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not read store document: {0}")]
    Io(#[from] std::io::Error),
}
