//! Error types for the node daemon.

/// Errors that can occur while setting up or running a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("malformed data frame: {0}")]
    Frame(String),
    #[error("no interfaces configured")]
    NoInterfaces,
    #[error("node already running")]
    AlreadyRunning,
}
