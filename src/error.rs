use thiserror::Error;

/// Error taxonomy for the client core. Nothing here is fatal to the
/// process; every failure degrades to a narrower observable state
/// (empty list, disabled send, dropped message).
#[derive(Error, Debug)]
pub enum ChitChatError {
    /// The validation collaborator rejected the session credential.
    /// Propagated to the caller (redirect to login), never handled here.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Normalization failure: {0}")]
    NormalizationFailure(String),

    #[error("Directory fetch failure: {0}")]
    DirectoryFetchFailure(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ChitChatError>;
