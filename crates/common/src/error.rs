//! Error types shared across Stagecast crates.

/// Top-level error type for Stagecast operations.
#[derive(Debug, thiserror::Error)]
pub enum StagecastError {
    /// The input line could not be understood as a command envelope.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A command was well-formed but a required field was missing or mistyped.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The media engine rejected or failed an operation.
    #[error("Engine error: {message}")]
    Engine { message: String },

    /// A command arrived in a session state that cannot accept it.
    #[error("Precondition violated: {message}")]
    Precondition { message: String },

    /// The raw-frame export socket or callback failed.
    #[error("Frame export error: {message}")]
    Export { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StagecastError.
pub type Result<T> = std::result::Result<T, StagecastError>;

impl StagecastError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    /// Message suitable for the `error` field of a wire response.
    pub fn response_message(&self) -> String {
        self.to_string()
    }
}
