use runway_codec::CodecError;
use thiserror::Error;

use crate::report::ErrorKind;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("Could not find handler method")]
    HandlerNotFound { specifier: String },

    #[error("could not construct handler `{type_name}`: {reason}")]
    Construction { type_name: String, reason: String },

    #[error("Unsupported handler: {0}")]
    UnsupportedHandler(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Handler(anyhow::Error),
}

impl RuntimeError {
    /// Which tier of the platform's failure model this error belongs to.
    ///
    /// Init errors mean no handler can serve any event; everything else is
    /// confined to the invocation that raised it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::HandlerNotFound { .. }
            | RuntimeError::Construction { .. }
            | RuntimeError::UnsupportedHandler(_)
            | RuntimeError::Config(_) => ErrorKind::InitError,
            RuntimeError::Transport(_) | RuntimeError::Codec(_) | RuntimeError::Handler(_) => {
                ErrorKind::RuntimeError
            }
        }
    }
}
