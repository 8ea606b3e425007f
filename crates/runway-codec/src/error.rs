use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("scalar codec `{codec}` failed: {reason}")]
    Scalar { codec: String, reason: String },
}
