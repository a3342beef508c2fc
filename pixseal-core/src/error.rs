use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixsealError {
    /// The image container could not be decoded. Canonical hashing
    /// recovers from this locally by falling back to raw-byte hashing;
    /// the degraded mode is surfaced via [`crate::hash::HashMode`].
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Key material unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Signing backend error: {0}")]
    SigningBackend(String),

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Unsupported signature scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Metadata carrier error: {0}")]
    Carrier(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PixsealError>;
