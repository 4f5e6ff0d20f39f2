use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImprintError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Malformed perceptual hash: {0}")]
    MalformedHash(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid overlay position: {0}")]
    InvalidPosition(String),

    #[error("Invalid overlay color: {0}")]
    InvalidColor(String),

    #[error("Unknown overlay kind: {0}")]
    UnknownOverlayKind(String),

    #[error("Too many overlays: {count} provided, maximum is {max}")]
    TooManyOverlays { count: usize, max: usize },

    #[error("Encode error: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, ImprintError>;
