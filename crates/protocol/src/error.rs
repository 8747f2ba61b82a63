use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    #[error("Length prefix exceeds 5 bytes")]
    LengthPrefixTooLong,

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Unknown parameter type tag: {0}")]
    UnknownTypeTag(u8),

    #[error("Negative parameter count: {0}")]
    NegativeParamCount(i32),

    #[error("Malformed JSON fallback payload for {type_name}: {message}")]
    InvalidJson { type_name: String, message: String },

    #[error("Parameter {index}: cannot convert {found} to {expected}")]
    ParamMismatch {
        index: usize,
        found: &'static str,
        expected: &'static str,
    },

    #[error("Frame does not carry the spawn discriminator")]
    NotSpawnFrame,
}

/// Result type for decode operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("JSON fallback encode failed: {0}")]
    Json(String),

    #[error("Method name is {0} bytes; names must stay under 255 bytes")]
    MethodNameTooLong(usize),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Transport already started")]
    AlreadyStarted,

    #[error("Transport not started")]
    NotStarted,

    #[error("Failed to bind port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("Failed to connect to {host}:{port}: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },
}
