use thiserror::Error;

pub type DecoderResult<T> = Result<T, DecoderError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("{operation} is not supported")]
    Unsupported { operation: &'static str },
    #[error("failed to initialize ffmpeg: {0}")]
    Init(String),
    #[error("could not allocate {0}")]
    Allocation(&'static str),
    #[error("unrecognized container format")]
    UnrecognizedFormat,
    #[error("could not open input: {0}")]
    OpenInput(String),
    #[error("no video stream")]
    NoVideoStream,
    #[error("could not copy codec parameters: {0}")]
    CopyParameters(String),
    #[error("could not open codec: {0}")]
    OpenCodec(String),
    #[error("could not send packet: {0}")]
    SendPacket(String),
    #[error("decoding error: {0}")]
    Decode(String),
    #[error("could not convert frame: {0}")]
    Convert(String),
    #[error("invalid session handle {0}")]
    InvalidHandle(u64),
}

impl DecoderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DecoderError::Configuration {
            message: message.into(),
        }
    }

    pub fn unsupported(operation: &'static str) -> Self {
        DecoderError::Unsupported { operation }
    }
}
