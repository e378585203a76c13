use std::fmt;

use crate::RgbFrame;

/// Outcome of a single poll of a decoding session.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// One decoded frame, owned by the caller from here on.
    Frame(RgbFrame),
    /// Not enough input is buffered; push more bytes and poll again.
    Again,
    /// The stream ended cleanly. No further frames will be produced.
    EndOfInput,
    /// The session failed and cannot make further progress.
    Fatal(String),
}

impl Response {
    pub fn fatal(message: impl Into<String>) -> Self {
        Response::Fatal(message.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Frame(_) => Status::Normal,
            Response::Again => Status::Again,
            Response::EndOfInput => Status::EndOfInput,
            Response::Fatal(_) => Status::Fatal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Response::EndOfInput | Response::Fatal(_))
    }

    pub fn into_frame(self) -> Option<RgbFrame> {
        match self {
            Response::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Payload-free discriminant of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Normal,
    Again,
    EndOfInput,
    Fatal,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Again => "again",
            Status::EndOfInput => "eoi",
            Status::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
