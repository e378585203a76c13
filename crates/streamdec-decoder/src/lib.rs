//! Incremental, poll-driven video decoding on top of ffmpeg.
//!
//! Bytes are pushed into a [`Session`] in whatever chunks the caller has;
//! each [`Session::poll`] either yields one packed RGB frame or says why it
//! could not ([`Response::Again`], [`Response::EndOfInput`],
//! [`Response::Fatal`]). [`Handler`] wraps sessions behind opaque handles for
//! hosts that manage several streams.

mod config;
mod container;
mod convert;
mod handler;
mod io;
mod queue;
mod session;
mod stream;

pub use config::{Configuration, DEFAULT_IO_BUFFER_SIZE, DEFAULT_PROBE_LIMIT};
pub use handler::{DataType, Handler, SessionHandle};
pub use io::PullSource;
pub use queue::InputQueue;
pub use session::{Progress, Session};
pub use streamdec_types::{
    DecoderError, DecoderResult, PixelLayout, Response, RgbFrame, Status,
};
