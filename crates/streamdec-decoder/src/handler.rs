use std::collections::HashMap;
use std::fmt;

use streamdec_types::{DecoderError, DecoderResult, Response};
use tracing::debug;

use crate::config::Configuration;
use crate::session::Session;

/// Kind of data a handler produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Video,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Video => "video",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-facing adapter that owns any number of decoding sessions behind
/// opaque handles.
pub struct Handler {
    config: Configuration,
    sessions: HashMap<SessionHandle, Session>,
    next_id: u64,
}

impl Handler {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn data_type(&self) -> DataType {
        DataType::Video
    }

    pub fn open(&mut self) -> DecoderResult<SessionHandle> {
        let session = Session::open(self.config.clone())?;
        let handle = SessionHandle(self.next_id);
        self.next_id += 1;
        self.sessions.insert(handle, session);
        debug!(%handle, "session opened");
        Ok(handle)
    }

    pub fn push(&mut self, handle: SessionHandle, data: &[u8]) -> DecoderResult<()> {
        self.session(handle)?.push(data);
        Ok(())
    }

    pub fn poll(&mut self, handle: SessionHandle) -> Response {
        match self.session(handle) {
            Ok(session) => session.poll(),
            Err(err) => Response::Fatal(err.to_string()),
        }
    }

    /// Gives a response back once the caller is done with its buffer.
    pub fn release(&mut self, handle: SessionHandle, response: Response) -> DecoderResult<()> {
        self.session(handle)?;
        drop(response);
        Ok(())
    }

    pub fn close(&mut self, handle: SessionHandle) -> DecoderResult<()> {
        self.sessions
            .remove(&handle)
            .ok_or(DecoderError::InvalidHandle(handle.0))?;
        debug!(%handle, "session closed");
        Ok(())
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Encoding sessions are not available; this handler only decodes.
    pub fn open_upload(&mut self) -> DecoderResult<SessionHandle> {
        Err(DecoderError::unsupported("upload"))
    }

    pub fn upload(&mut self, _handle: SessionHandle, _data: &[u8]) -> Response {
        Response::fatal("upload not supported")
    }

    fn session(&mut self, handle: SessionHandle) -> DecoderResult<&mut Session> {
        self.sessions
            .get_mut(&handle)
            .ok_or(DecoderError::InvalidHandle(handle.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_declares_video_output() {
        let handler = Handler::new(Configuration::default());
        assert_eq!(handler.data_type(), DataType::Video);
        assert_eq!(handler.data_type().to_string(), "video");
    }

    #[test]
    fn upload_is_a_stub() {
        let mut handler = Handler::new(Configuration::default());
        assert_eq!(
            handler.open_upload(),
            Err(DecoderError::unsupported("upload"))
        );
        assert_eq!(
            handler.upload(SessionHandle(7), b"bytes"),
            Response::Fatal("upload not supported".into())
        );
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut handler = Handler::new(Configuration::default());
        let handle = SessionHandle(42);
        assert_eq!(
            handler.push(handle, b"abc"),
            Err(DecoderError::InvalidHandle(42))
        );
        assert_eq!(handler.close(handle), Err(DecoderError::InvalidHandle(42)));
        assert!(matches!(handler.poll(handle), Response::Fatal(msg) if msg.contains("42")));
    }
}
