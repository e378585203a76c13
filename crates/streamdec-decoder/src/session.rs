use std::sync::{Arc, OnceLock};

use ffmpeg_next::frame::Video as FfFrame;
use ffmpeg_next::util::log;
use parking_lot::Mutex;
use streamdec_types::{DecoderError, DecoderResult, Response, RgbFrame};
use tracing::{debug, trace, warn};

use crate::config::Configuration;
use crate::container::Container;
use crate::convert::FrameConverter;
use crate::queue::InputQueue;
use crate::stream::VideoStream;

/// Result of a pipeline stage that may need more input before it can finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<T> {
    Ready(T),
    Again,
    EndOfInput,
}

impl<T> Progress<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Progress<U> {
        match self {
            Progress::Ready(value) => Progress::Ready(f(value)),
            Progress::Again => Progress::Again,
            Progress::EndOfInput => Progress::EndOfInput,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Progress::Ready(_))
    }
}

enum Terminal {
    EndOfInput,
    Fatal(String),
}

impl Terminal {
    fn response(&self) -> Response {
        match self {
            Terminal::EndOfInput => Response::EndOfInput,
            Terminal::Fatal(message) => Response::Fatal(message.clone()),
        }
    }
}

/// One logical input stream: buffered bytes in, decoded frames out.
///
/// Every call to [`Session::poll`] runs at most one pipeline cycle and never
/// blocks. Container, decoder and scratch state are released when the session
/// is dropped.
pub struct Session {
    config: Configuration,
    // Field order is drop order: the decoder goes before the demuxer, and both
    // before the queue their callbacks read from.
    stream: Option<VideoStream>,
    container: Option<Container>,
    frame: FfFrame,
    converter: FrameConverter,
    terminal: Option<Terminal>,
    queue: Arc<Mutex<InputQueue>>,
}

impl Session {
    pub fn open(config: Configuration) -> DecoderResult<Self> {
        config.validate()?;
        init_ffmpeg()?;
        let converter = FrameConverter::new(config.pixel_layout);
        Ok(Self {
            config,
            stream: None,
            container: None,
            frame: FfFrame::empty(),
            converter,
            terminal: None,
            queue: Arc::new(Mutex::new(InputQueue::new())),
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Appends bytes to the input queue.
    pub fn push(&self, data: &[u8]) {
        let mut queue = self.queue.lock();
        queue.push(data);
        trace!(pushed = data.len(), buffered = queue.available(), "input pushed");
    }

    /// Bytes pushed but not yet handed to the demuxer.
    pub fn buffered(&self) -> usize {
        self.queue.lock().available()
    }

    pub fn is_container_open(&self) -> bool {
        self.container.is_some()
    }

    pub fn container_format(&self) -> Option<String> {
        self.container.as_ref().map(Container::format_name)
    }

    /// Index of the selected video stream once the decoder is open.
    pub fn selected_stream(&self) -> Option<usize> {
        self.stream.as_ref().map(VideoStream::index)
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }

    /// Opens the container if it is not open yet.
    pub fn ensure_open(&mut self) -> DecoderResult<Progress<()>> {
        if self.container.is_none() {
            match Container::open(&self.queue, &self.config)? {
                Progress::Ready(container) => {
                    debug!(format = %container.format_name(), "container opened");
                    self.container = Some(container);
                }
                pending => return Ok(pending.map(|_| ())),
            }
        }
        Ok(Progress::Ready(()))
    }

    /// Opens the container and the video decoder if they are not open yet.
    pub fn ensure_stream_ready(&mut self) -> DecoderResult<Progress<()>> {
        if self.stream.is_some() {
            return Ok(Progress::Ready(()));
        }
        let opened = self.ensure_open()?;
        if !opened.is_ready() {
            return Ok(opened);
        }
        let Some(container) = self.container.as_mut() else {
            return Ok(Progress::Again);
        };
        match VideoStream::select(container, &self.config)? {
            Progress::Ready(stream) => {
                self.stream = Some(stream);
                Ok(Progress::Ready(()))
            }
            pending => Ok(pending.map(|_| ())),
        }
    }

    /// Runs one pipeline cycle.
    ///
    /// Once `EndOfInput` or `Fatal` has been returned, later polls repeat that
    /// outcome without touching the demuxer again.
    pub fn poll(&mut self) -> Response {
        if let Some(terminal) = &self.terminal {
            return terminal.response();
        }
        self.resume_input();

        let response = match self.advance() {
            Ok(Progress::Ready(frame)) => Response::Frame(frame),
            Ok(Progress::Again) => Response::Again,
            Ok(Progress::EndOfInput) => {
                debug!("end of input");
                self.terminal = Some(Terminal::EndOfInput);
                Response::EndOfInput
            }
            Err(err) => {
                warn!(error = %err, "decoding session failed");
                let message = err.to_string();
                self.terminal = Some(Terminal::Fatal(message.clone()));
                Response::Fatal(message)
            }
        };
        trace!(status = %response.status(), "poll finished");
        response
    }

    fn resume_input(&mut self) {
        if let Some(container) = self.container.as_mut()
            && !self.queue.lock().is_empty()
        {
            container.resume();
        }
    }

    fn advance(&mut self) -> DecoderResult<Progress<RgbFrame>> {
        match self.ensure_stream_ready()? {
            Progress::Ready(()) => {}
            Progress::Again => return Ok(Progress::Again),
            Progress::EndOfInput => return Ok(Progress::EndOfInput),
        }
        let (Some(container), Some(stream)) = (self.container.as_mut(), self.stream.as_mut())
        else {
            return Ok(Progress::Again);
        };
        match stream.decode_next(container, &mut self.frame)? {
            Progress::Ready(()) => self
                .converter
                .convert(&self.frame, stream.time_base())
                .map(Progress::Ready),
            Progress::Again => Ok(Progress::Again),
            Progress::EndOfInput => Ok(Progress::EndOfInput),
        }
    }
}

fn init_ffmpeg() -> DecoderResult<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| {
        ffmpeg_next::init().map_err(|err| err.to_string())?;
        log::set_level(log::Level::Error);
        Ok(())
    })
    .clone()
    .map_err(DecoderError::Init)
}
