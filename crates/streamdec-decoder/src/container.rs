use std::ffi::CStr;
use std::os::raw::c_int;
use std::ptr;
use std::sync::Arc;

use ffmpeg_next::error::Error as FfmpegError;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::packet::Packet;
use parking_lot::Mutex;
use streamdec_types::{DecoderError, DecoderResult};
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::io::CustomIo;
use crate::queue::InputQueue;
use crate::session::Progress;

/// Score a format must beat before the probe window is full.
const PROBE_SCORE_RETRY: c_int = 25;
/// Zeroed tail ffmpeg's probe functions may read past the payload.
const PROBE_PADDING_SIZE: usize = 32;

/// An opened demuxer reading through the session's custom I/O.
pub(crate) struct Container {
    // Dropped before `io`: closing the input must not outlive the AVIO context.
    input: Input,
    io: CustomIo<InputQueue>,
    queue: Arc<Mutex<InputQueue>>,
    journaled: bool,
}

impl Container {
    /// Tries to open the container from the bytes buffered so far.
    pub(crate) fn open(
        queue: &Arc<Mutex<InputQueue>>,
        config: &Configuration,
    ) -> DecoderResult<Progress<Self>> {
        let format = if config.retry_incomplete_header {
            match detect_format(&queue.lock(), config.probe_limit.get())? {
                Some(detected) => {
                    debug!(format = %detected.name, score = detected.score, "container format detected");
                    detected.format
                }
                None => return Ok(Progress::Again),
            }
        } else {
            ptr::null()
        };
        Self::open_with(queue, config, format)
    }

    fn open_with(
        queue: &Arc<Mutex<InputQueue>>,
        config: &Configuration,
        format: *const ffi::AVInputFormat,
    ) -> DecoderResult<Progress<Self>> {
        let journaled = config.retry_incomplete_header;
        let mut io = CustomIo::new(Arc::clone(queue), config.io_buffer_size.get())?;
        if journaled {
            queue.lock().begin_journal();
        }

        let mut ctx = unsafe { ffi::avformat_alloc_context() };
        if ctx.is_null() {
            return Err(DecoderError::Allocation("format context"));
        }
        let ret = unsafe {
            (*ctx).pb = io.as_mut_ptr();
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;
            // Frees the context and nulls `ctx` on failure.
            ffi::avformat_open_input(&mut ctx, c"".as_ptr(), format, ptr::null_mut())
        };

        if ret < 0 {
            let mut queue = queue.lock();
            let starved = queue.take_starved();
            queue.rewind();
            let err = ffmpeg_next::Error::from(ret);
            if journaled && starved {
                debug!(error = %err, buffered = queue.available(), "container header incomplete");
                return Ok(Progress::Again);
            }
            return Err(DecoderError::OpenInput(err.to_string()));
        }

        let input = unsafe { Input::wrap(ctx) };
        Ok(Progress::Ready(Self {
            input,
            io,
            queue: Arc::clone(queue),
            journaled,
        }))
    }

    /// Opens the same container again from the first pushed byte.
    ///
    /// Everything read so far is replayed; nothing may have been released
    /// from the queue yet.
    pub(crate) fn restart(&mut self, config: &Configuration) -> DecoderResult<()> {
        let format = unsafe { self.input.format().as_ptr() };
        match Self::open_with(&self.queue, config, format)? {
            Progress::Ready(fresh) => {
                *self = fresh;
                debug!(format = %self.format_name(), "container reopened");
                Ok(())
            }
            _ => Err(DecoderError::OpenInput(
                "container header could not be read again".to_string(),
            )),
        }
    }

    /// Whether reads can be undone and replayed.
    pub(crate) fn is_journaled(&self) -> bool {
        self.journaled
    }

    pub(crate) fn input(&self) -> &Input {
        &self.input
    }

    pub(crate) fn format_name(&self) -> String {
        self.input.format().name().to_string()
    }

    /// Gathers stream info and reports whether the reader ran out of input.
    pub(crate) fn find_stream_info(&mut self) -> Result<bool, FfmpegError> {
        self.queue.lock().take_starved();
        let ret =
            unsafe { ffi::avformat_find_stream_info(self.input.as_mut_ptr(), ptr::null_mut()) };
        let starved = self.queue.lock().take_starved();
        if ret < 0 {
            return Err(FfmpegError::from(ret));
        }
        Ok(starved)
    }

    /// Reads the next packet of any stream.
    ///
    /// With journaled input a packet cut short by an empty queue is undone:
    /// the queue and the AVIO buffer go back to where the packet started and
    /// `Again` is returned. Running dry exactly at a packet boundary is the
    /// end of input.
    pub(crate) fn read_packet(&mut self) -> Progress<Packet> {
        let start = self.io.position();
        if self.journaled {
            let mut queue = self.queue.lock();
            queue.release_to(start);
            queue.take_starved();
        }

        let mut packet = Packet::empty();
        let result = packet.read(&mut self.input);
        let starved = self.queue.lock().take_starved();
        match result {
            Ok(()) => Progress::Ready(packet),
            Err(err) if self.journaled && starved => {
                let pending = self.queue.lock().end().saturating_sub(start);
                if pending == 0 {
                    return Progress::EndOfInput;
                }
                debug!(error = %err, start, pending, "packet incomplete, rewinding");
                self.rewind_to(start);
                Progress::Again
            }
            Err(FfmpegError::Eof) => Progress::EndOfInput,
            Err(err) => {
                debug!(error = %err, "demuxer could not supply a packet");
                Progress::Again
            }
        }
    }

    /// Re-arms the reader after it reported end of data to the demuxer.
    pub(crate) fn resume(&mut self) {
        self.io.clear_eof();
    }

    fn rewind_to(&mut self, position: u64) {
        if self.queue.lock().seek(position) {
            self.io.restart_at(position);
        } else {
            warn!(position, "packet start is no longer buffered");
        }
    }
}

struct DetectedFormat {
    format: *const ffi::AVInputFormat,
    name: String,
    score: c_int,
}

/// Scores the buffered prefix against every registered demuxer.
///
/// `Ok(None)` means the prefix is not conclusive yet and more bytes may help.
fn detect_format(queue: &InputQueue, probe_limit: usize) -> DecoderResult<Option<DetectedFormat>> {
    let mut probe = queue.peek(probe_limit);
    let len = probe.len();
    if len == 0 {
        return Ok(None);
    }
    let window_full = len >= probe_limit;
    probe.resize(len + PROBE_PADDING_SIZE, 0);

    let data = ffi::AVProbeData {
        filename: c"".as_ptr(),
        buf: probe.as_mut_ptr(),
        buf_size: len as c_int,
        mime_type: ptr::null(),
    };
    let mut score: c_int = 0;
    let format = unsafe { ffi::av_probe_input_format3(&data, 1, &mut score) };

    let threshold = if window_full { 0 } else { PROBE_SCORE_RETRY };
    if !format.is_null() && score > threshold {
        let name = unsafe { CStr::from_ptr((*format).name) }
            .to_string_lossy()
            .into_owned();
        return Ok(Some(DetectedFormat {
            format,
            name,
            score,
        }));
    }
    if window_full {
        return Err(DecoderError::UnrecognizedFormat);
    }
    Ok(None)
}
