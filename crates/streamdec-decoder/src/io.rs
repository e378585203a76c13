use std::ffi::c_void;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::Arc;

use ffmpeg_next::ffi;
use parking_lot::Mutex;
use streamdec_types::{DecoderError, DecoderResult};

/// Non-blocking byte source read by the demuxer.
pub trait PullSource {
    /// Fills the front of `dst` with up to `dst.len()` bytes and returns how
    /// many were written. Zero means nothing is buffered right now.
    fn pull(&mut self, dst: &mut [u8]) -> usize;
}

/// Read-only AVIO context backed by a shared [`PullSource`].
///
/// Owns both the AVIO context and its internal buffer. The source stays alive
/// for as long as the context can call back into it.
pub(crate) struct CustomIo<S> {
    ctx: NonNull<ffi::AVIOContext>,
    _source: Arc<Mutex<S>>,
}

impl<S: PullSource> CustomIo<S> {
    pub(crate) fn new(source: Arc<Mutex<S>>, buffer_size: usize) -> DecoderResult<Self> {
        let size = c_int::try_from(buffer_size).map_err(|_| {
            DecoderError::configuration(format!("io buffer size {buffer_size} is too large"))
        })?;
        let opaque = Arc::as_ptr(&source) as *mut c_void;
        unsafe {
            let buffer = ffi::av_malloc(buffer_size) as *mut u8;
            if buffer.is_null() {
                return Err(DecoderError::Allocation("io buffer"));
            }
            let ctx = ffi::avio_alloc_context(
                buffer,
                size,
                0,
                opaque,
                Some(read_trampoline::<S>),
                None,
                None,
            );
            let Some(ctx) = NonNull::new(ctx) else {
                ffi::av_free(buffer as *mut c_void);
                return Err(DecoderError::Allocation("io context"));
            };
            Ok(Self {
                ctx,
                _source: source,
            })
        }
    }
}

impl<S> CustomIo<S> {
    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVIOContext {
        self.ctx.as_ptr()
    }

    /// Lets a demuxer that previously hit the end of buffered input read again.
    pub(crate) fn clear_eof(&mut self) {
        unsafe {
            let ctx = self.ctx.as_ptr();
            (*ctx).eof_reached = 0;
            (*ctx).error = 0;
        }
    }

    /// Stream position of the next byte the demuxer will read.
    pub(crate) fn position(&self) -> u64 {
        unsafe {
            let ctx = self.ctx.as_ptr();
            let unread = (*ctx).buf_end.offset_from((*ctx).buf_ptr) as i64;
            ((*ctx).pos - unread).max(0) as u64
        }
    }

    /// Discards the bytes buffered inside the context so the next read pulls
    /// from the source again, reporting `position` as the current offset.
    ///
    /// The source must already be positioned at `position`.
    pub(crate) fn restart_at(&mut self, position: u64) {
        unsafe {
            let ctx = self.ctx.as_ptr();
            (*ctx).buf_ptr = (*ctx).buffer;
            (*ctx).buf_end = (*ctx).buffer;
            (*ctx).pos = position as i64;
            (*ctx).eof_reached = 0;
            (*ctx).error = 0;
        }
    }
}

impl<S> Drop for CustomIo<S> {
    fn drop(&mut self) {
        unsafe {
            let mut ctx = self.ctx.as_ptr();
            // avio may have replaced the buffer we handed it.
            ffi::av_freep(&raw mut (*ctx).buffer as *mut c_void);
            ffi::avio_context_free(&mut ctx);
        }
    }
}

unsafe extern "C" fn read_trampoline<S: PullSource>(
    opaque: *mut c_void,
    buf: *mut u8,
    buf_size: c_int,
) -> c_int {
    if opaque.is_null() || buf.is_null() || buf_size <= 0 {
        return ffi::AVERROR_EOF;
    }
    let source = unsafe { &*(opaque as *const Mutex<S>) };
    let dst = unsafe { std::slice::from_raw_parts_mut(buf, buf_size as usize) };
    let read = source.lock().pull(dst);
    tracing::trace!(requested = buf_size, read, "custom io read");
    if read == 0 {
        // avio treats a zero-length read as a protocol error.
        ffi::AVERROR_EOF
    } else {
        read as c_int
    }
}
