use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;

use streamdec_types::{DecoderError, DecoderResult, PixelLayout};

use crate::handler::Handler;
use crate::session::Session;

pub const DEFAULT_IO_BUFFER_SIZE: usize = 8192;
pub const DEFAULT_PROBE_LIMIT: usize = 64 * 1024;

const IO_BUFFER_SIZE: NonZeroUsize = NonZeroUsize::new(DEFAULT_IO_BUFFER_SIZE).unwrap();
const PROBE_LIMIT: NonZeroUsize = NonZeroUsize::new(DEFAULT_PROBE_LIMIT).unwrap();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Size of the buffer handed to the custom AVIO context.
    pub io_buffer_size: NonZeroUsize,
    /// Size of the window scored during container detection
    /// (default 64 KiB, [`DEFAULT_PROBE_LIMIT`]).
    ///
    /// While fewer bytes than this are buffered, a prefix no demuxer
    /// recognizes yields `Again`. Once the window is full, an unrecognized
    /// prefix is `Fatal` with "unrecognized container format".
    pub probe_limit: NonZeroUsize,
    pub pixel_layout: PixelLayout,
    /// Frame threads for the decoder; `None` keeps the ffmpeg default.
    pub decoder_threads: Option<NonZeroUsize>,
    /// Retry container opening when it fails for lack of bytes instead of
    /// failing the session.
    pub retry_incomplete_header: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            io_buffer_size: IO_BUFFER_SIZE,
            probe_limit: PROBE_LIMIT,
            pixel_layout: PixelLayout::Rgb24,
            decoder_threads: None,
            retry_incomplete_header: true,
        }
    }
}

impl Configuration {
    pub fn from_env() -> DecoderResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from `STREAMDEC_*` values resolved by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> DecoderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Configuration::default();
        if let Some(value) = lookup("STREAMDEC_IO_BUFFER_SIZE") {
            config.io_buffer_size = parse_non_zero("STREAMDEC_IO_BUFFER_SIZE", &value)?;
        }
        if let Some(value) = lookup("STREAMDEC_PROBE_LIMIT") {
            config.probe_limit = parse_non_zero("STREAMDEC_PROBE_LIMIT", &value)?;
        }
        if let Some(value) = lookup("STREAMDEC_PIXEL_LAYOUT") {
            config.pixel_layout = PixelLayout::from_str(&value).map_err(|err| {
                DecoderError::configuration(format!("STREAMDEC_PIXEL_LAYOUT: {err}"))
            })?;
        }
        if let Some(value) = lookup("STREAMDEC_DECODER_THREADS") {
            config.decoder_threads = Some(parse_non_zero("STREAMDEC_DECODER_THREADS", &value)?);
        }
        if let Some(value) = lookup("STREAMDEC_RETRY_OPEN") {
            config.retry_incomplete_header = parse_flag("STREAMDEC_RETRY_OPEN", &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DecoderResult<()> {
        if i32::try_from(self.io_buffer_size.get()).is_err() {
            return Err(DecoderError::configuration(format!(
                "io buffer size {} exceeds the ffmpeg limit",
                self.io_buffer_size
            )));
        }
        if i32::try_from(self.probe_limit.get()).is_err() {
            return Err(DecoderError::configuration(format!(
                "probe limit {} exceeds the ffmpeg limit",
                self.probe_limit
            )));
        }
        Ok(())
    }

    pub fn open_session(&self) -> DecoderResult<Session> {
        Session::open(self.clone())
    }

    pub fn create_handler(&self) -> DecoderResult<Handler> {
        self.validate()?;
        Ok(Handler::new(self.clone()))
    }
}

fn parse_non_zero(name: &str, value: &str) -> DecoderResult<NonZeroUsize> {
    let parsed: usize = value.trim().parse().map_err(|_| {
        DecoderError::configuration(format!(
            "failed to parse {name}='{value}' as a positive integer"
        ))
    })?;
    NonZeroUsize::new(parsed)
        .ok_or_else(|| DecoderError::configuration(format!("{name} must be greater than zero")))
}

fn parse_flag(name: &str, value: &str) -> DecoderResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DecoderError::configuration(format!(
            "failed to parse {name}='{value}' as a boolean"
        ))),
    }
}
