use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use png::{BitDepth, ColorType, Encoder};
use streamdec_decoder::{Configuration, Response, Session};
use streamdec_types::{DecoderError, PixelLayout, RgbFrame};
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::{EffectiveSettings, InputSettings, OutputSettings};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode {}: {source}", path.display())]
    Png {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    #[error("decoding failed: {0}")]
    Fatal(String),
    #[error("input ended with {buffered} bytes that never produced a frame")]
    Stalled { buffered: usize },
}

pub struct ExecutionPlan {
    pub input: PathBuf,
    pub settings: EffectiveSettings,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub bytes_pushed: u64,
    /// Polls answered with `Again`.
    pub starved_polls: u64,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub container: Option<String>,
    /// Stopped by the frame limit rather than the end of input.
    pub truncated: bool,
    pub elapsed: Duration,
}

pub fn run(plan: &ExecutionPlan) -> Result<RunSummary, RunError> {
    let file = File::open(&plan.input).map_err(|source| RunError::Io {
        path: plan.input.clone(),
        source,
    })?;
    let output = &plan.settings.output;
    if let Some(dir) = &output.dir {
        fs::create_dir_all(dir).map_err(|source| RunError::Io {
            path: dir.clone(),
            source,
        })?;
    }

    let progress = spinner();
    let summary = decode_stream(
        file,
        plan.settings.decoder.clone(),
        &plan.settings.input,
        output,
        |index, frame| {
            progress.inc(1);
            progress.set_message(format!("{:.2}s", frame.timestamp()));
            if let Some(dir) = &output.dir {
                write_frame_png(frame, dir, index)?;
            }
            Ok(())
        },
    );
    match &summary {
        Ok(_) => progress.finish_with_message("done"),
        Err(_) => progress.abandon_with_message("failed"),
    }
    summary
}

/// Feeds `reader` into a fresh session and hands every decoded frame to
/// `on_frame` until the stream ends, fails, or hits the frame limit.
pub fn decode_stream<R, F>(
    reader: R,
    config: Configuration,
    input: &InputSettings,
    output: &OutputSettings,
    mut on_frame: F,
) -> Result<RunSummary, RunError>
where
    R: Read,
    F: FnMut(u64, &RgbFrame) -> Result<(), RunError>,
{
    let started = Instant::now();
    let mut session = Session::open(config)?;
    let mut feeder = Feeder::new(reader, input.chunk_size);
    let mut summary = RunSummary::default();

    loop {
        while session.buffered() < input.read_ahead && feeder.feed(&session)? {}

        match session.poll() {
            Response::Frame(frame) => {
                if summary.container.is_none() {
                    summary.container = session.container_format();
                }
                summary.first_timestamp.get_or_insert(frame.timestamp());
                summary.last_timestamp = Some(frame.timestamp());
                on_frame(summary.frames, &frame)?;
                summary.frames += 1;
                if output.max_frames.is_some_and(|max| summary.frames >= max) {
                    debug!(frames = summary.frames, "frame limit reached");
                    summary.truncated = true;
                    break;
                }
            }
            Response::Again => {
                summary.starved_polls += 1;
                if !feeder.feed(&session)? {
                    return Err(RunError::Stalled {
                        buffered: session.buffered(),
                    });
                }
            }
            Response::EndOfInput => break,
            Response::Fatal(message) => return Err(RunError::Fatal(message)),
        }
    }

    summary.bytes_pushed = feeder.pushed;
    summary.elapsed = started.elapsed();
    Ok(summary)
}

struct Feeder<R> {
    reader: R,
    chunk: Vec<u8>,
    pushed: u64,
    exhausted: bool,
}

impl<R: Read> Feeder<R> {
    fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk: vec![0; chunk_size.max(1)],
            pushed: 0,
            exhausted: false,
        }
    }

    /// Pushes one chunk; returns `false` once the reader is exhausted.
    fn feed(&mut self, session: &Session) -> Result<bool, RunError> {
        if self.exhausted {
            return Ok(false);
        }
        let read = loop {
            match self.reader.read(&mut self.chunk) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(RunError::Io {
                        path: PathBuf::from("<input>"),
                        source,
                    });
                }
            }
        };
        if read == 0 {
            debug!(pushed = self.pushed, "input exhausted");
            self.exhausted = true;
            return Ok(false);
        }
        session.push(&self.chunk[..read]);
        self.pushed += read as u64;
        Ok(true)
    }
}

pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:05}.png")
}

pub fn write_frame_png(frame: &RgbFrame, dir: &Path, index: u64) -> Result<PathBuf, RunError> {
    let path = dir.join(frame_file_name(index));
    let file = File::create(&path).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;
    let writer = BufWriter::new(file);
    let mut encoder = Encoder::new(writer, frame.width(), frame.height());
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    let png_error = |source: png::EncodingError| RunError::Png {
        path: path.clone(),
        source,
    };
    let mut writer = encoder.write_header().map_err(png_error)?;
    let written = match frame.layout() {
        PixelLayout::Rgb24 => writer.write_image_data(frame.data()),
        PixelLayout::Bgr24 => writer.write_image_data(&bgr_to_rgb(frame.data())),
    };
    written.map_err(png_error)?;
    writer.finish().map_err(png_error)?;
    Ok(path)
}

fn bgr_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for pixel in data.chunks_exact(PixelLayout::BYTES_PER_PIXEL) {
        out.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
    }
    out
}

pub fn report(summary: &RunSummary, plan: &ExecutionPlan) {
    info!(
        frames = summary.frames,
        bytes = summary.bytes_pushed,
        starved_polls = summary.starved_polls,
        "decoding finished"
    );
    println!(
        "Decoded {} frames from {} ({} bytes) in {:.2?}",
        summary.frames,
        plan.input.display(),
        summary.bytes_pushed,
        summary.elapsed
    );
    if let Some(container) = &summary.container {
        println!("Container: {container}");
    }
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        println!("Timestamps: {first:.3}s .. {last:.3}s");
    }
    if summary.truncated {
        println!("Stopped at the frame limit");
    }
    if let Some(dir) = &plan.settings.output.dir {
        println!("Wrote PNG files to {}", dir.display());
    }
}

fn spinner() -> ProgressBar {
    if !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {prefix:>8.cyan.bold} {pos:>6} frames {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.set_prefix("decode");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
