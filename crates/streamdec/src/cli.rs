use std::path::PathBuf;

use clap::Parser;
use streamdec_types::PixelLayout;

pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}

#[derive(Debug, Default, Parser)]
#[command(
    name = "streamdec",
    about = "Feed a video file to the incremental decoder and dump RGB frames",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Bytes read from the input and pushed per chunk
    #[arg(long = "chunk-size", value_parser = parse_positive_usize)]
    pub chunk_size: Option<usize>,

    /// Bytes kept queued ahead of the demuxer
    #[arg(long = "read-ahead", value_parser = parse_positive_usize)]
    pub read_ahead: Option<usize>,

    /// Directory receiving frame_NNNNN.png files
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Channel order of decoded frames (rgb, bgr)
    #[arg(long = "layout", value_parser = parse_layout)]
    pub layout: Option<PixelLayout>,

    /// Stop after this many frames
    #[arg(long = "max-frames", value_parser = parse_positive_u64)]
    pub max_frames: Option<u64>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Size of the ffmpeg read buffer in bytes
    #[arg(long = "io-buffer-size", value_parser = parse_positive_usize)]
    pub io_buffer_size: Option<usize>,

    /// Bytes after which an unrecognized prefix is rejected
    #[arg(long = "probe-limit", value_parser = parse_positive_usize)]
    pub probe_limit: Option<usize>,

    /// Decoder frame threads (ffmpeg default when omitted)
    #[arg(long = "decoder-threads", value_parser = parse_positive_usize)]
    pub decoder_threads: Option<usize>,

    /// Fail instead of waiting when the container header is incomplete
    #[arg(long = "strict-open")]
    pub strict_open: bool,

    /// Input video path
    pub input: Option<PathBuf>,
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|_| format!("'{value}' is not a valid number"))?;
    if parsed == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|_| format!("'{value}' is not a valid number"))?;
    if parsed == 0 {
        return Err("value must be at least 1".into());
    }
    Ok(parsed)
}

fn parse_layout(value: &str) -> Result<PixelLayout, String> {
    value.parse::<PixelLayout>().map_err(|err| err.to_string())
}
