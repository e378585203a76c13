use std::env;
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use streamdec_decoder::Configuration;
use streamdec_types::{DecoderError, PixelLayout};

use crate::cli::CliArgs;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_READ_AHEAD: usize = 8 * 1024 * 1024;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub(crate) decoder: Option<DecoderFileConfig>,
    pub(crate) input: Option<InputFileConfig>,
    pub(crate) output: Option<OutputFileConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct DecoderFileConfig {
    pub(crate) io_buffer_size: Option<usize>,
    pub(crate) probe_limit: Option<usize>,
    pub(crate) pixel_layout: Option<String>,
    pub(crate) threads: Option<usize>,
    pub(crate) retry_incomplete_header: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct InputFileConfig {
    pub(crate) chunk_size: Option<usize>,
    pub(crate) read_ahead: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub(crate) struct OutputFileConfig {
    pub(crate) dir: Option<PathBuf>,
    pub(crate) max_frames: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSettings {
    pub chunk_size: usize,
    /// Never smaller than `chunk_size`.
    pub read_ahead: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            read_ahead: DEFAULT_READ_AHEAD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSettings {
    pub dir: Option<PathBuf>,
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub decoder: Configuration,
    pub input: InputSettings,
    pub output: OutputSettings,
}

#[derive(Debug)]
pub struct ResolvedSettings {
    pub settings: EffectiveSettings,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
    Decoder {
        source: DecoderError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
            ConfigError::Decoder { source } => {
                write!(f, "invalid decoder configuration: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Decoder { source } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

/// Resolves settings with precedence: command line, config file,
/// `STREAMDEC_*` environment, built-in defaults.
pub fn resolve_settings(cli: &CliArgs) -> Result<ResolvedSettings, ConfigError> {
    let base = Configuration::from_env().map_err(|source| ConfigError::Decoder { source })?;
    let (file, config_path) = load_config(cli.config.as_deref())?;
    let settings = merge(cli, file, config_path.as_ref(), base)?;
    Ok(ResolvedSettings {
        settings,
        config_path,
    })
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let config = load_file_config(&path)?;
        return Ok((config, Some(path)));
    }

    if let Some(project_path) = project_config_path()
        && project_path.exists()
    {
        let config = load_file_config(&project_path)?;
        return Ok((config, Some(project_path)));
    }

    let Some(default_path) = default_config_path() else {
        return Ok((FileConfig::default(), None));
    };
    if !default_path.exists() {
        return Ok((FileConfig::default(), None));
    }
    let config = load_file_config(&default_path)?;
    Ok((config, Some(default_path)))
}

fn merge(
    cli: &CliArgs,
    file: FileConfig,
    config_path: Option<&PathBuf>,
    base: Configuration,
) -> Result<EffectiveSettings, ConfigError> {
    let FileConfig {
        decoder: file_decoder,
        input: file_input,
        output: file_output,
    } = file;
    let decoder_cfg = file_decoder.unwrap_or_default();
    let input_cfg = file_input.unwrap_or_default();
    let output_cfg = file_output.unwrap_or_default();

    let mut decoder = base;
    if let Some(size) = resolve_size(
        cli.io_buffer_size,
        decoder_cfg.io_buffer_size,
        "decoder.io_buffer_size",
        config_path,
    )? {
        decoder.io_buffer_size = size;
    }
    if let Some(limit) = resolve_size(
        cli.probe_limit,
        decoder_cfg.probe_limit,
        "decoder.probe_limit",
        config_path,
    )? {
        decoder.probe_limit = limit;
    }
    if let Some(threads) = resolve_size(
        cli.decoder_threads,
        decoder_cfg.threads,
        "decoder.threads",
        config_path,
    )? {
        decoder.decoder_threads = Some(threads);
    }
    if let Some(layout) = resolve_layout(cli.layout, decoder_cfg.pixel_layout, config_path)? {
        decoder.pixel_layout = layout;
    }
    if cli.strict_open {
        decoder.retry_incomplete_header = false;
    } else if let Some(retry) = decoder_cfg.retry_incomplete_header {
        decoder.retry_incomplete_header = retry;
    }
    decoder
        .validate()
        .map_err(|source| ConfigError::Decoder { source })?;

    let chunk_size = resolve_size(
        cli.chunk_size,
        input_cfg.chunk_size,
        "input.chunk_size",
        config_path,
    )?
    .map_or(DEFAULT_CHUNK_SIZE, NonZeroUsize::get);
    let read_ahead = resolve_size(
        cli.read_ahead,
        input_cfg.read_ahead,
        "input.read_ahead",
        config_path,
    )?
    .map_or(DEFAULT_READ_AHEAD, NonZeroUsize::get)
    .max(chunk_size);

    let max_frames = match cli.max_frames.or(output_cfg.max_frames) {
        Some(0) => {
            return Err(ConfigError::InvalidValue {
                path: config_path.cloned(),
                field: "output.max_frames",
                value: "0".into(),
            });
        }
        other => other,
    };

    Ok(EffectiveSettings {
        decoder,
        input: InputSettings {
            chunk_size,
            read_ahead,
        },
        output: OutputSettings {
            dir: cli.output_dir.clone().or(output_cfg.dir),
            max_frames,
        },
    })
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "streamdec", "streamdec")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

fn project_config_path() -> Option<PathBuf> {
    env::current_dir().ok().map(|dir| dir.join("streamdec.toml"))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Command-line values were validated by clap; only file values can be zero.
fn resolve_size(
    cli_value: Option<usize>,
    file_value: Option<usize>,
    field: &'static str,
    config_path: Option<&PathBuf>,
) -> Result<Option<NonZeroUsize>, ConfigError> {
    let Some(value) = cli_value.or(file_value) else {
        return Ok(None);
    };
    NonZeroUsize::new(value)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidValue {
            path: config_path.cloned(),
            field,
            value: value.to_string(),
        })
}

fn resolve_layout(
    cli_value: Option<PixelLayout>,
    file_value: Option<String>,
    config_path: Option<&PathBuf>,
) -> Result<Option<PixelLayout>, ConfigError> {
    if cli_value.is_some() {
        return Ok(cli_value);
    }
    let Some(raw) = normalize_string(file_value) else {
        return Ok(None);
    };
    raw.parse::<PixelLayout>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            path: config_path.cloned(),
            field: "decoder.pixel_layout",
            value: raw,
        })
}
