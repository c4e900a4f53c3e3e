//! Configuration module for bson-bouncer.
//!
//! The listen port is the only required setting and is always given on the
//! command line. Everything else has a default and may come from CLI flags
//! or an optional TOML file. CLI arguments take precedence over file values.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::protocols::bounce::{DecoderSettings, LengthMode};

/// Command-line arguments for the relay
#[derive(Parser, Debug)]
#[command(name = "bson-bouncer")]
#[command(author = "bson-bouncer authors")]
#[command(version = "0.1.0")]
#[command(about = "Echoes TCP traffic and logs the BSON documents in it", long_about = None)]
pub struct CliArgs {
    /// Port to listen on (loopback only)
    pub port: u16,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Maximum number of connections served at once (1 = one at a time)
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Close a connection after this many idle seconds (0 = never)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Largest frame the decoder will buffer, in bytes
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Number of characters of each decoded document to log
    #[arg(long)]
    pub preview_chars: Option<usize>,

    /// What the 4-byte length field counts
    #[arg(long, value_enum)]
    pub length_mode: Option<LengthField>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Length field interpretation, as spelled in the CLI and config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LengthField {
    /// Length counts payload bytes only.
    #[default]
    Payload,
    /// Length counts the whole frame, including the length field.
    Inclusive,
}

impl From<LengthField> for LengthMode {
    fn from(field: LengthField) -> Self {
        match field {
            LengthField::Payload => LengthMode::Payload,
            LengthField::Inclusive => LengthMode::Inclusive,
        }
    }
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle timeout in seconds (0 = never)
    #[serde(default)]
    pub idle_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backlog: default_backlog(),
            max_connections: default_max_connections(),
            idle_timeout: 0,
        }
    }
}

/// Frame decoder configuration
#[derive(Debug, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default)]
    pub length_mode: LengthField,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            preview_chars: default_preview_chars(),
            length_mode: LengthField::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_backlog() -> i32 {
    1
}

fn default_max_connections() -> usize {
    1024
}

fn default_max_frame_size() -> usize {
    64 * 1024 * 1024 // 64 MiB
}

fn default_preview_chars() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backlog: i32,
    pub max_connections: usize,
    pub idle_timeout: u64,
    pub max_frame_size: usize,
    pub preview_chars: usize,
    pub length_mode: LengthField,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    ///
    /// Exits the process with a usage message if the arguments are invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve configuration from already parsed arguments.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            port: cli.port,
            backlog: cli.backlog.unwrap_or(toml_config.server.backlog),
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections)
                .clamp(1, Semaphore::MAX_PERMITS),
            idle_timeout: cli.idle_timeout.unwrap_or(toml_config.server.idle_timeout),
            max_frame_size: cli
                .max_frame_size
                .unwrap_or(toml_config.decoder.max_frame_size),
            preview_chars: cli
                .preview_chars
                .unwrap_or(toml_config.decoder.preview_chars),
            length_mode: cli.length_mode.unwrap_or(toml_config.decoder.length_mode),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Idle timeout as a duration, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout))
    }

    /// Settings handed to every connection's frame decoder.
    pub fn decoder_settings(&self) -> DecoderSettings {
        DecoderSettings {
            length_mode: self.length_mode.into(),
            max_frame_size: self.max_frame_size,
            preview_chars: self.preview_chars,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("bson-bouncer").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.server.backlog, 1);
        assert_eq!(config.server.idle_timeout, 0);
        assert_eq!(config.decoder.max_frame_size, 64 * 1024 * 1024);
        assert_eq!(config.decoder.preview_chars, 1000);
        assert_eq!(config.decoder.length_mode, LengthField::Payload);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            backlog = 16
            max_connections = 1
            idle_timeout = 30

            [decoder]
            max_frame_size = 1048576
            preview_chars = 200
            length_mode = "inclusive"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.backlog, 16);
        assert_eq!(config.server.max_connections, 1);
        assert_eq!(config.server.idle_timeout, 30);
        assert_eq!(config.decoder.max_frame_size, 1048576);
        assert_eq!(config.decoder.preview_chars, 200);
        assert_eq!(config.decoder.length_mode, LengthField::Inclusive);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_port_only() {
        let config = Config::from_args(parse(&["9000"]).unwrap()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.backlog, 1);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.decoder_settings().length_mode, LengthMode::Payload);
        assert_eq!(config.decoder_settings().preview_chars, 1000);
    }

    #[test]
    fn test_usage_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["9000", "9001"]).is_err());
        assert!(parse(&["not-a-port"]).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = parse(&[
            "9000",
            "--max-connections",
            "0",
            "--idle-timeout",
            "5",
            "--length-mode",
            "inclusive",
            "--log-level",
            "trace",
        ])
        .unwrap();
        let config = Config::from_args(cli).unwrap();
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.length_mode, LengthField::Inclusive);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_max_connections_is_clamped() {
        let cli = parse(&["9000", "--max-connections", "18446744073709551615"]).unwrap();
        let config = Config::from_args(cli).unwrap();
        assert_eq!(config.max_connections, Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_missing_config_file() {
        let cli = parse(&["9000", "--config", "/nonexistent/bouncer.toml"]).unwrap();
        let err = Config::from_args(cli).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }
}
