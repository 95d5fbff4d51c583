// External crates
use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Environment variable naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "LLMO_CONFIG";

/// Prefix of environment overrides, i.e, `LLMO_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "LLMO";

/// Failures raised while assembling [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("settings file {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("invalid log level directive {directive:?}: {reason}")]
    InvalidLevel { directive: String, reason: String },

    #[error("log file destination requires a non-empty file name")]
    EmptyLogFileName,
}

/// Output encoding of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Standard prefixed text lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// How the call site is rendered in the line prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStyle {
    /// Final path component only, i.e, `main.rs:12`
    #[default]
    Short,
    /// Path as recorded by the compiler
    Long,
    /// No call site
    None,
}

/// Rotation period of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationPolicy {
    #[default]
    Never,
    Minutely,
    Hourly,
    Daily,
}

/// Log file destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogFileConfig {
    /// Directory the file is created in
    pub directory: PathBuf,
    /// File name, used as prefix of rotated files
    pub file_name: String,
    pub rotation: RotationPolicy,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_name: "llmo.log".to_string(),
            rotation: RotationPolicy::Never,
        }
    }
}

/// Settings of the logging context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set
    pub level: String,
    /// Line encoding
    pub format: LogFormat,
    /// Timestamps in UTC instead of local time
    pub utc: bool,
    /// Call site rendering
    pub source: SourceStyle,
    /// Level tag after the timestamp
    pub show_level: bool,
    /// Write to a (rotating) file instead of stderr
    pub file: Option<LogFileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            utc: false,
            source: SourceStyle::Short,
            show_level: false,
            file: None,
        }
    }
}

/// Effective CLI settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[logging]` table
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the resolved file location and the process environment.
    ///
    /// A missing file at the resolved location is not an error.
    pub fn load() -> Result<Self, SettingsError> {
        let path = resolve_path();
        Self::load_from(path.as_deref(), None, false)
    }

    /// Load settings from an explicit file which must exist.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        Self::load_from(Some(path), None, true)
    }

    /// Layer defaults, the optional TOML file and environment overrides.
    ///
    /// `env` replaces the process environment as the override source when given.
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
        required: bool,
    ) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the logging context cannot be built from.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(SettingsError::InvalidLevel {
                directive: self.logging.level.clone(),
                reason: e.to_string(),
            });
        }
        if let Some(file) = &self.logging.file
            && file.file_name.trim().is_empty()
        {
            return Err(SettingsError::EmptyLogFileName);
        }
        Ok(())
    }
}

/// Settings file location: `$LLMO_CONFIG`, then the XDG config directory, then `~/.config`.
#[must_use]
pub fn resolve_path() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("llmo").join("config.toml"))
}
