// Local crates
use crate::bootstrap::bootstrap::Execute;
use crate::helpers::load_config::{self, Settings};

// External crates
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::instrument;

#[derive(Parser, Debug)]
#[command(
    name = "llmo",
    long_about = "llmo is the command-line client of the LLM Operator platform.",
    about = "LLM Operator command-line client",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        llmo version
        llmo config show --format json
        llmo config validate --config ~/.config/llmo/config.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Display version information
    Version,

    /// Inspect and validate CLI settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective settings after defaults, file and environment are merged
    Show {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Toml)]
        format: OutputFormat,
    },

    /// Print where the settings file is looked up
    Path,

    /// Validate a settings file
    Validate {
        /// Settings file, defaults to the resolved settings location
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

/// Command tree shipped with the `llmo` binary.
///
/// Parses its own arguments when executed. Help and version requests
/// succeed; usage errors and command failures are printed here and then
/// reported as failure.
#[derive(Debug, Clone)]
pub struct RootCommand {
    args: Vec<OsString>,
    settings: Settings,
}

impl RootCommand {
    /// Root command over `args`, program name first.
    pub fn new<I, T>(args: I, settings: Settings) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            settings,
        }
    }

    /// Root command over the current process arguments.
    #[must_use]
    pub fn from_env(settings: Settings) -> Self {
        Self::new(std::env::args_os(), settings)
    }

    /// Parse and run, writing command output to `out`.
    pub fn run_with<W: Write>(&self, out: &mut W) -> Result<()> {
        let cli = match Cli::try_parse_from(&self.args) {
            Ok(cli) => cli,
            Err(e) => {
                // clap renders help, version and usage errors itself
                if e.print().is_err() {
                    eprintln!("{e}");
                }
                if e.use_stderr() {
                    return Err(e.into());
                }
                return Ok(());
            }
        };

        let result = match cli.command {
            Commands::Version => show_version(out),
            Commands::Config(ConfigCommands::Show { format }) => {
                show_config(&self.settings, format, out)
            }
            Commands::Config(ConfigCommands::Path) => show_config_path(out),
            Commands::Config(ConfigCommands::Validate { config }) => validate_config(config, out),
        };

        if let Err(e) = &result {
            eprintln!("Error: {e:#}");
        }
        result
    }
}

impl Execute for RootCommand {
    fn execute(&self) -> Result<()> {
        self.run_with(&mut io::stdout().lock())
    }
}

//
// ------------------------ Command Implementations ------------------------------
//

/// Show version information
fn show_version<W: Write>(out: &mut W) -> Result<()> {
    writeln!(out, "llmo {}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

#[instrument(name = "config_show", level = "debug", skip(settings, out))]
fn show_config<W: Write>(settings: &Settings, format: OutputFormat, out: &mut W) -> Result<()> {
    let rendered = match format {
        OutputFormat::Toml => {
            toml::to_string_pretty(settings).context("Failed to render settings as TOML")?
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(settings).context("Failed to render settings as JSON")?
        }
    };
    writeln!(out, "{}", rendered.trim_end())?;
    Ok(())
}

fn show_config_path<W: Write>(out: &mut W) -> Result<()> {
    let Some(path) = load_config::resolve_path() else {
        bail!(
            "cannot determine settings location: none of {}, XDG_CONFIG_HOME or HOME is set",
            load_config::CONFIG_PATH_ENV
        );
    };
    let state = if path.is_file() { "exists" } else { "not found" };
    writeln!(out, "{} ({state})", path.display())?;
    Ok(())
}

/// Validate configuration file
#[instrument(name = "config_validate", level = "debug", skip(out))]
fn validate_config<W: Write>(config: Option<PathBuf>, out: &mut W) -> Result<()> {
    let path = match config.or_else(load_config::resolve_path) {
        Some(path) => path,
        None => bail!("no settings file given and no default location could be resolved"),
    };

    tracing::debug!(settings_file = %path.display(), "Validating settings file");
    Settings::load_file(&path)
        .with_context(|| format!("Settings file {} is invalid", path.display()))?;

    writeln!(out, "Settings file {} is valid", path.display())?;
    Ok(())
}
