use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::calendar::DateFormat;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "jalali-picker",
    version,
    about = "Jalali calendar arithmetic and a scriptable date picker",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Picker config file (TOML).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override a config key, e.g. `--set year_anchor=today`.
    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    /// Freeze the clock at an RFC3339 instant or a YYYY-MM-DD date.
    #[arg(long = "now", global = true)]
    pub now: Option<String>,

    /// Emit JSON instead of text.
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Never emit ANSI colors.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show today's date in both calendars.
    Today,

    /// Convert a date between the Gregorian and Jalali calendars.
    Convert {
        input: String,

        /// Input format; guessed from the separator when omitted.
        #[arg(long = "from", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<DateFormat>()))]
        from: Option<DateFormat>,
    },

    /// Report leap status for a Jalali year or an inclusive range of years.
    Leap { year: i32, to: Option<i32> },

    /// Print the month grid for a Jalali month (defaults to the current one).
    Month {
        #[arg(requires = "month")]
        year: Option<i32>,
        month: Option<u32>,
    },

    /// Replay picker interaction events and print the resulting state.
    Pick {
        /// Initial value handed to the picker.
        #[arg(long = "value")]
        value: Option<String>,

        /// Start disabled; every event is ignored.
        #[arg(long = "disabled")]
        disabled: bool,

        /// Events: open, close, toggle, month-view, year-view, next, prev,
        /// month=N, year=N, day=N, outside.
        events: Vec<String>,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Parses arguments, exiting directly for `--help` and `--version`.
pub fn parse_args(raw: Vec<OsString>) -> anyhow::Result<GlobalCli> {
    match GlobalCli::try_parse_from(raw) {
        Ok(cli) => Ok(cli),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => Err(anyhow!("{err}")),
    }
}
