pub mod calendar;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod picker;
pub mod render;

use std::ffi::OsString;
use std::io::Write;

use anyhow::Context;
use tracing::{
  debug,
  info
};

pub use calendar::{
  CalendarDate,
  DateFormat
};
pub use error::{
  CalendarError,
  PickerError
};
pub use picker::{
  Command,
  Outcome,
  PickerController
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli = cli::parse_args(raw_args)?;

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting jalali picker"
  );
  debug!(overrides = cli.overrides.len(), "parsed overrides");

  let mut cfg =
    config::PickerConfig::load(
      cli.config.as_deref()
    )
    .context(
      "failed to load picker config"
    )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

  let ctx = commands::RunContext {
    config:   cfg,
    now:      cli.now,
    json:     cli.json,
    renderer: render::Renderer::new(
      !cli.no_color
    )
  };

  let mut out =
    std::io::stdout().lock();
  commands::dispatch(
    &ctx,
    cli.command,
    &mut out
  )?;
  out.flush()?;

  info!("done");
  Ok(())
}
