use std::io::Write;

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::calendar::{self, CalendarDate};
use crate::cli::Command;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::PickerConfig;
use crate::picker::{Command as PickerCommand, Outcome, PickerController};
use crate::render::Renderer;

/// Everything a subcommand needs besides its own arguments.
pub struct RunContext {
    pub config: PickerConfig,
    pub now: Option<String>,
    pub json: bool,
    pub renderer: Renderer,
}

impl RunContext {
    fn clock(&self) -> anyhow::Result<Box<dyn Clock>> {
        match self.now.as_deref() {
            Some(raw) => {
                let instant = crate::clock::parse_instant(raw, &self.config.timezone())?;
                debug!(%instant, "using frozen clock");
                Ok(Box::new(FixedClock(instant)))
            }
            None => Ok(Box::new(SystemClock)),
        }
    }

    fn today(&self) -> anyhow::Result<CalendarDate> {
        let clock = self.clock()?;
        calendar::today_with(clock.as_ref(), &self.config.timezone())
            .context("failed to place today in the Jalali calendar")
    }
}

#[tracing::instrument(skip(ctx, out))]
pub fn dispatch<W: Write>(ctx: &RunContext, command: Command, out: &mut W) -> anyhow::Result<()> {
    match command {
        Command::Today => {
            let today = ctx.today()?;
            write_date(ctx, out, &today)
        }
        Command::Convert { input, from } => {
            let date = match from {
                Some(format) => calendar::parse(&input, format),
                None => calendar::parse_any(&input),
            }
            .with_context(|| format!("cannot convert {input:?}"))?;
            write_date(ctx, out, &date)
        }
        Command::Leap { year, to } => {
            let end = to.unwrap_or(year);
            if end < year {
                return Err(anyhow!("range end {end} is before start {year}"));
            }
            if ctx.json {
                let years: Vec<_> = (year..=end)
                    .map(|y| json!({ "year": y, "leap": calendar::is_leap_year(y) }))
                    .collect();
                return write_json(out, &years);
            }
            ctx.renderer.write_leap_years(out, year..=end)
        }
        Command::Month { year, month } => {
            let mut picker = PickerController::new(ctx.config.clone(), None, ctx.clock()?);
            picker.open();
            if let (Some(year), Some(month)) = (year, month) {
                picker.show_year_view();
                picker
                    .select_year(year)
                    .with_context(|| format!("cannot show year {year}"))?;
                picker.show_month_view();
                picker
                    .select_month(month)
                    .with_context(|| format!("cannot show month {month}"))?;
            }
            if ctx.json {
                let cursor = picker.cursor();
                return write_json(
                    out,
                    &json!({
                        "year": cursor.year(),
                        "month": cursor.month(),
                        "leading_blanks": picker.leading_blank_count(),
                        "days": picker.visible_days(),
                    }),
                );
            }
            ctx.renderer.write_month_grid(out, &picker)
        }
        Command::Pick {
            value,
            disabled,
            events,
        } => run_session(ctx, value.as_deref(), disabled, &events, out),
    }
}

#[tracing::instrument(skip(ctx, events, out))]
fn run_session<W: Write>(
    ctx: &RunContext,
    value: Option<&str>,
    disabled: bool,
    events: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    let mut picker = PickerController::new(ctx.config.clone(), value, ctx.clock()?);
    picker.set_disabled(disabled);
    if let Some(warning) = picker.seed_warning() {
        warn!(%warning, "initial value ignored");
        if !ctx.json {
            writeln!(out, "warning: initial value ignored: {warning}")?;
        }
    }

    let mut log = Vec::with_capacity(events.len());
    for raw in events {
        let command: PickerCommand = raw.parse()?;
        let entry = match picker.apply(command) {
            Ok(Outcome::Applied) => EventRecord::new(command, "applied", None),
            Ok(Outcome::Ignored) => EventRecord::new(command, "ignored", None),
            Ok(Outcome::Committed(value)) => {
                if !ctx.json {
                    writeln!(out, "change: {value}")?;
                }
                EventRecord::new(command, "committed", Some(value))
            }
            Err(err) => {
                if !ctx.json {
                    writeln!(out, "rejected {command}: {err}")?;
                }
                EventRecord::new(command, "rejected", Some(err.to_string()))
            }
        };
        log.push(entry);
    }
    info!(events = log.len(), "session replayed");

    if ctx.json {
        return write_json(
            out,
            &json!({
                "events": log,
                "state": picker.snapshot(),
            }),
        );
    }

    ctx.renderer.write_snapshot(out, &picker.snapshot())?;
    if picker.state().is_open() {
        writeln!(out)?;
        ctx.renderer.write_picker(out, &picker)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct EventRecord {
    event: String,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl EventRecord {
    fn new(command: PickerCommand, result: &'static str, detail: Option<String>) -> Self {
        Self {
            event: command.to_string(),
            result,
            detail,
        }
    }
}

fn write_date<W: Write>(ctx: &RunContext, out: &mut W, date: &CalendarDate) -> anyhow::Result<()> {
    if ctx.json {
        return write_json(
            out,
            &json!({
                "jalali": date.to_string(),
                "gregorian": calendar::format(date),
                "weekday": date.weekday(),
                "holiday": calendar::is_holiday(date),
                "leap_year": calendar::is_leap_year(date.year()),
            }),
        );
    }
    ctx.renderer.write_date(out, date)
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}
