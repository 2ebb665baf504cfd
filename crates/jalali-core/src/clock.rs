use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  LocalResult,
  NaiveDate,
  TimeZone,
  Utc
};
use chrono_tz::Tz;

pub const TIMEZONE_ENV_VAR: &str =
  "JALALI_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str =
  "Asia/Tehran";

/// Wall-clock source. Only the calendar
/// date of `now` is ever used.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(
  pub DateTime<Utc>
);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.0
  }
}

#[must_use]
pub fn local_date(
  clock: &dyn Clock,
  tz: &Tz
) -> NaiveDate {
  clock
    .now()
    .with_timezone(tz)
    .date_naive()
}

/// Resolves the zone used to reduce the
/// clock to a calendar date: the env var
/// wins over the configured value, which
/// wins over Tehran.
pub fn calendar_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses an instant for a frozen clock:
/// RFC3339, or a bare `YYYY-MM-DD` taken
/// as noon in `tz`.
#[tracing::instrument(skip(tz), fields(input = input))]
pub fn parse_instant(
  input: &str,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  let date = NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized instant: {input} \
       (expected RFC3339 or \
       YYYY-MM-DD)"
    )
  })?;
  let noon = date
    .and_hms_opt(12, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct noon for \
         {date}"
      )
    })?;

  match tz.from_local_datetime(&noon) {
    | LocalResult::Single(local) => {
      Ok(local.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      _
    ) => Ok(first.with_timezone(&Utc)),
    | LocalResult::None => {
      Err(anyhow!(
        "local time does not exist in \
         {tz}: {noon}"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    FixedClock,
    local_date,
    parse_instant,
    parse_timezone
  };

  #[test]
  fn local_date_follows_timezone() {
    let clock = FixedClock(
      Utc
        .with_ymd_and_hms(
          2024, 3, 19, 21, 0, 0
        )
        .single()
        .expect("valid now")
    );
    let tehran = parse_timezone(
      "Asia/Tehran",
      "test"
    )
    .expect("tehran tz");
    assert_eq!(
      local_date(&clock, &tehran)
        .format("%Y-%m-%d")
        .to_string(),
      "2024-03-20"
    );
    assert_eq!(
      local_date(
        &clock,
        &chrono_tz::UTC
      )
      .format("%Y-%m-%d")
      .to_string(),
      "2024-03-19"
    );
  }

  #[test]
  fn rejects_unknown_timezone() {
    assert!(
      parse_timezone(
        "Mars/Olympus",
        "test"
      )
      .is_none()
    );
    assert!(
      parse_timezone("  ", "test")
        .is_none()
    );
  }

  #[test]
  fn parses_bare_date_instant() {
    let tehran = parse_timezone(
      "Asia/Tehran",
      "test"
    )
    .expect("tehran tz");
    let instant =
      parse_instant("2024-03-20", &tehran)
        .expect("parse instant");
    assert_eq!(
      instant
        .with_timezone(&tehran)
        .format("%Y-%m-%d %H:%M")
        .to_string(),
      "2024-03-20 12:00"
    );
    assert!(
      parse_instant("tomorrow", &tehran)
        .is_err()
    );
  }
}
