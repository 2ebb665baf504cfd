use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::calendar::DateFormat;
use crate::clock;

pub const CONFIG_ENV_VAR: &str =
  "JALALI_PICKER_CONFIG";
const CONFIG_DIR_NAME: &str =
  "jalali-picker";
const CONFIG_FILE_NAME: &str =
  "config.toml";

/// Year the year list is centered on.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum YearAnchor {
  #[default]
  Cursor,
  Today
}

impl YearAnchor {
  fn from_key(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "cursor" => Some(Self::Cursor),
      | "today" => Some(Self::Today),
      | _ => None
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct PickerConfig {
  pub year_span_before: i32,
  pub year_span_after:  i32,
  pub year_anchor:      YearAnchor,
  pub input_format:     DateFormat,
  pub timezone:         String,
  pub placeholder:      String
}

fn default_year_span_before() -> i32 {
  50
}

fn default_year_span_after() -> i32 {
  49
}

fn default_placeholder() -> String {
  "Select a date".to_string()
}

impl Default for PickerConfig {
  fn default() -> Self {
    Self {
      year_span_before:
        default_year_span_before(),
      year_span_after:
        default_year_span_after(),
      year_anchor:
        YearAnchor::default(),
      input_format:
        DateFormat::default(),
      timezone: clock::DEFAULT_TIMEZONE
        .to_string(),
      placeholder:
        default_placeholder()
    }
  }
}

impl PickerConfig {
  /// Loads the config file named by
  /// `override_path`, the env var or
  /// the user config dir, in that order.
  /// A missing default file means
  /// defaults; a missing explicit file
  /// is an error.
  #[tracing::instrument(skip(
    override_path
  ))]
  pub fn load(
    override_path: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(
        override_path
      )?
    else {
      warn!(
        "no picker config found; \
         using defaults"
      );
      return Ok(Self::default());
    };

    info!(config = %path.display(), "loading picker config");
    Self::load_file(&path)
  }

  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    Self::from_toml_str(&text)
      .with_context(|| {
        format!(
          "failed to parse {}",
          path.display()
        )
      })
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg =
      toml::from_str::<Self>(text)?;
    cfg.sanitize();
    Ok(cfg)
  }

  /// Applies `key=value` overrides on
  /// top of the loaded values.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key.trim();
      let value = value.trim();
      debug!(key, value, "applying override");
      match key {
        | "year_span_before" => {
          self.year_span_before =
            parse_span(key, value)?;
        }
        | "year_span_after" => {
          self.year_span_after =
            parse_span(key, value)?;
        }
        | "year_anchor" => {
          self.year_anchor =
            YearAnchor::from_key(value)
              .ok_or_else(|| {
                anyhow!(
                  "invalid year_anchor: \
                   {value} (expected \
                   cursor or today)"
                )
              })?;
        }
        | "input_format" => {
          self.input_format = value
            .parse::<DateFormat>()
            .map_err(|err| {
              anyhow!(
                "invalid input_format: \
                 {err}"
              )
            })?;
        }
        | "timezone" => {
          self.timezone =
            value.to_string();
        }
        | "placeholder" => {
          self.placeholder =
            value.to_string();
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: \
             {other}"
          ));
        }
      }
    }
    self.sanitize();
    Ok(())
  }

  pub fn timezone(&self) -> Tz {
    clock::calendar_timezone(Some(
      self.timezone.as_str()
    ))
  }

  fn sanitize(&mut self) {
    if self.year_span_before < 0 {
      warn!(
        value = self.year_span_before,
        "negative year_span_before; \
         using default"
      );
      self.year_span_before =
        default_year_span_before();
    }
    if self.year_span_after < 0 {
      warn!(
        value = self.year_span_after,
        "negative year_span_after; \
         using default"
      );
      self.year_span_after =
        default_year_span_after();
    }
    if self.timezone.trim().is_empty()
    {
      self.timezone =
        clock::DEFAULT_TIMEZONE
          .to_string();
    }
    if self
      .placeholder
      .trim()
      .is_empty()
    {
      self.placeholder =
        default_placeholder();
    }
  }
}

fn parse_span(
  key: &str,
  value: &str
) -> anyhow::Result<i32> {
  value.parse::<i32>().with_context(
    || {
      format!(
        "invalid {key}: {value}"
      )
    }
  )
}

fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(
      path.to_path_buf()
    ));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  let Some(dir) = dirs::config_dir()
  else {
    debug!(
      "cannot determine config \
       directory"
    );
    return Ok(None);
  };
  let candidate = dir
    .join(CONFIG_DIR_NAME)
    .join(CONFIG_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    PickerConfig,
    YearAnchor
  };
  use crate::calendar::DateFormat;

  #[test]
  fn missing_keys_fall_back_to_defaults()
  {
    let cfg =
      PickerConfig::from_toml_str(
        "year_anchor = \"today\"\n"
      )
      .expect("parse config");
    assert_eq!(
      cfg.year_anchor,
      YearAnchor::Today
    );
    assert_eq!(cfg.year_span_before, 50);
    assert_eq!(cfg.year_span_after, 49);
    assert_eq!(
      cfg.input_format,
      DateFormat::GregorianIso
    );
    assert_eq!(
      cfg.placeholder,
      "Select a date"
    );
  }

  #[test]
  fn sanitizes_negative_spans_and_blanks()
  {
    let cfg =
      PickerConfig::from_toml_str(
        "year_span_before = -3\n\
         placeholder = \"  \"\n\
         input_format = \"jalali\"\n"
      )
      .expect("parse config");
    assert_eq!(cfg.year_span_before, 50);
    assert_eq!(
      cfg.placeholder,
      "Select a date"
    );
    assert_eq!(
      cfg.input_format,
      DateFormat::Jalali
    );
  }

  #[test]
  fn loads_explicit_file() {
    let temp =
      tempdir().expect("tempdir");
    let path =
      temp.path().join("picker.toml");
    fs::write(
      &path,
      "year_span_before = 5\n\
       year_span_after = 5\n\
       timezone = \"UTC\"\n"
    )
    .expect("write config");

    let cfg =
      PickerConfig::load(Some(&path))
        .expect("load config");
    assert_eq!(cfg.year_span_before, 5);
    assert_eq!(cfg.timezone, "UTC");

    let missing =
      temp.path().join("missing.toml");
    assert!(
      PickerConfig::load(Some(
        &missing
      ))
      .is_err()
    );
  }

  #[test]
  fn applies_overrides() {
    let mut cfg =
      PickerConfig::default();
    cfg
      .apply_overrides(vec![
        (
          "year_anchor".to_string(),
          "today".to_string()
        ),
        (
          "year_span_after".to_string(),
          "10".to_string()
        ),
      ])
      .expect("apply overrides");
    assert_eq!(
      cfg.year_anchor,
      YearAnchor::Today
    );
    assert_eq!(cfg.year_span_after, 10);

    assert!(
      cfg
        .apply_overrides(vec![(
          "colour".to_string(),
          "red".to_string()
        )])
        .is_err()
    );
    assert!(
      cfg
        .apply_overrides(vec![(
          "input_format".to_string(),
          "hijri".to_string()
        )])
        .is_err()
    );
  }
}
