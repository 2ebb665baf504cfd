//! The date picker's interaction state machine.
//!
//! A host maps each discrete interaction event onto one [`Command`] and reads
//! the derived queries (`visible_days`, `month_tiles`, `year_tiles`, ...) to
//! draw itself. The controller never detects events on its own; an outside
//! click, for instance, arrives as [`Command::OutsideInteraction`].

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calendar::{self, CalendarDate, MAX_YEAR, MIN_YEAR, PERSIAN_MONTHS};
use crate::clock::{Clock, SystemClock};
use crate::config::{PickerConfig, YearAnchor};
use crate::error::{CalendarError, PickerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Day,
    Month,
    Year,
}

/// Visibility and view folded into one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PickerPhase {
    Closed,
    OpenDay,
    OpenMonth,
    OpenYear,
}

impl PickerPhase {
    pub fn is_open(&self) -> bool {
        !matches!(self, PickerPhase::Closed)
    }
}

/// The year and month being browsed. The month is always in 1..=12 and the
/// year always inside the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    year: i32,
    month: u32,
}

impl Cursor {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    fn of(date: &CalendarDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn next(self) -> Option<Self> {
        if self.month == 12 {
            (self.year < MAX_YEAR).then(|| Self {
                year: self.year + 1,
                month: 1,
            })
        } else {
            Some(Self {
                month: self.month + 1,
                ..self
            })
        }
    }

    fn prev(self) -> Option<Self> {
        if self.month == 1 {
            (self.year > MIN_YEAR).then(|| Self {
                year: self.year - 1,
                month: 12,
            })
        } else {
            Some(Self {
                month: self.month - 1,
                ..self
            })
        }
    }

    fn days(&self) -> u32 {
        calendar::month_length(self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerState {
    selected: Option<CalendarDate>,
    cursor: Cursor,
    view: ViewMode,
    open: bool,
}

impl PickerState {
    pub fn selected(&self) -> Option<CalendarDate> {
        self.selected
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn phase(&self) -> PickerPhase {
        match (self.open, self.view) {
            (false, _) => PickerPhase::Closed,
            (true, ViewMode::Day) => PickerPhase::OpenDay,
            (true, ViewMode::Month) => PickerPhase::OpenMonth,
            (true, ViewMode::Year) => PickerPhase::OpenYear,
        }
    }
}

/// One interaction event from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open,
    Close,
    Toggle,
    ShowMonthView,
    ShowYearView,
    SelectMonth(u32),
    SelectYear(i32),
    NextMonth,
    PrevMonth,
    SelectDay(u32),
    OutsideInteraction,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        if let Some((name, value)) = token.split_once('=') {
            let value = value.trim();
            let number = || -> anyhow::Result<i64> {
                value
                    .parse::<i64>()
                    .map_err(|_| anyhow!("invalid number in event {s:?}"))
            };
            return match name.trim() {
                "month" => Ok(Command::SelectMonth(u32::try_from(number()?)?)),
                "year" => Ok(Command::SelectYear(i32::try_from(number()?)?)),
                "day" => Ok(Command::SelectDay(u32::try_from(number()?)?)),
                other => Err(anyhow!("unknown event with value: {other}")),
            };
        }

        match token.as_str() {
            "open" => Ok(Command::Open),
            "close" => Ok(Command::Close),
            "toggle" => Ok(Command::Toggle),
            "month-view" => Ok(Command::ShowMonthView),
            "year-view" => Ok(Command::ShowYearView),
            "next" => Ok(Command::NextMonth),
            "prev" => Ok(Command::PrevMonth),
            "outside" => Ok(Command::OutsideInteraction),
            other => Err(anyhow!("unknown event: {other}")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Open => f.write_str("open"),
            Command::Close => f.write_str("close"),
            Command::Toggle => f.write_str("toggle"),
            Command::ShowMonthView => f.write_str("month-view"),
            Command::ShowYearView => f.write_str("year-view"),
            Command::SelectMonth(month) => write!(f, "month={month}"),
            Command::SelectYear(year) => write!(f, "year={year}"),
            Command::NextMonth => f.write_str("next"),
            Command::PrevMonth => f.write_str("prev"),
            Command::SelectDay(day) => write!(f, "day={day}"),
            Command::OutsideInteraction => f.write_str("outside"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Not valid from the current phase; nothing changed.
    Ignored,
    /// A day was selected; carries the value handed to `on_change`.
    Committed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    pub date: CalendarDate,
    pub is_today: bool,
    pub is_selected: bool,
    pub is_holiday: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthTile {
    pub month: u32,
    pub name: &'static str,
    pub is_selected: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearTile {
    pub year: i32,
    pub is_selected: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickerSnapshot {
    pub phase: PickerPhase,
    pub view: ViewMode,
    pub open: bool,
    pub cursor: Cursor,
    pub selected: Option<CalendarDate>,
    pub value: Option<String>,
    pub label: String,
}

type ChangeHandler = Box<dyn FnMut(&str)>;

pub struct PickerController {
    state: PickerState,
    config: PickerConfig,
    timezone: Tz,
    clock: Box<dyn Clock>,
    on_change: Option<ChangeHandler>,
    disabled: bool,
    seed_warning: Option<CalendarError>,
}

impl fmt::Debug for PickerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickerController")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("timezone", &self.timezone)
            .field("disabled", &self.disabled)
            .field("seed_warning", &self.seed_warning)
            .finish_non_exhaustive()
    }
}

impl PickerController {
    /// Builds a closed picker. An `initial` value that fails to parse leaves
    /// the selection empty and is kept as [`Self::seed_warning`].
    #[tracing::instrument(skip(config, clock))]
    pub fn new(config: PickerConfig, initial: Option<&str>, clock: Box<dyn Clock>) -> Self {
        let timezone = config.timezone();

        let (selected, seed_warning) = match initial.map(str::trim).filter(|v| !v.is_empty()) {
            None => (None, None),
            Some(raw) => match calendar::parse(raw, config.input_format) {
                Ok(date) => (Some(date), None),
                Err(err) => {
                    warn!(value = raw, error = %err, "ignoring unparsable initial value");
                    (None, Some(err))
                }
            },
        };

        let cursor = match selected {
            Some(date) => Cursor::of(&date),
            None => match calendar::today_with(clock.as_ref(), &timezone) {
                Ok(today) => Cursor::of(&today),
                Err(err) => {
                    warn!(error = %err, "clock is outside the supported range");
                    Cursor {
                        year: 1348,
                        month: 10,
                    }
                }
            },
        };

        debug!(?selected, ?cursor, "picker created");
        Self {
            state: PickerState {
                selected,
                cursor,
                view: ViewMode::Day,
                open: false,
            },
            config,
            timezone,
            clock,
            on_change: None,
            disabled: false,
            seed_warning,
        }
    }

    pub fn with_system_clock(config: PickerConfig, initial: Option<&str>) -> Self {
        Self::new(config, initial, Box::new(SystemClock))
    }

    pub fn on_change<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str) + 'static,
    {
        self.on_change = Some(Box::new(handler));
        self
    }

    pub fn set_on_change<F>(&mut self, handler: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.on_change = Some(Box::new(handler));
    }

    pub fn state(&self) -> &PickerState {
        &self.state
    }

    pub fn phase(&self) -> PickerPhase {
        self.state.phase()
    }

    pub fn cursor(&self) -> Cursor {
        self.state.cursor
    }

    pub fn selected(&self) -> Option<CalendarDate> {
        self.state.selected
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn seed_warning(&self) -> Option<&CalendarError> {
        self.seed_warning.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// While disabled every command is ignored.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn apply(&mut self, command: Command) -> Result<Outcome, PickerError> {
        match command {
            Command::SelectMonth(month) => self.select_month(month),
            Command::SelectYear(year) => self.select_year(year),
            Command::SelectDay(day) => self.select_day(day),
            other => Ok(self.navigate(other)),
        }
    }

    pub fn open(&mut self) -> Outcome {
        self.navigate(Command::Open)
    }

    pub fn close(&mut self) -> Outcome {
        self.navigate(Command::Close)
    }

    pub fn toggle(&mut self) -> Outcome {
        self.navigate(Command::Toggle)
    }

    pub fn show_month_view(&mut self) -> Outcome {
        self.navigate(Command::ShowMonthView)
    }

    pub fn show_year_view(&mut self) -> Outcome {
        self.navigate(Command::ShowYearView)
    }

    pub fn next_month(&mut self) -> Outcome {
        self.navigate(Command::NextMonth)
    }

    pub fn prev_month(&mut self) -> Outcome {
        self.navigate(Command::PrevMonth)
    }

    pub fn outside_interaction(&mut self) -> Outcome {
        self.navigate(Command::OutsideInteraction)
    }

    pub fn select_month(&mut self, month: u32) -> Result<Outcome, PickerError> {
        let command = Command::SelectMonth(month);
        if !self.accepts(command, PickerPhase::OpenMonth) {
            return Ok(Outcome::Ignored);
        }
        if !(1..=12).contains(&month) {
            debug!(month, "rejected month outside 1..=12");
            return Err(PickerError::MonthOutOfRange(month));
        }

        self.state.cursor.month = month;
        self.state.view = ViewMode::Day;
        self.log_transition(command, PickerPhase::OpenMonth);
        Ok(Outcome::Applied)
    }

    pub fn select_year(&mut self, year: i32) -> Result<Outcome, PickerError> {
        let command = Command::SelectYear(year);
        if !self.accepts(command, PickerPhase::OpenYear) {
            return Ok(Outcome::Ignored);
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            debug!(year, "rejected year outside the supported range");
            return Err(PickerError::YearOutOfRange {
                year,
                min: MIN_YEAR,
                max: MAX_YEAR,
            });
        }

        self.state.cursor.year = year;
        self.state.view = ViewMode::Day;
        self.log_transition(command, PickerPhase::OpenYear);
        Ok(Outcome::Applied)
    }

    /// Commits `day` of the cursor month, closes the popup and fires
    /// `on_change` with the Gregorian `YYYY-MM-DD` value.
    pub fn select_day(&mut self, day: u32) -> Result<Outcome, PickerError> {
        let command = Command::SelectDay(day);
        if !self.accepts(command, PickerPhase::OpenDay) {
            return Ok(Outcome::Ignored);
        }

        let cursor = self.state.cursor;
        let max = cursor.days();
        if day == 0 || day > max {
            debug!(day, max, "rejected day outside the cursor month");
            return Err(PickerError::DayOutOfRange {
                year: cursor.year,
                month: cursor.month,
                day,
                max,
            });
        }

        let date = CalendarDate::from_parts(cursor.year, cursor.month, day);
        let value = calendar::format(&date);
        self.state.selected = Some(date);
        self.state.open = false;
        self.log_transition(command, PickerPhase::OpenDay);

        if let Some(handler) = self.on_change.as_mut() {
            handler(&value);
        }
        Ok(Outcome::Committed(value))
    }

    fn navigate(&mut self, command: Command) -> Outcome {
        let from = self.phase();
        if self.disabled {
            debug!(%command, "picker disabled; ignoring command");
            return Outcome::Ignored;
        }

        let applied = match (command, from) {
            (Command::Open, PickerPhase::Closed) | (Command::Toggle, PickerPhase::Closed) => {
                self.show_popup();
                true
            }
            (Command::Close, phase)
            | (Command::Toggle, phase)
            | (Command::OutsideInteraction, phase)
                if phase.is_open() =>
            {
                self.state.open = false;
                true
            }
            (Command::ShowMonthView, PickerPhase::OpenDay) => {
                self.state.view = ViewMode::Month;
                true
            }
            (Command::ShowYearView, PickerPhase::OpenDay) => {
                self.state.view = ViewMode::Year;
                true
            }
            (Command::NextMonth, PickerPhase::OpenDay) => self.move_cursor(Cursor::next),
            (Command::PrevMonth, PickerPhase::OpenDay) => self.move_cursor(Cursor::prev),
            _ => false,
        };

        if applied {
            self.log_transition(command, from);
            Outcome::Applied
        } else {
            debug!(%command, phase = ?from, "command not valid here; ignoring");
            Outcome::Ignored
        }
    }

    fn show_popup(&mut self) {
        if let Some(selected) = self.state.selected {
            self.state.cursor = Cursor::of(&selected);
        }
        self.state.view = ViewMode::Day;
        self.state.open = true;
    }

    fn move_cursor(&mut self, step: fn(Cursor) -> Option<Cursor>) -> bool {
        match step(self.state.cursor) {
            Some(cursor) => {
                self.state.cursor = cursor;
                true
            }
            None => false,
        }
    }

    fn accepts(&self, command: Command, expected: PickerPhase) -> bool {
        let phase = self.phase();
        if self.disabled {
            debug!(%command, "picker disabled; ignoring command");
            return false;
        }
        if phase != expected {
            debug!(%command, ?phase, "command not valid here; ignoring");
            return false;
        }
        true
    }

    fn log_transition(&self, command: Command, from: PickerPhase) {
        debug!(
            %command,
            ?from,
            to = ?self.phase(),
            cursor_year = self.state.cursor.year,
            cursor_month = self.state.cursor.month,
            "picker transition"
        );
    }

    fn today(&self) -> Option<CalendarDate> {
        calendar::today_with(self.clock.as_ref(), &self.timezone)
            .map_err(|err| warn!(error = %err, "cannot place today in the calendar"))
            .ok()
    }

    /// Every day of the cursor month, in order.
    pub fn visible_days(&self) -> Vec<DayCell> {
        let today = self.today();
        let cursor = self.state.cursor;
        (1..=cursor.days())
            .map(|day| {
                let date = CalendarDate::from_parts(cursor.year, cursor.month, day);
                DayCell {
                    date,
                    is_today: today == Some(date),
                    is_selected: self.state.selected == Some(date),
                    is_holiday: calendar::is_holiday(&date),
                }
            })
            .collect()
    }

    /// Empty grid cells before the first day of the cursor month.
    pub fn leading_blank_count(&self) -> u32 {
        let cursor = self.state.cursor;
        calendar::weekday_offset(cursor.year, cursor.month).unwrap_or_default()
    }

    /// Ascending candidate years around the configured anchor, clipped to the
    /// supported range.
    pub fn year_range(&self, span_before: u32, span_after: u32) -> Vec<i32> {
        let anchor = match self.config.year_anchor {
            YearAnchor::Cursor => self.state.cursor.year,
            YearAnchor::Today => self
                .today()
                .map(|today| today.year())
                .unwrap_or(self.state.cursor.year),
        };
        let before = i32::try_from(span_before).unwrap_or(i32::MAX);
        let after = i32::try_from(span_after).unwrap_or(i32::MAX);
        let start = anchor.saturating_sub(before).max(MIN_YEAR);
        let end = anchor.saturating_add(after).min(MAX_YEAR);
        (start..=end).collect()
    }

    pub fn year_tiles(&self) -> Vec<YearTile> {
        let span_before = u32::try_from(self.config.year_span_before).unwrap_or(0);
        let span_after = u32::try_from(self.config.year_span_after).unwrap_or(0);
        let current = self.today().map(|today| today.year());
        self.year_range(span_before, span_after)
            .into_iter()
            .map(|year| YearTile {
                year,
                is_selected: year == self.state.cursor.year,
                is_current: current == Some(year),
            })
            .collect()
    }

    pub fn month_tiles(&self) -> Vec<MonthTile> {
        let today = self.today();
        let cursor = self.state.cursor;
        (1..=12u32)
            .map(|month| MonthTile {
                month,
                name: PERSIAN_MONTHS[month as usize - 1],
                is_selected: month == cursor.month,
                is_current: today
                    .is_some_and(|t| t.year() == cursor.year && t.month() == month),
            })
            .collect()
    }

    /// Month name and year shown above the grid.
    pub fn header(&self) -> (&'static str, i32) {
        let cursor = self.state.cursor;
        (PERSIAN_MONTHS[cursor.month as usize - 1], cursor.year)
    }

    pub fn display_label(&self) -> String {
        match self.state.selected {
            Some(date) => calendar::display_label(&date),
            None => self.config.placeholder.clone(),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.state.selected.as_ref().map(calendar::format)
    }

    pub fn snapshot(&self) -> PickerSnapshot {
        PickerSnapshot {
            phase: self.phase(),
            view: self.state.view,
            open: self.state.open,
            cursor: self.state.cursor,
            selected: self.state.selected,
            value: self.value(),
            label: self.display_label(),
        }
    }
}
