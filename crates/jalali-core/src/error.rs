use thiserror::Error;

/// Failures of calendar queries and date parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("invalid month {0}; expected 1..=12")]
    InvalidMonth(u32),

    #[error("day {day} does not exist in {year}/{month}")]
    InvalidDay { year: i32, month: u32, day: u32 },

    #[error("year {0} is outside the supported Jalali range")]
    YearOutOfRange(i32),

    #[error("unparsable date {input:?}: {reason}")]
    UnparsableDate { input: String, reason: String },
}

impl CalendarError {
    pub(crate) fn unparsable(input: &str, reason: impl Into<String>) -> Self {
        Self::UnparsableDate {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Recoverable rejections reported by the picker to its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickerError {
    #[error("day {day} is outside 1..={max} for {year}/{month}")]
    DayOutOfRange {
        year: i32,
        month: u32,
        day: u32,
        max: u32,
    },

    #[error("month {0} is outside 1..=12")]
    MonthOutOfRange(u32),

    #[error("year {year} is outside {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },
}
