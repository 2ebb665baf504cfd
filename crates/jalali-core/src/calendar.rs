//! Jalali calendar arithmetic.
//!
//! Leap years follow the break-table algorithm: between consecutive break
//! years the calendar runs 33-year sub-cycles with eight leap years each, and
//! the breaks absorb the drift against the vernal equinox. Conversions go
//! through Julian day numbers so that every Jalali date in the supported range
//! maps to exactly one Gregorian date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::clock::{self, Clock, SystemClock};
use crate::error::CalendarError;

/// First year covered by the break table.
pub const MIN_YEAR: i32 = -61;
/// Last year covered by the break table.
pub const MAX_YEAR: i32 = 3177;

const BREAKS: [i32; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Weekday index of Friday with Saturday as 0.
pub const FRIDAY: u32 = 6;

pub const PERSIAN_MONTHS: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

pub const JALALI_MONTHS: [&str; 12] = [
    "Farvardin",
    "Ordibehesht",
    "Khordad",
    "Tir",
    "Mordad",
    "Shahrivar",
    "Mehr",
    "Aban",
    "Azar",
    "Dey",
    "Bahman",
    "Esfand",
];

/// Saturday first.
pub const PERSIAN_WEEKDAYS_SHORT: [&str; 7] = ["ش", "ی", "د", "س", "چ", "پ", "ج"];

pub const WEEKDAYS: [&str; 7] = [
    "Saturday",
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
];

/// A valid day of the Jalali calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
}

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        check_year(year)?;
        check_month(month)?;
        if day == 0 || day > month_length(year, month) {
            return Err(CalendarError::InvalidDay { year, month, day });
        }
        Ok(Self { year, month, day })
    }

    /// Callers must already hold a supported year, a month in 1..=12 and a
    /// day inside that month.
    pub(crate) const fn from_parts(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn to_gregorian(&self) -> (i32, u32, u32) {
        to_gregorian(self)
    }

    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        let (year, month, day) = self.to_gregorian();
        NaiveDate::from_ymd_opt(year, month, day)
    }

    pub fn weekday(&self) -> u32 {
        weekday(self)
    }

    pub fn month_name(&self) -> &'static str {
        PERSIAN_MONTHS[self.month as usize - 1]
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

impl TryFrom<NaiveDate> for CalendarDate {
    type Error = CalendarError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        from_gregorian(value.year(), value.month(), value.day())
    }
}

/// Textual forms accepted by [`parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateFormat {
    /// `YYYY-MM-DD` in the Gregorian calendar.
    #[default]
    GregorianIso,
    /// `jYYYY/jMM/jDD` in the Jalali calendar.
    Jalali,
}

impl DateFormat {
    pub fn as_key(&self) -> &'static str {
        match self {
            DateFormat::GregorianIso => "gregorian-iso",
            DateFormat::Jalali => "jalali",
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for DateFormat {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gregorian-iso" | "gregorian" | "iso" => Ok(DateFormat::GregorianIso),
            "jalali" | "persian" | "shamsi" => Ok(DateFormat::Jalali),
            other => Err(CalendarError::unparsable(other, "unknown date format")),
        }
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year) && jal_cal(year).leap == 0
}

pub fn days_in_month(year: i32, month: u32) -> Result<u32, CalendarError> {
    check_month(month)?;
    Ok(month_length(year, month))
}

/// Weekday of the first day of the month, Saturday = 0 ... Friday = 6.
pub fn weekday_offset(year: i32, month: u32) -> Result<u32, CalendarError> {
    check_month(month)?;
    check_year(year)?;
    Ok(weekday(&CalendarDate::from_parts(year, month, 1)))
}

/// Saturday = 0 ... Friday = 6.
pub fn weekday(date: &CalendarDate) -> u32 {
    let jdn = jdn_from_jalali(date.year, date.month, date.day);
    (jdn + 2).rem_euclid(7) as u32
}

pub fn is_holiday(date: &CalendarDate) -> bool {
    weekday(date) == FRIDAY
}

/// Today's Jalali date from the system clock.
pub fn today() -> Result<CalendarDate, CalendarError> {
    today_with(&SystemClock, &clock::calendar_timezone(None))
}

pub fn today_with(clock: &dyn Clock, tz: &Tz) -> Result<CalendarDate, CalendarError> {
    CalendarDate::try_from(clock::local_date(clock, tz))
}

pub fn to_gregorian(date: &CalendarDate) -> (i32, u32, u32) {
    gregorian_from_jdn(jdn_from_jalali(date.year, date.month, date.day))
}

pub fn from_gregorian(year: i32, month: u32, day: u32) -> Result<CalendarDate, CalendarError> {
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return Err(CalendarError::unparsable(
            &format!("{year:04}-{month:02}-{day:02}"),
            "not a valid Gregorian date",
        ));
    }
    let (jy, jm, jd) = jalali_from_jdn(jdn_from_gregorian(year, month, day));
    check_year(jy)?;
    Ok(CalendarDate::from_parts(jy, jm, jd))
}

/// Canonical output: the Gregorian equivalent as `YYYY-MM-DD`.
pub fn format(date: &CalendarDate) -> String {
    let (year, month, day) = to_gregorian(date);
    format!("{year:04}-{month:02}-{day:02}")
}

pub fn format_jalali(date: &CalendarDate) -> String {
    date.to_string()
}

/// Unpadded `Y/M/D`, the text shown in the picker's input.
pub fn display_label(date: &CalendarDate) -> String {
    format!("{}/{}/{}", date.year, date.month, date.day)
}

#[tracing::instrument(level = "debug")]
pub fn parse(text: &str, format: DateFormat) -> Result<CalendarDate, CalendarError> {
    let token = normalize_digits(text.trim());
    if token.is_empty() {
        return Err(CalendarError::unparsable(text, "empty input"));
    }

    match format {
        DateFormat::GregorianIso => {
            let date = NaiveDate::parse_from_str(&token, "%Y-%m-%d")
                .map_err(|err| CalendarError::unparsable(text, err.to_string()))?;
            CalendarDate::try_from(date)
                .map_err(|err| CalendarError::unparsable(text, err.to_string()))
        }
        DateFormat::Jalali => parse_jalali(text, &token),
    }
}

/// Slash-separated input is read as Jalali, anything else as Gregorian ISO.
pub fn parse_any(text: &str) -> Result<CalendarDate, CalendarError> {
    if text.contains('/') {
        parse(text, DateFormat::Jalali)
    } else {
        parse(text, DateFormat::GregorianIso)
    }
}

fn parse_jalali(input: &str, token: &str) -> Result<CalendarDate, CalendarError> {
    let re = Regex::new(r"^(?P<year>-?\d{1,4})[/-](?P<month>\d{1,2})[/-](?P<day>\d{1,2})$")
        .map_err(|e| CalendarError::unparsable(input, format!("internal regex failure: {e}")))?;
    let caps = re
        .captures(token)
        .ok_or_else(|| CalendarError::unparsable(input, "expected jYYYY/jMM/jDD"))?;

    let year: i32 = capture(&caps, "year")
        .parse()
        .map_err(|_| CalendarError::unparsable(input, "invalid year"))?;
    let month: u32 = capture(&caps, "month")
        .parse()
        .map_err(|_| CalendarError::unparsable(input, "invalid month"))?;
    let day: u32 = capture(&caps, "day")
        .parse()
        .map_err(|_| CalendarError::unparsable(input, "invalid day"))?;

    CalendarDate::new(year, month, day)
        .map_err(|err| CalendarError::unparsable(input, err.to_string()))
}

fn capture<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

/// Maps Persian and Arabic-Indic digits onto ASCII.
fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (ch as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (ch as u32 - 0x0660) as u8),
            other => other,
        })
        .collect()
}

fn check_month(month: u32) -> Result<(), CalendarError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(CalendarError::InvalidMonth(month))
    }
}

fn check_year(year: i32) -> Result<(), CalendarError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(CalendarError::YearOutOfRange(year))
    }
}

/// `month` must be in 1..=12.
pub(crate) fn month_length(year: i32, month: u32) -> u32 {
    match month {
        1..=6 => 31,
        7..=11 => 30,
        _ if is_leap_year(year) => 30,
        _ => 29,
    }
}

struct YearFacts {
    /// 0 for a leap year, otherwise years since the last leap year.
    leap: i32,
    /// Day of March (Gregorian) on which Farvardin 1 falls.
    march: i32,
}

fn jal_cal(jy: i32) -> YearFacts {
    let gy = jy + 621;
    let mut leap_j = -14;
    let mut jp = BREAKS[0];
    let mut jump = 0;

    for &jm in &BREAKS[1..] {
        jump = jm - jp;
        if jy < jm {
            break;
        }
        leap_j += jump / 33 * 8 + (jump % 33) / 4;
        jp = jm;
    }

    let mut n = jy - jp;
    leap_j += n / 33 * 8 + (n % 33 + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_j += 1;
    }

    let leap_g = gy / 4 - (gy / 100 + 1) * 3 / 4 - 150;
    let march = 20 + leap_j - leap_g;

    if jump - n < 6 {
        n = n - jump + (jump + 4) / 33 * 33;
    }
    let mut leap = ((n + 1) % 33 - 1) % 4;
    if leap == -1 {
        leap = 4;
    }

    YearFacts { leap, march }
}

fn farvardin_first(jy: i32) -> i64 {
    jdn_from_gregorian(jy + 621, 3, jal_cal(jy).march as u32)
}

fn jdn_from_jalali(jy: i32, jm: u32, jd: u32) -> i64 {
    let jm = i64::from(jm);
    farvardin_first(jy) + (jm - 1) * 31 - jm / 7 * (jm - 7) + i64::from(jd) - 1
}

fn jalali_from_jdn(jdn: i64) -> (i32, u32, u32) {
    let (gy, _, _) = gregorian_from_jdn(jdn);
    let mut jy = gy - 621;
    let mut start = farvardin_first(jy);
    if jdn < start {
        jy -= 1;
        start = farvardin_first(jy);
    }

    let k = jdn - start;
    if k < 186 {
        (jy, (1 + k / 31) as u32, (k % 31 + 1) as u32)
    } else {
        let k = k - 186;
        (jy, (7 + k / 30) as u32, (k % 30 + 1) as u32)
    }
}

fn jdn_from_gregorian(gy: i32, gm: u32, gd: u32) -> i64 {
    let (gy, gm, gd) = (i64::from(gy), i64::from(gm), i64::from(gd));
    let shift = (gm - 8) / 6;
    let d = (gy + shift + 100_100) * 1461 / 4 + (153 * ((gm + 9) % 12) + 2) / 5 + gd - 34_840_408;
    d - (gy + 100_100 + shift) / 100 * 3 / 4 + 752
}

fn gregorian_from_jdn(jdn: i64) -> (i32, u32, u32) {
    let mut j = 4 * jdn + 139_361_631;
    j += (4 * jdn + 183_187_720) / 146_097 * 3 / 4 * 4 - 3908;
    let i = (j % 1461) / 4 * 5 + 308;
    let gd = (i % 153) / 5 + 1;
    let gm = (i / 153) % 12 + 1;
    let gy = j / 1461 - 100_100 + (8 - gm) / 6;
    (gy as i32, gm as u32, gd as u32)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::{FixedClock, parse_timezone};

    fn date(year: i32, month: u32, day: u32) -> CalendarDate {
        CalendarDate::new(year, month, day).expect("valid jalali date")
    }

    #[test]
    fn leap_years_match_reference_cycle() {
        let expected = [1375, 1379, 1383, 1387, 1391, 1395, 1399, 1403, 1408];
        let leaps: Vec<i32> = (1375..=1408).filter(|&y| is_leap_year(y)).collect();
        assert_eq!(leaps, expected);
    }

    #[test]
    fn esfand_length_follows_leap_status() {
        for year in 1200..1600 {
            for month in 1..=12 {
                let days = days_in_month(year, month).expect("valid month");
                assert!((29..=31).contains(&days));
            }
            let esfand = days_in_month(year, 12).expect("valid month");
            assert_eq!(esfand == 30, is_leap_year(year), "year {year}");
        }
    }

    #[test]
    fn rejects_months_outside_range() {
        assert_eq!(days_in_month(1403, 0), Err(CalendarError::InvalidMonth(0)));
        assert_eq!(days_in_month(1403, 13), Err(CalendarError::InvalidMonth(13)));
        assert_eq!(weekday_offset(1403, 13), Err(CalendarError::InvalidMonth(13)));
    }

    #[test]
    fn nowruz_lands_on_known_gregorian_days() {
        let cases = [
            (1399, "2020-03-20"),
            (1400, "2021-03-21"),
            (1401, "2022-03-21"),
            (1402, "2023-03-21"),
            (1403, "2024-03-20"),
            (1404, "2025-03-21"),
        ];
        for (year, expected) in cases {
            assert_eq!(format(&date(year, 1, 1)), expected, "nowruz {year}");
        }
    }

    #[test]
    fn converts_second_half_and_year_end() {
        assert_eq!(format(&date(1403, 7, 1)), "2024-09-22");
        assert_eq!(format(&date(1403, 12, 30)), "2025-03-20");
        assert_eq!(format(&date(1402, 12, 29)), "2024-03-19");
        assert_eq!(from_gregorian(2024, 3, 19), Ok(date(1402, 12, 29)));
        assert_eq!(from_gregorian(2025, 3, 20), Ok(date(1403, 12, 30)));
    }

    #[test]
    fn format_then_parse_returns_same_date() {
        for year in [1, 400, 1380, 1403, 1500] {
            for month in 1..=12 {
                let last = days_in_month(year, month).expect("valid month");
                for day in [1, 15, last] {
                    let original = date(year, month, day);
                    let parsed = parse(&format(&original), DateFormat::GregorianIso)
                        .expect("parse formatted date");
                    assert_eq!(parsed, original);
                }
            }
        }
    }

    #[test]
    fn weekday_offsets_use_saturday_zero() {
        // 1403/01/01 was a Wednesday.
        assert_eq!(weekday_offset(1403, 1), Ok(4));
        assert_eq!(weekday(&date(1403, 1, 3)), FRIDAY);
        assert!(is_holiday(&date(1403, 1, 3)));
        assert!(!is_holiday(&date(1403, 1, 4)));
        // 1404/01/01 was a Friday.
        assert_eq!(weekday_offset(1404, 1), Ok(6));
    }

    #[test]
    fn parses_jalali_text() {
        assert_eq!(parse("1403/01/15", DateFormat::Jalali), Ok(date(1403, 1, 15)));
        assert_eq!(parse(" 1403/1/5 ", DateFormat::Jalali), Ok(date(1403, 1, 5)));
        assert_eq!(parse("۱۴۰۳/۰۱/۰۱", DateFormat::Jalali), Ok(date(1403, 1, 1)));
        assert!(matches!(
            parse("1402/12/30", DateFormat::Jalali),
            Err(CalendarError::UnparsableDate { .. })
        ));
        assert!(matches!(
            parse("1403-01", DateFormat::Jalali),
            Err(CalendarError::UnparsableDate { .. })
        ));
    }

    #[test]
    fn parses_gregorian_text() {
        assert_eq!(parse("2024-03-20", DateFormat::GregorianIso), Ok(date(1403, 1, 1)));
        assert!(matches!(
            parse("2024-02-30", DateFormat::GregorianIso),
            Err(CalendarError::UnparsableDate { .. })
        ));
        assert!(matches!(
            parse("", DateFormat::GregorianIso),
            Err(CalendarError::UnparsableDate { .. })
        ));
        assert_eq!(parse_any("2024-04-03"), Ok(date(1403, 1, 15)));
        assert_eq!(parse_any("1403/1/15"), Ok(date(1403, 1, 15)));
    }

    #[test]
    fn gregorian_text_beyond_supported_years_is_unparsable() {
        assert!(matches!(
            parse("5000-01-01", DateFormat::GregorianIso),
            Err(CalendarError::UnparsableDate { input, .. }) if input == "5000-01-01"
        ));
        assert!(matches!(
            parse_any("5000-01-01"),
            Err(CalendarError::UnparsableDate { .. })
        ));
        assert!(matches!(
            from_gregorian(5000, 1, 1),
            Err(CalendarError::YearOutOfRange(_))
        ));
    }

    #[test]
    fn date_format_keys() {
        assert_eq!("iso".parse::<DateFormat>(), Ok(DateFormat::GregorianIso));
        assert_eq!("Jalali".parse::<DateFormat>(), Ok(DateFormat::Jalali));
        assert!("hijri".parse::<DateFormat>().is_err());
    }

    #[test]
    fn constructor_validates_every_field() {
        assert_eq!(
            CalendarDate::new(1403, 7, 31),
            Err(CalendarError::InvalidDay { year: 1403, month: 7, day: 31 })
        );
        assert_eq!(
            CalendarDate::new(MAX_YEAR + 1, 1, 1),
            Err(CalendarError::YearOutOfRange(MAX_YEAR + 1))
        );
        assert!(CalendarDate::new(1403, 12, 30).is_ok());
    }

    #[test]
    fn today_uses_clock_and_timezone() {
        let clock = FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 19, 21, 0, 0)
                .single()
                .expect("valid now"),
        );
        let tehran = parse_timezone("Asia/Tehran", "test").expect("tehran tz");
        assert_eq!(today_with(&clock, &tehran), Ok(date(1403, 1, 1)));
        assert_eq!(today_with(&clock, &chrono_tz::UTC), Ok(date(1402, 12, 29)));
    }

    #[test]
    fn system_today_is_in_range() {
        let today = today().expect("today");
        assert!(today.to_naive_date().is_some());
    }

    #[test]
    fn naive_date_round_trip() {
        let d = date(1403, 1, 15);
        let naive = d.to_naive_date().expect("gregorian date");
        assert_eq!(naive.format("%Y-%m-%d").to_string(), "2024-04-03");
        assert_eq!(CalendarDate::try_from(naive), Ok(d));
    }

    #[test]
    fn labels() {
        let d = date(1403, 1, 5);
        assert_eq!(d.to_string(), "1403/01/05");
        assert_eq!(display_label(&d), "1403/1/5");
        assert_eq!(d.month_name(), "فروردین");
    }
}
