use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use jalali_core::calendar::{self, DateFormat};
use jalali_core::clock::FixedClock;
use jalali_core::config::PickerConfig;
use jalali_core::picker::PickerPhase;
use jalali_core::{CalendarDate, Command, Outcome, PickerController, PickerError};
use tempfile::tempdir;

fn frozen_at(year: i32, month: u32, day: u32) -> Box<FixedClock> {
    let now = Utc
        .with_ymd_and_hms(year, month, day, 8, 0, 0)
        .single()
        .expect("valid now");
    Box::new(FixedClock(now))
}

#[test]
fn browse_select_and_reopen() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("picker.toml");
    fs::write(
        &path,
        "input_format = \"jalali\"\nyear_span_before = 2\nyear_span_after = 2\n",
    )
    .expect("write config");
    let config = PickerConfig::load(Some(&path)).expect("load config");

    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    let mut picker = PickerController::new(config, Some("1402/12/10"), frozen_at(2024, 5, 1))
        .on_change(move |value| sink.borrow_mut().push(value.to_string()));

    assert_eq!(picker.open(), Outcome::Applied);
    assert_eq!((picker.cursor().year(), picker.cursor().month()), (1402, 12));

    picker.next_month();
    assert_eq!((picker.cursor().year(), picker.cursor().month()), (1403, 1));

    picker.show_year_view();
    let years: Vec<i32> = picker.year_tiles().iter().map(|tile| tile.year).collect();
    assert_eq!(years, vec![1401, 1402, 1403, 1404, 1405]);
    picker.apply(Command::SelectYear(1404)).expect("select year");

    picker.show_month_view();
    picker.apply(Command::SelectMonth(12)).expect("select month");
    assert_eq!(picker.visible_days().len(), 29);
    assert!(matches!(
        picker.select_day(30),
        Err(PickerError::DayOutOfRange { max: 29, .. })
    ));

    let outcome = picker.apply(Command::SelectDay(29)).expect("select day");
    assert_eq!(outcome, Outcome::Committed("2026-03-20".to_string()));
    assert_eq!(picker.phase(), PickerPhase::Closed);
    assert_eq!(
        picker.selected(),
        Some(CalendarDate::new(1404, 12, 29).expect("valid date"))
    );

    picker.toggle();
    assert_eq!((picker.cursor().year(), picker.cursor().month()), (1404, 12));
    picker.outside_interaction();

    assert_eq!(*changes.borrow(), vec!["2026-03-20".to_string()]);
}

#[test]
fn nowruz_seed_and_fifteenth_of_farvardin() {
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    let mut picker = PickerController::new(
        PickerConfig::default(),
        Some("2024-03-20"),
        frozen_at(2024, 3, 25),
    )
    .on_change(move |value| sink.borrow_mut().push(value.to_string()));

    assert_eq!(
        picker.selected(),
        Some(CalendarDate::new(1403, 1, 1).expect("valid date"))
    );

    picker.open();
    picker.select_day(15).expect("select day");
    assert_eq!(*changes.borrow(), vec!["2024-04-03".to_string()]);
    assert_eq!(
        calendar::parse(&changes.borrow()[0], DateFormat::GregorianIso),
        Ok(CalendarDate::new(1403, 1, 15).expect("valid date"))
    );
}
