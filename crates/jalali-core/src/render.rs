use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{self, CalendarDate, JALALI_MONTHS, PERSIAN_WEEKDAYS_SHORT, WEEKDAYS};
use crate::picker::{DayCell, MonthTile, PickerController, PickerSnapshot, ViewMode, YearTile};

const CELL_WIDTH: usize = 4;
const YEAR_COLUMNS: usize = 10;

/// Plain-text drawing of the picker's derived queries.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Draws whatever the controller's current view shows.
    pub fn write_picker<W: Write>(
        &self,
        writer: &mut W,
        picker: &PickerController,
    ) -> anyhow::Result<()> {
        writeln!(writer, "{}", picker.display_label())?;
        if !picker.state().is_open() {
            return Ok(());
        }

        match picker.state().view() {
            ViewMode::Day => self.write_month_grid(writer, picker),
            ViewMode::Month => self.write_month_tiles(writer, &picker.month_tiles()),
            ViewMode::Year => self.write_year_tiles(writer, &picker.year_tiles()),
        }
    }

    pub fn write_month_grid<W: Write>(
        &self,
        writer: &mut W,
        picker: &PickerController,
    ) -> anyhow::Result<()> {
        let (month_name, year) = picker.header();
        let title = format!("< {month_name} {year} >");
        let total = CELL_WIDTH * 7;
        let padding = total.saturating_sub(UnicodeWidthStr::width(title.as_str())) / 2;
        writeln!(writer, "{}{}", " ".repeat(padding), title)?;

        for name in PERSIAN_WEEKDAYS_SHORT {
            write!(writer, "{}", pad_left(name, CELL_WIDTH))?;
        }
        writeln!(writer)?;

        let blanks = picker.leading_blank_count() as usize;
        let mut column = 0usize;
        for _ in 0..blanks {
            write!(writer, "{}", " ".repeat(CELL_WIDTH))?;
            column += 1;
        }

        for cell in picker.visible_days() {
            write!(writer, "{}", self.day_cell(&cell))?;
            column += 1;
            if column % 7 == 0 {
                writeln!(writer)?;
            }
        }
        if column % 7 != 0 {
            writeln!(writer)?;
        }

        writeln!(writer, "* selected  + today  ! friday")?;
        Ok(())
    }

    pub fn write_month_tiles<W: Write>(
        &self,
        writer: &mut W,
        tiles: &[MonthTile],
    ) -> anyhow::Result<()> {
        let headers = vec!["#".to_string(), "Month".to_string(), String::new()];
        let rows = tiles
            .iter()
            .map(|tile| {
                let name = if tile.is_selected {
                    self.paint(tile.name, "7")
                } else {
                    tile.name.to_string()
                };
                vec![
                    tile.month.to_string(),
                    name,
                    tile_marks(tile.is_selected, tile.is_current),
                ]
            })
            .collect();
        write_table(writer, headers, rows)
    }

    pub fn write_year_tiles<W: Write>(
        &self,
        writer: &mut W,
        tiles: &[YearTile],
    ) -> anyhow::Result<()> {
        for chunk in tiles.chunks(YEAR_COLUMNS) {
            for tile in chunk {
                let text = format!("{:>5}{}", tile.year, tile_marks(tile.is_selected, tile.is_current));
                let text = if tile.is_selected {
                    self.paint(&text, "7")
                } else {
                    text
                };
                write!(writer, "{} ", pad_right(&text, 7))?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn write_snapshot<W: Write>(
        &self,
        writer: &mut W,
        snapshot: &PickerSnapshot,
    ) -> anyhow::Result<()> {
        writeln!(writer, "phase     {:?}", snapshot.phase)?;
        writeln!(
            writer,
            "cursor    {}/{:02}",
            snapshot.cursor.year(),
            snapshot.cursor.month()
        )?;
        writeln!(
            writer,
            "selected  {}",
            snapshot
                .selected
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(
            writer,
            "value     {}",
            snapshot.value.clone().unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(writer, "label     {}", snapshot.label)?;
        Ok(())
    }

    pub fn write_date<W: Write>(&self, writer: &mut W, date: &CalendarDate) -> anyhow::Result<()> {
        let weekday = WEEKDAYS[date.weekday() as usize];
        let weekday = if calendar::is_holiday(date) {
            self.paint(weekday, "31")
        } else {
            weekday.to_string()
        };
        writeln!(writer, "jalali    {}", calendar::format_jalali(date))?;
        writeln!(writer, "gregorian {}", calendar::format(date))?;
        writeln!(
            writer,
            "month     {} ({})",
            date.month_name(),
            JALALI_MONTHS[date.month() as usize - 1]
        )?;
        writeln!(writer, "weekday   {weekday}")?;
        writeln!(writer, "holiday   {}", calendar::is_holiday(date))?;
        Ok(())
    }

    pub fn write_leap_years<W: Write>(
        &self,
        writer: &mut W,
        years: impl IntoIterator<Item = i32>,
    ) -> anyhow::Result<()> {
        let headers = vec!["Year".to_string(), "Leap".to_string(), "Esfand".to_string()];
        let rows = years
            .into_iter()
            .map(|year| {
                let leap = calendar::is_leap_year(year);
                let esfand = if leap { "30" } else { "29" };
                let leap = if leap {
                    self.paint("yes", "32")
                } else {
                    "no".to_string()
                };
                vec![year.to_string(), leap, esfand.to_string()]
            })
            .collect();
        write_table(writer, headers, rows)
    }

    fn day_cell(&self, cell: &DayCell) -> String {
        let mark = if cell.is_selected {
            '*'
        } else if cell.is_today {
            '+'
        } else if cell.is_holiday {
            '!'
        } else {
            ' '
        };
        let text = format!("{:>3}{mark}", cell.date.day());
        if cell.is_selected {
            self.paint(&text, "7")
        } else if cell.is_holiday {
            self.paint(&text, "31")
        } else if cell.is_today {
            self.paint(&text, "4")
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn tile_marks(selected: bool, current: bool) -> String {
    match (selected, current) {
        (true, true) => "*+".to_string(),
        (true, false) => "*".to_string(),
        (false, true) => "+".to_string(),
        (false, false) => String::new(),
    }
}

fn pad_left(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    format!("{}{}", " ".repeat(width.saturating_sub(visible)), text)
}

fn pad_right(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    format!("{}{}", text, " ".repeat(width.saturating_sub(visible)))
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{} ", pad_right(header, *width))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{} ", pad_right(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Renderer, strip_ansi};
    use crate::clock::FixedClock;
    use crate::config::PickerConfig;
    use crate::picker::PickerController;

    fn picker(initial: Option<&str>) -> PickerController {
        let now = Utc
            .with_ymd_and_hms(2024, 4, 3, 9, 0, 0)
            .single()
            .expect("valid now");
        PickerController::new(PickerConfig::default(), initial, Box::new(FixedClock(now)))
    }

    fn render(picker: &PickerController) -> String {
        let mut out = Vec::new();
        Renderer::plain()
            .write_picker(&mut out, picker)
            .expect("render picker");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn closed_picker_shows_only_label() {
        assert_eq!(render(&picker(None)), "Select a date\n");
    }

    #[test]
    fn month_grid_is_padded_and_marked() {
        let mut p = picker(Some("2024-03-22"));
        p.open();
        let text = render(&p);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "1403/1/3");
        assert!(lines[1].contains("فروردین 1403"));
        // Wednesday start: four blank cells, then days 1..=3.
        assert_eq!(lines[3], format!("{}  1   2   3*", " ".repeat(16)));
        assert!(text.contains(" 15+"));
        assert!(text.contains(" 10!"));
        assert_eq!(lines.last().copied(), Some("* selected  + today  ! friday"));
    }

    #[test]
    fn year_view_lists_a_century() {
        let mut p = picker(None);
        p.open();
        p.show_year_view();
        let text = render(&p);
        assert!(text.contains(" 1353"));
        assert!(text.contains(" 1452"));
        assert!(text.contains("1403*+"));
        assert_eq!(text.lines().count(), 11);
    }

    #[test]
    fn leap_table_lists_each_year() {
        let mut out = Vec::new();
        Renderer::plain()
            .write_leap_years(&mut out, 1402..=1404)
            .expect("render leap table");
        let text = String::from_utf8(out).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[3].starts_with("1403 yes  30"));
    }

    #[test]
    fn strips_ansi_sequences() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
    }
}
