//! In-memory workbook model.
//!
//! This module is the spreadsheet capability of the crate: open
//! workbook bytes into worksheets, rows, and typed cells; write a
//! patched workbook back to bytes. Parsing streams each worksheet part
//! through quick-xml once; the original ZIP bytes are retained so the
//! save path can copy untouched parts verbatim.

mod shared_strings;
mod sheet;
mod styles;
mod writer;

pub use writer::CellPatch;

use crate::container::WorkbookContainer;
use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use shared_strings::SharedStrings;
use std::collections::HashMap;
use styles::Styles;

/// A cell's resolved native value.
///
/// One arm per native kind the file format can carry, so conversion
/// logic can match exhaustively instead of switching on type strings.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No stored value.
    Empty,
    /// A textual value (shared, inline, or formula string).
    Text(String),
    /// A plain numeric value.
    Number(f64),
    /// A boolean value.
    Bool(bool),
    /// A numeric value whose style marks it as a date, decoded from
    /// its Excel serial.
    DateTime(NaiveDateTime),
    /// An error value such as `#DIV/0!`.
    Error(String),
}

impl CellValue {
    /// Render the value as display text, if it has any.
    ///
    /// Used for header matching and error messages; `Empty` has no
    /// text.
    pub fn display_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            CellValue::Error(code) => Some(code.clone()),
        }
    }
}

/// A single cell: its A1-style reference, zero-based column index, and
/// resolved value.
#[derive(Debug, Clone)]
pub struct Cell {
    pub reference: String,
    pub column: u32,
    pub value: CellValue,
}

/// One stored row of a worksheet. Rows absent from the file are not
/// materialized.
#[derive(Debug, Clone)]
pub struct Row {
    /// 1-based row number from the file.
    pub number: u32,
    pub cells: Vec<Cell>,
}

impl Row {
    /// Whether the row holds any non-empty cell.
    pub fn is_used(&self) -> bool {
        self.cells.iter().any(|c| c.value != CellValue::Empty)
    }

    /// The cell at a zero-based column index, if stored.
    pub fn cell_at(&self, column: u32) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column == column)
    }
}

/// A parsed worksheet and the ZIP part it came from.
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub name: String,
    /// ZIP part path, e.g. `xl/worksheets/sheet1.xml`. Patch maps are
    /// keyed by this path on save.
    pub part: String,
    pub rows: Vec<Row>,
}

impl Worksheet {
    /// Index into `rows` of the header row: the first row containing
    /// any used cell.
    pub fn header_row_index(&self) -> Option<usize> {
        self.rows.iter().position(Row::is_used)
    }

    /// Number of data rows below the header row.
    pub fn data_row_count(&self) -> u64 {
        match self.header_row_index() {
            Some(idx) => (self.rows.len() - idx - 1) as u64,
            None => 0,
        }
    }
}

/// A fully parsed workbook, exclusively owned by one conversion call.
pub struct Workbook {
    raw: Vec<u8>,
    pub sheets: Vec<Worksheet>,
}

impl Workbook {
    /// Parse workbook bytes into worksheet models.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let container = WorkbookContainer::from_bytes(data)?;

        let shared = match container.read_xml("xl/sharedStrings.xml") {
            Ok(xml) => SharedStrings::parse(&xml)?,
            Err(_) => SharedStrings::default(),
        };
        let styles = match container.read_xml("xl/styles.xml") {
            Ok(xml) => Styles::parse(&xml),
            Err(_) => Styles::default(),
        };

        let rels = parse_workbook_rels(&container)?;
        let registry = parse_sheet_registry(&container)?;
        if registry.is_empty() {
            return Err(Error::MissingComponent("xl/workbook.xml sheets".to_string()));
        }

        let mut sheets = Vec::with_capacity(registry.len());
        for entry in registry {
            let target = match rels.get(&entry.rel_id) {
                Some(t) => t,
                None => continue,
            };
            let part = if let Some(absolute) = target.strip_prefix('/') {
                absolute.to_string()
            } else {
                format!("xl/{}", target)
            };

            let xml = container.read_xml(&part)?;
            let rows = sheet::parse_sheet(&xml, &shared, &styles)?;
            sheets.push(Worksheet {
                name: entry.name,
                part,
                rows,
            });
        }

        Ok(Self {
            raw: container.into_bytes(),
            sheets,
        })
    }

    /// Serialize the workbook with the given per-part cell patches
    /// applied. Unpatched parts are copied from the original bytes.
    pub fn save(&self, patches: &HashMap<String, HashMap<String, CellPatch>>) -> Result<Vec<u8>> {
        writer::write_workbook(&self.raw, patches)
    }
}

/// A sheet entry from `xl/workbook.xml`.
struct SheetEntry {
    name: String,
    rel_id: String,
}

/// Parse `xl/_rels/workbook.xml.rels` into an id -> target map.
fn parse_workbook_rels(container: &WorkbookContainer) -> Result<HashMap<String, String>> {
    let mut rels = HashMap::new();
    let xml = match container.read_xml("xl/_rels/workbook.xml.rels") {
        Ok(xml) => xml,
        Err(_) => return Ok(rels),
    };

    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut target = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }
                if !id.is_empty() && !target.is_empty() {
                    rels.insert(id, target);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Parse the `<sheet>` registry from `xl/workbook.xml`.
fn parse_sheet_registry(container: &WorkbookContainer) -> Result<Vec<SheetEntry>> {
    let xml = container.read_xml("xl/workbook.xml")?;
    let mut reader = quick_xml::Reader::from_str(&xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                if e.name().as_ref() == b"sheet" =>
            {
                let mut name = String::new();
                let mut rel_id = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = String::from_utf8_lossy(&attr.value).to_string(),
                        b"r:id" => rel_id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }
                if !name.is_empty() && !rel_id.is_empty() {
                    entries.push(SheetEntry { name, rel_id });
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Days from the serial epoch (1899-12-30) to 1970-01-01.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Decode an Excel serial date number into a naive date-time.
///
/// Serials below 61 are shifted through the fictitious 1900-02-29 that
/// Excel inherited from Lotus 1-2-3: serial 59 is 1900-02-28, serial 61
/// is 1900-03-01, and the phantom serial 60 collapses onto 1900-02-28.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    let adjusted = if serial < 60.0 { serial + 1.0 } else { serial };
    let mut days = adjusted.floor() as i64;
    let mut secs = ((adjusted - adjusted.floor()) * 86_400.0).round() as i64;
    if secs >= 86_400 {
        days += 1;
        secs = 0;
    }

    let (y, m, d) = SERIAL_EPOCH;
    let base = NaiveDate::from_ymd_opt(y, m, d)?;
    let date = base.checked_add_signed(Duration::days(days))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}

/// Encode a naive date-time as an Excel serial date number.
pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let (y, m, d) = SERIAL_EPOCH;
    // Epoch components are constants; the date is always representable.
    let base = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
    let days = (dt.date() - base).num_days();
    let fraction = f64::from(dt.time().num_seconds_from_midnight()) / 86_400.0;
    let serial = days as f64 + fraction;
    // Mirror the phantom-leap-day shift for pre-1900-03-01 dates.
    if days < 61 {
        serial - 1.0
    } else {
        serial
    }
}

/// Parse the letter prefix of an A1-style reference into a zero-based
/// column index.
pub fn column_index(reference: &str) -> Option<u32> {
    let letters: String = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }

    let mut index: u32 = 0;
    for c in letters.chars() {
        let v = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        index = index.checked_mul(26)?.checked_add(v)?;
    }
    Some(index - 1)
}

/// Render a zero-based column index as A1-style letters.
pub fn column_letters(mut index: u32) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1"), Some(0));
        assert_eq!(column_index("B12"), Some(1));
        assert_eq!(column_index("Z9"), Some(25));
        assert_eq!(column_index("AA1"), Some(26));
        assert_eq!(column_index("BC23"), Some(54));
        assert_eq!(column_index("123"), None);
    }

    #[test]
    fn test_column_letters_round_trip() {
        for idx in [0, 1, 25, 26, 27, 51, 52, 701, 702] {
            let letters = column_letters(idx);
            assert_eq!(column_index(&format!("{letters}1")), Some(idx));
        }
    }

    #[test]
    fn test_serial_to_datetime() {
        let dt = serial_to_datetime(1.0).unwrap();
        assert_eq!(dt.to_string(), "1900-01-01 00:00:00");

        let dt = serial_to_datetime(59.0).unwrap();
        assert_eq!(dt.to_string(), "1900-02-28 00:00:00");

        // Serial 61 lands past the phantom leap day.
        let dt = serial_to_datetime(61.0).unwrap();
        assert_eq!(dt.to_string(), "1900-03-01 00:00:00");

        let dt = serial_to_datetime(44197.5).unwrap();
        assert_eq!(dt.to_string(), "2021-01-01 12:00:00");

        assert!(serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn test_serial_round_trip() {
        for serial in [1.0, 59.0, 61.0, 25569.0, 44197.5, 45306.25] {
            let dt = serial_to_datetime(serial).unwrap();
            let back = datetime_to_serial(&dt);
            assert!((serial - back).abs() < 1e-6, "serial {serial} -> {back}");
        }
    }

    #[test]
    fn test_display_text() {
        assert_eq!(CellValue::Empty.display_text(), None);
        assert_eq!(
            CellValue::Text("hello".to_string()).display_text(),
            Some("hello".to_string())
        );
        assert_eq!(CellValue::Bool(true).display_text(), Some("TRUE".to_string()));
        assert_eq!(CellValue::Number(42.0).display_text(), Some("42".to_string()));
    }

    #[test]
    fn test_row_lookup() {
        let row = Row {
            number: 1,
            cells: vec![
                Cell {
                    reference: "A1".to_string(),
                    column: 0,
                    value: CellValue::Empty,
                },
                Cell {
                    reference: "C1".to_string(),
                    column: 2,
                    value: CellValue::Text("x".to_string()),
                },
            ],
        };
        assert!(row.is_used());
        assert!(row.cell_at(1).is_none());
        assert_eq!(row.cell_at(2).unwrap().reference, "C1");
    }
}
