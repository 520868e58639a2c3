//! Worksheet XML parsing.

use super::shared_strings::SharedStrings;
use super::styles::Styles;
use super::{column_index, column_letters, serial_to_datetime, Cell, CellValue, Row};
use crate::error::{Error, Result};
use quick_xml::events::Event;

/// Parse a worksheet part into stored rows of typed cells.
///
/// A single streaming pass over `sheetData`. Cell type resolution
/// follows the `t` attribute; untyped numeric cells are promoted to
/// [`CellValue::DateTime`] when their style index carries a date number
/// format.
pub fn parse_sheet(xml: &str, shared: &SharedStrings, styles: &Styles) -> Result<Vec<Row>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut rows = Vec::new();

    let mut current_row: Option<Row> = None;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let number = attribute(e, b"r")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(rows.len() as u32 + 1);
                    current_row = Some(Row {
                        number,
                        cells: Vec::new(),
                    });
                }
                b"c" if current_row.is_some() => {
                    pending = Some(PendingCell::from_element(e, &current_row, &rows));
                }
                b"v" | b"t" if pending.is_some() => {
                    in_value = true;
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"c" && current_row.is_some() => {
                // Self-closing cell: no stored value.
                let cell = PendingCell::from_element(e, &current_row, &rows);
                if let Some(ref mut row) = current_row {
                    row.cells.push(cell.into_cell(shared, styles));
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_value {
                    if let Some(ref mut cell) = pending {
                        let text = e.unescape().unwrap_or_default();
                        cell.raw.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"row" => {
                    if let Some(row) = current_row.take() {
                        rows.push(row);
                    }
                }
                b"c" => {
                    if let Some(cell) = pending.take() {
                        if let Some(ref mut row) = current_row {
                            row.cells.push(cell.into_cell(shared, styles));
                        }
                    }
                }
                b"v" | b"t" => {
                    in_value = false;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Cell state accumulated between `<c>` and `</c>`.
struct PendingCell {
    reference: String,
    column: u32,
    cell_type: Option<String>,
    style: Option<usize>,
    raw: String,
}

impl PendingCell {
    fn from_element(
        e: &quick_xml::events::BytesStart<'_>,
        current_row: &Option<Row>,
        rows: &[Row],
    ) -> Self {
        let mut reference = None;
        let mut cell_type = None;
        let mut style = None;

        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"r" => reference = Some(String::from_utf8_lossy(&attr.value).to_string()),
                b"t" => cell_type = Some(String::from_utf8_lossy(&attr.value).to_string()),
                b"s" => style = String::from_utf8_lossy(&attr.value).parse().ok(),
                _ => {}
            }
        }

        // Writers may omit r; synthesize it from the row position so
        // downstream lookups stay consistent.
        let (reference, column) = match reference {
            Some(r) => {
                let column = column_index(&r).unwrap_or_else(|| next_column(current_row));
                (r, column)
            }
            None => {
                let column = next_column(current_row);
                let row_number = current_row
                    .as_ref()
                    .map(|r| r.number)
                    .unwrap_or(rows.len() as u32 + 1);
                (format!("{}{}", column_letters(column), row_number), column)
            }
        };

        Self {
            reference,
            column,
            cell_type,
            style,
            raw: String::new(),
        }
    }

    fn into_cell(self, shared: &SharedStrings, styles: &Styles) -> Cell {
        let value = resolve_value(self.cell_type.as_deref(), &self.raw, self.style, shared, styles);
        Cell {
            reference: self.reference,
            column: self.column,
            value,
        }
    }
}

fn next_column(current_row: &Option<Row>) -> u32 {
    current_row
        .as_ref()
        .and_then(|r| r.cells.last())
        .map(|c| c.column + 1)
        .unwrap_or(0)
}

fn resolve_value(
    cell_type: Option<&str>,
    raw: &str,
    style: Option<usize>,
    shared: &SharedStrings,
    styles: &Styles,
) -> CellValue {
    match cell_type {
        Some("s") => match raw.parse::<usize>().ok().and_then(|idx| shared.get(idx)) {
            Some(s) => CellValue::Text(s.to_string()),
            None => CellValue::Text(raw.to_string()),
        },
        Some("b") => CellValue::Bool(raw == "1"),
        Some("e") => CellValue::Error(raw.to_string()),
        Some("str") | Some("inlineStr") => CellValue::Text(raw.to_string()),
        _ => {
            if raw.is_empty() {
                return CellValue::Empty;
            }
            match raw.parse::<f64>() {
                Ok(number) => {
                    let is_date = style.map(|s| styles.is_date_style(s)).unwrap_or(false);
                    if is_date {
                        match serial_to_datetime(number) {
                            Some(dt) => CellValue::DateTime(dt),
                            None => CellValue::Number(number),
                        }
                    } else {
                        CellValue::Number(number)
                    }
                }
                // Malformed numeric cells degrade to text rather than
                // poisoning the whole sheet.
                Err(_) => CellValue::Text(raw.to_string()),
            }
        }
    }
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Vec<Row> {
        parse_sheet(xml, &SharedStrings::default(), &Styles::default()).unwrap()
    }

    #[test]
    fn test_parse_inline_and_numeric_cells() {
        let xml = r#"<worksheet><sheetData>
            <row r="1">
                <c r="A1" t="inlineStr"><is><t>Timestamp</t></is></c>
                <c r="B1" t="inlineStr"><is><t>Value</t></is></c>
            </row>
            <row r="2">
                <c r="A2" t="inlineStr"><is><t>2024-01-15 12:00:00</t></is></c>
                <c r="B2"><v>42.5</v></c>
            </row>
        </sheetData></worksheet>"#;

        let rows = parse(xml);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 1);
        assert_eq!(
            rows[0].cells[0].value,
            CellValue::Text("Timestamp".to_string())
        );
        assert_eq!(rows[1].cells[0].column, 0);
        assert_eq!(rows[1].cells[1].value, CellValue::Number(42.5));
    }

    #[test]
    fn test_parse_shared_string_cell() {
        let shared = SharedStrings::parse(
            r#"<sst><si><t>Hello</t></si><si><t>World</t></si></sst>"#,
        )
        .unwrap();
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>1</v></c></row>
        </sheetData></worksheet>"#;

        let rows = parse_sheet(xml, &shared, &Styles::default()).unwrap();
        assert_eq!(rows[0].cells[0].value, CellValue::Text("World".to_string()));
    }

    #[test]
    fn test_parse_bool_error_and_empty_cells() {
        let xml = r#"<worksheet><sheetData>
            <row r="1">
                <c r="A1" t="b"><v>1</v></c>
                <c r="B1" t="e"><v>#DIV/0!</v></c>
                <c r="C1"/>
            </row>
        </sheetData></worksheet>"#;

        let rows = parse(xml);
        let cells = &rows[0].cells;
        assert_eq!(cells[0].value, CellValue::Bool(true));
        assert_eq!(cells[1].value, CellValue::Error("#DIV/0!".to_string()));
        assert_eq!(cells[2].value, CellValue::Empty);
        assert_eq!(cells[2].column, 2);
    }

    #[test]
    fn test_date_styled_cell_becomes_datetime() {
        let styles = Styles::parse(
            r#"<styleSheet>
                <cellXfs count="2">
                    <xf numFmtId="0"/>
                    <xf numFmtId="22"/>
                </cellXfs>
            </styleSheet>"#,
        );
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" s="1"><v>44197.5</v></c></row>
        </sheetData></worksheet>"#;

        let rows = parse_sheet(xml, &SharedStrings::default(), &styles).unwrap();
        match &rows[0].cells[0].value {
            CellValue::DateTime(dt) => assert_eq!(dt.to_string(), "2021-01-01 12:00:00"),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_reference_synthesized() {
        let xml = r#"<worksheet><sheetData>
            <row r="3"><c t="inlineStr"><is><t>a</t></is></c><c t="inlineStr"><is><t>b</t></is></c></row>
        </sheetData></worksheet>"#;

        let rows = parse(xml);
        assert_eq!(rows[0].cells[0].reference, "A3");
        assert_eq!(rows[0].cells[1].reference, "B3");
        assert_eq!(rows[0].cells[1].column, 1);
    }
}
