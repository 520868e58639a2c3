//! Style parsing for date number-format detection.
//!
//! The file format stores date-times as plain numbers; the only signal
//! that a numeric cell is a timestamp is its number format. This module
//! parses just enough of `xl/styles.xml` to answer "is this style a
//! date format".

use quick_xml::events::Event;
use std::collections::HashMap;

/// Built-in date format ids (m/d/yyyy through h:mm and the 45-47 time
/// block), per the SpreadsheetML spec.
fn is_builtin_date_format(num_fmt_id: u32) -> bool {
    (14..=22).contains(&num_fmt_id) || (45..=47).contains(&num_fmt_id)
}

/// Number-format information for the workbook's cell styles.
#[derive(Debug, Default)]
pub struct Styles {
    /// Custom formats: numFmtId -> formatCode.
    num_fmts: HashMap<u32, String>,
    /// Cell style index -> numFmtId.
    cell_xfs: Vec<u32>,
}

impl Styles {
    /// Parse `xl/styles.xml`. Unparseable content degrades to "no date
    /// styles" rather than failing the workbook.
    pub fn parse(xml: &str) -> Self {
        let mut styles = Self::default();
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(ev) => ev,
                Err(_) => break,
            };
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                    b"numFmts" => in_num_fmts = true,
                    b"cellXfs" => in_cell_xfs = true,
                    b"numFmt" if in_num_fmts => {
                        let mut id = None;
                        let mut code = String::new();
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"numFmtId" => {
                                    id = String::from_utf8_lossy(&attr.value).parse().ok();
                                }
                                b"formatCode" => {
                                    code = String::from_utf8_lossy(&attr.value).to_string();
                                }
                                _ => {}
                            }
                        }
                        if let Some(id) = id {
                            styles.num_fmts.insert(id, code);
                        }
                    }
                    b"xf" if in_cell_xfs => {
                        let id = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"numFmtId")
                            .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok())
                            .unwrap_or(0);
                        styles.cell_xfs.push(id);
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().as_ref() {
                    b"numFmts" => in_num_fmts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        styles
    }

    /// Whether the style at `style_index` carries a date number format.
    pub fn is_date_style(&self, style_index: usize) -> bool {
        match self.cell_xfs.get(style_index) {
            Some(&id) => self.is_date_format(id),
            None => false,
        }
    }

    fn is_date_format(&self, num_fmt_id: u32) -> bool {
        if is_builtin_date_format(num_fmt_id) {
            return true;
        }
        match self.num_fmts.get(&num_fmt_id) {
            Some(code) => is_date_format_code(code),
            None => false,
        }
    }
}

/// Whether a custom format code denotes a date or time.
///
/// Date/time tokens (y, m, d, h, s) count only outside quoted literals
/// and bracketed sections such as `[Red]` or `[$-409]`.
fn is_date_format_code(code: &str) -> bool {
    let mut in_bracket = false;
    let mut in_quote = false;

    for c in code.chars() {
        match c {
            '[' if !in_quote => in_bracket = true,
            ']' if !in_quote => in_bracket = false,
            '"' => in_quote = !in_quote,
            _ if !in_bracket && !in_quote => {
                if matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h') {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}
