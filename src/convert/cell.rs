//! Per-cell conversion.

use crate::model::CellOutcome;
use crate::parse::{DateTimeParser, RENDER_LAYOUT};
use crate::timezone;
use crate::workbook::{Cell, CellValue};
use chrono_tz::Tz;

/// Converts one cell at a time, dispatching on the cell's native kind.
pub struct CellConverter<'a> {
    parser: &'a DateTimeParser,
    source: Tz,
    target: Tz,
}

impl<'a> CellConverter<'a> {
    pub fn new(parser: &'a DateTimeParser, source: Tz, target: Tz) -> Self {
        Self {
            parser,
            source,
            target,
        }
    }

    /// Convert one cell.
    ///
    /// Native date-time cells convert directly. Numeric, boolean,
    /// error, and empty cells are not timestamps: they are skipped
    /// silently and do not count as errors. Textual cells go through
    /// the heuristic parser; a text that fails to parse IS a counted
    /// error, with the original text quoted in the message.
    pub fn convert_cell(&self, cell: &Cell) -> CellOutcome {
        match &cell.value {
            CellValue::DateTime(value) => {
                let original = cell.value.display_text().unwrap_or_default();
                match timezone::convert(*value, self.source, self.target) {
                    Ok(converted) => CellOutcome::success(original, converted, None),
                    Err(err) => CellOutcome::failed(original, err.to_string()),
                }
            }
            CellValue::Number(_) | CellValue::Bool(_) | CellValue::Error(_) | CellValue::Empty => {
                CellOutcome::skipped(cell.value.display_text().unwrap_or_default())
            }
            CellValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return CellOutcome::skipped(text.clone());
                }

                let parsed = match self.parser.parse_detailed(trimmed) {
                    Some(parsed) => parsed,
                    None => {
                        return CellOutcome::failed(
                            text.clone(),
                            format!("could not parse \"{trimmed}\" as a date-time"),
                        );
                    }
                };

                match timezone::convert(parsed.value, self.source, self.target) {
                    Ok(converted) => {
                        let layout = parsed.layout.as_deref().unwrap_or(RENDER_LAYOUT);
                        let rendered = converted.format(layout).to_string();
                        CellOutcome::success(text.clone(), converted, Some(rendered))
                    }
                    Err(err) => CellOutcome::failed(text.clone(), err.to_string()),
                }
            }
        }
    }
}
