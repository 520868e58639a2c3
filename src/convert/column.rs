//! Header column location.

use crate::workbook::{Row, Workbook};
use std::collections::BTreeSet;

/// Cap on headers listed in a column-not-found error.
pub const MAX_LISTED_HEADERS: usize = 10;

/// Find the target column in a header row.
///
/// Two passes: case-insensitive exact match of trimmed texts, then
/// (only when nothing matched exactly) case-insensitive substring
/// containment. The first matching cell in row order wins per pass.
/// Returns the zero-based sheet column index.
pub fn find_column(header: &Row, name: &str) -> Option<u32> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    for cell in &header.cells {
        if let Some(text) = cell.value.display_text() {
            if text.trim().to_lowercase() == needle {
                return Some(cell.column);
            }
        }
    }

    for cell in &header.cells {
        if let Some(text) = cell.value.display_text() {
            if text.trim().to_lowercase().contains(&needle) {
                return Some(cell.column);
            }
        }
    }

    None
}

/// All header texts across the workbook, deduplicated and sorted.
pub fn collect_headers(workbook: &Workbook) -> Vec<String> {
    let mut headers = BTreeSet::new();
    for sheet in &workbook.sheets {
        if let Some(idx) = sheet.header_row_index() {
            for cell in &sheet.rows[idx].cells {
                if let Some(text) = cell.value.display_text() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        headers.insert(text);
                    }
                }
            }
        }
    }
    headers.into_iter().collect()
}

/// The capped header listing used in column-not-found errors.
pub fn available_headers(workbook: &Workbook) -> Vec<String> {
    let mut headers = collect_headers(workbook);
    headers.truncate(MAX_LISTED_HEADERS);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{Cell, CellValue};

    fn header_row(names: &[&str]) -> Row {
        Row {
            number: 1,
            cells: names
                .iter()
                .enumerate()
                .map(|(i, name)| Cell {
                    reference: format!("{}1", crate::workbook::column_letters(i as u32)),
                    column: i as u32,
                    value: CellValue::Text(name.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let row = header_row(&["Timestamp", "Value"]);
        assert_eq!(find_column(&row, "timestamp"), Some(0));
        assert_eq!(find_column(&row, "VALUE"), Some(1));
    }

    #[test]
    fn test_substring_match_used_only_without_exact() {
        let row = header_row(&["Local Time", "Time"]);
        // "Time" matches the second header exactly even though the
        // first contains it.
        assert_eq!(find_column(&row, "Time"), Some(1));

        let row = header_row(&["Local Time", "Value"]);
        assert_eq!(find_column(&row, "Time"), Some(0));
    }

    #[test]
    fn test_trimming_applies_to_both_sides() {
        let row = header_row(&["  Timestamp  "]);
        assert_eq!(find_column(&row, " timestamp "), Some(0));
    }

    #[test]
    fn test_no_match() {
        let row = header_row(&["Date", "Value"]);
        assert_eq!(find_column(&row, "Quantity"), None);
        assert_eq!(find_column(&row, ""), None);
    }

    #[test]
    fn test_first_match_wins() {
        let row = header_row(&["Start Time", "End Time"]);
        assert_eq!(find_column(&row, "Time"), Some(0));
    }
}
