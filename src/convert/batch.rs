//! Batched row processing.

use super::cell::CellConverter;
use crate::model::{ConversionStatistics, MAX_CELL_WARNINGS};
use crate::progress::{CancellationToken, ConversionProgress, ProgressSink, PROCESS_RANGE};
use crate::workbook::{datetime_to_serial, CellPatch, CellValue, Worksheet};
use std::collections::HashMap;

/// Batch size bounds: at least 100 rows, at most 1000, aiming for
/// roughly ten batches per worksheet.
const MIN_BATCH_ROWS: usize = 100;
const MAX_BATCH_ROWS: usize = 1000;

/// Compute the batch size for a worksheet's data row count.
pub fn batch_size(total_rows: u64) -> usize {
    ((total_rows / 10) as usize).clamp(MIN_BATCH_ROWS, MAX_BATCH_ROWS)
}

/// Counts accumulated while processing one worksheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetCounts {
    pub processed: u64,
    pub successes: u64,
    pub errors: u64,
}

/// Result of a worksheet run: either completed counts, or an early
/// stop at a batch boundary after the cancellation token fired.
#[derive(Debug)]
pub enum BatchRun {
    Completed(SheetCounts),
    Cancelled,
}

/// Drives the cell converter over a worksheet's data rows in batches.
///
/// Rows are processed sequentially and in order; the workbook is
/// mutated through a patch map, and the document model is not safe for
/// concurrent mutation.
pub struct BatchProcessor<'a> {
    converter: &'a CellConverter<'a>,
    token: &'a CancellationToken,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(converter: &'a CellConverter<'a>, token: &'a CancellationToken) -> Self {
        Self { converter, token }
    }

    /// Process one worksheet's data rows.
    ///
    /// `workbook_done` and `workbook_total` scale the emitted progress
    /// into the whole run; the cancellation token is polled before
    /// each batch, never mid-batch.
    #[allow(clippy::too_many_arguments)]
    pub fn process_worksheet(
        &self,
        sheet: &Worksheet,
        header_index: usize,
        column: u32,
        workbook_done: u64,
        workbook_total: u64,
        progress: Option<&ProgressSink<'_>>,
        stats: &mut ConversionStatistics,
        patches: &mut HashMap<String, CellPatch>,
    ) -> BatchRun {
        let data_rows = &sheet.rows[header_index + 1..];
        let size = batch_size(data_rows.len() as u64);
        let mut counts = SheetCounts::default();

        for batch in data_rows.chunks(size) {
            if self.token.is_cancelled() {
                return BatchRun::Cancelled;
            }

            for row in batch {
                counts.processed += 1;
                let cell = match row.cell_at(column) {
                    Some(cell) => cell,
                    // A row with no stored cell in the column is an
                    // empty cell: skipped, not an error.
                    None => continue,
                };

                let outcome = self.converter.convert_cell(cell);
                if outcome.is_success() {
                    counts.successes += 1;
                    stage_patch(patches, cell, &outcome);
                } else if let Some(message) = &outcome.error {
                    counts.errors += 1;
                    if stats.warnings.len() < MAX_CELL_WARNINGS {
                        stats
                            .warnings
                            .push(format!("{} {}: {}", sheet.name, cell.reference, message));
                    }
                }
            }

            if let Some(sink) = progress {
                let processed = workbook_done + counts.processed;
                sink(&ConversionProgress {
                    processed,
                    total: workbook_total,
                    label: format!("Converting '{}'", sheet.name),
                    percent: PROCESS_RANGE.at(processed, workbook_total),
                });
            }
        }

        BatchRun::Completed(counts)
    }
}

/// Record the replacement value for a converted cell, in the cell's
/// own native kind.
fn stage_patch(
    patches: &mut HashMap<String, CellPatch>,
    cell: &crate::workbook::Cell,
    outcome: &crate::model::CellOutcome,
) {
    let patch = match (&cell.value, &outcome.rendered, &outcome.converted) {
        (CellValue::Text(_), Some(rendered), _) => CellPatch::Text(rendered.clone()),
        (CellValue::DateTime(_), _, Some(converted)) => {
            CellPatch::Serial(datetime_to_serial(converted))
        }
        _ => return,
    };
    patches.insert(cell.reference.clone(), patch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{DateTimeParser, PatternCache};
    use crate::workbook::{Cell, Row};
    use chrono_tz::Tz;
    use std::str::FromStr;
    use std::sync::Arc;

    fn text_cell(reference: &str, column: u32, text: &str) -> Cell {
        Cell {
            reference: reference.to_string(),
            column,
            value: CellValue::Text(text.to_string()),
        }
    }

    fn sheet_with_texts(texts: &[&str]) -> Worksheet {
        let mut rows = vec![Row {
            number: 1,
            cells: vec![text_cell("A1", 0, "Timestamp")],
        }];
        for (i, text) in texts.iter().enumerate() {
            let number = i as u32 + 2;
            rows.push(Row {
                number,
                cells: vec![text_cell(&format!("A{number}"), 0, text)],
            });
        }
        Worksheet {
            name: "Sheet1".to_string(),
            part: "xl/worksheets/sheet1.xml".to_string(),
            rows,
        }
    }

    #[test]
    fn test_batch_size_clamps() {
        assert_eq!(batch_size(0), 100);
        assert_eq!(batch_size(50), 100);
        assert_eq!(batch_size(5_000), 500);
        assert_eq!(batch_size(100_000), 1000);
    }

    #[test]
    fn test_counts_and_patches() {
        let parser = DateTimeParser::new(Arc::new(PatternCache::with_common_patterns()));
        let converter = CellConverter::new(
            &parser,
            Tz::from_str("UTC").unwrap(),
            Tz::from_str("Europe/Paris").unwrap(),
        );
        let token = CancellationToken::new();
        let processor = BatchProcessor::new(&converter, &token);

        let sheet = sheet_with_texts(&[
            "2024-01-15 12:00:00",
            "definitely not a timestamp",
            "2024-06-01 00:00:00",
        ]);
        let mut stats = ConversionStatistics::default();
        let mut patches = HashMap::new();

        let run = processor.process_worksheet(
            &sheet,
            0,
            0,
            0,
            3,
            None,
            &mut stats,
            &mut patches,
        );

        match run {
            BatchRun::Completed(counts) => {
                assert_eq!(counts.processed, 3);
                assert_eq!(counts.successes, 2);
                assert_eq!(counts.errors, 1);
            }
            BatchRun::Cancelled => panic!("unexpected cancellation"),
        }
        assert_eq!(patches.len(), 2);
        assert_eq!(
            patches.get("A2"),
            Some(&CellPatch::Text("2024-01-15 13:00:00".to_string()))
        );
        assert_eq!(stats.warnings.len(), 1);
        assert!(stats.warnings[0].contains("Sheet1 A3"));
    }

    #[test]
    fn test_pre_cancelled_token_stops_before_first_batch() {
        let parser = DateTimeParser::new(Arc::new(PatternCache::with_common_patterns()));
        let converter = CellConverter::new(
            &parser,
            Tz::from_str("UTC").unwrap(),
            Tz::from_str("UTC").unwrap(),
        );
        let token = CancellationToken::new();
        token.cancel();
        let processor = BatchProcessor::new(&converter, &token);

        let sheet = sheet_with_texts(&["2024-01-15 12:00:00"]);
        let mut stats = ConversionStatistics::default();
        let mut patches = HashMap::new();

        let run =
            processor.process_worksheet(&sheet, 0, 0, 0, 1, None, &mut stats, &mut patches);
        assert!(matches!(run, BatchRun::Cancelled));
        assert!(patches.is_empty());
    }
}
