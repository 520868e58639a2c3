//! Conversion orchestration.
//!
//! One conversion call moves through open, count, process, and save
//! phases. Failures abort with a typed error; cancellation unwinds to
//! a distinct outcome with all partial work discarded.

mod batch;
mod cell;
mod column;
mod validate;

pub use batch::batch_size;
pub use column::find_column;

use crate::detect;
use crate::error::{Error, Result};
use crate::model::{
    AnalyzeReport, ConversionOutcome, ConversionRequest, ConversionStatistics,
};
use crate::parse::{DateTimeParser, PatternCache};
use crate::progress::{ConversionProgress, ProgressSink, ANALYZE_RANGE, SAVE_RANGE};
use crate::timezone::{self, TimezoneResolver};
use crate::workbook::{CellPatch, Workbook};
use batch::{BatchProcessor, BatchRun};
use cell::CellConverter;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// The conversion engine: the pattern cache and timezone-handle cache
/// plus the orchestration over them.
///
/// Both caches are read-mostly and safe to share; keep one engine for
/// the process lifetime and hand it every call.
pub struct ConversionEngine {
    patterns: Arc<PatternCache>,
    zones: TimezoneResolver,
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Work discovered for one worksheet during the counting pass.
struct SheetPlan {
    sheet_index: usize,
    header_index: usize,
    column: u32,
    data_rows: u64,
}

impl ConversionEngine {
    /// Create an engine with the common patterns pre-seeded.
    pub fn new() -> Self {
        Self {
            patterns: Arc::new(PatternCache::with_common_patterns()),
            zones: TimezoneResolver::new(),
        }
    }

    /// Convert the named column of every worksheet from the source
    /// zone to the target zone.
    ///
    /// Bad cells are skipped and counted, not fatal. The progress sink
    /// (if any) receives snapshots at phase transitions and batch
    /// boundaries.
    pub fn convert_file(
        &self,
        request: ConversionRequest,
        progress: Option<&ProgressSink<'_>>,
    ) -> Result<ConversionOutcome> {
        let started = Instant::now();

        validate::validate_request(&request, &self.zones)?;
        let source = self.zones.resolve(&request.source_zone)?;
        let target = self.zones.resolve(&request.target_zone)?;

        let ConversionRequest {
            bytes,
            column_name,
            source_zone,
            target_zone,
            cancellation: token,
            ..
        } = request;

        emit(progress, 0, 0, "Opening workbook", ANALYZE_RANGE.at(0, 2));
        let workbook = Workbook::from_bytes(bytes)?;

        // Counting pass: locate the column per worksheet and size the
        // total work before touching any cell.
        let mut plans: Vec<SheetPlan> = Vec::new();
        let mut total_rows: u64 = 0;
        for (sheet_index, sheet) in workbook.sheets.iter().enumerate() {
            let header_index = match sheet.header_row_index() {
                Some(idx) => idx,
                None => continue,
            };
            let column = match find_column(&sheet.rows[header_index], &column_name) {
                Some(column) => column,
                None => continue,
            };
            let data_rows = (sheet.rows.len() - header_index - 1) as u64;
            total_rows += data_rows;
            plans.push(SheetPlan {
                sheet_index,
                header_index,
                column,
                data_rows,
            });
        }

        if total_rows == 0 {
            return Err(Error::ColumnNotFound {
                name: column_name,
                available: column::available_headers(&workbook),
            });
        }

        emit(
            progress,
            0,
            total_rows,
            "Analyzed workbook",
            ANALYZE_RANGE.at(2, 2),
        );

        if token.is_cancelled() {
            return Ok(ConversionOutcome::Cancelled);
        }

        let parser = DateTimeParser::new(Arc::clone(&self.patterns));
        let converter = CellConverter::new(&parser, source, target);
        let processor = BatchProcessor::new(&converter, &token);

        let mut statistics = ConversionStatistics {
            column_name,
            source_zone,
            target_zone,
            ..Default::default()
        };
        let mut patches: HashMap<String, HashMap<String, CellPatch>> = HashMap::new();
        let mut done: u64 = 0;

        for plan in &plans {
            if token.is_cancelled() {
                return Ok(ConversionOutcome::Cancelled);
            }

            let sheet = &workbook.sheets[plan.sheet_index];
            debug_assert_eq!(plan.data_rows, (sheet.rows.len() - plan.header_index - 1) as u64);

            let mut sheet_patches = HashMap::new();
            match processor.process_worksheet(
                sheet,
                plan.header_index,
                plan.column,
                done,
                total_rows,
                progress,
                &mut statistics,
                &mut sheet_patches,
            ) {
                BatchRun::Cancelled => return Ok(ConversionOutcome::Cancelled),
                BatchRun::Completed(counts) => {
                    done += counts.processed;
                    statistics.rows_processed += counts.processed;
                    statistics.successful_conversions += counts.successes;
                    statistics.error_count += counts.errors;
                }
            }

            if !sheet_patches.is_empty() {
                patches.insert(sheet.part.clone(), sheet_patches);
            }
        }

        statistics.warnings.extend(parser.take_warnings());

        emit(
            progress,
            done,
            total_rows,
            "Saving workbook",
            SAVE_RANGE.at(0, 1),
        );
        let bytes = workbook.save(&patches)?;

        statistics.elapsed_ms = started.elapsed().as_millis() as u64;
        emit(progress, done, total_rows, "Done", SAVE_RANGE.at(1, 1));

        Ok(ConversionOutcome::Completed {
            bytes,
            statistics,
        })
    }

    /// Convert a single wall-clock value between zones.
    pub fn convert_value(
        &self,
        value: NaiveDateTime,
        source_id: &str,
        target_id: &str,
    ) -> Result<NaiveDateTime> {
        let source = self.zones.resolve(source_id)?;
        let target = self.zones.resolve(target_id)?;
        timezone::convert(value, source, target)
    }

    /// Parse a loose text into a naive date-time using the engine's
    /// pattern cache.
    pub fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        DateTimeParser::new(Arc::clone(&self.patterns)).parse(text)
    }

    /// Structurally inspect workbook bytes without converting.
    ///
    /// Invalid bytes yield a report with `is_valid: false` rather than
    /// an error.
    pub fn analyze(&self, bytes: &[u8]) -> Result<AnalyzeReport> {
        if detect::detect_workbook(bytes).is_err() {
            return Ok(AnalyzeReport::default());
        }

        let workbook = match Workbook::from_bytes(bytes.to_vec()) {
            Ok(workbook) => workbook,
            Err(_) => return Ok(AnalyzeReport::default()),
        };

        Ok(AnalyzeReport {
            columns: column::collect_headers(&workbook),
            worksheet_count: workbook.sheets.len(),
            row_count: workbook.sheets.iter().map(|s| s.data_row_count()).sum(),
            is_valid: true,
        })
    }
}

fn emit(
    progress: Option<&ProgressSink<'_>>,
    processed: u64,
    total: u64,
    label: &str,
    percent: f64,
) {
    if let Some(sink) = progress {
        sink(&ConversionProgress {
            processed,
            total,
            label: label.to_string(),
            percent,
        });
    }
}
