//! Request and result types for workbook conversion.

use crate::progress::CancellationToken;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Default ceiling for input workbook size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// A workbook conversion request.
///
/// # Example
///
/// ```no_run
/// use tzshift::ConversionRequest;
///
/// let bytes = std::fs::read("events.xlsx")?;
/// let request = ConversionRequest::new(bytes, "Timestamp", "UTC", "Europe/London");
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Raw workbook bytes.
    pub bytes: Vec<u8>,
    /// Header name of the column to convert.
    pub column_name: String,
    /// IANA id the existing values are interpreted in.
    pub source_zone: String,
    /// IANA id the values are projected into.
    pub target_zone: String,
    /// Size ceiling for `bytes`.
    pub max_file_size: usize,
    /// Cooperative cancellation flag for this call.
    pub cancellation: CancellationToken,
}

impl ConversionRequest {
    pub fn new(
        bytes: Vec<u8>,
        column_name: impl Into<String>,
        source_zone: impl Into<String>,
        target_zone: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            column_name: column_name.into(),
            source_zone: source_zone.into(),
            target_zone: target_zone.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            cancellation: CancellationToken::new(),
        }
    }

    /// Override the input size ceiling.
    pub fn with_max_file_size(mut self, limit: usize) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Attach a cancellation token shared with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Aggregated statistics for one conversion run. Built up additively
/// during the run, read-only once returned.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStatistics {
    /// Data rows visited across all worksheets.
    pub rows_processed: u64,
    /// Cells successfully converted.
    pub successful_conversions: u64,
    /// Cells that looked like timestamps but could not be converted.
    pub error_count: u64,
    /// Wall time for the whole call, in milliseconds.
    pub elapsed_ms: u64,
    /// Non-fatal notes: unusable layouts and a capped sample of cell
    /// errors.
    pub warnings: Vec<String>,
    /// Echoed request parameters.
    pub column_name: String,
    pub source_zone: String,
    pub target_zone: String,
}

/// Cap on per-cell error messages carried into
/// [`ConversionStatistics::warnings`].
pub(crate) const MAX_CELL_WARNINGS: usize = 20;

/// Terminal outcome of [`crate::convert_file`].
///
/// Cancellation is an outcome, not an error: partial output and
/// partial statistics are discarded.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// The run completed; `bytes` is a full workbook.
    Completed {
        bytes: Vec<u8>,
        statistics: ConversionStatistics,
    },
    /// The cancellation token fired before the run finished.
    Cancelled,
}

impl ConversionOutcome {
    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConversionOutcome::Cancelled)
    }
}

/// Per-cell conversion result, consumed immediately by the batch
/// processor.
#[derive(Debug, Clone)]
pub struct CellOutcome {
    /// The cell's original display text.
    pub original: String,
    /// Converted value, present iff the cell converted.
    pub converted: Option<NaiveDateTime>,
    /// Replacement text for textual cells, rendered with the layout
    /// that matched the original.
    pub rendered: Option<String>,
    /// Error message, present iff the failure counts as an error.
    pub error: Option<String>,
}

impl CellOutcome {
    pub fn success(original: String, converted: NaiveDateTime, rendered: Option<String>) -> Self {
        Self {
            original,
            converted: Some(converted),
            rendered,
            error: None,
        }
    }

    /// A cell that is not a timestamp at all; skipped without counting
    /// as an error.
    pub fn skipped(original: String) -> Self {
        Self {
            original,
            converted: None,
            rendered: None,
            error: None,
        }
    }

    /// A counted failure.
    pub fn failed(original: String, error: String) -> Self {
        Self {
            original,
            converted: None,
            rendered: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.converted.is_some()
    }

    pub fn is_counted_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of [`crate::analyze`]: a cheap structural look at workbook
/// bytes without converting anything.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzeReport {
    /// Header texts across all worksheets, deduplicated and sorted.
    pub columns: Vec<String>,
    pub worksheet_count: usize,
    /// Data rows below each worksheet's header row.
    pub row_count: u64,
    /// Whether the bytes opened as a workbook at all. When false the
    /// other fields are empty.
    pub is_valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ConversionRequest::new(vec![1, 2, 3], "Timestamp", "UTC", "Asia/Tokyo")
            .with_max_file_size(1024);
        assert_eq!(request.max_file_size, 1024);
        assert_eq!(request.column_name, "Timestamp");
        assert!(!request.cancellation.is_cancelled());
    }

    #[test]
    fn test_cell_outcome_classification() {
        let success = CellOutcome::success(
            "2024-01-01 00:00:00".to_string(),
            chrono::NaiveDateTime::default(),
            None,
        );
        assert!(success.is_success());
        assert!(!success.is_counted_error());

        let skipped = CellOutcome::skipped("42".to_string());
        assert!(!skipped.is_success());
        assert!(!skipped.is_counted_error());

        let failed = CellOutcome::failed("garbage".to_string(), "could not parse".to_string());
        assert!(!failed.is_success());
        assert!(failed.is_counted_error());
    }

    #[test]
    fn test_statistics_serialize() {
        let stats = ConversionStatistics {
            rows_processed: 10,
            successful_conversions: 8,
            error_count: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"rows_processed\":10"));
        assert!(json.contains("\"error_count\":2"));
    }
}
