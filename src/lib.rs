//! # tzshift
//!
//! Timezone conversion for timestamp columns in Excel workbooks.
//!
//! This library takes raw workbook bytes, locates a named column
//! across every worksheet, heuristically parses each cell into a
//! wall-clock date-time, reinterprets it in a source IANA timezone,
//! projects it into a target timezone, and writes the modified
//! workbook back out with conversion statistics. Bad cells are skipped
//! and counted, never fatal.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tzshift::{convert_file, ConversionOutcome, ConversionRequest};
//!
//! let bytes = std::fs::read("events.xlsx")?;
//! let request = ConversionRequest::new(bytes, "Timestamp", "UTC", "Europe/London");
//!
//! match convert_file(request, None)? {
//!     ConversionOutcome::Completed { bytes, statistics } => {
//!         std::fs::write("events-local.xlsx", bytes)?;
//!         println!(
//!             "{} converted, {} errors",
//!             statistics.successful_conversions, statistics.error_count
//!         );
//!     }
//!     ConversionOutcome::Cancelled => println!("cancelled"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Single values
//!
//! ```
//! use chrono::NaiveDate;
//!
//! let value = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let converted = tzshift::convert_value(value, "UTC", "Asia/Tokyo")?;
//! assert_eq!(converted.to_string(), "2024-01-15 21:00:00");
//! # Ok::<(), tzshift::Error>(())
//! ```
//!
//! ## Progress and cancellation
//!
//! One conversion call runs on a single worker; run it inside your own
//! background task if it must not block. The [`CancellationToken`] is
//! polled at worksheet and batch boundaries, so at most one batch of
//! extra work runs after a cancel request.

pub mod container;
pub mod convert;
pub mod detect;
pub mod error;
pub mod model;
pub mod parse;
pub mod progress;
pub mod timezone;
pub mod workbook;

// Re-exports
pub use convert::ConversionEngine;
pub use error::{Error, Result};
pub use model::{
    AnalyzeReport, CellOutcome, ConversionOutcome, ConversionRequest, ConversionStatistics,
    DEFAULT_MAX_FILE_SIZE,
};
pub use parse::{DateTimeParser, PatternCache};
pub use progress::{CancellationToken, ConversionProgress, ProgressSink};

use chrono::NaiveDateTime;
use std::sync::OnceLock;

/// Shared engine behind the free functions, so the pattern cache and
/// timezone-handle cache live for the process. Construct your own
/// [`ConversionEngine`] to scope the caches explicitly.
fn default_engine() -> &'static ConversionEngine {
    static ENGINE: OnceLock<ConversionEngine> = OnceLock::new();
    ENGINE.get_or_init(ConversionEngine::new)
}

/// Convert the named column of a workbook between timezones.
///
/// See [`ConversionEngine::convert_file`].
pub fn convert_file(
    request: ConversionRequest,
    progress: Option<&ProgressSink<'_>>,
) -> Result<ConversionOutcome> {
    default_engine().convert_file(request, progress)
}

/// Convert a single wall-clock value between timezones.
pub fn convert_value(
    value: NaiveDateTime,
    source_id: &str,
    target_id: &str,
) -> Result<NaiveDateTime> {
    default_engine().convert_value(value, source_id, target_id)
}

/// Parse a loose text into a naive date-time.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    default_engine().parse_datetime(text)
}

/// Structurally inspect workbook bytes without converting anything.
pub fn analyze(bytes: &[u8]) -> Result<AnalyzeReport> {
    default_engine().analyze(bytes)
}

/// All known IANA timezone ids, sorted.
pub fn list_timezones() -> Vec<&'static str> {
    timezone::list_timezones()
}

/// Check whether an id resolves against the IANA database.
pub fn is_valid_timezone(id: &str) -> bool {
    timezone::is_valid_timezone(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_value_surface() {
        let value = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let converted = convert_value(value, "UTC", "Asia/Tokyo").unwrap();
        assert_eq!(converted.to_string(), "2024-01-15 21:00:00");
    }

    #[test]
    fn test_timezone_surface() {
        assert!(is_valid_timezone("Europe/London"));
        assert!(!is_valid_timezone("London"));
        assert!(list_timezones().contains(&"UTC"));
    }

    #[test]
    fn test_parse_datetime_surface() {
        assert!(parse_datetime("2024-06-01T08:00:00Z").is_some());
        assert!(parse_datetime("gibberish").is_none());
    }
}
