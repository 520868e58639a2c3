//! Error types for the tzshift library.

use std::io;
use thiserror::Error;

/// Result type alias for tzshift operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during workbook conversion.
///
/// Per-cell parse and conversion failures are NOT represented here:
/// they are folded into [`crate::ConversionStatistics`] and never abort
/// a run. This enum covers request validation and anything that makes
/// the whole call unusable.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The request carried no file data.
    #[error("No file data provided")]
    EmptyInput,

    /// The file exceeds the configured size ceiling.
    #[error("File too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: usize, limit: usize },

    /// The file does not start with the ZIP local-file-header signature.
    #[error("Not an Excel workbook: missing ZIP signature")]
    InvalidFormat,

    /// No target column name was supplied.
    #[error("Column name must not be empty")]
    MissingColumnName,

    /// A timezone id did not resolve against the IANA database.
    #[error("Unknown timezone \"{id}\". Did you mean one of: {}?", suggestions.join(", "))]
    UnknownTimezone {
        id: String,
        suggestions: Vec<String>,
    },

    /// The target column was not found in any worksheet.
    #[error("Column \"{name}\" not found in any worksheet. Available columns: {}", available.join(", "))]
    ColumnNotFound {
        name: String,
        available: Vec<String>,
    },

    /// Error reading or writing the ZIP container.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required workbook part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// Unexpected fault. The code is opaque and safe to show to users.
    #[error("Internal error ({code})")]
    Internal { code: &'static str },
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}
