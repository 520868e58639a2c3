//! Pre-flight request validation.

use crate::detect;
use crate::error::{Error, Result};
use crate::model::ConversionRequest;
use crate::timezone::TimezoneResolver;

/// Validate a conversion request before any parsing happens.
///
/// Check order is fixed: presence, size ceiling, ZIP signature, column
/// name, then both timezone ids. The first failing check aborts with a
/// user-facing error.
pub fn validate_request(request: &ConversionRequest, zones: &TimezoneResolver) -> Result<()> {
    if request.bytes.is_empty() {
        return Err(Error::EmptyInput);
    }

    if request.bytes.len() > request.max_file_size {
        return Err(Error::FileTooLarge {
            size: request.bytes.len(),
            limit: request.max_file_size,
        });
    }

    if !detect::is_zip_file(&request.bytes) {
        return Err(Error::InvalidFormat);
    }

    if request.column_name.trim().is_empty() {
        return Err(Error::MissingColumnName);
    }

    zones.resolve(&request.source_zone)?;
    zones.resolve(&request.target_zone)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bytes: Vec<u8>) -> ConversionRequest {
        ConversionRequest::new(bytes, "Timestamp", "UTC", "Europe/London")
    }

    fn zip_prefixed(len: usize) -> Vec<u8> {
        let mut bytes = vec![0x50, 0x4B, 0x03, 0x04];
        bytes.resize(len, 0);
        bytes
    }

    #[test]
    fn test_empty_bytes_rejected() {
        let zones = TimezoneResolver::new();
        let result = validate_request(&request(Vec::new()), &zones);
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let zones = TimezoneResolver::new();
        let req = request(zip_prefixed(2048)).with_max_file_size(1024);
        let result = validate_request(&req, &zones);
        assert!(matches!(
            result,
            Err(Error::FileTooLarge { size: 2048, limit: 1024 })
        ));
    }

    #[test]
    fn test_bad_magic_rejected_before_parsing() {
        let zones = TimezoneResolver::new();
        let result = validate_request(&request(b"PDF-1.7 not a workbook".to_vec()), &zones);
        assert!(matches!(result, Err(Error::InvalidFormat)));
    }

    #[test]
    fn test_blank_column_name_rejected() {
        let zones = TimezoneResolver::new();
        let mut req = request(zip_prefixed(64));
        req.column_name = "   ".to_string();
        let result = validate_request(&req, &zones);
        assert!(matches!(result, Err(Error::MissingColumnName)));
    }

    #[test]
    fn test_unknown_timezone_rejected_with_suggestions() {
        let zones = TimezoneResolver::new();
        let mut req = request(zip_prefixed(64));
        req.target_zone = "New_York".to_string();
        match validate_request(&req, &zones) {
            Err(Error::UnknownTimezone { id, suggestions }) => {
                assert_eq!(id, "New_York");
                assert!(suggestions.contains(&"America/New_York".to_string()));
            }
            other => panic!("expected UnknownTimezone, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let zones = TimezoneResolver::new();
        assert!(validate_request(&request(zip_prefixed(64)), &zones).is_ok());
    }
}
