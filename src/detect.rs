//! Workbook format detection.

use crate::error::{Error, Result};
use std::io::Cursor;

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Check if data starts with the ZIP local-file-header signature.
///
/// This is the pre-flight gate for every conversion request: bytes
/// failing it are rejected before any parsing is attempted, regardless
/// of file extension.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZIP_MAGIC
}

/// Verify that the bytes look like an Excel workbook.
///
/// Checks the ZIP signature, then opens the archive and looks for the
/// `xl/` package structure. Used by [`crate::analyze`]; the conversion
/// path only gates on the signature and lets the workbook parser
/// surface deeper structural faults.
pub fn detect_workbook(data: &[u8]) -> Result<()> {
    if !is_zip_file(data) {
        return Err(Error::InvalidFormat);
    }

    let cursor = Cursor::new(data);
    let archive = zip::ZipArchive::new(cursor)?;

    let has_workbook = archive.file_names().any(|n| n == "xl/workbook.xml");
    if has_workbook {
        Ok(())
    } else {
        Err(Error::MissingComponent("xl/workbook.xml".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zip_file() {
        assert!(is_zip_file(&[0x50, 0x4B, 0x03, 0x04, 0x00]));
        assert!(!is_zip_file(&[0x00, 0x00, 0x00, 0x00]));
        assert!(!is_zip_file(&[0x50, 0x4B])); // Too short
        assert!(!is_zip_file(b""));
    }

    #[test]
    fn test_detect_rejects_non_zip() {
        let result = detect_workbook(b"This is not a workbook");
        assert!(matches!(result, Err(Error::InvalidFormat)));
    }

    #[test]
    fn test_detect_rejects_zip_without_workbook_part() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buffer = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buffer));
            writer
                .start_file("hello.txt", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"hi").unwrap();
            writer.finish().unwrap();
        }

        let result = detect_workbook(&buffer);
        assert!(matches!(result, Err(Error::MissingComponent(_))));
    }
}
