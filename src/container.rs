//! ZIP container abstraction for xlsx workbooks.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::io::{Cursor, Read};

/// Read-side abstraction over a workbook's ZIP archive.
///
/// Owns the raw bytes for the lifetime of one conversion call; the
/// write path recovers them via [`WorkbookContainer::into_bytes`] so
/// unmodified parts can be copied into the output verbatim.
pub struct WorkbookContainer {
    archive: RefCell<zip::ZipArchive<Cursor<Vec<u8>>>>,
}

impl WorkbookContainer {
    /// Create a container from workbook bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let cursor = Cursor::new(data);
        let archive = zip::ZipArchive::new(cursor)?;
        Ok(Self {
            archive: RefCell::new(archive),
        })
    }

    /// Read an XML part from the archive as a string.
    ///
    /// Workbook parts are almost always UTF-8, but UTF-16 with a BOM
    /// shows up in files produced by some legacy exporters.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        let bytes = self.read_binary(path)?;
        decode_xml_bytes(&bytes)
    }

    /// Read a part's raw bytes from the archive.
    pub fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive.borrow_mut();
        let mut file = archive
            .by_name(path)
            .map_err(|_| Error::MissingComponent(path.to_string()))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Check if a part exists in the archive.
    pub fn exists(&self, path: &str) -> bool {
        let archive = self.archive.borrow();
        let found = archive.file_names().any(|n| n == path);
        found
    }

    /// List all parts in the archive.
    pub fn list_files(&self) -> Vec<String> {
        let archive = self.archive.borrow();
        archive.file_names().map(String::from).collect()
    }

    /// Consume the container and recover the original workbook bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.archive.into_inner().into_inner().into_inner()
    }
}

impl std::fmt::Debug for WorkbookContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkbookContainer")
            .field("parts", &self.list_files().len())
            .finish()
    }
}

/// Decode XML part bytes, handling UTF-8 (with or without BOM) and
/// BOM-marked UTF-16 LE/BE.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        // UTF-8 BOM
        return String::from_utf8(bytes[3..].to_vec())
            .map_err(|e| Error::XmlParse(e.to_string()));
    }

    if bytes.len() >= 2 && bytes[..2] == [0xFF, 0xFE] {
        // UTF-16 LE BOM
        let content = decode_utf16(&bytes[2..], u16::from_le_bytes)?;
        return Ok(fix_encoding_declaration(&content));
    }

    if bytes.len() >= 2 && bytes[..2] == [0xFE, 0xFF] {
        // UTF-16 BE BOM
        let content = decode_utf16(&bytes[2..], u16::from_be_bytes)?;
        return Ok(fix_encoding_declaration(&content));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn decode_utf16(bytes: &[u8], combine: fn([u8; 2]) -> u16) -> Result<String> {
    let len = bytes.len() & !1;
    let units = (0..len)
        .step_by(2)
        .map(|i| combine([bytes[i], bytes[i + 1]]));

    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::XmlParse(e.to_string()))
}

/// After transcoding UTF-16 bytes to a Rust String the XML declaration
/// still claims UTF-16, which makes quick-xml re-interpret the text.
/// Rewrite the declaration to UTF-8.
fn fix_encoding_declaration(content: &str) -> String {
    if let Some(end) = content.find("?>").filter(|_| content.starts_with("<?xml")) {
        let decl = content[..end + 2]
            .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
            .replace("encoding='UTF-16'", "encoding='UTF-8'")
            .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
            .replace("encoding='utf-16'", "encoding='UTF-8'");
        return format!("{}{}", decl, &content[end + 2..]);
    }
    content.to_string()
}
