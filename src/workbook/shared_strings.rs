//! Shared strings table parsing.

use crate::error::{Error, Result};
use quick_xml::events::Event;

/// The workbook's shared strings table, indexed by cell `v` values.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    strings: Vec<String>,
}

impl SharedStrings {
    /// Parse `xl/sharedStrings.xml`.
    ///
    /// Rich-text runs inside one `<si>` are concatenated; phonetic
    /// `<rPh>` runs are skipped so furigana does not leak into values.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current = String::new();
        let mut in_item = false;
        let mut in_text = false;
        let mut phonetic_depth = 0usize;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_item = true;
                        current.clear();
                    }
                    b"rPh" if in_item => phonetic_depth += 1,
                    b"t" if in_item && phonetic_depth == 0 => in_text = true,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_text {
                        let text = e.unescape().unwrap_or_default();
                        current.push_str(&text);
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current));
                        in_item = false;
                    }
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { strings })
    }

    /// Get a string by its shared index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_strings() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
    <si><t>Timestamp</t></si>
    <si><t>2024-01-15 12:00:00</t></si>
    <si><t>Value</t></si>
</sst>"#;

        let table = SharedStrings::parse(xml).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some("Timestamp"));
        assert_eq!(table.get(1), Some("2024-01-15 12:00:00"));
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn test_rich_text_runs_concatenated() {
        let xml = r#"<sst><si><r><t>Local </t></r><r><t>Time</t></r></si></sst>"#;
        let table = SharedStrings::parse(xml).unwrap();
        assert_eq!(table.get(0), Some("Local Time"));
    }

    #[test]
    fn test_phonetic_runs_skipped() {
        let xml = r#"<sst><si><t>東京</t><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si></sst>"#;
        let table = SharedStrings::parse(xml).unwrap();
        assert_eq!(table.get(0), Some("東京"));
    }
}
