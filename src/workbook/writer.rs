//! Workbook serialization with cell patches.
//!
//! The save path never rebuilds the document: it streams the original
//! ZIP, rewrites only worksheet parts that have patched cells, and
//! copies every other part verbatim.

use crate::error::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Replacement value for one cell, keyed by its A1-style reference.
#[derive(Debug, Clone, PartialEq)]
pub enum CellPatch {
    /// Write as an inline string.
    Text(String),
    /// Write as a raw serial number (date-styled cells keep their
    /// style and stay dates).
    Serial(f64),
}

/// Rewrite the workbook bytes with per-part cell patches applied.
pub fn write_workbook(
    raw: &[u8],
    patches: &HashMap<String, HashMap<String, CellPatch>>,
) -> Result<Vec<u8>> {
    let mut input = zip::ZipArchive::new(Cursor::new(raw))?;
    let mut out = Vec::new();

    {
        let mut output = zip::ZipWriter::new(Cursor::new(&mut out));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for i in 0..input.len() {
            let mut part = input.by_index(i)?;
            let name = part.name().to_string();

            if part.is_dir() {
                output.add_directory(name, options)?;
                continue;
            }

            match patches.get(&name) {
                Some(cell_patches) if !cell_patches.is_empty() => {
                    let mut xml = Vec::with_capacity(part.size() as usize);
                    part.read_to_end(&mut xml)?;
                    let patched = patch_sheet_xml(&xml, cell_patches)?;
                    output.start_file(name, options)?;
                    output.write_all(&patched)?;
                }
                _ => {
                    output.start_file(name, options)?;
                    std::io::copy(&mut part, &mut output)?;
                }
            }
        }

        output.finish()?;
    }

    Ok(out)
}

/// Stream a worksheet part, replacing each patched `<c>` element.
fn patch_sheet_xml(xml: &[u8], patches: &HashMap<String, CellPatch>) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"c" => {
                match patch_for(&e, patches) {
                    Some((reference, style, patch)) => {
                        // Drop the original cell content.
                        let end = e.to_end().into_owned();
                        reader
                            .read_to_end_into(end.name(), &mut skip_buf)
                            .map_err(|err| Error::XmlParse(err.to_string()))?;
                        write_cell(&mut writer, &reference, style.as_deref(), patch)?;
                    }
                    None => {
                        writer
                            .write_event(Event::Start(e))
                            .map_err(|err| Error::XmlParse(err.to_string()))?;
                    }
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"c" => match patch_for(&e, patches) {
                Some((reference, style, patch)) => {
                    write_cell(&mut writer, &reference, style.as_deref(), patch)?;
                }
                None => {
                    writer
                        .write_event(Event::Empty(e))
                        .map_err(|err| Error::XmlParse(err.to_string()))?;
                }
            },
            Ok(Event::Eof) => break,
            Ok(event) => {
                writer
                    .write_event(event)
                    .map_err(|err| Error::XmlParse(err.to_string()))?;
            }
            Err(err) => return Err(Error::XmlParse(err.to_string())),
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Look up a patch for a cell element, returning its reference, style
/// attribute, and the patch itself.
fn patch_for<'a>(
    e: &BytesStart<'_>,
    patches: &'a HashMap<String, CellPatch>,
) -> Option<(String, Option<String>, &'a CellPatch)> {
    let mut reference = None;
    let mut style = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => reference = Some(String::from_utf8_lossy(&attr.value).to_string()),
            b"s" => style = Some(String::from_utf8_lossy(&attr.value).to_string()),
            _ => {}
        }
    }

    let reference = reference?;
    let patch = patches.get(&reference)?;
    Some((reference, style, patch))
}

/// Emit a replacement cell. The style attribute is preserved; the type
/// attribute is rewritten to match the patched value.
fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    reference: &str,
    style: Option<&str>,
    patch: &CellPatch,
) -> Result<()> {
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference));
    if let Some(s) = style {
        cell.push_attribute(("s", s));
    }

    match patch {
        CellPatch::Text(text) => {
            cell.push_attribute(("t", "inlineStr"));
            emit_events(
                writer,
                vec![
                    Event::Start(cell),
                    Event::Start(BytesStart::new("is")),
                    Event::Start(BytesStart::new("t")),
                    Event::Text(BytesText::new(text)),
                    Event::End(BytesEnd::new("t")),
                    Event::End(BytesEnd::new("is")),
                    Event::End(BytesEnd::new("c")),
                ],
            )
        }
        CellPatch::Serial(serial) => {
            let value = serial.to_string();
            emit_events(
                writer,
                vec![
                    Event::Start(cell),
                    Event::Start(BytesStart::new("v")),
                    Event::Text(BytesText::new(&value)),
                    Event::End(BytesEnd::new("v")),
                    Event::End(BytesEnd::new("c")),
                ],
            )
        }
    }
}

fn emit_events<W: Write>(writer: &mut Writer<W>, events: Vec<Event<'_>>) -> Result<()> {
    for event in events {
        writer
            .write_event(event)
            .map_err(|err| Error::XmlParse(err.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_xml(xml: &str, patches: &[(&str, CellPatch)]) -> String {
        let map: HashMap<String, CellPatch> = patches
            .iter()
            .map(|(r, p)| (r.to_string(), p.clone()))
            .collect();
        let out = patch_sheet_xml(xml.as_bytes(), &map).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_patch_text_cell() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2" s="3" t="s"><v>7</v></c></row></sheetData></worksheet>"#;
        let out = patch_xml(
            xml,
            &[("A2", CellPatch::Text("2024-01-15 07:00:00".to_string()))],
        );

        assert!(out.contains(r#"<c r="A2" s="3" t="inlineStr"><is><t>2024-01-15 07:00:00</t></is></c>"#));
        assert!(!out.contains("<v>7</v>"));
    }

    #[test]
    fn test_patch_serial_cell() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="B2" s="1"><v>44197.5</v></c></row></sheetData></worksheet>"#;
        let out = patch_xml(xml, &[("B2", CellPatch::Serial(44197.75))]);

        assert!(out.contains(r#"<c r="B2" s="1"><v>44197.75</v></c>"#));
    }

    #[test]
    fn test_unpatched_cells_pass_through() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>5</v></c></row></sheetData></worksheet>"#;
        let out = patch_xml(xml, &[]);

        assert!(out.contains(r#"<c r="A1" t="s"><v>0</v></c>"#));
        assert!(out.contains(r#"<c r="B1"><v>5</v></c>"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"/></row></sheetData></worksheet>"#;
        let out = patch_xml(xml, &[("A1", CellPatch::Text("a < b & c".to_string()))]);

        assert!(out.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_write_workbook_copies_unrelated_parts() {
        use zip::ZipWriter;

        let mut raw = Vec::new();
        {
            let mut writer = ZipWriter::new(Cursor::new(&mut raw));
            let options = SimpleFileOptions::default();
            writer.start_file("xl/workbook.xml", options).unwrap();
            writer.write_all(b"<workbook/>").unwrap();
            writer
                .start_file("xl/worksheets/sheet1.xml", options)
                .unwrap();
            writer
                .write_all(
                    br#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#,
                )
                .unwrap();
            writer.finish().unwrap();
        }

        let mut patches = HashMap::new();
        patches.insert(
            "xl/worksheets/sheet1.xml".to_string(),
            [("A1".to_string(), CellPatch::Serial(2.0))]
                .into_iter()
                .collect(),
        );

        let out = write_workbook(&raw, &patches).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(out)).unwrap();
        let mut workbook = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut workbook)
            .unwrap();
        assert_eq!(workbook, "<workbook/>");

        let mut sheet = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut sheet)
            .unwrap();
        assert!(sheet.contains(r#"<c r="A1"><v>2</v></c>"#));
    }
}
