//! Minimal XLSX container reading: sheet names and a raw text grid.
//!
//! The dataset is consumed as text only (filtering parses numbers itself), so
//! this reader resolves the sheet part, inlines shared strings and flattens
//! every cell to a `String`. Row-index gaps in the sheet XML are materialized
//! as fully blank rows so separator rows survive the round trip.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::StruttureError;

pub fn sheet_names(path: &Path) -> Result<Vec<String>, StruttureError> {
    let mut archive = open_archive(path)?;
    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?;
    let entries = parse_sheet_entries(&workbook_xml)?;
    Ok(entries.into_iter().map(|entry| entry.name).collect())
}

pub fn has_sheet(path: &Path, name: &str) -> Result<bool, StruttureError> {
    Ok(sheet_names(path)?.iter().any(|candidate| candidate == name))
}

/// Reads the named sheet as a grid of text cells, header row included.
pub fn read_sheet(path: &Path, name: &str) -> Result<Vec<Vec<String>>, StruttureError> {
    let mut archive = open_archive(path)?;

    let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?;
    let entries = parse_sheet_entries(&workbook_xml)?;
    let rel_id = entries
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.rel_id)
        .ok_or_else(|| StruttureError::MissingSheet {
            path: path.to_path_buf(),
            sheet: name.to_string(),
        })?;

    let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let target = parse_relationships(&rels_xml)?
        .into_iter()
        .find(|rel| rel.id == rel_id)
        .map(|rel| resolve_target(&rel.target))
        .ok_or_else(|| {
            StruttureError::Workbook(format!("no workbook relationship for sheet {name:?}"))
        })?;

    let shared = match read_optional_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = read_part(&mut archive, &target)?;
    parse_sheet_grid(&sheet_xml, &shared)
}

struct SheetEntry {
    name: String,
    rel_id: String,
}

struct Relationship {
    id: String,
    target: String,
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, StruttureError> {
    let file = File::open(path)
        .map_err(|err| StruttureError::Workbook(format!("open {}: {err}", path.display())))?;
    ZipArchive::new(file).map_err(wb)
}

fn read_part(archive: &mut ZipArchive<File>, part: &str) -> Result<String, StruttureError> {
    let mut entry = archive
        .by_name(part)
        .map_err(|err| StruttureError::Workbook(format!("{part}: {err}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| StruttureError::Workbook(format!("{part}: {err}")))?;
    Ok(xml)
}

fn read_optional_part(
    archive: &mut ZipArchive<File>,
    part: &str,
) -> Result<Option<String>, StruttureError> {
    match archive.by_name(part) {
        Ok(mut entry) => {
            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|err| StruttureError::Workbook(format!("{part}: {err}")))?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(wb(err)),
    }
}

fn parse_sheet_entries(xml: &str) -> Result<Vec<SheetEntry>, StruttureError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?;
                // `r:id` has local name `id`; `sheetId` does not collide.
                let rel_id = attr_value(&e, b"id")?;
                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    entries.push(SheetEntry { name, rel_id });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, StruttureError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id")?;
                let target = attr_value(&e, b"Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    relationships.push(Relationship { id, target });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

// Targets are relative to `xl/` unless rooted at the package.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, StruttureError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(read_si(&mut reader)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn read_si(reader: &mut Reader<&[u8]>) -> Result<String, StruttureError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                text.push_str(&read_text(reader, QName(b"t"))?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"rPh" => {
                // Phonetic runs are not part of the displayed string.
                reader.read_to_end_into(e.name(), &mut Vec::new()).map_err(wb)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"si" => break,
            Event::Eof => return Err(wb("unexpected eof in <si>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn parse_sheet_grid(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, StruttureError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut in_sheet_data = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = true,
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                pad_missing_rows(&mut grid, declared_row_index(&e)?);
                let cells = read_row(&mut reader, shared)?;
                grid.push(cells);
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                pad_missing_rows(&mut grid, declared_row_index(&e)?);
                grid.push(Vec::new());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(grid)
}

fn declared_row_index(e: &BytesStart<'_>) -> Result<Option<usize>, StruttureError> {
    Ok(attr_value(e, b"r")?.and_then(|value| value.parse::<usize>().ok()))
}

// A `<row r="5">` after `<row r="3">` implies a blank row 4.
fn pad_missing_rows(grid: &mut Vec<Vec<String>>, declared: Option<usize>) {
    if let Some(index) = declared {
        while grid.len() + 1 < index {
            grid.push(Vec::new());
        }
    }
}

fn read_row(reader: &mut Reader<&[u8]>, shared: &[String]) -> Result<Vec<String>, StruttureError> {
    let mut buf = Vec::new();
    let mut cells: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(&e, cells.len())?;
                place_cell(&mut cells, col, String::new());
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(&e, cells.len())?;
                let cell_type = attr_value(&e, b"t")?;
                let raw = read_cell_value(reader)?;
                let text = match cell_type.as_deref() {
                    Some("s") => raw
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| shared.get(index).cloned())
                        .unwrap_or_default(),
                    _ => raw,
                };
                place_cell(&mut cells, col, text);
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => break,
            Event::Eof => return Err(wb("unexpected eof in <row>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(cells)
}

// Collects `<v>` or inline `<t>` content until `</c>`; formulas are skipped.
fn read_cell_value(reader: &mut Reader<&[u8]>) -> Result<String, StruttureError> {
    let mut buf = Vec::new();
    let mut value = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Start(e) if e.local_name().as_ref() == b"v" => {
                value.push_str(&read_text(reader, QName(b"v"))?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                value.push_str(&read_text(reader, QName(b"t"))?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"f" => {
                reader.read_to_end_into(e.name(), &mut Vec::new()).map_err(wb)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"c" => break,
            Event::Eof => return Err(wb("unexpected eof in <c>")),
            _ => {}
        }
        buf.clear();
    }

    Ok(value)
}

fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String, StruttureError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(wb)? {
            Event::Text(e) => {
                text.push_str(&e.unescape().map_err(wb)?);
            }
            Event::CData(e) => {
                text.push_str(
                    std::str::from_utf8(e.as_ref())
                        .map_err(|err| wb(format!("cdata: {err}")))?,
                );
            }
            Event::End(e) if e.name() == end => break,
            Event::Eof => return Err(wb("unexpected eof in text element")),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn cell_column(e: &BytesStart<'_>, fallback: usize) -> Result<usize, StruttureError> {
    Ok(attr_value(e, b"r")?
        .as_deref()
        .and_then(column_of_reference)
        .unwrap_or(fallback))
}

fn column_of_reference(reference: &str) -> Option<usize> {
    let letters: String = reference
        .chars()
        .take_while(|ch| ch.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for ch in letters.chars() {
        index = index * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

fn place_cell(cells: &mut Vec<String>, col: usize, value: String) {
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value;
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, StruttureError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| wb(format!("attribute: {err}")))?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(wb)?.into_owned()));
        }
    }
    Ok(None)
}

fn wb(err: impl std::fmt::Display) -> StruttureError {
    StruttureError::Workbook(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_references() {
        assert_eq!(column_of_reference("A1"), Some(0));
        assert_eq!(column_of_reference("C12"), Some(2));
        assert_eq!(column_of_reference("AA3"), Some(26));
        assert_eq!(column_of_reference("12"), None);
    }

    #[test]
    fn relationship_targets_resolve_under_xl() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn sheet_grid_fills_row_gaps() {
        let xml = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>LUOGO</t></is></c></row>
    <row r="2"><c r="A2" t="inlineStr"><is><t>Dobbiaco</t></is></c><c r="B2"><v>-5</v></c></row>
    <row r="4"><c r="A4" t="inlineStr"><is><t>Livigno</t></is></c></row>
  </sheetData>
</worksheet>"#;
        let grid = parse_sheet_grid(xml, &[]).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0], vec!["LUOGO".to_string()]);
        assert_eq!(grid[1], vec!["Dobbiaco".to_string(), "-5".to_string()]);
        assert!(grid[2].is_empty());
        assert_eq!(grid[3], vec!["Livigno".to_string()]);
    }

    #[test]
    fn shared_string_cells_are_inlined() {
        let xml = r#"<worksheet><sheetData>
    <row r="1"><c r="A1" t="s"><v>1</v></c><c r="B1" t="s"><v>0</v></c></row>
</sheetData></worksheet>"#;
        let shared = vec!["neve fresca".to_string(), "LUOGO".to_string()];
        let grid = parse_sheet_grid(xml, &shared).unwrap();
        assert_eq!(grid[0], vec!["LUOGO".to_string(), "neve fresca".to_string()]);
    }
}
