use std::io::{Cursor, Write};
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Builds a minimal xlsx in memory: one sheet, inline-string cells, empty
/// slices become blank separator rows.
pub fn xlsx_bytes(sheet_name: &str, rows: &[&[&str]]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let workbook = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<sheets><sheet name="{name}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        name = escape(sheet_name)
    );
    let rels = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        r#"<Relationship Id="rId1" "#,
        r#"Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" "#,
        r#"Target="worksheets/sheet1.xml"/></Relationships>"#,
    );

    let mut sheet = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        "<sheetData>",
    ));
    for (row_index, cells) in rows.iter().enumerate() {
        let row_ref = row_index + 1;
        if cells.iter().all(|cell| cell.trim().is_empty()) {
            sheet.push_str(&format!(r#"<row r="{row_ref}"/>"#));
            continue;
        }
        sheet.push_str(&format!(r#"<row r="{row_ref}">"#));
        for (col_index, cell) in cells.iter().enumerate() {
            sheet.push_str(&format!(
                r#"<c r="{col}{row_ref}" t="inlineStr"><is><t>{text}</t></is></c>"#,
                col = column_letter(col_index),
                text = escape(cell),
            ));
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    writer.start_file("xl/workbook.xml", options).unwrap();
    writer.write_all(workbook.as_bytes()).unwrap();
    writer.start_file("xl/_rels/workbook.xml.rels", options).unwrap();
    writer.write_all(rels.as_bytes()).unwrap();
    writer.start_file("xl/worksheets/sheet1.xml", options).unwrap();
    writer.write_all(sheet.as_bytes()).unwrap();

    writer.finish().unwrap().into_inner()
}

pub fn write_xlsx(path: &Path, sheet_name: &str, rows: &[&[&str]]) {
    std::fs::write(path, xlsx_bytes(sheet_name, rows)).unwrap();
}

fn column_letter(index: usize) -> String {
    let mut index = index + 1;
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
