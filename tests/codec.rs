use std::io::{Cursor, Write};

use sheetmerge::{read, write, CellValue, Error, Sheet, Workbook};
use zip::{write::SimpleFileOptions, ZipWriter};

mod common;

#[test]
fn round_trip_keeps_names_rows_and_values() {
    let mut book = Workbook::new("input.xlsx");
    book.push_sheet(Sheet::with_rows("Data", vec![
        vec!["name".into(), "value".into(), "flag".into()],
        vec!["alpha".into(), CellValue::Number(1.5), CellValue::Bool(true)],
        vec![CellValue::Blank, CellValue::Number(-2.0), "a & b <c>".into()],
        vec![],
        vec![" padded ".into()],
    ]));
    book.push_sheet(Sheet::with_rows("Dates", vec![
        vec![CellValue::Date(45_292.0), CellValue::Datetime(45_292.5), CellValue::Time(0.25)],
    ]));
    book.push_sheet(Sheet::new("Empty"));

    let bytes = write::encode(&book).unwrap();
    let back = read::decode(&bytes).unwrap();

    assert_eq!(back.sheet_names(), vec!["Data", "Dates", "Empty"]);
    assert_eq!(back.sheets(), book.sheets());
    assert_eq!(back.name(), "");
}

#[test]
fn decode_named_keeps_file_name() {
    let book = common::book("x", vec![Sheet::with_rows("S", common::text_rows("r", 2))]);
    let bytes = write::encode(&book).unwrap();
    let back = read::decode_named("district_MDS.xlsx", &bytes).unwrap();
    assert_eq!(back.name(), "district_MDS.xlsx");
    assert_eq!(back.sheet(0).unwrap().row_count(), 2);
}

#[test]
fn garbage_is_a_decode_error() {
    match read::decode(b"definitely not a spreadsheet") {
        Err(Error::Decode(_)) => {},
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn zip_without_workbook_is_a_decode_error() {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("hello.txt", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"hi").unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    assert!(matches!(read::decode(&bytes), Err(Error::Decode(_))));
}

#[test]
fn duplicate_sheet_names_cannot_be_encoded() {
    let book = common::book("dup.xlsx", vec![Sheet::new("Data"), Sheet::new("DATA")]);
    assert!(matches!(write::encode(&book), Err(Error::Encode(_))));
}

#[test]
fn invalid_sheet_name_cannot_be_encoded() {
    let book = common::book("bad.xlsx", vec![Sheet::new("in/out")]);
    assert!(matches!(write::encode(&book), Err(Error::Encode(_))));
}

#[test]
fn workbook_without_sheets_gets_a_default_sheet() {
    let bytes = write::encode(&Workbook::default()).unwrap();
    let back = read::decode(&bytes).unwrap();
    assert_eq!(back.sheets().len(), 1);
    assert!(back.sheet(0).unwrap().is_empty());
}

fn package(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="First" sheetId="1" r:id="rId1"/><sheet name="Hidden" sheetId="2" state="hidden" r:id="rId2"/></sheets>
</workbook>"#;

const SHARED: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
<si><t>plain</t></si>
<si><r><t xml:space="preserve">rich </t></r><r><t>text</t></r><rPh sb="0" eb="1"><t>skip</t></rPh></si>
</sst>"#;

const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:D3"/>
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" s="0"/><c r="C1" t="inlineStr"><is><t>inline &amp; co</t></is></c><c r="E1" t="s"><v>1</v></c></row>
<row r="3"><c><v>7</v></c><c t="b"><v>1</v></c><c r="D3" t="str"><f>A1</f><v>cached</v></c><c r="E3" t="e"><v>#N/A</v></c></row>
</sheetData>
</worksheet>"#;

const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;

#[test]
fn hand_written_package_decodes() {
    let bytes = package(&[
        ("xl/_rels/workbook.xml.rels", RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/sharedStrings.xml", SHARED),
        ("xl/worksheets/sheet1.xml", SHEET1),
        ("xl/worksheets/sheet2.xml", SHEET2),
    ]);
    let book = read::decode(&bytes).unwrap();
    assert_eq!(book.sheet_names(), vec!["First", "Hidden"]);

    let first = book.sheet(0).unwrap();
    assert_eq!(first.row_count(), 3);
    assert_eq!(first.rows()[0], vec![
        CellValue::from("plain"),
        CellValue::Blank,
        CellValue::from("inline & co"),
        CellValue::Blank,
        CellValue::from("rich text"),
    ]);
    assert!(first.rows()[1].is_empty());
    assert_eq!(first.rows()[2], vec![
        CellValue::Number(7.0),
        CellValue::Bool(true),
        CellValue::Blank,
        CellValue::from("cached"),
        CellValue::Error("#N/A".into()),
    ]);
    assert!(book.sheet(1).unwrap().is_empty());
}

#[test]
fn dangling_shared_string_is_a_decode_error() {
    let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>9</v></c></row></sheetData></worksheet>"#;
    let bytes = package(&[
        ("xl/_rels/workbook.xml.rels", RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/sharedStrings.xml", SHARED),
        ("xl/worksheets/sheet1.xml", sheet),
        ("xl/worksheets/sheet2.xml", SHEET2),
    ]);
    assert!(matches!(read::decode(&bytes), Err(Error::Decode(_))));
}

fn single_sheet(sheet: &str) -> Vec<u8> {
    package(&[
        ("xl/_rels/workbook.xml.rels", RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/worksheets/sheet1.xml", sheet),
        ("xl/worksheets/sheet2.xml", SHEET2),
    ])
}

#[test]
fn row_zero_is_a_decode_error() {
    let bytes = single_sheet(r#"<worksheet><sheetData><row r="0"><c><v>1</v></c></row></sheetData></worksheet>"#);
    assert!(matches!(read::decode(&bytes), Err(Error::Decode(_))));

    let bytes = single_sheet(r#"<worksheet><sheetData><row r="0"/></sheetData></worksheet>"#);
    assert!(matches!(read::decode(&bytes), Err(Error::Decode(_))));
}

#[test]
fn cell_past_last_column_is_a_decode_error() {
    let bytes = single_sheet(
        r#"<worksheet><sheetData><row r="1"><c r="XFD1"><v>1</v></c><c><v>2</v></c></row></sheetData></worksheet>"#,
    );
    assert!(matches!(read::decode(&bytes), Err(Error::Decode(_))));

    let bytes = single_sheet(r#"<worksheet><sheetData><row r="1"><c r="XFD1"><v>1</v></c></row></sheetData></worksheet>"#);
    let book = read::decode(&bytes).unwrap();
    assert_eq!(book.sheet(0).unwrap().column_count(), 16_384);
}
