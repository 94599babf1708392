use sheetmerge::{
    classify::Classifier,
    merge::{merge, merge_with, MergeJob},
    read, CellValue, Error, Sheet,
};

mod common;
use common::{book, text_rows};

#[test]
fn single_workbook_is_returned_unchanged() {
    let a = book("base.xlsx", vec![
        Sheet::with_rows("S1", text_rows("a", 5)),
        Sheet::with_rows("S2", vec![vec![CellValue::Number(1.0), CellValue::Blank, "x".into()]]),
    ]);
    let merged = merge(std::slice::from_ref(&a)).unwrap();
    assert_eq!(merged, a);
}

#[test]
fn secondary_rows_are_appended_from_start_row() {
    let a = book("base.xlsx", vec![Sheet::with_rows("S1", text_rows("a", 5))]);
    let b = book("report.xlsx", vec![Sheet::with_rows("Other", text_rows("b", 10))]);

    let merged = merge(&[a.clone(), b]).unwrap();
    let s1 = merged.sheet(0).unwrap();
    assert_eq!(s1.name(), "S1");
    assert_eq!(s1.row_count(), 5 + (10 - 7));
    // base rows untouched, then b8..b10 in order
    assert_eq!(&s1.rows()[..5], a.sheet(0).unwrap().rows());
    assert_eq!(s1.rows()[5..].to_vec(), vec![
        vec![CellValue::from("b8")],
        vec![CellValue::from("b9")],
        vec![CellValue::from("b10")],
    ]);
}

#[test]
fn start_row_follows_file_name() {
    let a = book("base.xlsx", vec![Sheet::with_rows("S1", vec![])]);
    let tb1 = book("facility_tb1_q3.xlsx", vec![Sheet::with_rows("S1", text_rows("t", 10))]);
    let tb4 = book("TB4-annual.xlsx", vec![Sheet::with_rows("S1", text_rows("u", 13))]);

    let merged = merge(&[a, tb1, tb4]).unwrap();
    let rows = merged.sheet(0).unwrap().rows();
    // TB1 starts at row 7, TB4 at row 12
    assert_eq!(rows.len(), 4 + 2);
    assert_eq!(rows[0], vec![CellValue::from("t7")]);
    assert_eq!(rows[4], vec![CellValue::from("u12")]);
    assert_eq!(rows[5], vec![CellValue::from("u13")]);
}

#[test]
fn output_shape_follows_the_base() {
    let a = book("base.xlsx", vec![
        Sheet::with_rows("S1", text_rows("a", 1)),
        Sheet::with_rows("S2", text_rows("c", 1)),
    ]);
    let only_one = book("x_MDS.xlsx", vec![Sheet::with_rows("X1", text_rows("m", 10))]);
    let three = book("y_DAH.xlsx", vec![
        Sheet::with_rows("Y1", text_rows("y", 9)),
        Sheet::with_rows("Y2", text_rows("z", 9)),
        Sheet::with_rows("Y3", text_rows("w", 50)),
    ]);

    let merged = merge(&[a, only_one, three]).unwrap();
    assert_eq!(merged.sheet_names(), vec!["S1", "S2"]);
    assert_eq!(merged.name(), "base.xlsx");
    let s1 = merged.sheet(0).unwrap().rows();
    assert_eq!(s1, &[
        vec![CellValue::from("a1")],
        vec![CellValue::from("m9")],
        vec![CellValue::from("m10")],
        vec![CellValue::from("y9")],
    ]);
    let s2 = merged.sheet(1).unwrap().rows();
    assert_eq!(s2, &[vec![CellValue::from("c1")], vec![CellValue::from("z9")]]);
}

#[test]
fn short_secondary_sheet_adds_nothing() {
    let a = book("base.xlsx", vec![Sheet::with_rows("S1", text_rows("a", 3))]);
    let b = book("b.xlsx", vec![Sheet::with_rows("S1", text_rows("b", 4))]);
    let merged = merge(&[a.clone(), b]).unwrap();
    assert_eq!(merged, a);
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(merge(&[]), Err(Error::NoFiles)));
}

#[test]
fn custom_table_changes_the_offset() {
    let table = Classifier::from_json(r#"{"rules": [{"label": "HMIS", "pattern": "hmis", "start_row": 2}], "default_start_row": 1}"#).unwrap();
    let a = book("base.xlsx", vec![Sheet::with_rows("S1", text_rows("a", 1))]);
    let b = book("HMIS_105.xlsx", vec![Sheet::with_rows("S1", text_rows("b", 3))]);
    let c = book("plain.xlsx", vec![Sheet::with_rows("S1", text_rows("c", 2))]);
    let merged = merge_with(&[a, b, c], &table).unwrap();
    assert_eq!(merged.sheet(0).unwrap().row_count(), 1 + 2 + 2);
}

#[test]
fn job_needs_two_files_and_names_the_output() {
    let mut job = MergeJob::new("merged_excel");
    assert!(matches!(job.validate(), Err(Error::NoFiles)));
    job.push(book("base.xlsx", vec![Sheet::with_rows("S1", text_rows("a", 2))]));
    assert!(matches!(job.validate(), Err(Error::TooFewFiles { found: 1 })));
    job.push(book("TB1.xlsx", vec![Sheet::with_rows("S1", text_rows("b", 8))]));
    job.validate().unwrap();
    assert_eq!(job.len(), 2);
    assert_eq!(job.file_name(), "merged_excel.xlsx");
    assert_eq!(MergeJob::new("out.XLSX").file_name(), "out.XLSX");

    let out = job.run(&Classifier::default()).unwrap();
    assert_eq!(out.file_name, "merged_excel.xlsx");
    assert_eq!(out.workbook.name(), "merged_excel.xlsx");
    let back = read::decode(&out.bytes).unwrap();
    assert_eq!(back.sheet_names(), vec!["S1"]);
    assert_eq!(back.sheet(0).unwrap().rows(), out.workbook.sheet(0).unwrap().rows());
    assert_eq!(back.sheet(0).unwrap().row_count(), 2 + 2);
}

#[test]
fn start_row_counts_from_the_used_range() {
    // base data starts at B2, the TB1 sheet's at C3
    let mut base = Sheet::new("S1");
    base.set_cell(1, 1, "a1");
    base.set_cell(3, 1, "a3");
    let mut offset = Sheet::new("S1");
    for i in 0..9 {
        offset.set_cell(2 + i, 2, format!("t{}", i + 1));
    }
    offset.set_cell(12, 0, CellValue::Blank);

    let merged = merge(&[
        book("base.xlsx", vec![base]),
        book("TB1_north.xlsx", vec![offset]),
    ])
    .unwrap();
    let rows = merged.sheet(0).unwrap().rows();
    assert_eq!(rows.to_vec(), vec![
        vec![CellValue::from("a1")],
        vec![],
        vec![CellValue::from("a3")],
        vec![CellValue::from("t7")],
        vec![CellValue::from("t8")],
        vec![CellValue::from("t9")],
    ]);
}
