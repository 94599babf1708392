#![allow(dead_code)]
use sheetmerge::{CellValue, Sheet, Workbook};

/// rows of single text cells, `prefix1`, `prefix2`, ...
pub fn text_rows(prefix: &str, n: usize) -> Vec<Vec<CellValue>> {
    (1..=n).map(|i| vec![CellValue::from(format!("{}{}", prefix, i))]).collect()
}

pub fn book(name: &str, sheets: Vec<Sheet>) -> Workbook {
    let mut book = Workbook::new(name);
    for sheet in sheets {
        book.push_sheet(sheet);
    }
    book
}

/// a sheet whose row 8 holds `labels` from column 6 (F) rightwards; `None` leaves a gap
pub fn header_sheet(name: &str, labels: &[Option<&str>]) -> Sheet {
    let mut sheet = Sheet::new(name);
    sheet.set_cell(0, 0, "Data element mapping");
    for (i, label) in labels.iter().enumerate() {
        if let Some(label) = label {
            sheet.set_cell(7, 5 + i, *label);
        }
    }
    sheet
}
