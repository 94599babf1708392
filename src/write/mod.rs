use std::{collections::HashSet, fs, path::Path};
use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet, XlsxError};
use tracing::debug;

use crate::{book::{Sheet, Workbook}, error::Error, CellValue, ColNum, RowNum, MAX_COL_NUM, MAX_ROW_NUM};

pub use rust_xlsxwriter::IntoExcelData;

impl IntoExcelData for &CellValue {
    fn write<'a>(
        self,
        worksheet: &'a mut Worksheet,
        row: RowNum,
        col: ColNum,
    ) -> Result<&'a mut Worksheet, XlsxError> {
        match self {
            CellValue::Blank => {},
            CellValue::Bool(v) => {
                worksheet.write_boolean(row, col, *v)?;
            },
            CellValue::Number(v) => {
                worksheet.write_number(row, col, *v)?;
            },
            CellValue::Date(v) => {
                worksheet.write_number_with_format(row, col, *v, &FMT_DEFAULT_DATE)?;
            },
            CellValue::Time(v) => {
                worksheet.write_number_with_format(row, col, *v, &FMT_DEFAULT_TIME)?;
            },
            CellValue::Datetime(v) => {
                worksheet.write_number_with_format(row, col, *v, &FMT_DEFAULT_DATETIME)?;
            },
            CellValue::String(v) | CellValue::Error(v) => {
                worksheet.write_string(row, col, v)?;
            },
        };
        Ok(worksheet)
    }

    fn write_with_format<'a, 'b>(
        self,
        worksheet: &'a mut Worksheet,
        row: RowNum,
        col: ColNum,
        format: &'b Format,
    ) -> Result<&'a mut Worksheet, XlsxError> {
        match self {
            CellValue::Blank => {
                worksheet.write_blank(row, col, format)?;
            },
            CellValue::Bool(v) => {
                worksheet.write_boolean_with_format(row, col, *v, format)?;
            },
            CellValue::Number(v) | CellValue::Date(v) | CellValue::Time(v) | CellValue::Datetime(v) => {
                worksheet.write_number_with_format(row, col, *v, format)?;
            },
            CellValue::String(v) | CellValue::Error(v) => {
                worksheet.write_string_with_format(row, col, v, format)?;
            },
        };
        Ok(worksheet)
    }
}

/// Encode a workbook as xlsx bytes.
///
/// A workbook without sheets gets one empty default sheet, since the format needs at least one.
pub fn encode(book: &Workbook) -> crate::Result<Vec<u8>> {
    XlsxWriter::from_workbook(book)
        .and_then(XlsxWriter::into_buffer)
        .map_err(Error::Encode)
}

/// Encode and write to disk.
pub fn save<P: AsRef<Path>>(book: &Workbook, path: P) -> crate::Result<()> {
    let bytes = encode(book)?;
    fs::write(path, bytes)?;
    Ok(())
}

// xlsx_writer
struct XlsxWriter {
    sheets: Vec<Worksheet>,
}

impl XlsxWriter {
    fn from_workbook(book: &Workbook) -> Result<Self> {
        let mut seen = HashSet::with_capacity(book.sheets().len());
        let mut sheets = Vec::with_capacity(book.sheets().len());
        for sheet in book.sheets() {
            // Excel compares sheet names case-insensitively
            if !seen.insert(sheet.name().to_lowercase()) {
                return Err(anyhow!("duplicate sheet name: {}", sheet.name()));
            }
            sheets.push(write_sheet(sheet)?);
        }
        Ok(Self { sheets })
    }
    fn into_buffer(self) -> Result<Vec<u8>> {
        let mut book = XlsxWorkbook::new();
        if self.sheets.is_empty() {
            book.add_worksheet();
        }
        for sht in self.sheets {
            book.push_worksheet(sht);
        }
        Ok(book.save_to_buffer()?)
    }
}

fn write_sheet(sheet: &Sheet) -> Result<Worksheet> {
    let mut ws = Worksheet::new();
    ws.set_name(sheet.name())
        .map_err(|e| anyhow!("invalid sheet name {:?}: {}", sheet.name(), e))?;
    if sheet.row_count() > MAX_ROW_NUM as usize {
        return Err(anyhow!("sheet {} has {} rows, more than {}", sheet.name(), sheet.row_count(), MAX_ROW_NUM));
    }
    for (r, cells) in sheet.rows().iter().enumerate() {
        if cells.len() > MAX_COL_NUM as usize {
            return Err(anyhow!("sheet {} row {} has {} columns, more than {}", sheet.name(), r + 1, cells.len(), MAX_COL_NUM));
        }
        for (c, cell) in cells.iter().enumerate() {
            if !cell.is_blank() {
                ws.write(r as RowNum, c as ColNum, cell)?;
            }
        }
    }
    debug!(sheet = sheet.name(), rows = sheet.row_count(), "sheet encoded");
    Ok(ws)
}

lazy_static! {
    static ref FMT_DEFAULT_DATE: Format = Format::new().set_num_format_index(14);
    static ref FMT_DEFAULT_TIME: Format = Format::new().set_num_format_index(21);
    static ref FMT_DEFAULT_DATETIME: Format = Format::new().set_num_format_index(22);
}
