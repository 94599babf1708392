//! Merge Excel workbooks by sheet position and map header labels to DHIS2 data element ids, in pure Rust.
//!
//! The crate is made of a small spreadsheet codec ([`read`], [`write`]) over an in-memory
//! [`book::Workbook`], and two batch pipelines built on top of it:
//!
//! * [`merge`] concatenates same-position sheets of several workbooks, skipping a
//!   file-name-dependent number of leading rows of every secondary file ([`classify`]);
//! * [`mapping`] scans a header row of every sheet, resolves each label through a
//!   [`lookup::Lookup`] and writes the ids into a parallel output row.
//!
//! ```no_run
//! use sheetmerge::{merge, read, write};
//!
//! # fn main() -> sheetmerge::Result<()> {
//! let base = read::decode_file("district_MDS.xlsx")?;
//! let other = read::decode_file("facility_TB1.xlsx")?;
//! let merged = merge::merge(&[base, other])?;
//! write::save(&merged, "merged_excel.xlsx")?;
//! # Ok(())
//! # }
//! ```
use anyhow::{anyhow, Result as AnyResult};
use read::FromCellValue;

/// In-memory workbook model
pub mod book;
/// Filename classifier for merge start rows
pub mod classify;
/// Error taxonomy
pub mod error;
/// Remote label lookup
pub mod lookup;
/// Header label to id mapping pipeline
pub mod mapping;
/// Sheet merge pipeline
pub mod merge;
/// Excel file reader
pub mod read;
/// Excel file writer
pub mod write;

pub use book::{Sheet, Workbook};
pub use error::{Error, Result};

/// reexport chrono
pub use chrono;

/// row number, 1-based where it appears in an address
pub type RowNum = u32;
/// column number, 1-based where it appears in an address
pub type ColNum = u16;

/// max column number of an Excel 2007+ worksheet
pub const MAX_COL_NUM: ColNum = 16_384;
/// max row number of an Excel 2007+ worksheet
pub const MAX_ROW_NUM: RowNum = 1_048_576;

/// Convert character based Excel cell column addresses to number. If you pass parameter D to this function, you will get 4.
/// Trailing row digits are ignored, so B3 gives 2.
pub fn get_num_from_ord(addr: &[u8]) -> AnyResult<ColNum> {
    let mut col: u32 = 0;
    for b in addr.iter().map(u8::to_ascii_uppercase).take_while(u8::is_ascii_alphabetic) {
        col = col * 26 + u32::from(b - b'@');
        if col > u32::from(MAX_COL_NUM) {
            return Err(anyhow!("column out of range: {}", String::from_utf8_lossy(addr)));
        }
    }
    Ok(col as ColNum)
}

/// Convert number based Excel cell column addresses to character. If you pass parameter 4 to this function, you will get D
pub fn get_ord_from_num(num: ColNum) -> AnyResult<String> {
    if num == 0 {
        return Err(anyhow!("column number starts from 1"));
    }
    let mut col = u32::from(num);
    let mut addr = Vec::with_capacity(3);
    while col > 0 {
        addr.push(b'A' + ((col - 1) % 26) as u8);
        col = (col - 1) / 26;
    }
    addr.reverse();
    Ok(String::from_utf8(addr)?)
}

/// Convert character based Excel cell addresses to numbers. If you pass parameter D2 to this function, you will get (2, 4)
pub fn get_tuple_from_ord(addr: &[u8]) -> AnyResult<(RowNum, ColNum)> {
    let split = addr
        .iter()
        .position(u8::is_ascii_digit)
        .ok_or_else(|| anyhow!("invalid cell address: {}", String::from_utf8_lossy(addr)))?;
    let col = get_num_from_ord(&addr[..split])?;
    let row: RowNum = std::str::from_utf8(&addr[split..])?.parse()?;
    if col == 0 || row == 0 {
        return Err(anyhow!("invalid cell address: {}", String::from_utf8_lossy(addr)));
    }
    Ok((row, col))
}

/// Convert numbers based Excel cell addresses to characters. If you pass parameter (2, 4) to this function, you will get D2.
pub fn get_ord_from_tuple(row: RowNum, col: ColNum) -> AnyResult<String> {
    Ok(format!("{}{}", get_ord_from_num(col)?, row))
}

/// Cell Value Type
///
/// `Date`, `Time` and `Datetime` hold the raw Excel serial number of a numeric cell whose
/// style carries a date/time number format.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Blank,
    Bool(bool),
    Number(f64),
    Date(f64),
    Time(f64),
    Datetime(f64),
    String(String),
    Error(String),
}

impl CellValue {
    /// Attention: as to blank cell, String will return String::new(), and other types will return None.
    pub fn get<T: FromCellValue>(&self) -> AnyResult<Option<T>> {
        T::try_from_cval(self)
    }
    /// true only for [`CellValue::Blank`]
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::String(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_owned())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Number(v as f64)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}
