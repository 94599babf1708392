use crate::CellValue;

/// one worksheet: a name and its rows, 0-based
///
/// Rows may be ragged; trailing blank cells are not stored. Reading outside the stored
/// grid returns `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            rows: vec![],
        }
    }
    /// build a sheet from rows as they are
    pub fn with_rows<S: Into<String>>(name: S, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
    /// get sheet name
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }
    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
    /// widest row length
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(CellValue::is_blank))
    }
    /// cell at 0-based (row, col)
    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }
    /// set cell at 0-based (row, col), growing the grid with blanks when needed
    pub fn set_cell<V: Into<CellValue>>(&mut self, row: usize, col: usize, value: V) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, CellValue::Blank);
        }
        cells[col] = value.into();
    }
    /// 0-based (row, col) of the top-left corner of the used range, `None` when every cell is blank
    pub fn origin(&self) -> Option<(usize, usize)> {
        let row = self.rows.iter().position(|r| r.iter().any(|c| !c.is_blank()))?;
        let col = self.rows[row..]
            .iter()
            .filter_map(|r| r.iter().position(|c| !c.is_blank()))
            .min()?;
        Some((row, col))
    }
    /// Rows of the used range, its top-left corner moved to the first cell.
    ///
    /// Leading blank rows and columns are dropped, and so are trailing blank rows.
    /// Blank rows inside the range are kept.
    pub fn used_rows(&self) -> Vec<Vec<CellValue>> {
        let (row, col) = match self.origin() {
            Some(origin) => origin,
            None => return vec![],
        };
        let end = self
            .rows
            .iter()
            .rposition(|r| r.iter().any(|c| !c.is_blank()))
            .map_or(row, |last| last + 1);
        self.rows[row..end]
            .iter()
            .map(|r| r.iter().skip(col).cloned().collect())
            .collect()
    }
    /// append a row at the bottom
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }
    /// append rows at the bottom, keeping their order
    pub fn extend_rows<I: IntoIterator<Item = Vec<CellValue>>>(&mut self, rows: I) {
        self.rows.extend(rows);
    }
}

/// ordered sheets of one file
///
/// `name` is the source file name; the merge pipeline classifies secondary files by it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    name: String,
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            sheets: vec![],
        }
    }
    /// replace the file name
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }
    pub fn sheets_mut(&mut self) -> &mut [Sheet] {
        &mut self.sheets
    }
    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }
    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
    /// sheet names in order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }
    pub fn push_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }
}
