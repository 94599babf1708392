use std::{
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, info, warn};

use crate::{
    book::{Sheet, Workbook},
    error::{Error, Result},
    lookup::Lookup,
    write, CellValue,
};

/// placeholder written when a label has no id
pub const NOT_FOUND: &str = "Not found";

/// Where labels are read and ids written. Rows and columns are 1-based.
///
/// For every sheet, `header_row` is scanned from `start_column` rightwards over at most
/// `max_columns` cells. **The scan stops at the first blank cell**: labels further right
/// of a gap are never looked up. A cell is blank when it is missing, empty text, the
/// number zero or `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    pub header_row: u32,
    pub output_row: u32,
    pub start_column: u32,
    pub max_columns: u32,
    /// written when the lookup returns nothing
    pub not_found: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            header_row: 8,
            output_row: 9,
            start_column: 6,
            max_columns: 200,
            not_found: NOT_FOUND.to_owned(),
        }
    }
}

impl MappingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.header_row == 0 || self.output_row == 0 || self.start_column == 0 {
            return Err(Error::Config("rows and columns start from 1".into()));
        }
        if self.max_columns == 0 {
            return Err(Error::Config("scan window has no columns".into()));
        }
        if self.header_row == self.output_row {
            return Err(Error::Config(format!(
                "output row {} would overwrite the header row",
                self.output_row
            )));
        }
        let last = u64::from(self.start_column) + u64::from(self.max_columns) - 1;
        if last > u64::from(crate::MAX_COL_NUM) {
            return Err(Error::Config(format!("scan window ends at column {}, past the sheet", last)));
        }
        if self.output_row > crate::MAX_ROW_NUM {
            return Err(Error::Config(format!("output row {} past the sheet", self.output_row)));
        }
        Ok(())
    }
    /// 0-based columns of the scan window, empty when `start_column` is 0
    fn columns(&self) -> Range<usize> {
        match (self.start_column as usize).checked_sub(1) {
            Some(first) => first..first + self.max_columns as usize,
            None => 0..0,
        }
    }
}

/// cells mapped so far out of the cells found by the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    /// rounded percentage, halves round up; 100 when there is nothing to do
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        let p = (self.processed * 200 + self.total) / (self.total * 2);
        p.min(100) as u32
    }
    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingState {
    Idle,
    Scanning,
    Resolving,
    Done,
    Failed,
}

/// Shared flag to stop a running job between two lookups.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// mapped workbook ready for download
#[derive(Debug, Clone)]
pub struct MappingOutput {
    pub workbook: Workbook,
    pub bytes: Vec<u8>,
    pub progress: Progress,
}

fn is_blank_header(cell: &CellValue) -> bool {
    match cell {
        CellValue::Blank => true,
        CellValue::String(s) => s.is_empty(),
        CellValue::Number(n) | CellValue::Date(n) | CellValue::Time(n) | CellValue::Datetime(n) => {
            *n == 0.0 || n.is_nan()
        },
        CellValue::Bool(b) => !b,
        CellValue::Error(_) => false,
    }
}

/// header cells of the window up to the first blank, with their 0-based column
fn header_cells<'s>(sheet: &'s Sheet, config: &MappingConfig) -> impl Iterator<Item = (usize, &'s CellValue)> + 's {
    let row = (config.header_row as usize).checked_sub(1);
    config.columns().map_while(move |col| {
        row.and_then(|r| sheet.cell(r, col))
            .filter(|c| !is_blank_header(c))
            .map(|c| (col, c))
    })
}

/// lookup text of a header cell; date and time cells give their serial number
fn label_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Blank => String::new(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Number(n) | CellValue::Date(n) | CellValue::Time(n) | CellValue::Datetime(n) => n.to_string(),
        CellValue::String(s) | CellValue::Error(s) => s.trim().to_owned(),
    }
}

/// One mapping run over one workbook.
pub struct MappingJob<'l> {
    lookup: &'l dyn Lookup,
    config: MappingConfig,
    cancel: CancelToken,
    state: MappingState,
    progress: Progress,
}

impl<'l> MappingJob<'l> {
    pub fn new(lookup: &'l dyn Lookup, config: MappingConfig) -> Self {
        Self {
            lookup,
            config,
            cancel: CancelToken::new(),
            state: MappingState::Idle,
            progress: Progress::default(),
        }
    }
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
    pub fn state(&self) -> MappingState {
        self.state
    }
    pub fn progress(&self) -> Progress {
        self.progress
    }
    pub fn config(&self) -> &MappingConfig {
        &self.config
    }
    /// Count the header cells to map across all sheets. Resets the progress.
    pub fn scan(&mut self, book: &Workbook) -> usize {
        self.state = MappingState::Scanning;
        let total = book
            .sheets()
            .iter()
            .map(|sheet| {
                let n = header_cells(sheet, &self.config).count();
                debug!(sheet = sheet.name(), labels = n, "header row scanned");
                n
            })
            .sum();
        self.progress = Progress { processed: 0, total };
        total
    }
    /// Scan, resolve every label in (sheet, column) order and encode the result.
    ///
    /// `on_progress` is called after every written cell. Writes already made stay in
    /// `book` when the job fails or is cancelled.
    pub fn run<F: FnMut(Progress)>(&mut self, book: &mut Workbook, on_progress: F) -> Result<Vec<u8>> {
        let result = self.resolve_all(book, on_progress).and_then(|_| {
            write::encode(book).map_err(|e| Error::Processing(e.to_string()))
        });
        match &result {
            Ok(_) => {
                self.state = MappingState::Done;
                info!(mapped = self.progress.processed, "mapping complete");
            },
            Err(e) => {
                self.state = MappingState::Failed;
                warn!(error = %e, processed = self.progress.processed, "mapping failed");
            },
        }
        result
    }
    fn resolve_all<F: FnMut(Progress)>(&mut self, book: &mut Workbook, mut on_progress: F) -> Result<()> {
        self.config.validate()?;
        self.scan(book);
        self.state = MappingState::Resolving;
        let out_row = self.config.output_row as usize - 1;
        for sheet in book.sheets_mut() {
            let labels: Vec<(usize, String)> = header_cells(sheet, &self.config)
                .map(|(col, cell)| (col, label_text(cell)))
                .collect();
            for (col, label) in labels {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let value = match self.lookup.resolve(&label).filter(|id| !id.is_empty()) {
                    Some(id) => id,
                    None => {
                        debug!(sheet = sheet.name(), label = %label, "label not found");
                        self.config.not_found.clone()
                    },
                };
                sheet.set_cell(out_row, col, CellValue::String(value));
                self.progress.processed += 1;
                on_progress(self.progress);
            }
        }
        Ok(())
    }
}

/// Map the header labels of every sheet to ids and encode the result.
pub fn map_labels_to_ids<F: FnMut(Progress)>(
    mut workbook: Workbook,
    lookup: &dyn Lookup,
    config: &MappingConfig,
    cancel: &CancelToken,
    on_progress: F,
) -> Result<MappingOutput> {
    let mut job = MappingJob::new(lookup, config.clone()).with_cancel(cancel.clone());
    let bytes = job.run(&mut workbook, on_progress)?;
    Ok(MappingOutput {
        workbook,
        bytes,
        progress: job.progress(),
    })
}
