use tracing::{debug, info};

use crate::{
    book::{Sheet, Workbook},
    classify::Classifier,
    error::{Error, Result},
    write,
};

/// Merge workbooks with the built-in file name table.
///
/// See [`merge_with`].
pub fn merge(workbooks: &[Workbook]) -> Result<Workbook> {
    merge_with(workbooks, &Classifier::default())
}

/// Merge same-position sheets of `workbooks` into one workbook.
///
/// The first workbook is the base: its sheets, their names and their order make the
/// output. Every sheet is flattened from its used range (see [`Sheet::used_rows`]), so
/// the output starts at A1. For every later workbook that has a sheet at the same index,
/// its used rows from `classifier.classify(name)` (1-based, counted from the first used
/// row) onward are appended. Sheets that only exist in later workbooks are dropped. The
/// result keeps the base's file name.
pub fn merge_with(workbooks: &[Workbook], classifier: &Classifier) -> Result<Workbook> {
    let (base, others) = workbooks.split_first().ok_or(Error::NoFiles)?;

    let mut merged = Workbook::new(base.name());
    for (index, base_sheet) in base.sheets().iter().enumerate() {
        let mut sheet = Sheet::with_rows(base_sheet.name(), base_sheet.used_rows());
        for other in others {
            if let Some(other_sheet) = other.sheet(index) {
                let start_row = classifier.classify(other.name());
                let skip = start_row.saturating_sub(1) as usize;
                let before = sheet.row_count();
                sheet.extend_rows(other_sheet.used_rows().into_iter().skip(skip));
                debug!(
                    sheet = base_sheet.name(),
                    file = other.name(),
                    start_row,
                    appended = sheet.row_count() - before,
                    "rows appended"
                );
            }
        }
        merged.push_sheet(sheet);
    }
    info!(files = workbooks.len(), sheets = merged.sheets().len(), "workbooks merged");
    Ok(merged)
}

/// queued merge inputs and the output file name
#[derive(Debug, Clone, Default)]
pub struct MergeJob {
    output_name: String,
    workbooks: Vec<Workbook>,
}

/// merged workbook ready for download
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// output name with the `.xlsx` extension
    pub file_name: String,
    pub workbook: Workbook,
    pub bytes: Vec<u8>,
}

impl MergeJob {
    pub fn new<S: Into<String>>(output_name: S) -> Self {
        Self {
            output_name: output_name.into(),
            workbooks: vec![],
        }
    }
    /// queue a decoded workbook; the first one pushed is the base
    pub fn push(&mut self, workbook: Workbook) -> &mut Self {
        self.workbooks.push(workbook);
        self
    }
    pub fn len(&self) -> usize {
        self.workbooks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.workbooks.is_empty()
    }
    pub fn workbooks(&self) -> &[Workbook] {
        &self.workbooks
    }
    /// file name of the output, `.xlsx` appended unless already present
    pub fn file_name(&self) -> String {
        if self.output_name.to_ascii_lowercase().ends_with(".xlsx") {
            self.output_name.clone()
        } else {
            format!("{}.xlsx", self.output_name)
        }
    }
    /// Merging only makes sense with two files or more.
    pub fn validate(&self) -> Result<()> {
        match self.workbooks.len() {
            0 => Err(Error::NoFiles),
            1 => Err(Error::TooFewFiles { found: 1 }),
            _ => Ok(()),
        }
    }
    /// merge and encode
    pub fn run(&self, classifier: &Classifier) -> Result<MergeOutput> {
        let file_name = self.file_name();
        let workbook = merge_with(&self.workbooks, classifier)?.named(file_name.as_str());
        let bytes = write::encode(&workbook)?;
        Ok(MergeOutput { file_name, workbook, bytes })
    }
}
