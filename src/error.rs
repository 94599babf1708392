use thiserror::Error;

/// Errors that abort a merge or mapping job.
///
/// Lookup failures are not part of this taxonomy: they are folded into the
/// "Not found" placeholder written into the sheet.
#[derive(Debug, Error)]
pub enum Error {
    /// malformed or unsupported spreadsheet input
    #[error("cannot read workbook: {0:#}")]
    Decode(anyhow::Error),

    /// the workbook model cannot be written as xlsx
    #[error("cannot write workbook: {0:#}")]
    Encode(anyhow::Error),

    #[error("no files to merge")]
    NoFiles,

    #[error("at least two files are required to merge, got {found}")]
    TooFewFiles { found: usize },

    /// unexpected failure while mapping, e.g. the output could not be encoded
    #[error("processing error: {0}")]
    Processing(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
