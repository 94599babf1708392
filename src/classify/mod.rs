use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// start row used when no rule matches a file name
pub const DEFAULT_START_ROW: u32 = 8;

/// built-in table: label, pattern, 1-based start row. Order matters, first match wins.
pub const FILE_PATTERNS: &[(&str, &str, u32)] = &[
    ("MDS", "MDS", 9),
    ("DAH", "DAH", 9),
    ("TB1", "TB1", 7),
    ("TB4", "TB4", 12),
];

lazy_static! {
    static ref DEFAULT_CLASSIFIER: Classifier = Classifier::builtin();
}

/// one file name rule
#[derive(Debug, Clone)]
pub struct FilePattern {
    label: String,
    pattern: Regex,
    start_row: u32,
}

impl FilePattern {
    /// `pattern` is a regular expression matched case-insensitively anywhere in the file name
    pub fn new<S: Into<String>>(label: S, pattern: &str, start_row: u32) -> Result<Self> {
        let label = label.into();
        if start_row == 0 {
            return Err(Error::Config(format!("rule {}: start row starts from 1", label)));
        }
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("rule {}: {}", label, e)))?;
        Ok(Self { label, pattern, start_row })
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
    pub fn start_row(&self) -> u32 {
        self.start_row
    }
    pub fn is_match(&self, filename: &str) -> bool {
        self.pattern.is_match(filename)
    }
}

/// Maps a file name to the first row (1-based) of its data to append when merging.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<FilePattern>,
    default_start_row: u32,
}

#[derive(Deserialize)]
struct RuleDef {
    label: String,
    pattern: String,
    start_row: u32,
}

#[derive(Deserialize)]
struct TableDef {
    rules: Vec<RuleDef>,
    #[serde(default = "default_start_row")]
    default_start_row: u32,
}

fn default_start_row() -> u32 {
    DEFAULT_START_ROW
}

impl Classifier {
    fn builtin() -> Self {
        let rules = FILE_PATTERNS
            .iter()
            .filter_map(|&(label, pattern, start_row)| FilePattern::new(label, pattern, start_row).ok())
            .collect();
        Self { rules, default_start_row: DEFAULT_START_ROW }
    }
    pub fn from_rules(rules: Vec<FilePattern>, default_start_row: u32) -> Result<Self> {
        if default_start_row == 0 {
            return Err(Error::Config("default start row starts from 1".into()));
        }
        Ok(Self { rules, default_start_row })
    }
    /// Load a table such as
    /// `{"rules": [{"label": "MDS", "pattern": "MDS", "start_row": 9}], "default_start_row": 8}`.
    pub fn from_json(text: &str) -> Result<Self> {
        let def: TableDef = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("pattern table: {}", e)))?;
        let rules = def
            .rules
            .into_iter()
            .map(|r| FilePattern::new(r.label, &r.pattern, r.start_row))
            .collect::<Result<Vec<_>>>()?;
        Self::from_rules(rules, def.default_start_row)
    }
    pub fn rules(&self) -> &[FilePattern] {
        &self.rules
    }
    pub fn default_start_row(&self) -> u32 {
        self.default_start_row
    }
    /// start row of the first rule matching `filename`, or the default
    pub fn classify(&self, filename: &str) -> u32 {
        match self.rules.iter().find(|r| r.is_match(filename)) {
            Some(rule) => {
                debug!(filename, rule = rule.label(), start_row = rule.start_row, "file classified");
                rule.start_row
            },
            None => self.default_start_row,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

/// classify with the built-in table
pub fn classify(filename: &str) -> u32 {
    DEFAULT_CLASSIFIER.classify(filename)
}
