use std::collections::HashMap;

#[cfg(feature = "http")]
mod dhis2;

#[cfg(feature = "http")]
pub use dhis2::{Dhis2Config, Dhis2Lookup};

/// Resolves a header label to an external id.
///
/// Implementations never fail: a transport error, an error status or an empty result are
/// all reported as `None`, and the mapping pipeline writes its placeholder instead.
pub trait Lookup {
    fn resolve(&self, label: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, label: &str) -> Option<String> {
        self(label)
    }
}

/// in-memory label -> id table, exact match
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    ids: HashMap<String, String>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, label: K, id: V) -> &mut Self {
        self.ids.insert(label.into(), id.into());
        self
    }
    pub fn len(&self) -> usize {
        self.ids.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl Lookup for StaticLookup {
    fn resolve(&self, label: &str) -> Option<String> {
        self.ids.get(label).cloned()
    }
}
