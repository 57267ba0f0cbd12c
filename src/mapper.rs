//! Field renaming between external records and directory attributes.

use std::collections::BTreeMap;

use crate::entry::Entry;
use crate::error::{Error, Result};

/// Conversion direction of [`FieldMapper::convert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// External record to directory attributes.
    ToDirectory,
    /// Directory attributes to external record.
    ToExternal,
}

/// Strict projection through the configured mapping table.
///
/// Fields absent from the table are dropped.
#[derive(Clone, Debug, Default)]
pub struct FieldMapper<'a> {
    mapping: Option<&'a BTreeMap<String, String>>,
}

impl<'a> FieldMapper<'a> {
    /// Create a new [`FieldMapper`] over `directory attribute -> field`.
    pub fn new(mapping: Option<&'a BTreeMap<String, String>>) -> Self {
        Self { mapping }
    }

    /// Rename `record` fields following `direction`.
    pub fn convert(&self, record: &Entry, direction: Direction) -> Result<Entry> {
        let mapping = self.mapping.ok_or_else(|| {
            Error::Configuration("no field mapping configured".into())
        })?;

        let mut out = Entry::new();
        for (attribute, field) in mapping {
            let (from, to) = match direction {
                Direction::ToExternal => (attribute, field),
                Direction::ToDirectory => (field, attribute),
            };

            if let Some(value) = record.get(from) {
                out.insert(to.clone(), value.clone());
            }
        }

        Ok(out)
    }

    /// Rename directory attributes to external fields.
    pub fn to_external(&self, record: &Entry) -> Result<Entry> {
        self.convert(record, Direction::ToExternal)
    }

    /// Rename external fields to directory attributes.
    pub fn to_directory(&self, record: &Entry) -> Result<Entry> {
        self.convert(record, Direction::ToDirectory)
    }
}
