//! Device registry — the name-keyed result of one discovery session.
//!
//! Both discovery paths (streamed detections and the final scan batch) write
//! into the same registry through [`DeviceRegistry::admit`], which applies the
//! admission filter. Iteration follows first-insertion order so that "first
//! match" is deterministic.

use std::collections::HashMap;

use crate::device::DeviceRecord;
use crate::error::ValidationError;

/// Outcome of offering a record to the registry.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// A new name was added.
    Inserted,
    /// An existing name was overwritten in place.
    Updated,
    /// The record failed the admission filter and was dropped.
    Rejected(ValidationError),
}

/// Mapping from advertised name to [`DeviceRecord`].
///
/// Never contains an empty name or the `"Unknown"` placeholder.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `record`, keyed by its name.
    ///
    /// The last write for a given name wins but keeps the position of the
    /// first insertion.
    pub fn admit(&mut self, record: DeviceRecord) -> Admission {
        if let Err(reason) = record.validate() {
            return Admission::Rejected(reason);
        }
        if let Some(&pos) = self.index.get(&record.name) {
            self.records[pos] = record;
            return Admission::Updated;
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        Admission::Inserted
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DeviceRecord> {
        self.index.get(name).map(|&pos| &self.records[pos])
    }

    /// Iterate records in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter()
    }

    /// Iterate names in first-insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a DeviceRegistry {
    type Item = &'a DeviceRecord;
    type IntoIter = std::slice::Iter<'a, DeviceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
