use std::slice::Iter;

use crate::{id::Tag, unit::StandardUnit};

/// A single flattened, named numeric value ready to be sent to a backend.
///
/// The value of a `Record` is never NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    name: String,
    unit: StandardUnit,
    timestamp: u64,
    value: f64,
    tags: Vec<Tag>,
}

impl Record {
    /// Creates a new `Record`.
    ///
    /// Returns `None` if `value` is NaN.
    pub fn new(
        name: String,
        unit: StandardUnit,
        timestamp: u64,
        value: f64,
        tags: Vec<Tag>,
    ) -> Option<Self> {
        if value.is_nan() {
            return None;
        }

        Some(Record { name, unit, timestamp, value, tags })
    }

    /// Qualified name of this record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of this record.
    pub fn unit(&self) -> StandardUnit {
        self.unit
    }

    /// Timestamp of this record, in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Value of this record.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Tags of this record.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// An ordered, non-empty group of records sent to a backend in a single call.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Creates a batch from a non-empty list of records.
    pub(crate) fn new(records: Vec<Record>) -> Self {
        debug_assert!(!records.is_empty(), "batches must not be empty");
        Batch { records }
    }

    /// Number of records in this batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false`: batches are never empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in this batch.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterates over the records in this batch.
    pub fn iter(&self) -> Iter<'_, Record> {
        self.records.iter()
    }

    /// Consumes the batch, returning its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
