//! Append-only record table

use sandpile_core::Record;

/// Ordered, append-only sequence of avalanche records
///
/// Records are never deduplicated or modified once pushed. The column layout
/// is fixed by the record type ([`Record::COLUMNS`]).
#[derive(Debug, Clone)]
pub struct ResultCollector<R: Record> {
    records: Vec<R>,
}

impl<R: Record> ResultCollector<R> {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Create a collector with room for `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    /// Append a record
    pub fn push(&mut self, record: R) {
        self.records.push(record);
    }

    /// Number of records collected
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been collected
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in emission order
    pub fn as_slice(&self) -> &[R] {
        &self.records
    }

    /// Iterate records in emission order
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Column names of the collected record type
    pub fn columns(&self) -> &'static [&'static str] {
        R::COLUMNS
    }

    /// Hand the complete table to the caller
    pub fn finalize(self) -> Vec<R> {
        self.records
    }
}

impl<R: Record> Default for ResultCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Extend<R> for ResultCollector<R> {
    fn extend<I: IntoIterator<Item = R>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl<'a, R: Record> IntoIterator for &'a ResultCollector<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Capacity hint for a run of `iterations` emitting at `emission_rate`
///
/// Capped so that a pessimistic rate on a huge budget does not reserve
/// gigabytes up front; the vector still grows past the hint if needed.
pub fn expected_capacity(iterations: u64, emission_rate: f64) -> usize {
    const MAX_PREALLOCATED: u64 = 1 << 22;
    let rate = if emission_rate.is_finite() {
        emission_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((iterations as f64 * rate) as u64).min(MAX_PREALLOCATED) as usize
}
