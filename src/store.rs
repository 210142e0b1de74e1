use crate::content::ContentData;
use crate::record::EventRecord;
use std::sync::Arc;

/// One position of a [`LogSnapshot`]: the record and whatever enrichment
/// outcome was known when the snapshot was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub record: Arc<EventRecord>,
    pub enrichment: Option<ContentData>,
}

/// An immutable, ordered copy of the event log.
///
/// Detached from the store it was taken from: later appends are not
/// visible through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSnapshot {
    entries: Vec<LogEntry>,
}

impl LogSnapshot {
    /// Build a snapshot of unenriched records, in the given order.
    pub fn from_records(records: impl IntoIterator<Item = EventRecord>) -> Self {
        LogSnapshot {
            entries: records
                .into_iter()
                .map(|record| LogEntry {
                    record: Arc::new(record),
                    enrichment: None,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only, arrival-ordered store of every delivered event.
///
/// Records are never deduplicated, mutated, or removed. Enrichment outcomes
/// live in a side table keyed by position, so the records themselves stay
/// exactly as delivered.
#[derive(Debug, Default)]
pub struct EventLogStore {
    records: Vec<Arc<EventRecord>>,
    enrichment: Vec<Option<ContentData>>,
}

impl EventLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its position.
    pub fn append(&mut self, record: EventRecord) -> usize {
        self.records.push(Arc::new(record));
        self.enrichment.push(None);
        self.records.len() - 1
    }

    /// Record the enrichment outcome for `position`.
    ///
    /// The first outcome wins; returns `false` if the position is out of
    /// range or already has one.
    pub fn record_enrichment(&mut self, position: usize, data: ContentData) -> bool {
        match self.enrichment.get_mut(position) {
            Some(slot @ None) => {
                *slot = Some(data);
                true
            }
            _ => false,
        }
    }

    /// Copy of the whole log.
    pub fn snapshot(&self) -> LogSnapshot {
        self.snapshot_prefix(self.records.len())
    }

    /// Copy of the first `len` records (clamped to the log length).
    pub fn snapshot_prefix(&self, len: usize) -> LogSnapshot {
        let len = len.min(self.records.len());
        LogSnapshot {
            entries: self.records[..len]
                .iter()
                .zip(&self.enrichment)
                .map(|(record, enrichment)| LogEntry {
                    record: Arc::clone(record),
                    enrichment: enrichment.clone(),
                })
                .collect(),
        }
    }

    pub fn get(&self, position: usize) -> Option<&EventRecord> {
        self.records.get(position).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
