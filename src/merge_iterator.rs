use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Context;

use crate::blob_store::BlobStore;
use crate::record::{IndexedRecord, KeyOrder};

// Walks the chunks of a single run in order, holding at most one decoded
// chunk in memory. The head is the record the run currently offers to the
// tournament.
pub(crate) struct RunIterator {
    store: Arc<dyn BlobStore>,
    chunks: Vec<String>,
    next_chunk: usize,
    records: std::vec::IntoIter<IndexedRecord>,
    head: Option<IndexedRecord>,
}

impl RunIterator {
    pub(crate) fn new(store: Arc<dyn BlobStore>, chunks: Vec<String>) -> RunIterator {
        RunIterator {
            store,
            chunks,
            next_chunk: 0,
            records: Vec::new().into_iter(),
            head: None,
        }
    }

    // Move the head to the next record, loading the next chunk when the
    // current one is exhausted. A cleared head means the run is done.
    fn advance(&mut self) -> Result<(), anyhow::Error> {
        loop {
            if let Some(record) = self.records.next() {
                self.head = Some(record);
                return Ok(());
            }
            if self.next_chunk >= self.chunks.len() {
                self.head = None;
                return Ok(());
            }
            let key = &self.chunks[self.next_chunk];
            let records = self
                .store
                .get(key)
                .with_context(|| format!("load chunk {}", key))?;
            self.next_chunk += 1;
            self.records = records.into_iter();
        }
    }
}

/// Tournament over the sorted runs of a spill. Every run contributes its head
/// record; each step yields the smallest head, refilling that run, and drops
/// runs as they dry up. Ties go to the run that was spilled first, which
/// keeps the overall order stable.
pub struct MergeIterator {
    runs: Vec<RunIterator>,
    current: usize,
    started: bool,
    key_order: KeyOrder,
}

impl MergeIterator {
    pub(crate) fn new(runs: Vec<RunIterator>, key_order: KeyOrder) -> MergeIterator {
        MergeIterator {
            runs,
            current: 0,
            started: false,
            key_order,
        }
    }

    fn select_current(&mut self) {
        let mut current = 0;
        for i in 1..self.runs.len() {
            let candidate = self.runs[i].head.as_ref().unwrap();
            let smallest = self.runs[current].head.as_ref().unwrap();
            if (self.key_order)(&candidate.key, &smallest.key) == Ordering::Less {
                current = i;
            }
        }
        self.current = current;
    }
}

impl Iterator for MergeIterator {
    type Item = Result<IndexedRecord, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            for run in self.runs.iter_mut() {
                if let Err(e) = run.advance() {
                    return Some(Err(e));
                }
            }
            self.runs.retain(|run| run.head.is_some());
        } else {
            if self.runs.is_empty() {
                return None;
            }
            match self.runs[self.current].advance() {
                Err(e) => return Some(Err(e)),
                Ok(()) => {
                    if self.runs[self.current].head.is_none() {
                        self.runs.remove(self.current);
                    }
                }
            }
        }

        if self.runs.is_empty() {
            return None;
        }
        self.select_current();
        Some(Ok(self.runs[self.current].head.clone().unwrap()))
    }
}

/// Iterator over all indexed records in total key order, either walking the
/// kept in-memory vector or merging disk-resident runs.
pub enum SortedIterator<'a> {
    InMemory(std::slice::Iter<'a, IndexedRecord>),
    Merge(MergeIterator),
}

impl<'a> Iterator for SortedIterator<'a> {
    type Item = Result<IndexedRecord, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SortedIterator::InMemory(records) => records.next().map(|record| Ok(record.clone())),
            SortedIterator::Merge(merge) => merge.next(),
        }
    }
}
