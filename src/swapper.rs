use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};

use crate::blob_store::{BlobStore, DiskBlobStore, MemoryBlobStore};
use crate::memory_probe::{FixedMemoryProbe, MemoryProbe, ResidentMemoryProbe};
use crate::merge_iterator::{MergeIterator, RunIterator, SortedIterator};
use crate::record::{default_key_order, IndexedRecord, KeyOrder};

// Allocation growth factor of a full vector, cf. Vec reallocation.
const ALLOC_RATIO: f64 = 1.25;
// Reserved memory (~200MB) for internal stuff.
const RESERVED_MEMORY: u64 = 200 << 20;

/// Customisable chunk sizing. Receives the number of records in the spilled
/// vector and returns the number of records per chunk.
pub type ChunkSize = Box<dyn Fn(usize) -> usize>;

// One spill. The run's records are sorted across its chunks; the first key of
// chunk k+1 is >= the last key of chunk k.
struct Run {
    chunks: Vec<String>,
}

/// Dumps the in-memory index to a [`BlobStore`] when the configured memory
/// limit is reached, and merges the resulting runs back into one sorted
/// iterator.
///
/// A swapper built with [`Swapper::null`] has no memory limit. It never
/// spills and serves the merge from the vector stashed with
/// [`Swapper::keep_without_spill`].
pub struct Swapper {
    limit: Option<u64>,
    store: Arc<dyn BlobStore>,
    probe: Arc<dyn MemoryProbe>,
    chunk_size: ChunkSize,
    key_order: KeyOrder,
    runs: Vec<Run>,
    kept: Vec<IndexedRecord>,
}

impl Swapper {
    /// A swapper without a memory limit.
    pub fn null() -> Swapper {
        Swapper {
            limit: None,
            store: Arc::new(MemoryBlobStore::new()),
            probe: Arc::new(FixedMemoryProbe::new(0)),
            chunk_size: Box::new(|_| 1),
            key_order: default_key_order,
            runs: Vec::new(),
            kept: Vec::new(),
        }
    }

    /// A swapper that spills to `basepath` when the resident memory of the
    /// process approaches `limit` bytes. Starts a background
    /// [`ResidentMemoryProbe`] that lives as long as the swapper.
    pub fn new<P: Into<PathBuf>>(limit: u64, basepath: P) -> Result<Swapper, anyhow::Error> {
        let store = DiskBlobStore::new(basepath)?;
        Ok(Swapper {
            limit: Some(limit.saturating_sub(RESERVED_MEMORY)),
            store: Arc::new(store),
            probe: Arc::new(ResidentMemoryProbe::start()),
            chunk_size: default_chunk_size(limit),
            key_order: default_key_order,
            runs: Vec::new(),
            kept: Vec::new(),
        })
    }

    /// Replace the blob store.
    pub fn with_store(&mut self, store: Arc<dyn BlobStore>) {
        self.store = store;
    }

    /// Replace the memory probe.
    pub fn with_probe(&mut self, probe: Arc<dyn MemoryProbe>) {
        self.probe = probe;
    }

    /// Replace the chunk sizing function.
    pub fn with_chunk_size(&mut self, chunk_size: ChunkSize) {
        self.chunk_size = chunk_size;
    }

    /// Replace the key comparison function.
    pub fn with_key_order(&mut self, key_order: KeyOrder) {
        self.key_order = key_order;
    }

    /// True when the memory limit is about to be reached: the vector is at
    /// capacity, so the next append reallocates, and either the current
    /// resident memory or its projected next allocation exceeds the limit.
    pub fn should_spill(&self, records: &Vec<IndexedRecord>) -> bool {
        let limit = match self.limit {
            None => return false,
            Some(limit) => limit,
        };

        if records.len() == records.capacity() {
            let resident = self.probe.current_resident_bytes();
            return resident >= limit || (resident as f64 * ALLOC_RATIO) as u64 >= limit;
        }

        false
    }

    /// True when at least one run has been spilled.
    pub fn has_spilled(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Number of spilled runs.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Sort `records` by key and write them out as the chunks of a new run.
    pub fn spill(&mut self, records: &mut [IndexedRecord]) -> Result<(), anyhow::Error> {
        if self.limit.is_none() || records.is_empty() {
            return Ok(());
        }

        let key_order = self.key_order;
        records.sort_by(|a, b| key_order(&a.key, &b.key));

        let chunk_size = (self.chunk_size)(records.len()).max(1);
        let run_id = self.runs.len();
        let mut chunks = Vec::with_capacity(records.len() / chunk_size + 1);
        for (chunk_id, chunk) in records.chunks(chunk_size).enumerate() {
            let key = format!("{}-{}.chunk", run_id, chunk_id);
            self.store
                .put(&key, chunk)
                .with_context(|| format!("spill run {}", run_id))?;
            chunks.push(key);
        }
        log::debug!(
            "Spilled run {}, {} chunks, {} records",
            run_id,
            chunks.len(),
            records.len()
        );
        self.runs.push(Run { chunks });
        Ok(())
    }

    /// Stash the final in-memory vector as the sole source for the merge
    /// iterator. Only valid while nothing has been spilled.
    pub fn keep_without_spill(
        &mut self,
        records: Vec<IndexedRecord>,
    ) -> Result<(), anyhow::Error> {
        if self.has_spilled() {
            return Err(anyhow!(
                "keep_without_spill called after a spill has occurred"
            ));
        }
        self.kept = records;
        Ok(())
    }

    /// An iterator over all records in total key order.
    pub fn merge_iterator(&self) -> SortedIterator<'_> {
        if self.limit.is_none() || !self.has_spilled() {
            return SortedIterator::InMemory(self.kept.iter());
        }
        let runs = self
            .runs
            .iter()
            .map(|run| RunIterator::new(Arc::clone(&self.store), run.chunks.clone()))
            .collect();
        SortedIterator::Merge(MergeIterator::new(runs, self.key_order))
    }

    /// Remove all spilled data from the store.
    pub fn erase_all(&self) -> Result<(), anyhow::Error> {
        self.store.erase_all()
    }
}

// The calibration constant K is the ratio between the memory limit times the
// number of indexed records and the wanted chunk size; at a 1 GiB limit a
// 4,140,032-record index yields chunks of about 500,000 records.
fn default_chunk_size(limit: u64) -> ChunkSize {
    let k = ((1u64 << 30) * 4_140_032 / 500_000) as f64;
    let l = limit as f64;
    Box::new(move |records: usize| (records as f64 * l / k) as usize + 1)
}
