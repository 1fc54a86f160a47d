use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{anyhow, Context};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::record::IndexedRecord;

/// Keyed storage for spilled chunks. Values are CBOR-encoded and
/// gzip-compressed on the way in and reversed on the way out. Any I/O or
/// codec error propagates verbatim to the caller.
pub trait BlobStore {
    /// Encode, compress and persist `records` under `key`.
    fn put(&self, key: &str, records: &[IndexedRecord]) -> Result<(), anyhow::Error>;
    /// Load, decompress and decode the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<IndexedRecord>, anyhow::Error>;
    /// Remove every stored blob.
    fn erase_all(&self) -> Result<(), anyhow::Error>;
}

fn encode(key: &str, records: &[IndexedRecord], writer: impl Write) -> Result<(), anyhow::Error> {
    let mut encoder = GzEncoder::new(writer, Compression::default());
    ciborium::ser::into_writer(&records, &mut encoder)
        .map_err(|e| anyhow!("encode blob {}: {}", key, e))?;
    let mut inner = encoder
        .finish()
        .with_context(|| format!("compress blob {}", key))?;
    inner.flush()?;
    Ok(())
}

/// Blob store backed by an in-memory map. Puts serialise behind a write lock;
/// gets are permitted concurrently when no put is in flight.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> MemoryBlobStore {
        MemoryBlobStore {
            blobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        MemoryBlobStore::new()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, key: &str, records: &[IndexedRecord]) -> Result<(), anyhow::Error> {
        let mut compressed = Vec::new();
        encode(key, records, &mut compressed)?;
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert(key.to_string(), compressed);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<IndexedRecord>, anyhow::Error> {
        let blobs = self.blobs.read().unwrap();
        let compressed = blobs
            .get(key)
            .ok_or_else(|| anyhow!("no blob stored under key {}", key))?;
        let decoder = GzDecoder::new(compressed.as_slice());
        let records = ciborium::de::from_reader(decoder)
            .map_err(|e| anyhow!("decode blob {}: {}", key, e))?;
        Ok(records)
    }

    fn erase_all(&self) -> Result<(), anyhow::Error> {
        let mut blobs = self.blobs.write().unwrap();
        blobs.clear();
        Ok(())
    }
}

/// Blob store writing one file per blob under `basepath`. A key of the form
/// `A-B.chunk` maps to `<basepath>/A/B.chunk/A-B.chunk`; the nested layout
/// caps the number of files per directory.
pub struct DiskBlobStore {
    basepath: PathBuf,
}

impl DiskBlobStore {
    pub fn new<P: Into<PathBuf>>(basepath: P) -> Result<DiskBlobStore, anyhow::Error> {
        let basepath = basepath.into();
        fs::create_dir_all(&basepath)
            .with_context(|| format!("create blob directory {}", basepath.display()))?;
        Ok(DiskBlobStore { basepath })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut path = self.basepath.clone();
        for part in key.split('-') {
            path.push(part);
        }
        path.push(key);
        path
    }
}

impl BlobStore for DiskBlobStore {
    fn put(&self, key: &str, records: &[IndexedRecord]) -> Result<(), anyhow::Error> {
        let path = self.blob_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let file =
            File::create(&path).with_context(|| format!("create blob {}", path.display()))?;
        encode(key, records, BufWriter::new(file))
    }

    fn get(&self, key: &str) -> Result<Vec<IndexedRecord>, anyhow::Error> {
        let path = self.blob_path(key);
        let file = File::open(&path).with_context(|| format!("open blob {}", path.display()))?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let records = ciborium::de::from_reader(decoder)
            .map_err(|e| anyhow!("decode blob {}: {}", key, e))?;
        Ok(records)
    }

    fn erase_all(&self) -> Result<(), anyhow::Error> {
        if self.basepath.exists() {
            fs::remove_dir_all(&self.basepath)
                .with_context(|| format!("erase {}", self.basepath.display()))?;
        }
        fs::create_dir_all(&self.basepath)
            .with_context(|| format!("create blob directory {}", self.basepath.display()))?;
        Ok(())
    }
}
