use anyhow::anyhow;

use crate::scanner::Scanner;

struct Seeker {
    scanner: Scanner,
    offset: u64,
}

/// A set of read handles on the same input file, each registered near a
/// distinct region. Random reads are dispatched to the handle whose
/// registered offset is the greatest one not above the target, so that every
/// handle keeps seeking forward within its own region of the file.
///
/// Handles must be added ordered by offset, with the first one at offset 0.
pub(crate) struct SeekerPool {
    seekers: Vec<Seeker>,
}

impl SeekerPool {
    pub(crate) fn new() -> SeekerPool {
        SeekerPool {
            seekers: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, scanner: Scanner, offset: u64) {
        self.seekers.push(Seeker { scanner, offset });
    }

    pub(crate) fn len(&self) -> usize {
        self.seekers.len()
    }

    /// Drop every handle.
    pub(crate) fn clear(&mut self) {
        self.seekers.clear();
    }

    /// Read `length` bytes at `offset` through the nearest handle.
    pub(crate) fn read_at(&self, offset: u64, length: u32) -> Result<Vec<u8>, anyhow::Error> {
        let seeker = self
            .select(offset)
            .ok_or_else(|| anyhow!("seeker pool is empty"))?;
        Ok(seeker.scanner.read_at(offset, length)?)
    }

    // The seeker with the greatest registered offset that is <= offset, or
    // the first seeker when none qualifies.
    fn select(&self, offset: u64) -> Option<&Seeker> {
        for (i, seeker) in self.seekers.iter().enumerate() {
            if seeker.offset > offset {
                return if i == 0 {
                    self.seekers.first()
                } else {
                    self.seekers.get(i - 1)
                };
            }
        }
        self.seekers.last()
    }
}
