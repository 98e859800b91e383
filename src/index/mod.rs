pub(crate) mod external;
pub(crate) mod sorted;
pub(crate) mod store;

use std::{collections::BTreeMap, io::Cursor, path::PathBuf};

pub use store::{IndexError, SpillBackend};
use store::SpillStore;

use crate::{
    fs::ScratchDir,
    index::{external::RedbStore, sorted::SortedFileStore},
    merge::RecordMerger,
    record::Record,
    serdes::{Decode, Encode},
};

/// Key → record map bounded by a memory budget.
///
/// Buffers log-block records (and tombstones) while folding competing
/// versions through the merge strategy. Once the approximate in-memory
/// footprint exceeds the configured threshold, every entry relocates to a
/// disk-backed store in the scratch directory and later operations hit the
/// store; callers observe no behavioral difference, only different latency.
pub struct RecordIndex {
    merger: RecordMerger,
    mem: BTreeMap<String, Record>,
    mem_size: usize,
    threshold: usize,
    scratch_root: PathBuf,
    backend: SpillBackend,
    spill: Option<Spill>,
    drain_cursor: Option<Vec<u8>>,
    closed: bool,
}

struct Spill {
    // Dropped before the scratch directory it lives in.
    store: Box<dyn SpillStore>,
    scratch: ScratchDir,
}

impl RecordIndex {
    pub fn new(
        merger: RecordMerger,
        threshold: usize,
        scratch_root: impl Into<PathBuf>,
        backend: SpillBackend,
    ) -> Self {
        Self {
            merger,
            mem: BTreeMap::new(),
            mem_size: 0,
            threshold,
            scratch_root: scratch_root.into(),
            backend,
            spill: None,
            drain_cursor: None,
            closed: false,
        }
    }

    /// Fold `record` into the entry currently held for its key, if any.
    pub fn upsert(&mut self, record: Record) -> Result<(), IndexError> {
        if self.closed {
            return Err(IndexError::Closed);
        }
        let key = record.key().to_string();

        if let Some(spill) = &mut self.spill {
            let existing = decode_slot(spill.store.get(key.as_bytes())?)?;
            let merged = self.merger.merge(existing.as_ref(), &record)?;
            spill.store.put(key.as_bytes(), &encode_record(&merged)?)?;
            return Ok(());
        }

        let merged = self.merger.merge(self.mem.get(&key), &record)?;
        let entry_size = key.len() + merged.size();
        if let Some(old) = self.mem.insert(key, merged) {
            self.mem_size -= old.key().len() + old.size();
        }
        self.mem_size += entry_size;

        if self.mem_size > self.threshold {
            self.promote()?;
        }
        Ok(())
    }

    /// Remove and return the pending entry for `key` so the base scan can
    /// merge against it without double-emitting it during drain. Tombstones
    /// are returned too; the caller decides what a tombstone suppresses.
    pub fn take(&mut self, key: &str) -> Result<Option<Record>, IndexError> {
        if self.closed {
            return Err(IndexError::Closed);
        }
        if let Some(spill) = &mut self.spill {
            return decode_slot(spill.store.remove(key.as_bytes())?);
        }

        match self.mem.remove(key) {
            None => Ok(None),
            Some(record) => {
                self.mem_size -= key.len() + record.size();
                Ok(Some(record))
            }
        }
    }

    /// Next page of surviving (non-tombstone) records in key order. Returns
    /// an empty page once the index is exhausted.
    pub fn drain_page(&mut self, limit: usize) -> Result<Vec<Record>, IndexError> {
        if self.closed {
            return Err(IndexError::Closed);
        }
        let mut page = Vec::new();

        if let Some(spill) = &mut self.spill {
            'scan: while page.len() < limit {
                let entries = spill.store.scan_after(self.drain_cursor.as_deref(), limit)?;
                if entries.is_empty() {
                    break;
                }
                for (key, buf) in entries {
                    if page.len() == limit {
                        break 'scan;
                    }
                    let record = Record::decode(&mut Cursor::new(buf))?;
                    self.drain_cursor = Some(key);
                    if !record.is_delete() {
                        page.push(record);
                    }
                }
            }
            return Ok(page);
        }

        while page.len() < limit {
            match self.mem.pop_first() {
                None => break,
                Some((_, record)) => {
                    if !record.is_delete() {
                        page.push(record);
                    }
                }
            }
        }
        Ok(page)
    }

    /// Release the spill store and its scratch directory. Idempotent; also
    /// performed on drop for abnormal termination paths.
    pub fn close(&mut self) -> Result<(), IndexError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.mem.clear();
        self.mem_size = 0;
        if let Some(mut spill) = self.spill.take() {
            spill.store.close()?;
            spill.scratch.close()?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    fn promote(&mut self) -> Result<(), IndexError> {
        let scratch = ScratchDir::create(&self.scratch_root)?;
        let mut store: Box<dyn SpillStore> = match self.backend {
            SpillBackend::SortedFile => Box::new(SortedFileStore::create(&scratch)?),
            SpillBackend::Redb => Box::new(RedbStore::create(&scratch)?),
        };
        tracing::debug!(
            entries = self.mem.len(),
            size = self.mem_size,
            backend = ?self.backend,
            "record index exceeded its memory budget, relocating to disk"
        );

        for (key, record) in std::mem::take(&mut self.mem) {
            store.put(key.as_bytes(), &encode_record(&record)?)?;
        }
        self.mem_size = 0;
        self.spill = Some(Spill { store, scratch });
        Ok(())
    }
}

fn encode_record(record: &Record) -> Result<Vec<u8>, IndexError> {
    let mut buf = Vec::with_capacity(Encode::size(record));
    record.encode(&mut buf)?;
    Ok(buf)
}

fn decode_slot(slot: Option<Vec<u8>>) -> Result<Option<Record>, IndexError> {
    match slot {
        None => Ok(None),
        Some(buf) => Ok(Some(Record::decode(&mut Cursor::new(buf))?)),
    }
}
