use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    ops::Bound,
    path::Path,
};

use crate::{
    fs::{FileId, FileType, ScratchDir},
    index::store::{IndexError, SpillStore},
};

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u32,
    checksum: u32,
}

/// Embedded sorted-file spill store.
///
/// Values are appended to a single data file in the scratch directory; an
/// in-memory map keeps key → (offset, len, crc32) in key order. Overwritten
/// slots leak file space, which is acceptable for a store that lives only
/// for the duration of one read and is deleted with the scratch directory.
pub(crate) struct SortedFileStore {
    file: File,
    end: u64,
    slots: BTreeMap<Vec<u8>, Slot>,
}

impl SortedFileStore {
    pub(crate) fn create(scratch: &ScratchDir) -> Result<Self, IndexError> {
        Self::open(&scratch.file_path(FileId::new(), FileType::SpillData))
    }

    fn open(path: &Path) -> Result<Self, IndexError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        Ok(Self {
            file,
            end: 0,
            slots: BTreeMap::new(),
        })
    }

    fn read_slot(&mut self, key: &[u8], slot: Slot) -> Result<Vec<u8>, IndexError> {
        let mut buf = vec![0; slot.len as usize];
        self.file.seek(SeekFrom::Start(slot.offset))?;
        self.file.read_exact(&mut buf)?;

        if crc32fast::hash(&buf) != slot.checksum {
            return Err(IndexError::Corrupt {
                key: String::from_utf8_lossy(key).into_owned(),
            });
        }
        Ok(buf)
    }
}

impl SpillStore for SortedFileStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), IndexError> {
        let offset = self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(value)?;
        self.end = offset + value.len() as u64;

        self.slots.insert(
            key.to_vec(),
            Slot {
                offset,
                len: value.len() as u32,
                checksum: crc32fast::hash(value),
            },
        );
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError> {
        match self.slots.get(key).copied() {
            None => Ok(None),
            Some(slot) => Ok(Some(self.read_slot(key, slot)?)),
        }
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError> {
        match self.slots.remove(key) {
            None => Ok(None),
            Some(slot) => Ok(Some(self.read_slot(key, slot)?)),
        }
    }

    fn scan_after(
        &mut self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IndexError> {
        let lower = match after {
            Some(after) => Bound::Excluded(after.to_vec()),
            None => Bound::Unbounded,
        };
        let keys: Vec<(Vec<u8>, Slot)> = self
            .slots
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(key, slot)| (key.clone(), *slot))
            .collect();

        let mut page = Vec::with_capacity(keys.len());
        for (key, slot) in keys {
            let value = self.read_slot(&key, slot)?;
            page.push((key, value));
        }
        Ok(page)
    }

    fn close(&mut self) -> Result<(), IndexError> {
        // The data file itself is removed with the scratch directory.
        self.slots.clear();
        Ok(())
    }
}
