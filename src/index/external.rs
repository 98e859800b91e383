use std::ops::Bound;

use redb::{Database, TableDefinition};

use crate::{
    fs::{FileId, FileType, ScratchDir},
    index::store::{IndexError, SpillStore},
};

const SPILL_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("spill");

/// External disk-backed map variant of the spill store, backed by an
/// embedded redb database in the scratch directory.
pub(crate) struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub(crate) fn create(scratch: &ScratchDir) -> Result<Self, IndexError> {
        let db = Database::create(scratch.file_path(FileId::new(), FileType::SpillDb))?;

        // Materialize the table so reads before the first put see it.
        let txn = db.begin_write()?;
        txn.open_table(SPILL_TABLE)?;
        txn.commit()?;

        Ok(Self { db })
    }
}

impl SpillStore for RedbStore {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), IndexError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SPILL_TABLE)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SPILL_TABLE)?;

        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SPILL_TABLE)?;
            // The access guard borrows the table; detach the bytes before
            // the table goes out of scope.
            let removed = table.remove(key)?.map(|guard| guard.value().to_vec());
            removed
        };
        txn.commit()?;

        Ok(removed)
    }

    fn scan_after(
        &mut self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IndexError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SPILL_TABLE)?;
        let range = match after {
            Some(after) => table.range::<&[u8]>((Bound::Excluded(after), Bound::Unbounded))?,
            None => table.range::<&[u8]>(..)?,
        };

        let mut page = Vec::new();
        for entry in range.take(limit) {
            let (key, value) = entry?;
            page.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(page)
    }

    fn close(&mut self) -> Result<(), IndexError> {
        // The database file is removed with the scratch directory.
        Ok(())
    }
}
