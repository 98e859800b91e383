use std::io;

use thiserror::Error;

use crate::{record::ValueError, serdes::DecodeError};

/// Error raised by the spillable record index. Fatal to the index: nothing
/// is retried internally, the caller decides whether to re-instantiate the
/// reader.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("spill io error: {0}")]
    Io(#[from] io::Error),
    #[error("spill entry decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("corrupt spill entry for key {key}")]
    Corrupt { key: String },
    #[error("merge failed: {0}")]
    Merge(#[from] ValueError),
    #[error("spill database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("spill transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("spill table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("spill storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("spill commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("index already closed")]
    Closed,
}

/// Disk backend used once the record index exceeds its memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpillBackend {
    /// Embedded sorted-file store: one append-only data file plus an
    /// in-memory offset map, entries framed with crc32 checksums.
    SortedFile,
    /// External disk-backed map (redb).
    Redb,
}

/// Key/value capability backing the spilled half of the record index.
///
/// Keys are record keys as bytes; values are `Encode`d records. `scan_after`
/// pages through entries in ascending key order, which keeps the drain phase
/// memory-bounded.
pub(crate) trait SpillStore: Send {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), IndexError>;

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError>;

    fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, IndexError>;

    /// Up to `limit` entries with keys strictly greater than `after`
    /// (everything from the start when `after` is `None`), in key order.
    fn scan_after(
        &mut self,
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IndexError>;

    fn close(&mut self) -> Result<(), IndexError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::SpillStore;

    /// Shared contract checks run against both backends.
    pub(crate) fn store_contract(store: &mut dyn SpillStore) {
        assert_eq!(store.get(b"a").unwrap(), None);

        store.put(b"b", b"2").unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"c", b"3").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));

        // overwrite
        store.put(b"a", b"10").unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"10".to_vec()));

        // ordered paging
        let page = store.scan_after(None, 2).unwrap();
        assert_eq!(
            page,
            vec![
                (b"a".to_vec(), b"10".to_vec()),
                (b"b".to_vec(), b"2".to_vec())
            ]
        );
        let page = store.scan_after(Some(b"b"), 10).unwrap();
        assert_eq!(page, vec![(b"c".to_vec(), b"3".to_vec())]);

        assert_eq!(store.remove(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.remove(b"b").unwrap(), None);
        let page = store.scan_after(None, 10).unwrap();
        assert_eq!(page.len(), 2);

        store.close().unwrap();
    }
}
