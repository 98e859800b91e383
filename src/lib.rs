//! Merge-on-read file group reader.
//!
//! A file group in a merge-on-read table is one optional immutable base file
//! plus an ordered chain of delta log blocks recorded across successive
//! commits. [`FileGroupReader`] reconciles the two into a single
//! deduplicated, update-applied, delete-filtered stream of records per key:
//! log blocks are buffered into a memory-bounded, spill-to-disk record
//! index, then the base scan merges each record against its pending
//! log-side update, then the log-only leftovers drain.
//!
//! Binary parsing of the base columnar format and of log-block framing is
//! external: callers hand in a [`ReaderContext`] that decodes raw bytes
//! into [`Record`] streams.

mod fs;
mod serdes;

/// Spillable record index and its disk backends.
pub mod index;

/// Record merge strategies.
pub mod merge;

/// Reader configuration and the recognized property keys.
pub mod option;

/// Reader construction and the file-slice model.
pub mod reader;

/// Logical records, row payloads and the typed value comparator.
pub mod record;

/// Record streams produced by external decoders.
pub mod stream;

/// Commit ordering.
pub mod timestamp;

pub use crate::{
    index::{IndexError, RecordIndex, SpillBackend},
    merge::{CustomMerger, MergeMode, RecordMerger},
    option::{OptionError, ReaderOption},
    reader::{BaseFile, FileGroupReader, FileSlice, LogFile, ReadError, ReaderContext},
    record::{compare_values, Record, Row, Schema, Value, ValueError},
    stream::{RecordStream, SourceError},
    timestamp::CommitTime,
};
