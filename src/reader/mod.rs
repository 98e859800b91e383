use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    vec,
};

use futures_core::{ready, Stream};
use futures_util::StreamExt;
use pin_project_lite::pin_project;
use thiserror::Error;

use crate::{
    index::{IndexError, RecordIndex},
    merge::{CustomMerger, MergeMode, RecordMerger},
    option::{OptionError, ReaderOption},
    record::{Record, Schema, Value, ValueError},
    stream::{ScanStream, SourceError},
    timestamp::CommitTime,
};

/// Entries drained from the record index per page during the log-only phase.
const DRAIN_PAGE: usize = 256;

#[derive(Debug, Error)]
pub enum ReadError {
    /// A malformed or truncated log block aborts the whole read: silently
    /// dropping updates would corrupt the merge invariant.
    #[error("corrupt log block in {file}: {source}")]
    CorruptLogBlock {
        file: String,
        #[source]
        source: SourceError,
    },
    #[error("corrupt base file {file}: {source}")]
    CorruptBaseFile {
        file: String,
        #[source]
        source: SourceError,
    },
    #[error("byte range [{start}, {end}) was requested but the file slice has no base file")]
    MissingBaseFile { start: u64, end: u64 },
    #[error("log blocks out of commit order: {prev} then {next}")]
    OutOfOrderLogBlock { prev: CommitTime, next: CommitTime },
    #[error("reader is not initialized")]
    Uninitialized,
    #[error("reader is already initialized")]
    AlreadyInitialized,
    #[error("value error: {0}")]
    Value(#[from] ValueError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("option error: {0}")]
    Option(#[from] OptionError),
}

/// Immutable columnar base file of a file slice. Decoding is external; the
/// reader only carries the path (for error attribution) and the length
/// (default scan range).
#[derive(Debug, Clone)]
pub struct BaseFile {
    pub path: String,
    pub file_len: u64,
}

/// One commit-stamped delta log file.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: String,
    pub commit: CommitTime,
}

/// A base file plus the log files applicable as of one commit: one
/// consistent snapshot of a file group. All records across the base file
/// and the log blocks share the same partition and logical key space.
#[derive(Debug, Clone, Default)]
pub struct FileSlice {
    pub base: Option<BaseFile>,
    pub logs: Vec<LogFile>,
    /// Values for the configured partition fields, reinjected into payload
    /// slots that storage stripped.
    pub partition_values: Vec<Value>,
}

/// External collaborator that decodes raw bytes into records.
pub trait ReaderContext: Send + Sync {
    /// Record stream for the base-file byte range `(start, length)`.
    fn scan_base(
        &self,
        base: &BaseFile,
        range: (u64, u64),
        projected: bool,
    ) -> Result<crate::stream::RecordStream, ReadError>;

    /// Record stream over one log block, in block order.
    fn scan_log(&self, log: &LogFile) -> Result<crate::stream::RecordStream, ReadError>;
}

enum ReaderState {
    Initializing,
    ScanningBase { inner: ScanStream },
    Draining { page: vec::IntoIter<Record> },
    Exhausted,
}

pin_project! {
    /// Merges one file slice into a single forward-only stream of records.
    ///
    /// Phases: buffer every log block into the spillable record index (a
    /// later block can override an earlier one regardless of base order, so
    /// this completes before any output), then scan the base-file byte range
    /// merging each record against its pending log-side update, then drain
    /// the log-only leftovers. Not restartable and not safe for concurrent
    /// pulls; re-scanning requires a new instance.
    pub struct FileGroupReader {
        context: Arc<dyn ReaderContext>,
        slice: FileSlice,
        option: ReaderOption,
        merger: RecordMerger,
        index: RecordIndex,
        ordering_index: Option<usize>,
        partition_slots: Vec<(usize, Value)>,
        state: ReaderState,
    }
}

impl FileGroupReader {
    pub fn new(
        context: Arc<dyn ReaderContext>,
        slice: FileSlice,
        schema: &Schema,
        option: ReaderOption,
        custom_merger: Option<CustomMerger>,
    ) -> Result<Self, ReadError> {
        let base_requested = option.contains_base_file
            || option.range.map_or(false, |(_, length)| length > 0);
        let base_present = option.contains_base_file && slice.base.is_some();
        if base_requested && !base_present {
            let (start, length) = option.range.unwrap_or((0, 0));
            return Err(ReadError::MissingBaseFile {
                start,
                end: start + length,
            });
        }

        for pair in slice.logs.windows(2) {
            if pair[1].commit <= pair[0].commit {
                return Err(ReadError::OutOfOrderLogBlock {
                    prev: pair[0].commit,
                    next: pair[1].commit,
                });
            }
        }

        let merger = match option.merge_mode {
            MergeMode::OverwriteWithLatest => RecordMerger::OverwriteWithLatest,
            MergeMode::EventTimeOrdering => RecordMerger::EventTimeOrdering,
            MergeMode::Custom => RecordMerger::Custom(
                custom_merger.ok_or(OptionError::MissingCustomMerger)?,
            ),
        };

        let ordering_index = match &option.ordering_field {
            Some(field) => Some(
                schema
                    .index_of(field)
                    .ok_or_else(|| OptionError::UnknownField(field.clone()))?,
            ),
            None => None,
        };

        let partition_slots = option
            .partition_fields
            .iter()
            .zip(slice.partition_values.iter().cloned())
            .map(|(field, value)| {
                let index = schema
                    .index_of(field)
                    .ok_or_else(|| OptionError::UnknownField(field.clone()))?;
                Ok((index, value))
            })
            .collect::<Result<Vec<_>, OptionError>>()?;

        let index = RecordIndex::new(
            merger.clone(),
            option.memory_threshold,
            &option.scratch_dir,
            option.spill_backend,
        );

        Ok(Self {
            context,
            slice,
            option,
            merger,
            index,
            ordering_index,
            partition_slots,
            state: ReaderState::Initializing,
        })
    }

    /// Buffer every log block in ascending commit order, then position the
    /// reader at the start of the base scan. Must be called exactly once
    /// before pulling records.
    pub async fn init(&mut self) -> Result<(), ReadError> {
        if !matches!(self.state, ReaderState::Initializing) {
            return Err(ReadError::AlreadyInitialized);
        }

        let logs = self.slice.logs.clone();
        let ordering_index = self.ordering_index;
        tracing::debug!(
            logs = logs.len(),
            strategy = ?self.option.merger_strategy,
            mode = %self.option.merge_mode,
            "buffering log blocks"
        );
        for log in &logs {
            let mut stream = ScanStream::log(log.path.clone(), self.context.scan_log(log)?);
            while let Some(record) = stream.next().await {
                let record = match record {
                    Ok(record) => record,
                    Err(err) => {
                        tracing::error!(file = %log.path, %err, "log block scan aborted");
                        return Err(err);
                    }
                };
                let record = resolve_ordering(ordering_index, record);
                self.index.upsert(record)?;
            }
        }

        self.state = match (self.option.contains_base_file, &self.slice.base) {
            (true, Some(base)) => {
                let range = self.option.range.unwrap_or((0, base.file_len));
                tracing::debug!(file = %base.path, ?range, "scanning base file");
                let inner = self
                    .context
                    .scan_base(base, range, self.option.projected)?;
                ReaderState::ScanningBase {
                    inner: ScanStream::base(base.path.clone(), inner),
                }
            }
            // Validated in new(): no base means no byte-range request.
            _ => ReaderState::Draining {
                page: Vec::new().into_iter(),
            },
        };
        Ok(())
    }

    /// Release the record index and its scratch directory. Idempotent and
    /// safe to call mid-scan; further pulls yield end-of-sequence.
    pub fn close(&mut self) -> Result<(), ReadError> {
        self.state = ReaderState::Exhausted;
        self.index.close()?;
        Ok(())
    }
}

impl Stream for FileGroupReader {
    type Item = Result<Record, ReadError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        loop {
            match this.state {
                ReaderState::Initializing => {
                    // Terminal so a caller looping on next() cannot spin.
                    *this.state = ReaderState::Exhausted;
                    return Poll::Ready(Some(Err(ReadError::Uninitialized)));
                }
                ReaderState::ScanningBase { inner } => {
                    match ready!(Pin::new(inner).poll_next(cx)) {
                        Some(Ok(base_record)) => {
                            let base_record =
                                resolve_ordering(*this.ordering_index, base_record);
                            let pending = match this.index.take(base_record.key()) {
                                Ok(pending) => pending,
                                Err(err) => {
                                    *this.state = ReaderState::Exhausted;
                                    return Poll::Ready(Some(Err(err.into())));
                                }
                            };
                            // The base record reflects the state before the
                            // earliest log block, so it plays the `existing`
                            // role against the pending log-side update.
                            let merged = match pending {
                                None => base_record,
                                Some(pending) => {
                                    match this.merger.merge(Some(&base_record), &pending) {
                                        Ok(merged) => merged,
                                        Err(err) => {
                                            *this.state = ReaderState::Exhausted;
                                            return Poll::Ready(Some(Err(err.into())));
                                        }
                                    }
                                }
                            };
                            if merged.is_delete() {
                                continue;
                            }
                            return Poll::Ready(Some(Ok(reinject(this.partition_slots, merged))));
                        }
                        Some(Err(err)) => {
                            tracing::error!(%err, "base scan aborted");
                            *this.state = ReaderState::Exhausted;
                            return Poll::Ready(Some(Err(err)));
                        }
                        None => {
                            tracing::debug!("base scan exhausted, draining log-only records");
                            *this.state = ReaderState::Draining {
                                page: Vec::new().into_iter(),
                            };
                        }
                    }
                }
                ReaderState::Draining { page } => {
                    if let Some(record) = page.next() {
                        return Poll::Ready(Some(Ok(reinject(this.partition_slots, record))));
                    }
                    match this.index.drain_page(DRAIN_PAGE) {
                        Ok(next) => {
                            if next.is_empty() {
                                *this.state = ReaderState::Exhausted;
                                return Poll::Ready(None);
                            }
                            *this.state = ReaderState::Draining {
                                page: next.into_iter(),
                            };
                        }
                        Err(err) => {
                            *this.state = ReaderState::Exhausted;
                            return Poll::Ready(Some(Err(err.into())));
                        }
                    }
                }
                ReaderState::Exhausted => return Poll::Ready(None),
            }
        }
    }
}

/// Derive the ordering value from the configured row position unless the
/// decoder already attached one (deletes carry it explicitly).
fn resolve_ordering(ordering_index: Option<usize>, record: Record) -> Record {
    if record.ordering().is_some() {
        return record;
    }
    if let Some(index) = ordering_index {
        if let Some(value) = record.row().get(index) {
            if !value.is_null() {
                let value = value.clone();
                return record.with_ordering(value);
            }
        }
    }
    record
}

fn reinject(partition_slots: &[(usize, Value)], mut record: Record) -> Record {
    for (index, value) in partition_slots {
        if record.row().get(*index).map_or(false, Value::is_null) {
            record.set_row_value(*index, value.clone());
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::stream::RecordStream;

    struct NoopContext;

    impl ReaderContext for NoopContext {
        fn scan_base(
            &self,
            _base: &BaseFile,
            _range: (u64, u64),
            _projected: bool,
        ) -> Result<RecordStream, ReadError> {
            Ok(Box::pin(futures_util::stream::empty()))
        }

        fn scan_log(&self, _log: &LogFile) -> Result<RecordStream, ReadError> {
            Ok(Box::pin(futures_util::stream::empty()))
        }
    }

    fn schema() -> Schema {
        Schema::new(["_row_key", "timestamp", "rider"])
    }

    #[test]
    fn range_without_base_file_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path())
            .contains_base_file(false)
            .range(0, 4096);

        let result = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        );
        assert!(matches!(
            result,
            Err(ReadError::MissingBaseFile { start: 0, end: 4096 })
        ));
    }

    #[test]
    fn missing_base_file_with_flag_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path());

        let result = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        );
        assert!(matches!(result, Err(ReadError::MissingBaseFile { .. })));
    }

    #[test]
    fn out_of_order_log_blocks_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path()).contains_base_file(false);
        let slice = FileSlice {
            base: None,
            logs: vec![
                LogFile {
                    path: "log.2".into(),
                    commit: 2.into(),
                },
                LogFile {
                    path: "log.1".into(),
                    commit: 1.into(),
                },
            ],
            partition_values: Vec::new(),
        };

        let result =
            FileGroupReader::new(Arc::new(NoopContext), slice, &schema(), option, None);
        assert!(matches!(result, Err(ReadError::OutOfOrderLogBlock { .. })));
    }

    #[test]
    fn custom_mode_requires_merger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path())
            .contains_base_file(false)
            .merge_mode(MergeMode::Custom);

        let result = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        );
        assert!(matches!(
            result,
            Err(ReadError::Option(OptionError::MissingCustomMerger))
        ));
    }

    #[test]
    fn unknown_ordering_field_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path())
            .contains_base_file(false)
            .ordering_field("missing");

        let result = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        );
        assert!(matches!(
            result,
            Err(ReadError::Option(OptionError::UnknownField(field))) if field == "missing"
        ));
    }

    #[tokio::test]
    async fn pulling_before_init_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path()).contains_base_file(false);
        let mut reader = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        )
        .unwrap();

        assert!(matches!(
            reader.next().await,
            Some(Err(ReadError::Uninitialized))
        ));
        // The error is terminal; the stream must end instead of spinning.
        assert!(reader.next().await.is_none());
        reader.close().unwrap();
    }

    #[tokio::test]
    async fn init_twice_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let option = ReaderOption::new(temp_dir.path()).contains_base_file(false);
        let mut reader = FileGroupReader::new(
            Arc::new(NoopContext),
            FileSlice::default(),
            &schema(),
            option,
            None,
        )
        .unwrap();

        reader.init().await.unwrap();
        assert!(matches!(
            reader.init().await,
            Err(ReadError::AlreadyInitialized)
        ));
    }
}
