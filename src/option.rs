use std::{collections::HashMap, path::PathBuf};

use thiserror::Error;

use crate::{index::SpillBackend, merge::MergeMode};

/// Property key selecting the merge mode.
pub const MERGE_MODE_KEY: &str = "merge-mode";
/// Property key naming the field used as the ordering value.
pub const ORDERING_FIELD_KEY: &str = "ordering-field";
/// Legacy alias of [`ORDERING_FIELD_KEY`].
pub const PRECOMBINE_FIELD_KEY: &str = "precombine-field";
/// Property key naming the merge function implementation under CUSTOM mode.
pub const MERGER_STRATEGY_KEY: &str = "merger-strategy";
/// Property key listing fields to reinject into payloads stripped in storage.
pub const PARTITION_FIELDS_KEY: &str = "partition-fields";

#[derive(Debug, Error)]
pub enum OptionError {
    #[error("unknown merge mode: {0}")]
    UnknownMergeMode(String),
    #[error("merge mode CUSTOM requires an injected merger")]
    MissingCustomMerger,
    #[error("field {0} is not present in the requested schema")]
    UnknownField(String),
}

/// Configuration of one file group read, built in the builder style.
#[derive(Debug, Clone)]
pub struct ReaderOption {
    pub(crate) merge_mode: MergeMode,
    pub(crate) ordering_field: Option<String>,
    pub(crate) merger_strategy: Option<String>,
    pub(crate) partition_fields: Vec<String>,
    /// Byte range `(start, length)` restricting the base-file scan. Log
    /// blocks are never range-limited.
    pub(crate) range: Option<(u64, u64)>,
    pub(crate) contains_base_file: bool,
    pub(crate) memory_threshold: usize,
    pub(crate) scratch_dir: PathBuf,
    pub(crate) spill_backend: SpillBackend,
    pub(crate) projected: bool,
}

impl ReaderOption {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        ReaderOption {
            merge_mode: MergeMode::OverwriteWithLatest,
            ordering_field: None,
            merger_strategy: None,
            partition_fields: Vec::new(),
            range: None,
            contains_base_file: true,
            memory_threshold: 1024 * 1024 * 1000,
            scratch_dir: scratch_dir.into(),
            spill_backend: SpillBackend::SortedFile,
            projected: false,
        }
    }

    /// Fold a property bag into the option; unrecognized keys are ignored.
    pub fn apply_properties(
        mut self,
        props: &HashMap<String, String>,
    ) -> Result<Self, OptionError> {
        if let Some(mode) = props.get(MERGE_MODE_KEY) {
            self.merge_mode = mode
                .parse()
                .map_err(OptionError::UnknownMergeMode)?;
        }
        if let Some(field) = props
            .get(ORDERING_FIELD_KEY)
            .or_else(|| props.get(PRECOMBINE_FIELD_KEY))
        {
            self.ordering_field = Some(field.clone());
        }
        if let Some(strategy) = props.get(MERGER_STRATEGY_KEY) {
            self.merger_strategy = Some(strategy.clone());
        }
        if let Some(fields) = props.get(PARTITION_FIELDS_KEY) {
            self.partition_fields = fields
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(self)
    }

    pub fn merge_mode(self, merge_mode: MergeMode) -> Self {
        ReaderOption { merge_mode, ..self }
    }

    pub fn ordering_field(self, ordering_field: impl Into<String>) -> Self {
        ReaderOption {
            ordering_field: Some(ordering_field.into()),
            ..self
        }
    }

    pub fn partition_fields<I, S>(self, partition_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReaderOption {
            partition_fields: partition_fields.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn range(self, start: u64, length: u64) -> Self {
        ReaderOption {
            range: Some((start, length)),
            ..self
        }
    }

    pub fn contains_base_file(self, contains_base_file: bool) -> Self {
        ReaderOption {
            contains_base_file,
            ..self
        }
    }

    pub fn memory_threshold(self, memory_threshold: usize) -> Self {
        ReaderOption {
            memory_threshold,
            ..self
        }
    }

    pub fn spill_backend(self, spill_backend: SpillBackend) -> Self {
        ReaderOption {
            spill_backend,
            ..self
        }
    }

    pub fn projected(self, projected: bool) -> Self {
        ReaderOption { projected, ..self }
    }
}
