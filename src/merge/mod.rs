//! Record merge strategies.
//!
//! A merger resolves two competing versions of the same key into the version
//! that occupies the index slot (or is emitted). Deletes survive as
//! tombstones rather than disappearing, so a stale base-file record for the
//! same key is still suppressed later in the read.

use std::{cmp::Ordering, fmt, str::FromStr, sync::Arc};

use crate::record::{compare_values, Record, Value, ValueError};

/// Policy deciding which of two competing record versions survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The chronologically later record always wins; the ordering field is
    /// ignored even on ties.
    OverwriteWithLatest,
    /// The record with the greater ordering value wins regardless of commit
    /// order; ties go to the later arrival.
    EventTimeOrdering,
    /// Delegate to an injected merge function that may combine both inputs.
    Custom,
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OVERWRITE_WITH_LATEST" => Ok(MergeMode::OverwriteWithLatest),
            "EVENT_TIME_ORDERING" => Ok(MergeMode::EventTimeOrdering),
            "CUSTOM" => Ok(MergeMode::Custom),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::OverwriteWithLatest => "OVERWRITE_WITH_LATEST",
            MergeMode::EventTimeOrdering => "EVENT_TIME_ORDERING",
            MergeMode::Custom => "CUSTOM",
        };
        write!(f, "{}", name)
    }
}

/// Injected two-argument merge function for [`MergeMode::Custom`].
///
/// Returning `None` means the key is deleted after the merge; the engine
/// does not interpret the result beyond that.
pub type CustomMerger = Arc<dyn Fn(Option<&Record>, &Record) -> Option<Record> + Send + Sync>;

/// A merge strategy resolved once at reader construction.
#[derive(Clone)]
pub enum RecordMerger {
    OverwriteWithLatest,
    EventTimeOrdering,
    Custom(CustomMerger),
}

impl fmt::Debug for RecordMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordMerger::OverwriteWithLatest => write!(f, "RecordMerger::OverwriteWithLatest"),
            RecordMerger::EventTimeOrdering => write!(f, "RecordMerger::EventTimeOrdering"),
            RecordMerger::Custom(_) => write!(f, "RecordMerger::Custom"),
        }
    }
}

impl RecordMerger {
    /// Resolve two competing versions of one key.
    ///
    /// `incoming` must be chronologically later than (or the same pass as)
    /// `existing`: log blocks are consumed in ascending commit order and the
    /// base record always plays the `existing` role. The returned record is
    /// the slot occupant; a tombstone (`is_delete()`) marks the key as
    /// deleted without being dropped from the index.
    pub fn merge(
        &self,
        existing: Option<&Record>,
        incoming: &Record,
    ) -> Result<Record, ValueError> {
        let Some(existing) = existing else {
            // A delete with no prior record stays as an explicit tombstone
            // so a later base-file record for the key is suppressed.
            return Ok(incoming.clone());
        };

        match self {
            RecordMerger::OverwriteWithLatest => Ok(incoming.clone()),
            RecordMerger::EventTimeOrdering => {
                let incoming_ordering = incoming.ordering().unwrap_or(&Value::Null);
                let existing_ordering = existing.ordering().unwrap_or(&Value::Null);
                // Ties favor the later arrival, consistent with log replay.
                // An out-of-order delete (smaller ordering value) is
                // discarded and must not suppress the existing record.
                match compare_values(incoming_ordering, existing_ordering)? {
                    Ordering::Less => Ok(existing.clone()),
                    Ordering::Equal | Ordering::Greater => Ok(incoming.clone()),
                }
            }
            RecordMerger::Custom(merger) => Ok(merger(Some(existing), incoming)
                .unwrap_or_else(|| {
                    Record::delete(
                        incoming.key(),
                        incoming.ordering().cloned(),
                        incoming.commit(),
                    )
                })),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::Row;

    fn upsert(key: &str, payload: i64, ordering: i64, commit: u64) -> Record {
        Record::upsert(key, Row::new(vec![Value::Int64(payload)]), commit.into())
            .with_ordering(Value::Int64(ordering))
    }

    #[test]
    fn overwrite_with_latest_always_takes_incoming() {
        let merger = RecordMerger::OverwriteWithLatest;

        let first = upsert("k", 1, 100, 1);
        let second = upsert("k", 2, 50, 2);
        let merged = merger.merge(Some(&first), &second).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(2)));

        let tombstone = Record::delete("k", None, 3.into());
        let merged = merger.merge(Some(&merged), &tombstone).unwrap();
        assert!(merged.is_delete());
    }

    #[test]
    fn event_time_ordering_greater_wins() {
        let merger = RecordMerger::EventTimeOrdering;

        let early = upsert("k", 1, 10, 1);
        let late = upsert("k", 2, 20, 2);

        // Surviving record is the one with the greater ordering value,
        // regardless of arrival order.
        let merged = merger.merge(Some(&early), &late).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(2)));
        let merged = merger.merge(Some(&late), &early).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(2)));
    }

    #[test]
    fn event_time_ordering_tie_takes_later_arrival() {
        let merger = RecordMerger::EventTimeOrdering;

        let first = upsert("k", 1, 10, 1);
        let second = upsert("k", 2, 10, 2);
        let merged = merger.merge(Some(&first), &second).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(2)));
    }

    #[test]
    fn event_time_ordering_discards_out_of_order_delete() {
        let merger = RecordMerger::EventTimeOrdering;

        let existing = upsert("k", 1, 20, 1);
        let stale_delete = Record::delete("k", Some(Value::Int64(10)), 2.into());
        let merged = merger.merge(Some(&existing), &stale_delete).unwrap();
        assert!(!merged.is_delete());
        assert_eq!(merged.row().get(0), Some(&Value::Int64(1)));

        let fresh_delete = Record::delete("k", Some(Value::Int64(30)), 3.into());
        let merged = merger.merge(Some(&existing), &fresh_delete).unwrap();
        assert!(merged.is_delete());
    }

    #[test]
    fn event_time_ordering_missing_value_is_lowest() {
        let merger = RecordMerger::EventTimeOrdering;

        let with_ordering = upsert("k", 1, 5, 1);
        let without = Record::upsert("k", Row::new(vec![Value::Int64(2)]), 2.into());
        let merged = merger.merge(Some(&with_ordering), &without).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(1)));
    }

    #[test]
    fn delete_without_prior_record_keeps_tombstone() {
        let merger = RecordMerger::OverwriteWithLatest;

        let tombstone = Record::delete("k", None, 1.into());
        let merged = merger.merge(None, &tombstone).unwrap();
        assert!(merged.is_delete());
    }

    #[test]
    fn custom_merger_blends_fields() {
        let merger = RecordMerger::Custom(Arc::new(|existing, incoming| {
            let sum = match (existing, incoming.row().get(0)) {
                (Some(existing), Some(Value::Int64(b))) => match existing.row().get(0) {
                    Some(Value::Int64(a)) => a + b,
                    _ => *b,
                },
                (None, Some(Value::Int64(b))) => *b,
                _ => 0,
            };
            Some(Record::upsert(
                incoming.key(),
                Row::new(vec![Value::Int64(sum)]),
                incoming.commit(),
            ))
        }));

        let first = upsert("k", 1, 0, 1);
        let second = upsert("k", 2, 0, 2);
        let merged = merger.merge(Some(&first), &second).unwrap();
        assert_eq!(merged.row().get(0), Some(&Value::Int64(3)));
    }

    #[test]
    fn custom_merger_none_becomes_tombstone() {
        let merger = RecordMerger::Custom(Arc::new(|_, _| None));

        let first = upsert("k", 1, 0, 1);
        let second = upsert("k", 2, 7, 2);
        let merged = merger.merge(Some(&first), &second).unwrap();
        assert!(merged.is_delete());
        assert_eq!(merged.ordering(), Some(&Value::Int64(7)));
    }

    #[test]
    fn merge_mode_parse() {
        assert_eq!(
            "OVERWRITE_WITH_LATEST".parse::<MergeMode>().unwrap(),
            MergeMode::OverwriteWithLatest
        );
        assert_eq!(
            "EVENT_TIME_ORDERING".parse::<MergeMode>().unwrap(),
            MergeMode::EventTimeOrdering
        );
        assert_eq!("CUSTOM".parse::<MergeMode>().unwrap(), MergeMode::Custom);
        assert!("LATEST".parse::<MergeMode>().is_err());
    }
}
