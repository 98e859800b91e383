pub(crate) mod value;

use std::{io, mem::size_of};

pub use value::{compare_values, Value, ValueError, ValueKind};

use crate::{
    serdes::{Decode, DecodeError, Encode},
    timestamp::CommitTime,
};

/// Positional row payload. Opaque to the merge engine: merging either picks
/// one of two competing rows or hands both to a custom merger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub(crate) fn set(&mut self, index: usize, value: Value) {
        if index < self.values.len() {
            self.values[index] = value;
        }
    }

    pub fn size(&self) -> usize {
        size_of::<Self>() + self.values.iter().map(Value::size).sum::<usize>()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl Encode for Row {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        (self.values.len() as u32).encode(writer)?;
        for value in &self.values {
            value.encode(writer)?;
        }
        Ok(())
    }

    fn size(&self) -> usize {
        size_of::<u32>() + self.values.iter().map(Encode::size).sum::<usize>()
    }
}

impl Decode for Row {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let len = u32::decode(reader)?;
        let mut values = Vec::with_capacity(len as usize);
        for _ in 0..len {
            values.push(Value::decode(reader)?);
        }
        Ok(Self { values })
    }
}

/// Field-name list of the requested logical schema.
///
/// Schema resolution and evolution happen outside the reader; this only maps
/// the ordering field and partition fields to row positions.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field == name)
    }
}

/// A logical row version flowing through the merge engine.
///
/// Immutable once constructed: merging produces a new `Record` or selects an
/// existing one, never mutates a payload in place. A delete carries an empty
/// row but may still carry an ordering value, which decides whether it
/// suppresses earlier versions under event-time ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    key: String,
    ordering: Option<Value>,
    row: Row,
    delete: bool,
    commit: CommitTime,
}

impl Record {
    pub fn upsert(key: impl Into<String>, row: Row, commit: CommitTime) -> Self {
        Self {
            key: key.into(),
            ordering: None,
            row,
            delete: false,
            commit,
        }
    }

    pub fn delete(key: impl Into<String>, ordering: Option<Value>, commit: CommitTime) -> Self {
        Self {
            key: key.into(),
            ordering,
            row: Row::default(),
            delete: true,
            commit,
        }
    }

    pub fn with_ordering(mut self, ordering: Value) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ordering value used for conflict resolution; `None` is treated as the
    /// lowest possible value under event-time ordering.
    pub fn ordering(&self) -> Option<&Value> {
        self.ordering.as_ref()
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn into_row(self) -> Row {
        self.row
    }

    pub fn is_delete(&self) -> bool {
        self.delete
    }

    pub fn commit(&self) -> CommitTime {
        self.commit
    }

    pub(crate) fn set_row_value(&mut self, index: usize, value: Value) {
        self.row.set(index, value);
    }

    /// Approximate in-memory footprint of the record, fed into the spill
    /// trigger.
    pub fn size(&self) -> usize {
        size_of::<Self>()
            + self.key.len()
            + self.ordering.as_ref().map(Value::size).unwrap_or_default()
            + self.row.size()
    }
}

impl Encode for Record {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.key.encode(writer)?;
        self.ordering.encode(writer)?;
        self.row.encode(writer)?;
        self.delete.encode(writer)?;
        self.commit.encode(writer)
    }

    fn size(&self) -> usize {
        Encode::size(&self.key)
            + Encode::size(&self.ordering)
            + Encode::size(&self.row)
            + Encode::size(&self.delete)
            + Encode::size(&self.commit)
    }
}

impl Decode for Record {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let key = String::decode(reader)?;
        let ordering = Option::<Value>::decode(reader)?;
        let row = Row::decode(reader)?;
        let delete = bool::decode(reader)?;
        let commit = CommitTime::decode(reader)?;

        Ok(Self {
            key,
            ordering,
            row,
            delete,
            commit,
        })
    }
}
