use std::{fmt, io, mem::size_of};

use crate::serdes::{Decode, DecodeError, Encode};

/// Monotonically increasing identifier of the commit a record belongs to.
///
/// Log blocks are consumed strictly in ascending commit order, so within one
/// file slice a larger `CommitTime` always means "chronologically later".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitTime(u64);

impl From<u64> for CommitTime {
    fn from(ts: u64) -> Self {
        Self(ts)
    }
}

impl From<CommitTime> for u64 {
    fn from(ts: CommitTime) -> Self {
        ts.0
    }
}

impl fmt::Display for CommitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for CommitTime {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.encode(writer)
    }

    fn size(&self) -> usize {
        size_of::<u64>()
    }
}

impl Decode for CommitTime {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode(reader)?))
    }
}
