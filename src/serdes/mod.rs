//! Length-prefixed binary encoding for spilled index entries.
//!
//! The spill path is the only consumer: entries are written to the scratch
//! store with these traits and read back verbatim within the same reader
//! instance, so the format does not need to be stable across versions.

mod boolean;
mod num;
mod option;
mod string;

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid tag: {0}")]
    InvalidTag(u8),
    #[error("invalid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub trait Encode {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()>;

    fn size(&self) -> usize;
}

impl<T: Encode> Encode for &T {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        Encode::encode(*self, writer)
    }

    fn size(&self) -> usize {
        Encode::size(*self)
    }
}

pub trait Decode: Sized {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError>;
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn encode_decode_primitives() {
        let mut buf = Vec::new();
        42_u32.encode(&mut buf).unwrap();
        (-7_i64).encode(&mut buf).unwrap();
        true.encode(&mut buf).unwrap();
        "hello".to_string().encode(&mut buf).unwrap();
        Some(3_u32).encode(&mut buf).unwrap();
        Option::<u32>::None.encode(&mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(u32::decode(&mut cursor).unwrap(), 42);
        assert_eq!(i64::decode(&mut cursor).unwrap(), -7);
        assert!(bool::decode(&mut cursor).unwrap());
        assert_eq!(String::decode(&mut cursor).unwrap(), "hello");
        assert_eq!(Option::<u32>::decode(&mut cursor).unwrap(), Some(3));
        assert_eq!(Option::<u32>::decode(&mut cursor).unwrap(), None);
    }
}
