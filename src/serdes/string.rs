use std::{io, mem::size_of};

use super::{Decode, DecodeError, Encode};

impl Encode for &str {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        (self.len() as u32).encode(writer)?;
        writer.write_all(self.as_bytes())
    }

    fn size(&self) -> usize {
        size_of::<u32>() + self.len()
    }
}

impl Encode for String {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.as_str().encode(writer)
    }

    fn size(&self) -> usize {
        self.as_str().size()
    }
}

impl Decode for String {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let len = u32::decode(reader)?;
        let mut buf = vec![0; len as usize];
        reader.read_exact(&mut buf)?;

        Ok(String::from_utf8(buf)?)
    }
}
