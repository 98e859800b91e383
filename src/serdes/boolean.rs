use std::io;

use super::{Decode, DecodeError, Encode};

impl Encode for bool {
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[*self as u8])
    }

    fn size(&self) -> usize {
        1
    }
}

impl Decode for bool {
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut buf = [0];
        reader.read_exact(&mut buf)?;

        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidTag(tag)),
        }
    }
}
