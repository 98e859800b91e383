use std::io;

use super::{Decode, DecodeError, Encode};

impl<V> Encode for Option<V>
where
    V: Encode,
{
    fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            None => writer.write_all(&[0]),
            Some(v) => {
                writer.write_all(&[1])?;
                v.encode(writer)
            }
        }
    }

    fn size(&self) -> usize {
        1 + self.as_ref().map(Encode::size).unwrap_or_default()
    }
}

impl<V> Decode for Option<V>
where
    V: Decode,
{
    fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut tag = [0];
        reader.read_exact(&mut tag)?;

        match tag[0] {
            0 => Ok(None),
            1 => Ok(Some(V::decode(reader)?)),
            tag => Err(DecodeError::InvalidTag(tag)),
        }
    }
}
