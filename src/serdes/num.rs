use std::{io, mem::size_of};

use super::{Decode, DecodeError, Encode};

macro_rules! implement_encode_decode {
    ($struct_name:ident) => {
        impl Encode for $struct_name {
            fn encode<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
                writer.write_all(&self.to_le_bytes())
            }

            fn size(&self) -> usize {
                size_of::<Self>()
            }
        }

        impl Decode for $struct_name {
            fn decode<R: io::Read>(reader: &mut R) -> Result<Self, DecodeError> {
                let mut buf = [0; size_of::<Self>()];
                reader.read_exact(&mut buf)?;

                Ok(Self::from_le_bytes(buf))
            }
        }
    };
}

implement_encode_decode!(u8);
implement_encode_decode!(u16);
implement_encode_decode!(u32);
implement_encode_decode!(u64);
implement_encode_decode!(i32);
implement_encode_decode!(i64);
implement_encode_decode!(f32);
implement_encode_decode!(f64);
