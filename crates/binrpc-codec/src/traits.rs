use bytes::Bytes;

use crate::error::Result;
use crate::reader::Reader;
use crate::writer::Writer;

/// A value that can be written with a [`Writer`].
pub trait Encode {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()>;
}

/// A value that can be read back with a [`Reader`].
pub trait Decode: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self>;
}

macro_rules! primitive {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
                    writer.$write(*self)
                }
            }

            impl Decode for $ty {
                fn decode(reader: &mut Reader<'_>) -> Result<Self> {
                    reader.$read()
                }
            }
        )*
    };
}

primitive! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Encode for str {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_str(self)
    }
}

impl Encode for String {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_str(self)
    }
}

impl Decode for String {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_string()
    }
}

/// Byte arrays in one bounds check and one copy; same wire format as `Vec<u8>`.
impl Encode for Bytes {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_bytes(self)
    }
}

impl Decode for Bytes {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_bytes().map(Bytes::from)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_array(self)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        writer.write_array(self)
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        reader.read_array()
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, writer: &mut Writer<'_>) -> Result<()> {
        (**self).encode(writer)
    }
}
