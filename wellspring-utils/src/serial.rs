//! Big-endian binary encoding for persisted values.
//!
//! Mirrors the shape of the network codecs: a type knows how to write itself
//! to any `Write` and read itself back from any `Read`.

use std::io::{Read, Result, Write};

/// A type that can be written to a byte stream.
pub trait WriteTo {
    /// Writes `self` to `writer`.
    fn write(&self, writer: &mut impl Write) -> Result<()>;
}

/// A type that can be read from a byte stream.
pub trait ReadFrom: Sized {
    /// Reads a value from `reader`.
    fn read(reader: &mut impl Read) -> Result<Self>;
}

macro_rules! impl_primitive {
    ($($ty:ty),*) => {
        $(
            impl WriteTo for $ty {
                fn write(&self, writer: &mut impl Write) -> Result<()> {
                    writer.write_all(&self.to_be_bytes())
                }
            }

            impl ReadFrom for $ty {
                fn read(reader: &mut impl Read) -> Result<Self> {
                    let mut buf = [0u8; size_of::<$ty>()];
                    reader.read_exact(&mut buf)?;
                    Ok(<$ty>::from_be_bytes(buf))
                }
            }
        )*
    };
}

impl_primitive!(u8, i32, u32, i64);

impl WriteTo for bool {
    fn write(&self, writer: &mut impl Write) -> Result<()> {
        u8::from(*self).write(writer)
    }
}

impl ReadFrom for bool {
    fn read(reader: &mut impl Read) -> Result<Self> {
        Ok(u8::read(reader)? != 0)
    }
}

impl<T: WriteTo> WriteTo for Option<T> {
    fn write(&self, writer: &mut impl Write) -> Result<()> {
        match self {
            Some(value) => {
                true.write(writer)?;
                value.write(writer)
            }
            None => false.write(writer),
        }
    }
}

impl<T: ReadFrom> ReadFrom for Option<T> {
    fn read(reader: &mut impl Read) -> Result<Self> {
        if bool::read(reader)? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }
}
