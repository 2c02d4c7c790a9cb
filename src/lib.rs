//! Post-link compression of RAM-initialized data for 32-bit ELF firmware.
//!
//! The linker emits a data-initialization table (`__data_init_table`) whose
//! entries describe the regions copied from flash to RAM at boot. This crate
//! rewrites such a binary so the initialization payloads are stored
//! compressed: each table entry is re-encoded with the cheapest codec
//! (counting both payload bytes and any decompressor code the choice pulls
//! in), the required decompressor routines are embedded next to the table,
//! and the table is rewritten to point at the compressed data.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

use std::io::{Read, Seek, Write};

use crate::error::Error;

pub mod compress;
pub mod decompressor;
pub mod elf;
pub mod error;
pub mod rewrite;

/// Decode an owned instance of a type from a reader
pub trait FromReader<R>
where
    R: Read + Seek,
    Self: Sized,
{
    /// The error type for this operation
    type Error;

    /// Decode an instance of this type from a reader
    fn from_reader(reader: &mut R) -> Result<Self, Self::Error>;
}

/// Encode an instance of a type to a writer
pub trait ToWriter<W>
where
    W: Write,
    Self: Sized,
{
    /// The error type for this operation
    type Error;

    /// Encode an instance of this type to a writer
    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error>;
}

/// A type which always has a known size when written to a writer
pub trait HasWrittenSize {
    /// The size when written
    const SIZE: usize;
}

macro_rules! le_int {
    ($ty:ty) => {
        impl<R> FromReader<R> for $ty
        where
            R: Read + Seek,
        {
            type Error = Error;

            fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
                let mut buf = [0; std::mem::size_of::<$ty>()];
                reader
                    .read_exact(&mut buf)
                    .map_err(|e| Error::Io { kind: e.kind() })?;
                Ok(<$ty>::from_le_bytes(buf))
            }
        }

        impl<W> ToWriter<W> for $ty
        where
            W: Write,
        {
            type Error = Error;

            fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
                writer
                    .write_all(&self.to_le_bytes())
                    .map_err(|e| Error::Io { kind: e.kind() })
            }
        }

        impl HasWrittenSize for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();
        }
    };
}

le_int!(u8);
le_int!(u16);
le_int!(u32);
