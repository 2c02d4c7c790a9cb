//! ELF program headers (segments) and their payloads

use std::io::{Read, Seek, Write};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::{error::Error, FromReader, HasWrittenSize, ToWriter};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The type of an ELF segment (`PT_*`)
pub enum SegmentType {
    /// Unused entry
    Null = 0,
    /// Loadable segment
    Load = 1,
    /// Dynamic linking information
    Dynamic = 2,
    /// Interpreter path
    Interp = 3,
    /// Auxiliary information
    Note = 4,
    /// Reserved
    ShLib = 5,
    /// The program header table itself
    Phdr = 6,
    /// Thread-local storage template
    Tls = 7,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Segment permission flags (`PF_*`)
    pub struct SegmentFlags: u32 {
        /// Executable
        const X = 1;
        /// Writable
        const W = 2;
        /// Readable
        const R = 4;

        const _ = !0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One program header together with the file bytes it covers.
///
/// `memsz` may exceed `filesz`; the loader zero-fills the tail, and
/// virtual-address reads of that range return zeros.
pub struct Segment {
    /// Raw segment type value (see [`SegmentType`])
    pub typ: u32,
    /// File offset of the segment contents
    pub offset: u32,
    /// Virtual address of the first byte
    pub vaddr: u32,
    /// Physical (load) address of the first byte
    pub paddr: u32,
    /// Number of bytes in the file image
    pub filesz: u32,
    /// Number of bytes in the memory image
    pub memsz: u32,
    /// Permission flags
    pub flags: SegmentFlags,
    /// Alignment constraint
    pub align: u32,
    /// The segment's file bytes (`filesz` of them)
    pub payload: Vec<u8>,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            typ: 0,
            offset: 0,
            vaddr: 0,
            paddr: 0,
            filesz: 0,
            memsz: 0,
            flags: SegmentFlags::empty(),
            align: 0,
            payload: Vec::new(),
        }
    }
}

impl Segment {
    /// The segment type, when it is one of the known `PT_*` values
    pub fn segment_type(&self) -> Option<SegmentType> {
        SegmentType::from_u32(self.typ)
    }

    /// Whether `va` falls inside `[vaddr, vaddr + memsz)`
    pub fn contains_va(&self, va: u32) -> bool {
        va >= self.vaddr && u64::from(va) < u64::from(self.vaddr) + u64::from(self.memsz)
    }

    /// Whether `pa` falls inside `[paddr, paddr + memsz)`
    pub fn contains_pa(&self, pa: u32) -> bool {
        pa >= self.paddr && u64::from(pa) < u64::from(self.paddr) + u64::from(self.memsz)
    }

    /// Whether `offset` falls inside `[offset, offset + filesz)`
    pub fn contains_offset(&self, offset: u32) -> bool {
        offset >= self.offset && u64::from(offset) < u64::from(self.offset) + u64::from(self.filesz)
    }
}

impl<R> FromReader<R> for Segment
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
        Ok(Self {
            typ: u32::from_reader(reader)?,
            offset: u32::from_reader(reader)?,
            vaddr: u32::from_reader(reader)?,
            paddr: u32::from_reader(reader)?,
            filesz: u32::from_reader(reader)?,
            memsz: u32::from_reader(reader)?,
            flags: SegmentFlags::from_bits_retain(u32::from_reader(reader)?),
            align: u32::from_reader(reader)?,
            payload: Vec::new(),
        })
    }
}

impl<W> ToWriter<W> for Segment
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.typ.to_writer(writer)?;
        self.offset.to_writer(writer)?;
        self.vaddr.to_writer(writer)?;
        self.paddr.to_writer(writer)?;
        self.filesz.to_writer(writer)?;
        self.memsz.to_writer(writer)?;
        self.flags.bits().to_writer(writer)?;
        self.align.to_writer(writer)
    }
}

impl HasWrittenSize for Segment {
    const SIZE: usize = 0x20;
}
