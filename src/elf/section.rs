//! ELF section headers and their payloads

use std::io::{Read, Seek, Write};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::{error::Error, FromReader, HasWrittenSize, ToWriter};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The type of an ELF section (`SHT_*`)
pub enum SectionType {
    /// Inactive header with no associated section
    Null = 0,
    /// Program-defined contents
    ProgBits = 1,
    /// Symbol table
    SymTab = 2,
    /// String table
    StrTab = 3,
    /// Relocation entries with explicit addends
    Rela = 4,
    /// Symbol hash table
    Hash = 5,
    /// Dynamic linking information
    Dynamic = 6,
    /// File notes
    Note = 7,
    /// Occupies no file space; zero-initialized at load time
    NoBits = 8,
    /// Relocation entries without explicit addends
    Rel = 9,
    /// Reserved
    ShLib = 10,
    /// Dynamic linker symbol table
    DynSym = 11,
    /// Array of initialization function pointers
    InitArray = 14,
    /// Array of termination function pointers
    FiniArray = 15,
    /// Array of pre-initialization function pointers
    PreInitArray = 16,
    /// Section group
    Group = 17,
    /// Extended section indices for a symbol table
    SymTabShndx = 18,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Section attribute flags (`SHF_*`)
    pub struct SectionFlags: u32 {
        /// Writable during execution
        const WRITE = 0x1;
        /// Occupies memory during execution
        const ALLOC = 0x2;
        /// Contains executable machine instructions
        const EXECINSTR = 0x4;
        /// May be merged to eliminate duplication
        const MERGE = 0x10;
        /// Contains NUL-terminated strings
        const STRINGS = 0x20;
        /// `sh_info` holds a section header table index
        const INFO_LINK = 0x40;
        /// Ordering requirement relative to the linked-to section
        const LINK_ORDER = 0x80;
        /// Requires OS-specific processing
        const OS_NONCONFORMING = 0x100;
        /// Member of a section group
        const GROUP = 0x200;
        /// Holds thread-local storage
        const TLS = 0x400;

        // OS and processor-specific bits survive a parse/pack round-trip
        const _ = !0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One section header together with the file bytes it covers
pub struct Section {
    /// Name resolved from the section name string table. Until resolution
    /// this holds the zero-padded hex of `name_idx`.
    pub name: String,
    /// Offset of the name in the section name string table
    pub name_idx: u32,
    /// Raw section type value (see [`SectionType`])
    pub typ: u32,
    /// Attribute flags
    pub flags: SectionFlags,
    /// Virtual address of the first byte, or 0 if not allocated
    pub addr: u32,
    /// File offset of the section contents
    pub offset: u32,
    /// Size of the section in bytes
    pub size: u32,
    /// Section header table index link
    pub link: u32,
    /// Extra type-dependent information
    pub info: u32,
    /// Address alignment constraint
    pub addralign: u32,
    /// Size of each entry for table-like sections
    pub entsize: u32,
    /// The section's file bytes; empty for `NULL` and `NOBITS` sections
    pub payload: Vec<u8>,
}

impl Default for Section {
    fn default() -> Self {
        Self {
            name: format!("{:08X}", 0),
            name_idx: 0,
            typ: 0,
            flags: SectionFlags::empty(),
            addr: 0,
            offset: 0,
            size: 0,
            link: 0,
            info: 0,
            addralign: 0,
            entsize: 0,
            payload: Vec::new(),
        }
    }
}

impl Section {
    /// The section type, when it is one of the known `SHT_*` values
    pub fn section_type(&self) -> Option<SectionType> {
        SectionType::from_u32(self.typ)
    }

    /// Whether the section occupies bytes in the file image
    pub fn has_data(&self) -> bool {
        !matches!(
            self.section_type(),
            Some(SectionType::Null) | Some(SectionType::NoBits)
        )
    }

    /// Whether `va` falls inside `[addr, addr + size)`
    pub fn contains_va(&self, va: u32) -> bool {
        va >= self.addr && u64::from(va) < u64::from(self.addr) + u64::from(self.size)
    }

    /// Whether `offset` falls inside `[offset, offset + size)`
    pub fn contains_offset(&self, offset: u32) -> bool {
        offset >= self.offset && u64::from(offset) < u64::from(self.offset) + u64::from(self.size)
    }
}

impl<R> FromReader<R> for Section
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
        let name_idx = u32::from_reader(reader)?;
        Ok(Self {
            name: format!("{name_idx:08X}"),
            name_idx,
            typ: u32::from_reader(reader)?,
            flags: SectionFlags::from_bits_retain(u32::from_reader(reader)?),
            addr: u32::from_reader(reader)?,
            offset: u32::from_reader(reader)?,
            size: u32::from_reader(reader)?,
            link: u32::from_reader(reader)?,
            info: u32::from_reader(reader)?,
            addralign: u32::from_reader(reader)?,
            entsize: u32::from_reader(reader)?,
            payload: Vec::new(),
        })
    }
}

impl<W> ToWriter<W> for Section
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.name_idx.to_writer(writer)?;
        self.typ.to_writer(writer)?;
        self.flags.bits().to_writer(writer)?;
        self.addr.to_writer(writer)?;
        self.offset.to_writer(writer)?;
        self.size.to_writer(writer)?;
        self.link.to_writer(writer)?;
        self.info.to_writer(writer)?;
        self.addralign.to_writer(writer)?;
        self.entsize.to_writer(writer)
    }
}

impl HasWrittenSize for Section {
    const SIZE: usize = 0x28;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_section_roundtrip() {
        let section = Section {
            name_idx: 0x1B,
            typ: SectionType::ProgBits as u32,
            flags: SectionFlags::ALLOC | SectionFlags::WRITE,
            addr: 0x0800_1000,
            offset: 0x74,
            size: 0x100,
            addralign: 4,
            ..Section::default()
        };
        let mut bytes = Vec::new();
        section.to_writer(&mut bytes).unwrap();
        assert_eq!(bytes.len(), Section::SIZE);

        let parsed = Section::from_reader(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.name, "0000001B");
        assert_eq!(parsed.section_type(), Some(SectionType::ProgBits));
        assert_eq!(parsed.flags, SectionFlags::ALLOC | SectionFlags::WRITE);
        assert_eq!(parsed.size, 0x100);
    }

    #[test]
    fn test_unknown_flag_bits_survive() {
        let flags = SectionFlags::from_bits_retain(0xF000_0002);
        let section = Section {
            flags,
            ..Section::default()
        };
        let mut bytes = Vec::new();
        section.to_writer(&mut bytes).unwrap();
        let parsed = Section::from_reader(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.flags.bits(), 0xF000_0002);
    }

    #[test]
    fn test_containment_is_half_open() {
        let section = Section {
            addr: 0x1000,
            size: 0x10,
            ..Section::default()
        };
        assert!(section.contains_va(0x1000));
        assert!(section.contains_va(0x100F));
        assert!(!section.contains_va(0x1010));
        assert!(!section.contains_va(0xFFF));
    }

    #[test]
    fn test_has_data() {
        let mut section = Section {
            typ: SectionType::ProgBits as u32,
            ..Section::default()
        };
        assert!(section.has_data());
        section.typ = SectionType::NoBits as u32;
        assert!(!section.has_data());
        section.typ = 0x7000_0003; // processor-specific
        assert!(section.has_data());
    }
}
