//! The ELF32 file header

use std::io::{Read, Seek, Write};

use crate::{error::Error, FromReader, HasWrittenSize, ToWriter};

/// Magic bytes identifying an ELF file
pub const ELF_MAGIC: [u8; 4] = [0x7F, 0x45, 0x4C, 0x46];

/// Ident class value for 32-bit ELF files
pub const CLASS_ELF32: u8 = 1;
/// Ident class value for 64-bit ELF files
pub const CLASS_ELF64: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The file header of a 32-bit little-endian ELF object
pub struct ElfHeader {
    /// Ident data-encoding byte (carried through, not interpreted)
    pub data_encoding: u8,
    /// Ident version byte
    pub ident_version: u8,
    /// OS ABI byte
    pub os_abi: u8,
    /// ABI version byte
    pub abi_version: u8,
    /// Ident padding bytes
    pub pad: [u8; 7],
    /// Object file type (`ET_*`)
    pub typ: u16,
    /// Target machine (`EM_*`)
    pub machine: u16,
    /// Object file version
    pub version: u32,
    /// Entry point virtual address
    pub entry: u32,
    /// File offset of the program header table
    pub phoff: u32,
    /// File offset of the section header table
    pub shoff: u32,
    /// Processor-specific flags
    pub flags: u32,
    /// Size of this header in bytes
    pub ehsize: u16,
    /// Size of one program header table entry
    pub phentsize: u16,
    /// Number of program header table entries
    pub phnum: u16,
    /// Size of one section header table entry
    pub shentsize: u16,
    /// Number of section header table entries
    pub shnum: u16,
    /// Section table index of the section name string table
    pub shstrndx: u16,
}

impl Default for ElfHeader {
    fn default() -> Self {
        Self {
            data_encoding: 1,
            ident_version: 1,
            os_abi: 0,
            abi_version: 0,
            pad: [0; 7],
            typ: 0,
            machine: 0,
            version: 1,
            entry: 0,
            phoff: 0,
            shoff: 0,
            flags: 0,
            ehsize: Self::SIZE as u16,
            phentsize: 0x20,
            phnum: 0,
            shentsize: 0x28,
            shnum: 0,
            shstrndx: 0,
        }
    }
}

impl<R> FromReader<R> for ElfHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| Error::Io { kind: e.kind() })?;
        if magic != ELF_MAGIC {
            return Err(Error::NotElf);
        }

        let class = u8::from_reader(reader)?;
        if class != CLASS_ELF32 {
            // 64-bit ELFs are recognized but not supported; anything else is
            // reported by its raw class value.
            let bitness = if class == CLASS_ELF64 { 64 } else { u32::from(class) };
            return Err(Error::UnsupportedBitness { bitness });
        }

        let data_encoding = u8::from_reader(reader)?;
        let ident_version = u8::from_reader(reader)?;
        let os_abi = u8::from_reader(reader)?;
        let abi_version = u8::from_reader(reader)?;
        let mut pad = [0u8; 7];
        reader
            .read_exact(&mut pad)
            .map_err(|e| Error::Io { kind: e.kind() })?;

        Ok(Self {
            data_encoding,
            ident_version,
            os_abi,
            abi_version,
            pad,
            typ: u16::from_reader(reader)?,
            machine: u16::from_reader(reader)?,
            version: u32::from_reader(reader)?,
            entry: u32::from_reader(reader)?,
            phoff: u32::from_reader(reader)?,
            shoff: u32::from_reader(reader)?,
            flags: u32::from_reader(reader)?,
            ehsize: u16::from_reader(reader)?,
            phentsize: u16::from_reader(reader)?,
            phnum: u16::from_reader(reader)?,
            shentsize: u16::from_reader(reader)?,
            shnum: u16::from_reader(reader)?,
            shstrndx: u16::from_reader(reader)?,
        })
    }
}

impl<W> ToWriter<W> for ElfHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        writer
            .write_all(&ELF_MAGIC)
            .map_err(|e| Error::Io { kind: e.kind() })?;
        CLASS_ELF32.to_writer(writer)?;
        self.data_encoding.to_writer(writer)?;
        self.ident_version.to_writer(writer)?;
        self.os_abi.to_writer(writer)?;
        self.abi_version.to_writer(writer)?;
        writer
            .write_all(&self.pad)
            .map_err(|e| Error::Io { kind: e.kind() })?;
        self.typ.to_writer(writer)?;
        self.machine.to_writer(writer)?;
        self.version.to_writer(writer)?;
        self.entry.to_writer(writer)?;
        self.phoff.to_writer(writer)?;
        self.shoff.to_writer(writer)?;
        self.flags.to_writer(writer)?;
        self.ehsize.to_writer(writer)?;
        self.phentsize.to_writer(writer)?;
        self.phnum.to_writer(writer)?;
        self.shentsize.to_writer(writer)?;
        self.shnum.to_writer(writer)?;
        self.shstrndx.to_writer(writer)
    }
}

impl HasWrittenSize for ElfHeader {
    const SIZE: usize = 0x34;
}
