//! ELF symbols and conjunctive symbol lookup

use std::io::{Read, Seek, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use typed_builder::TypedBuilder;

use crate::{error::Error, FromReader, HasWrittenSize, ToWriter};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// Symbol binding (`STB_*`)
pub enum SymbolBinding {
    /// Not visible outside the object file
    Local = 0,
    /// Visible to all object files
    Global = 1,
    /// Global with lower precedence
    Weak = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// Symbol type (`STT_*`)
pub enum SymbolType {
    /// Unspecified
    NoType = 0,
    /// Data object
    Object = 1,
    /// Function or other executable code
    Func = 2,
    /// Associated with a section
    Section = 3,
    /// Source file name
    File = 4,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// One entry of the symbol table
pub struct Symbol {
    /// Name resolved from `.strtab`; empty until resolved or for unnamed symbols
    pub name: String,
    /// Offset of the name in `.strtab`
    pub name_idx: u32,
    /// Symbol value (a virtual address for data and function symbols)
    pub value: u32,
    /// Size in bytes, or 0 when unknown
    pub size: u32,
    /// Binding, the high nibble of `st_info`
    pub bind: u8,
    /// Type, the low nibble of `st_info`
    pub typ: u8,
    /// Visibility byte
    pub other: u8,
    /// Index of the section the symbol is defined relative to
    pub shndx: u16,
}

impl<R> FromReader<R> for Symbol
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
        let name_idx = u32::from_reader(reader)?;
        let value = u32::from_reader(reader)?;
        let size = u32::from_reader(reader)?;
        let info = u8::from_reader(reader)?;
        Ok(Self {
            name: String::new(),
            name_idx,
            value,
            size,
            bind: info >> 4,
            typ: info & 0x0F,
            other: u8::from_reader(reader)?,
            shndx: u16::from_reader(reader)?,
        })
    }
}

impl<W> ToWriter<W> for Symbol
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.name_idx.to_writer(writer)?;
        self.value.to_writer(writer)?;
        self.size.to_writer(writer)?;
        ((self.bind << 4) | (self.typ & 0x0F)).to_writer(writer)?;
        self.other.to_writer(writer)?;
        self.shndx.to_writer(writer)
    }
}

impl HasWrittenSize for Symbol {
    const SIZE: usize = 0x10;
}

#[derive(Debug, Clone, Default, TypedBuilder)]
/// A conjunctive symbol lookup filter: a symbol matches when every field
/// that was supplied matches. An empty filter matches every symbol.
pub struct SymbolFilter {
    #[builder(default, setter(into, strip_option))]
    /// Match the resolved symbol name
    pub name: Option<String>,
    #[builder(default, setter(strip_option))]
    /// Match the symbol value
    pub value: Option<u32>,
    #[builder(default, setter(strip_option))]
    /// Match the symbol size
    pub size: Option<u32>,
    #[builder(default, setter(strip_option))]
    /// Match the symbol type
    pub typ: Option<SymbolType>,
    #[builder(default, setter(strip_option))]
    /// Match the symbol binding
    pub bind: Option<SymbolBinding>,
    #[builder(default, setter(strip_option))]
    /// Match the defining section index
    pub shndx: Option<u16>,
}

impl SymbolFilter {
    /// Whether `symbol` satisfies every supplied field of the filter
    pub fn matches(&self, symbol: &Symbol) -> bool {
        self.name.as_ref().map_or(true, |n| *n == symbol.name)
            && self.value.map_or(true, |v| v == symbol.value)
            && self.size.map_or(true, |s| s == symbol.size)
            && self.typ.map_or(true, |t| t as u8 == symbol.typ)
            && self.bind.map_or(true, |b| b as u8 == symbol.bind)
            && self.shndx.map_or(true, |i| i == symbol.shndx)
    }
}
