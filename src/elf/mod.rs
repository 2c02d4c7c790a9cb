//! In-memory representation of a 32-bit little-endian ELF executable with
//! virtual-address-indexed access to its contents.
//!
//! The file is parsed once into owned segment and section payloads, mutated
//! in place through [`Elf::write_to_va`] and direct field access, and
//! serialized once with [`Elf::pack`]. Writable mode additionally pins the
//! file layout (program header table directly after the ELF header, section
//! header table last), which is what allows `pack` to reassemble the image
//! without relocating anything.

use std::io::{Cursor, Seek, SeekFrom};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    FromReader, HasWrittenSize, ToWriter,
};

pub mod header;
pub mod section;
pub mod segment;
pub mod strtab;
pub mod symbol;

pub use header::ElfHeader;
pub use section::{Section, SectionFlags, SectionType};
pub use segment::{Segment, SegmentFlags, SegmentType};
pub use strtab::StringTable;
pub use symbol::{Symbol, SymbolBinding, SymbolFilter, SymbolType};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A parsed ELF32 executable
pub struct Elf {
    /// The file header
    pub header: ElfHeader,
    /// The program header table, in file order
    pub segments: Vec<Segment>,
    /// The section header table, in file order
    pub sections: Vec<Section>,
    /// Symbols from `.symtab` with names resolved via `.strtab`; empty when
    /// the file carries no symbol table
    pub symbols: Vec<Symbol>,
}

impl Elf {
    /// Parse an ELF image for read-only use
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, false)
    }

    /// Parse an ELF image that will be mutated and repacked. Rejects layouts
    /// `pack` cannot reproduce in place.
    pub fn parse_writable(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, true)
    }

    fn parse_with(data: &[u8], writable: bool) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let header = ElfHeader::from_reader(&mut cursor)?;
        info!("ELF32");

        if writable && u32::from(header.ehsize) != header.phoff {
            return Err(Error::PhtNotAdjacent);
        }
        if writable
            && header.shoff != 0
            && header.shnum != 0
            && u64::from(header.shoff)
                + u64::from(header.shnum) * u64::from(header.shentsize)
                != data.len() as u64
        {
            return Err(Error::ShtNotAtEnd);
        }

        debug!("{} segments", header.phnum);
        debug!("{} sections", header.shnum);

        cursor
            .seek(SeekFrom::Start(u64::from(header.phoff)))
            .map_err(|e| Error::Io { kind: e.kind() })?;
        let mut segments = Vec::with_capacity(usize::from(header.phnum));
        for _ in 0..header.phnum {
            let mut segment = Segment::from_reader(&mut cursor)?;
            let start = segment.offset as usize;
            let end = start + segment.filesz as usize;
            segment.payload = data
                .get(start..end)
                .ok_or(Error::Truncated {
                    what: "segment payload",
                    offset: start,
                })?
                .to_vec();
            segments.push(segment);
        }

        cursor
            .seek(SeekFrom::Start(u64::from(header.shoff)))
            .map_err(|e| Error::Io { kind: e.kind() })?;
        let mut sections = Vec::with_capacity(usize::from(header.shnum));
        for _ in 0..header.shnum {
            let mut section = Section::from_reader(&mut cursor)?;
            if section.has_data() {
                let start = section.offset as usize;
                let end = start + section.size as usize;
                section.payload = data
                    .get(start..end)
                    .ok_or(Error::Truncated {
                        what: "section payload",
                        offset: start,
                    })?
                    .to_vec();
            }
            sections.push(section);
        }

        let mut elf = Self {
            header,
            segments,
            sections,
            symbols: Vec::new(),
        };

        if elf.header.shstrndx != 0 {
            let shstrtab = elf.section(usize::from(elf.header.shstrndx))?.payload.clone();
            let table = StringTable::new(&shstrtab);
            for section in &mut elf.sections {
                section.name = table.get(section.name_idx as usize)?;
            }
        }

        elf.parse_symbols()?;

        Ok(elf)
    }

    fn parse_symbols(&mut self) -> Result<()> {
        let Some(symtab) = self.find_section_by_name(".symtab") else {
            return Ok(());
        };
        let strtab = self
            .find_section_by_name(".strtab")
            .ok_or(Error::SymtabWithoutStrtab)?;
        info!("Parsing symbols...");

        if symtab.payload.len() % Symbol::SIZE != 0 {
            return Err(Error::Truncated {
                what: "symbol table",
                offset: symtab.offset as usize,
            });
        }

        let names = strtab.payload.clone();
        let table = StringTable::new(&names);
        let mut cursor = Cursor::new(symtab.payload.as_slice());
        let mut symbols = Vec::with_capacity(symtab.payload.len() / Symbol::SIZE);
        for _ in 0..symtab.payload.len() / Symbol::SIZE {
            let mut symbol = Symbol::from_reader(&mut cursor)?;
            symbol.name = table.get(symbol.name_idx as usize)?;
            symbols.push(symbol);
        }
        self.symbols = symbols;
        Ok(())
    }

    /// The section at `index`
    pub fn section(&self, index: usize) -> Result<&Section> {
        self.sections
            .get(index)
            .ok_or(Error::SectionIndexOutOfRange { index })
    }

    /// Mutable access to the section at `index`
    pub fn section_mut(&mut self, index: usize) -> Result<&mut Section> {
        self.sections
            .get_mut(index)
            .ok_or(Error::SectionIndexOutOfRange { index })
    }

    /// The first section named `name`
    pub fn find_section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The first section whose address range contains `va`
    pub fn find_section_by_va(&self, va: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains_va(va))
    }

    /// Index of the first section whose address range contains `va`
    pub fn find_section_index_by_va(&self, va: u32) -> Option<usize> {
        self.sections.iter().position(|s| s.contains_va(va))
    }

    /// The first section whose file range contains `offset`
    pub fn find_section_by_offset(&self, offset: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains_offset(offset))
    }

    /// The first segment whose virtual address range contains `va`
    pub fn find_segment_by_va(&self, va: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains_va(va))
    }

    /// The first segment whose physical address range contains `pa`
    pub fn find_segment_by_pa(&self, pa: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains_pa(pa))
    }

    /// The first segment whose file range contains `offset`
    pub fn find_segment_by_offset(&self, offset: u32) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains_offset(offset))
    }

    /// The first symbol matching every supplied field of `filter`
    pub fn find_symbol(&self, filter: &SymbolFilter) -> Option<&Symbol> {
        self.symbols.iter().find(|sym| filter.matches(sym))
    }

    /// Map a virtual address to its file offset, via segments first and
    /// sections second. `None` when no region maps it.
    pub fn va_to_offset(&self, va: u32) -> Option<u32> {
        if let Some(seg) = self.find_segment_by_va(va) {
            return Some(seg.offset + (va - seg.vaddr));
        }
        if let Some(sct) = self.find_section_by_va(va) {
            return Some(sct.offset + (va - sct.addr));
        }
        None
    }

    /// Read `size` bytes at virtual address `va`.
    ///
    /// The first containing segment is preferred; a read reaching into its
    /// `[filesz, memsz)` tail yields zeros for the missing bytes. When no
    /// segment contains `va` the first containing section is used. Reads
    /// that cross a region boundary or hit no region at all fail.
    pub fn read_from_va(&self, va: u32, size: u32) -> Result<Vec<u8>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        if let Some(seg) = self.find_segment_by_va(va) {
            if u64::from(va) + u64::from(size) > u64::from(seg.vaddr) + u64::from(seg.memsz) {
                return Err(Error::ReadOutOfBounds { va, size });
            }
            let start = (va - seg.vaddr) as usize;
            let end = start + size as usize;
            let filesz = seg.filesz as usize;
            // the [filesz, memsz) tail is zero-filled at load time
            if start >= filesz {
                return Ok(vec![0; size as usize]);
            }
            let mut out = seg
                .payload
                .get(start..filesz.min(end))
                .ok_or(Error::ReadOutOfBounds { va, size })?
                .to_vec();
            out.resize(size as usize, 0);
            return Ok(out);
        }
        if let Some(sct) = self.find_section_by_va(va) {
            if u64::from(va) + u64::from(size) > u64::from(sct.addr) + u64::from(sct.size) {
                return Err(Error::ReadOutOfBounds { va, size });
            }
            let start = (va - sct.addr) as usize;
            return Ok(sct
                .payload
                .get(start..start + size as usize)
                .ok_or(Error::ReadOutOfBounds { va, size })?
                .to_vec());
        }
        Err(Error::ReadUnmapped { va, size })
    }

    /// Write `data` at virtual address `va`.
    ///
    /// The same address range is commonly mapped by both a segment and a
    /// section; the write is applied to every region that contains `va` so
    /// that `pack` never serializes a stale copy. All containing regions are
    /// bounds-checked before any of them is mutated.
    pub fn write_to_va(&mut self, va: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let size = data.len() as u32;
        let end = u64::from(va) + data.len() as u64;

        let mut mapped = false;
        for seg in self.segments.iter().filter(|s| s.contains_va(va)) {
            if end > u64::from(seg.vaddr) + u64::from(seg.filesz) {
                return Err(Error::WriteOutOfBounds { va, size });
            }
            mapped = true;
        }
        for sct in self.sections.iter().filter(|s| s.contains_va(va)) {
            if end > u64::from(sct.addr) + u64::from(sct.size) {
                return Err(Error::WriteOutOfBounds { va, size });
            }
            mapped = true;
        }
        if !mapped {
            return Err(Error::WriteUnmapped { va, size });
        }

        for seg in self.segments.iter_mut().filter(|s| s.contains_va(va)) {
            let start = (va - seg.vaddr) as usize;
            if let Some(dst) = seg.payload.get_mut(start..start + data.len()) {
                dst.copy_from_slice(data);
            }
        }
        for sct in self.sections.iter_mut().filter(|s| s.contains_va(va)) {
            // NOBITS sections have no file image to keep consistent
            if !sct.has_data() {
                continue;
            }
            let start = (va - sct.addr) as usize;
            if let Some(dst) = sct.payload.get_mut(start..start + data.len()) {
                dst.copy_from_slice(data);
            }
        }
        Ok(())
    }

    /// Serialize the image: segments and section data at their recorded
    /// offsets, the section header table appended last (4-aligned), and the
    /// header refreshed to match.
    pub fn pack(&mut self) -> Result<Vec<u8>> {
        // segments and sections can be unordered; size the image to cover
        // every extent instead of appending sequentially
        let mut image_size = 0usize;
        for seg in &self.segments {
            if seg.filesz != 0 {
                image_size = image_size.max(seg.offset as usize + seg.filesz as usize);
            }
        }
        for sct in &self.sections {
            if sct.has_data() {
                image_size = image_size.max(sct.offset as usize + sct.size as usize);
            }
        }
        if !self.sections.is_empty() {
            image_size = (image_size + 3) & !3;
            self.header.shoff = image_size as u32;
            image_size += usize::from(self.header.shentsize) * self.sections.len();
        }
        info!("New image size: {:X}", image_size);

        let mut out = vec![0u8; image_size];
        for seg in &self.segments {
            let start = seg.offset as usize;
            let filesz = seg.filesz as usize;
            let src = seg.payload.get(..filesz).ok_or(Error::Truncated {
                what: "segment payload",
                offset: start,
            })?;
            out.get_mut(start..start + filesz)
                .ok_or(Error::Truncated {
                    what: "segment payload",
                    offset: start,
                })?
                .copy_from_slice(src);
        }
        for sct in &self.sections {
            if !sct.has_data() {
                continue;
            }
            let start = sct.offset as usize;
            let size = sct.size as usize;
            let src = sct.payload.get(..size).ok_or(Error::Truncated {
                what: "section payload",
                offset: start,
            })?;
            out.get_mut(start..start + size)
                .ok_or(Error::Truncated {
                    what: "section payload",
                    offset: start,
                })?
                .copy_from_slice(src);
        }

        self.header.phnum = self.segments.len() as u16;
        self.header.shnum = self.sections.len() as u16;

        let mut head = Vec::with_capacity(
            ElfHeader::SIZE + Segment::SIZE * self.segments.len(),
        );
        self.header.to_writer(&mut head)?;
        for seg in &self.segments {
            seg.to_writer(&mut head)?;
        }
        out.get_mut(..head.len())
            .ok_or(Error::Truncated {
                what: "program header table",
                offset: 0,
            })?
            .copy_from_slice(&head);

        if !self.sections.is_empty() {
            let mut sht = Vec::with_capacity(Section::SIZE * self.sections.len());
            for sct in &self.sections {
                sct.to_writer(&mut sht)?;
            }
            let shoff = self.header.shoff as usize;
            out.get_mut(shoff..shoff + sht.len())
                .ok_or(Error::Truncated {
                    what: "section header table",
                    offset: shoff,
                })?
                .copy_from_slice(&sht);
        }

        Ok(out)
    }
}
