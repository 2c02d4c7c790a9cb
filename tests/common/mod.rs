//! A synthetic Cortex-M style firmware image for container and rewrite
//! tests: one flash segment holding `.idata`, one RAM-shadow segment
//! holding `.data`, plus `.shstrtab`/`.symtab`/`.strtab` so symbol lookup
//! works. The layout matches what the tool requires of writable inputs
//! (PHT right after the header, SHT last).

// not every test crate uses every helper
#![allow(dead_code)]

use elfcomp::{
    elf::{
        Elf, ElfHeader, Section, SectionFlags, SectionType, Segment, SegmentFlags, SegmentType,
        Symbol, SymbolBinding, SymbolType,
    },
    ToWriter,
};

/// Address of `.idata` and of `__data_init_table`
pub const IDATA_ADDR: u32 = 0x0800_1000;
/// RAM address of `.data`
pub const DATA_ADDR: u32 = 0x2000_0000;
/// Value of the `memset` symbol
pub const MEMSET_ADDR: u32 = 0x0800_0400;
/// Default size of the `.idata` section (leaves generous slack)
pub const IDATA_SIZE: u32 = 0x100;
/// The non-uniform init data: not fill-able, compressible by copy codecs
pub const PATTERN: &[u8] = b"ABCABCABCABC";

/// File size of `.data`: 16 zero bytes, 256 fill bytes, the pattern
pub const DATA_FILESZ: u32 = 0x10 + 0x100 + PATTERN.len() as u32;
/// Memory size of `.data`; the tail past `DATA_FILESZ` is load-time zeros
pub const DATA_MEMSZ: u32 = 0x140;

const EHSIZE: u32 = 0x34;
const PHENT: u32 = 0x20;

fn push_entry(table: &mut Vec<u8>, src: u32, dst: u32, size: u32, pfn: u32) {
    for word in [src, dst, size, pfn] {
        table.extend_from_slice(&word.to_le_bytes());
    }
}

/// `.data` contents as loaded into RAM
pub fn data_payload() -> Vec<u8> {
    let mut data = vec![0u8; 0x10];
    data.extend_from_slice(&[0xAA; 0x100]);
    data.extend_from_slice(PATTERN);
    data
}

/// The input init table: three live entries and one skip entry
pub fn idata_payload(idata_size: u32) -> Vec<u8> {
    let mut idata = Vec::new();
    idata.extend_from_slice(&4u32.to_le_bytes());
    push_entry(&mut idata, 0x0800_2000, DATA_ADDR, 0x10, 0xDEAD_0001);
    push_entry(&mut idata, 0x0800_2010, DATA_ADDR + 0x10, 0x100, 0xDEAD_0001);
    push_entry(&mut idata, 0, 0, 0, 0);
    push_entry(
        &mut idata,
        0x0800_2110,
        DATA_ADDR + 0x110,
        PATTERN.len() as u32,
        0xDEAD_0002,
    );
    assert!(idata.len() <= idata_size as usize);
    idata.resize(idata_size as usize, 0xFF);
    idata
}

/// Build the firmware image with an `.idata` section of `idata_size` bytes
pub fn firmware_image_with_idata_size(idata_size: u32) -> Vec<u8> {
    let idata = idata_payload(idata_size);
    let data = data_payload();

    let shstrtab = b"\0.idata\0.data\0.shstrtab\0.symtab\0.strtab\0".to_vec();
    let strtab = b"\0__data_init_table\0memset\0".to_vec();

    let symbols = [
        Symbol::default(),
        Symbol {
            name_idx: 1,
            value: IDATA_ADDR,
            bind: SymbolBinding::Global as u8,
            typ: SymbolType::Object as u8,
            shndx: 1,
            ..Symbol::default()
        },
        Symbol {
            name_idx: 19,
            value: MEMSET_ADDR,
            size: 0x30,
            bind: SymbolBinding::Global as u8,
            typ: SymbolType::Func as u8,
            ..Symbol::default()
        },
    ];
    let mut symtab = Vec::new();
    for symbol in &symbols {
        symbol.to_writer(&mut symtab).unwrap();
    }

    let idata_off = EHSIZE + 2 * PHENT;
    let data_off = idata_off + idata_size;
    let shstrtab_off = data_off + data.len() as u32;
    let symtab_off = shstrtab_off + shstrtab.len() as u32;
    let strtab_off = symtab_off + symtab.len() as u32;

    let section = |name_idx: u32, typ: SectionType, flags, addr, offset: u32, payload: &[u8]| {
        Section {
            name_idx,
            typ: typ as u32,
            flags,
            addr,
            offset,
            size: payload.len() as u32,
            payload: payload.to_vec(),
            ..Section::default()
        }
    };

    let alloc = SectionFlags::ALLOC;
    let mut sections = vec![
        Section::default(),
        section(1, SectionType::ProgBits, alloc, IDATA_ADDR, idata_off, &idata),
        section(
            8,
            SectionType::ProgBits,
            alloc | SectionFlags::WRITE,
            DATA_ADDR,
            data_off,
            &data,
        ),
        section(14, SectionType::StrTab, SectionFlags::empty(), 0, shstrtab_off, &shstrtab),
        section(24, SectionType::SymTab, SectionFlags::empty(), 0, symtab_off, &symtab),
        section(32, SectionType::StrTab, SectionFlags::empty(), 0, strtab_off, &strtab),
    ];
    sections[4].link = 5;
    sections[4].entsize = 0x10;

    let segments = vec![
        Segment {
            typ: SegmentType::Load as u32,
            offset: idata_off,
            vaddr: IDATA_ADDR,
            paddr: IDATA_ADDR,
            filesz: idata_size,
            memsz: idata_size,
            flags: SegmentFlags::R,
            align: 4,
            payload: idata,
        },
        Segment {
            typ: SegmentType::Load as u32,
            offset: data_off,
            vaddr: DATA_ADDR,
            paddr: 0x0800_2000,
            filesz: data.len() as u32,
            memsz: DATA_MEMSZ,
            flags: SegmentFlags::R | SegmentFlags::W,
            align: 4,
            payload: data,
        },
    ];

    let mut elf = Elf {
        header: ElfHeader {
            typ: 2,
            machine: 0x28,
            entry: IDATA_ADDR,
            phoff: EHSIZE,
            shstrndx: 3,
            ..ElfHeader::default()
        },
        segments,
        sections,
        symbols: symbols.to_vec(),
    };
    elf.pack().unwrap()
}

/// Build the default firmware image
pub fn firmware_image() -> Vec<u8> {
    firmware_image_with_idata_size(IDATA_SIZE)
}
