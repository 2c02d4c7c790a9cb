//! Codec selection and `.idata` layout.
//!
//! For every entry of the data-initialization table the raw RAM contents are
//! encoded with each registered codec and the cheapest result wins, where
//! cost is payload bytes plus the marginal decompressor code the choice
//! pulls in. The section is then rebuilt in place as
//! `{count, descriptors, decompressor code, payloads}` and shrunk to fit.

use std::io::{Cursor, Read, Seek};

use log::{debug, info};

use crate::{
    compress::{self, Codec, CodecConfig, Encoded},
    decompressor::DecompressorManager,
    elf::{Elf, SectionType, SymbolFilter},
    error::{Error, Result},
    FromReader, HasWrittenSize, ToWriter,
};

/// Linker symbol marking the head of the data-initialization table
pub const INIT_TABLE_SYMBOL: &str = "__data_init_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One 16-byte entry of the data-initialization table
pub struct InitEntry {
    /// Address of the source payload (or an inline value)
    pub src: u32,
    /// RAM destination address
    pub dst: u32,
    /// Decompressed length; 0 marks a skipped entry
    pub size: u32,
    /// Decompressor function pointer
    pub pfn: u32,
}

impl<R> FromReader<R> for InitEntry
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader(reader: &mut R) -> Result<Self> {
        Ok(Self {
            src: u32::from_reader(reader)?,
            dst: u32::from_reader(reader)?,
            size: u32::from_reader(reader)?,
            pfn: u32::from_reader(reader)?,
        })
    }
}

impl HasWrittenSize for InitEntry {
    const SIZE: usize = 0x10;
}

/// Codec output destined for the rewritten table
enum Payload {
    /// Value stored verbatim in the descriptor `src` field
    Inline(u32),
    /// Bytes appended to the payload block
    Bytes(Vec<u8>),
}

/// A selected codec's output for one table entry
struct CompressedData {
    codec: &'static str,
    payload: Payload,
    dst: u32,
    size: u32,
}

/// Pick the cheapest codec for `raw`. Returns the codec index and its
/// output; `None` when nothing can encode the input.
fn select_codec(
    codecs: &[Box<dyn Codec>],
    manager: &DecompressorManager,
    binary: &Elf,
    raw: &[u8],
) -> Result<Option<(usize, Payload)>> {
    let mut best: Option<(usize, Payload, usize)> = None;
    for (index, codec) in codecs.iter().enumerate() {
        debug!("\tTrying {}", codec.name());
        let (comp_size, payload) = match codec.encode(raw) {
            Encoded::Unsupported => {
                debug!("\t\tn/a");
                continue;
            }
            Encoded::Inline(value) => (0, Payload::Inline(value)),
            Encoded::Bytes(bytes) => (bytes.len(), Payload::Bytes(bytes)),
        };
        let dc_size = manager.marginal_cost(codec.as_ref(), binary)?;
        let total = comp_size + dc_size;
        debug!("\t\t{:X} -> {:X}+{:X}={:X}", raw.len(), comp_size, dc_size, total);
        if best.as_ref().map_or(true, |(_, _, t)| total < *t) {
            best = Some((index, payload, total));
        }
        if total == 0 {
            break; // nothing can be better
        }
    }
    Ok(best.map(|(index, payload, total)| {
        info!(
            "\tBest algo: {} ({:X} -> {:X})",
            codecs[index].name(),
            raw.len(),
            total
        );
        (index, payload)
    }))
}

/// Rewrite the binary's data-initialization table in place: compress every
/// non-empty entry, embed the decompressors the choices require, and shrink
/// the table's section around the result.
pub fn rewrite(binary: &mut Elf, config: &CodecConfig) -> Result<()> {
    let codecs = compress::registry(config);

    let table_sym = binary
        .find_symbol(&SymbolFilter::builder().name(INIT_TABLE_SYMBOL).build())
        .ok_or(Error::MissingInitTable)?
        .clone();
    let table_p = table_sym.value;
    debug!("{}: {:#x}", INIT_TABLE_SYMBOL, table_p);
    if table_p & 3 != 0 {
        return Err(Error::MisalignedInitTable { addr: table_p });
    }

    let table_shndx = usize::from(table_sym.shndx);
    let idata = binary.section(table_shndx)?;
    let idata_size = idata.size as usize;
    debug!(".idata: {:#x} [{:#x}]", idata.addr, idata.size);
    if table_p != idata.addr {
        return Err(Error::InitTableSectionMismatch {
            addr: table_p,
            section_addr: idata.addr,
        });
    }

    let n_entries = u32::from_reader(&mut Cursor::new(binary.read_from_va(table_p, 4)?))?;
    info!("{} sections to initialize", n_entries);

    info!("Compressing sections...");
    let mut manager = DecompressorManager::new();
    let mut srcdata: Vec<Option<CompressedData>> = Vec::with_capacity(n_entries as usize);
    for index in 0..n_entries {
        let entry_va = table_p + 4 + index * InitEntry::SIZE as u32;
        let entry = InitEntry::from_reader(&mut Cursor::new(
            binary.read_from_va(entry_va, InitEntry::SIZE as u32)?,
        ))?;
        info!(
            "{:2}: {:08X} -> {:08X} [{:08X}]",
            index, entry.src, entry.dst, entry.size
        );
        if entry.size == 0 {
            srcdata.push(None);
            continue;
        }

        let raw = binary.read_from_va(entry.dst, entry.size)?;
        let Some((winner, payload)) = select_codec(&codecs, &manager, binary, &raw)? else {
            return Err(Error::Incompressible {
                index,
                size: entry.size,
            });
        };
        manager.register(codecs[winner].as_ref(), binary)?;
        srcdata.push(Some(CompressedData {
            codec: codecs[winner].name(),
            payload,
            dst: entry.dst,
            size: entry.size,
        }));

        // Mark the source data section as zero-initialized so a later
        // objcopy leaves it out of the load image. A destination mapped
        // only by a segment has no section to mark.
        if let Some(shndx) = binary.find_section_index_by_va(entry.dst) {
            let section = binary.section_mut(shndx)?;
            if section.section_type() == Some(SectionType::ProgBits) {
                section.typ = SectionType::NoBits as u32;
            }
        }
    }

    let out_n = srcdata.iter().flatten().count() as u32;
    let fn_addr = table_p + 4 + out_n * InitEntry::SIZE as u32;
    let decomp_code = manager.build(fn_addr);
    let mut data_addr = fn_addr + decomp_code.len() as u32;

    info!("Building .idata...");
    // table_p:
    //   u32 out_n
    //   { src, dst, size, pfn }[out_n]
    //   decompressor code
    //   compressed payloads
    let mut table = Vec::with_capacity(4 + out_n as usize * InitEntry::SIZE);
    out_n.to_writer(&mut table)?;
    let mut comp_data = Vec::new();
    for record in srcdata.iter().flatten() {
        let (src, src_size) = match &record.payload {
            Payload::Inline(value) => (*value, 0),
            Payload::Bytes(bytes) => {
                comp_data.extend_from_slice(bytes);
                (data_addr, bytes.len() as u32)
            }
        };
        table.extend_from_slice(&manager.table_entry(record.codec, src, record.dst, record.size)?);
        data_addr += src_size;
    }

    let mut image = table;
    image.extend_from_slice(&decomp_code);
    image.extend_from_slice(&comp_data);
    if image.len() > idata_size {
        return Err(Error::CapacityExceeded {
            needed: image.len(),
            available: idata_size,
        });
    }
    binary.write_to_va(table_p, &image)?;

    info!("Shrinking .idata...");
    binary.section_mut(table_shndx)?.size = image.len() as u32;
    Ok(())
}
