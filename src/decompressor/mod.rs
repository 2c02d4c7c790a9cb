//! Placement and deduplication of boot-time decompressor routines.
//!
//! Each codec chosen during selection needs exactly one decompressor in the
//! output image. A decompressor is free when the application already links a
//! suitable routine (resolved through the codec's symbol aliases); otherwise
//! the codec's fallback image is embedded once and shared by every entry
//! that uses the codec.

use log::debug;

use crate::{
    compress::{Codec, ParamOrder, DEFAULT_PARAMS},
    elf::{Elf, SymbolFilter},
    error::{Error, Result},
};

#[derive(Debug, Clone)]
/// One decompressor routine: either resolved to an application symbol or an
/// embedded code image that receives its address during [`DecompressorManager::build`]
struct Decompressor {
    address: Option<u32>,
    image: Vec<u8>,
    align: u32,
    params: ParamOrder,
}

#[derive(Debug, Default)]
/// Unique-by-codec registry of the decompressors chosen during selection.
/// Registration order is preserved; it determines the layout of the embedded
/// code block and is observable through the descriptor `pfn` fields.
pub struct DecompressorManager {
    decompressors: Vec<(&'static str, Decompressor)>,
}

impl DecompressorManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, name: &str) -> Option<&Decompressor> {
        self.decompressors
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, d)| d)
    }

    fn find_alias(codec: &dyn Codec, binary: &Elf) -> Option<(&'static str, u32, ParamOrder)> {
        codec.aliases().iter().find_map(|alias| {
            binary
                .find_symbol(&SymbolFilter::builder().name(alias.symbol).build())
                .map(|sym| (alias.symbol, sym.value, alias.params))
        })
    }

    /// Code bytes that choosing `codec` would add to the image: zero when the
    /// codec is already registered or the application provides the routine,
    /// the fallback image size otherwise
    pub fn marginal_cost(&self, codec: &dyn Codec, binary: &Elf) -> Result<usize> {
        if self.get(codec.name()).is_some() {
            return Ok(0); // already paid
        }
        if Self::find_alias(codec, binary).is_some() {
            return Ok(0); // in the app code already
        }
        Ok(codec.decompressor_image()?.len())
    }

    /// Record `codec`'s decompressor; a no-op when already registered.
    /// Aliases are scanned in declaration order and the first hit fixes both
    /// the routine address and the parameter order.
    pub fn register(&mut self, codec: &dyn Codec, binary: &Elf) -> Result<()> {
        if self.get(codec.name()).is_some() {
            return Ok(());
        }
        let decomp = match Self::find_alias(codec, binary) {
            Some((symbol, address, params)) => {
                debug!(
                    "Found builtin func {} at {:#x} for algo {}",
                    symbol,
                    address,
                    codec.name()
                );
                Decompressor {
                    address: Some(address),
                    image: Vec::new(),
                    align: 1,
                    params,
                }
            }
            None => Decompressor {
                address: None,
                image: codec.decompressor_image()?,
                align: codec.decompressor_align(),
                params: DEFAULT_PARAMS,
            },
        };
        self.decompressors.push((codec.name(), decomp));
        Ok(())
    }

    /// Lay out every embedded decompressor starting at `address`, in
    /// registration order, padding with zero bytes up to each image's
    /// alignment. Assigns the final address of each embedded routine and
    /// returns the assembled code block. Alias-resolved decompressors
    /// contribute nothing.
    pub fn build(&mut self, mut address: u32) -> Vec<u8> {
        let mut image = Vec::new();
        for (_, decomp) in &mut self.decompressors {
            if decomp.address.is_some() {
                continue;
            }
            let misalign = address % decomp.align;
            if misalign != 0 {
                let pad = decomp.align - misalign;
                address += pad;
                image.extend(std::iter::repeat(0u8).take(pad as usize));
            }
            decomp.address = Some(address);
            image.extend_from_slice(&decomp.image);
            address += decomp.image.len() as u32;
        }
        image
    }

    /// Assemble the 16-byte table descriptor for an entry handled by the
    /// codec named `name`: 12 parameter bytes in the decompressor's argument
    /// order, then the decompressor address
    pub fn table_entry(&self, name: &'static str, src: u32, dst: u32, size: u32) -> Result<[u8; 16]> {
        let decomp = self
            .get(name)
            .ok_or(Error::DecompressorNotRegistered { name })?;
        let address = decomp
            .address
            .ok_or(Error::DecompressorNotRegistered { name })?;
        let mut out = [0u8; 16];
        out[..12].copy_from_slice(&decomp.params.pack(src, dst, size));
        out[12..].copy_from_slice(&address.to_le_bytes());
        Ok(out)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        compress::{Alias, CodecConfig, Encoded},
        elf::{ElfHeader, Symbol},
    };

    /// Codec stand-in with a fixed in-memory decompressor image
    struct StubCodec {
        name: &'static str,
        aliases: &'static [Alias],
        image: Vec<u8>,
        align: u32,
        config: CodecConfig,
    }

    impl StubCodec {
        fn new(name: &'static str, aliases: &'static [Alias], image: Vec<u8>, align: u32) -> Self {
            Self {
                name,
                aliases,
                image,
                align,
                config: CodecConfig::builder().arch("cm3").build(),
            }
        }
    }

    impl Codec for StubCodec {
        fn name(&self) -> &'static str {
            self.name
        }

        fn aliases(&self) -> &'static [Alias] {
            self.aliases
        }

        fn decompressor_align(&self) -> u32 {
            self.align
        }

        fn config(&self) -> &CodecConfig {
            &self.config
        }

        fn encode(&self, _src: &[u8]) -> Encoded {
            Encoded::Unsupported
        }

        fn decompressor_image(&self) -> Result<Vec<u8>> {
            Ok(self.image.clone())
        }
    }

    const MEMSET_ALIAS: &[Alias] = &[Alias {
        symbol: "memset",
        params: ParamOrder::DstSrcSize,
    }];

    fn binary_with_memset() -> Elf {
        Elf {
            header: ElfHeader::default(),
            segments: Vec::new(),
            sections: Vec::new(),
            symbols: vec![Symbol {
                name: "memset".into(),
                value: 0x0800_0400,
                ..Symbol::default()
            }],
        }
    }

    fn empty_binary() -> Elf {
        Elf {
            header: ElfHeader::default(),
            segments: Vec::new(),
            sections: Vec::new(),
            symbols: Vec::new(),
        }
    }

    #[test]
    fn test_alias_hit_costs_nothing() {
        let manager = DecompressorManager::new();
        let codec = StubCodec::new("fill", MEMSET_ALIAS, vec![0; 64], 2);
        assert_eq!(
            manager.marginal_cost(&codec, &binary_with_memset()).unwrap(),
            0
        );
    }

    #[test]
    fn test_embedded_cost_is_image_size_until_registered() {
        let binary = empty_binary();
        let mut manager = DecompressorManager::new();
        let codec = StubCodec::new("packbits", &[], vec![0xAA; 48], 2);
        assert_eq!(manager.marginal_cost(&codec, &binary).unwrap(), 48);
        manager.register(&codec, &binary).unwrap();
        // the second selection rides on the first registration
        assert_eq!(manager.marginal_cost(&codec, &binary).unwrap(), 0);
    }

    #[test]
    fn test_register_twice_is_a_noop() {
        let binary = empty_binary();
        let mut manager = DecompressorManager::new();
        let codec = StubCodec::new("packbits", &[], vec![0xAA; 16], 2);
        manager.register(&codec, &binary).unwrap();
        manager.register(&codec, &binary).unwrap();
        let image = manager.build(0x1000);
        assert_eq!(image.len(), 16);
    }

    #[test]
    fn test_build_pads_to_alignment_in_registration_order() {
        let binary = empty_binary();
        let mut manager = DecompressorManager::new();
        let first = StubCodec::new("a", &[], vec![0x11; 5], 2);
        let second = StubCodec::new("b", &[], vec![0x22; 6], 4);
        manager.register(&first, &binary).unwrap();
        manager.register(&second, &binary).unwrap();

        let image = manager.build(0x1002);
        // first lands at 0x1002 (aligned), second needs 0x1007 -> 0x1008
        assert_eq!(image.len(), 5 + 1 + 6);
        assert_eq!(&image[..5], &[0x11; 5]);
        assert_eq!(image[5], 0);
        assert_eq!(&image[6..], &[0x22; 6]);

        let entry_a = manager.table_entry("a", 1, 2, 3).unwrap();
        assert_eq!(&entry_a[12..], &0x1002u32.to_le_bytes());
        let entry_b = manager.table_entry("b", 1, 2, 3).unwrap();
        assert_eq!(&entry_b[12..], &0x1008u32.to_le_bytes());
    }

    #[test]
    fn test_aliased_entry_uses_symbol_address_and_order() {
        let binary = binary_with_memset();
        let mut manager = DecompressorManager::new();
        let codec = StubCodec::new("fill", MEMSET_ALIAS, vec![0; 64], 2);
        manager.register(&codec, &binary).unwrap();

        let image = manager.build(0x2000);
        assert!(image.is_empty());

        let entry = manager
            .table_entry("fill", 0xAA, 0x2000_0000, 0x100)
            .unwrap();
        // memset argument order: dst, value, size, then the routine address
        assert_eq!(&entry[0..4], &0x2000_0000u32.to_le_bytes());
        assert_eq!(&entry[4..8], &0xAAu32.to_le_bytes());
        assert_eq!(&entry[8..12], &0x100u32.to_le_bytes());
        assert_eq!(&entry[12..16], &0x0800_0400u32.to_le_bytes());
    }

    #[test]
    fn test_unregistered_codec_is_an_error() {
        let manager = DecompressorManager::new();
        assert_eq!(
            manager.table_entry("lz77rle", 0, 0, 0),
            Err(Error::DecompressorNotRegistered { name: "lz77rle" })
        );
    }
}
