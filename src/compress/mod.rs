//! Compression codecs and their registry.
//!
//! Every codec's output format is a contract with an externally built
//! assembly decompressor: the encoder side lives here, the decoder runs at
//! boot. A codec advertises the application symbols that can already serve
//! as its decompressor and, failing those, a fallback machine-code image
//! loaded from disk.

use std::{fs, path::PathBuf};

use typed_builder::TypedBuilder;

use crate::error::Result;

pub mod fill;
pub mod lz77rle;
pub mod packbits;

pub use fill::Fill;
pub use lz77rle::Lz77Rle;
pub use packbits::PackBits;

#[derive(Debug, Clone, PartialEq, Eq)]
/// The result of encoding one input buffer
pub enum Encoded {
    /// A compressed payload to be placed in the payload block
    Bytes(Vec<u8>),
    /// No payload at all; the value is stored verbatim in the descriptor's
    /// `src` field (e.g. the fill byte for [`Fill`])
    Inline(u32),
    /// The codec cannot represent this input
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The argument order a decompressor routine expects, applied when packing
/// the first 12 bytes of a table descriptor
pub enum ParamOrder {
    /// `(src, dst, size)`, the scatterload convention
    SrcDstSize,
    /// `(dst, src, size)`, the `memset` convention
    DstSrcSize,
}

impl ParamOrder {
    /// Pack the three descriptor parameters in this order as little-endian
    /// u32 values
    pub fn pack(self, src: u32, dst: u32, size: u32) -> [u8; 12] {
        let (first, second) = match self {
            Self::SrcDstSize => (src, dst),
            Self::DstSrcSize => (dst, src),
        };
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&first.to_le_bytes());
        out[4..8].copy_from_slice(&second.to_le_bytes());
        out[8..12].copy_from_slice(&size.to_le_bytes());
        out
    }
}

/// Parameter order used when a decompressor is embedded from a blob rather
/// than resolved from an application symbol
pub const DEFAULT_PARAMS: ParamOrder = ParamOrder::SrcDstSize;

#[derive(Debug, Clone, Copy)]
/// A decompressor routine that may already be linked into the application,
/// together with the argument order it expects
pub struct Alias {
    /// Symbol name to look for in the binary
    pub symbol: &'static str,
    /// Argument order of the routine behind the symbol
    pub params: ParamOrder,
}

#[derive(Debug, Clone, TypedBuilder)]
/// Configuration shared by all codec instances
pub struct CodecConfig {
    #[builder(setter(into))]
    /// Target architecture tag; selects which decompressor blobs are loaded
    pub arch: String,
    #[builder(default = PathBuf::from("compression"), setter(into))]
    /// Directory the decompressor blobs are discovered under
    pub blob_root: PathBuf,
}

impl CodecConfig {
    /// Path of the decompressor blob for the codec named `codec`
    fn blob_path(&self, codec: &str) -> PathBuf {
        self.blob_root
            .join(codec)
            .join("decompress")
            .join(format!("d_{}.bin", self.arch))
    }
}

/// A compression algorithm with an external boot-time decompressor
pub trait Codec {
    /// Registry name of the codec
    fn name(&self) -> &'static str;

    /// Application symbols that can serve as this codec's decompressor, in
    /// preference order
    fn aliases(&self) -> &'static [Alias];

    /// Required code alignment of the embedded decompressor image
    fn decompressor_align(&self) -> u32;

    /// The shared configuration
    fn config(&self) -> &CodecConfig;

    /// Encode `src` under this codec's wire format
    fn encode(&self, src: &[u8]) -> Encoded;

    /// Load the fallback decompressor image for the configured architecture
    fn decompressor_image(&self) -> Result<Vec<u8>> {
        Ok(fs::read(self.config().blob_path(self.name()))?)
    }
}

/// All codecs, in registry order. Selection ties are broken in favor of the
/// earlier codec.
pub fn registry(config: &CodecConfig) -> Vec<Box<dyn Codec>> {
    vec![
        Box::new(Fill::new(config.clone())),
        Box::new(PackBits::new(config.clone())),
        Box::new(Lz77Rle::new(config.clone())),
    ]
}
