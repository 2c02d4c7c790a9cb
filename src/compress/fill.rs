//! Constant-fill codec: regions consisting of a single repeated byte carry
//! no payload at all. The fill value rides in the descriptor's `src` field
//! and the decompressor is `memset`-shaped, so a binary that already links
//! `memset` pays nothing for the code either.

use super::{Alias, Codec, CodecConfig, Encoded, ParamOrder};

const ALIASES: &[Alias] = &[
    Alias {
        symbol: "memset",
        params: ParamOrder::DstSrcSize,
    },
    Alias {
        symbol: "__aeabi_memset",
        params: ParamOrder::DstSrcSize,
    },
];

#[derive(Debug, Clone)]
/// The `fill` codec
pub struct Fill {
    config: CodecConfig,
}

impl Fill {
    /// Create a fill codec for `config`
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }
}

impl Codec for Fill {
    fn name(&self) -> &'static str {
        "fill"
    }

    fn aliases(&self) -> &'static [Alias] {
        ALIASES
    }

    fn decompressor_align(&self) -> u32 {
        // Cortex-M code without literal pools is safe to align to 2
        2
    }

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn encode(&self, src: &[u8]) -> Encoded {
        let Some(&value) = src.first() else {
            return Encoded::Bytes(Vec::new());
        };
        if src.iter().all(|&b| b == value) {
            Encoded::Inline(u32::from(value))
        } else {
            Encoded::Unsupported
        }
    }
}
