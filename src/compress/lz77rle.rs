//! LZ77 with run-length encoding of zeros, matching the scatterload-style
//! assembly decoder.
//!
//! The stream is a sequence of records: a primary header byte, an optional
//! extended literal-count byte, an optional extended zero/copy-count byte,
//! the literal bytes, and (for copies) a final distance byte.
//!
//! Primary header fields:
//! - bit 3 (`0x08`): DISTCOPY. Set when the record ends with a copy from a
//!   previous window position; clear when it ends with a run of zeros.
//! - bits 0-2: literal count plus one, or zero when the count is in the
//!   extended byte.
//! - bits 4-7: the zero-run length (zerofill) or the copy length minus two
//!   (distcopy), or zero when the value is in the extended byte.
//!
//! Copies may overlap their own output, which is what encodes runs of a
//! repeated nonzero byte.

use super::{Alias, Codec, CodecConfig, Encoded, ParamOrder};

const MIN_COPY: usize = 3;
// distance byte is 1..=254; offset zero is inside the window
const MAX_DIST: usize = 254;
const MAX_COPY: usize = 254;
const MAX_ZERO: usize = 255;
const MAX_LIT: usize = 254;
const DISTCOPY: u8 = 0x08;

const ALIASES: &[Alias] = &[Alias {
    symbol: "__scatterload_lz77rle",
    params: ParamOrder::SrcDstSize,
}];

#[derive(Debug, Clone)]
/// The `lz77rle` codec
pub struct Lz77Rle {
    config: CodecConfig,
}

impl Lz77Rle {
    /// Create an LZ77RLE codec for `config`
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Longest match for position `si`, searched backward over distances
    /// `1..=254`. Matches may run into not-yet-emitted output. The shortest
    /// distance wins ties.
    fn find_match(src: &[u8], si: usize) -> (usize, usize) {
        let mut ncopy = 0;
        let mut copy_dist = 0;
        for dist in 1..=si.min(MAX_DIST) {
            let ofs = si - dist;
            let mut len = 0;
            while len < MAX_COPY && si + len < src.len() && src[ofs + len] == src[si + len] {
                len += 1;
            }
            if len > ncopy {
                ncopy = len;
                copy_dist = dist;
            }
        }
        (ncopy, copy_dist)
    }
}

impl Codec for Lz77Rle {
    fn name(&self) -> &'static str {
        "lz77rle"
    }

    fn aliases(&self) -> &'static [Alias] {
        ALIASES
    }

    fn decompressor_align(&self) -> u32 {
        2
    }

    fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn encode(&self, src: &[u8]) -> Encoded {
        let size = src.len();
        let mut dst = Vec::new();
        let mut si = 0;
        let mut lit_start = 0;
        let mut lit_len = 0;

        while si < size {
            let zero_cap = MAX_ZERO.min(size - si);
            let mut nzero = 0;
            while nzero < zero_cap && src[si + nzero] == 0 {
                nzero += 1;
            }

            let (mut ncopy, copy_dist) = if nzero == zero_cap {
                // the zero run already reaches the cap, nothing can beat it
                (0, 0)
            } else {
                Self::find_match(src, si)
            };
            if ncopy < MIN_COPY {
                ncopy = 0;
            }

            if nzero == 0 && ncopy == 0 {
                lit_len += 1;
                si += 1;
                if lit_len < MAX_LIT && si < size {
                    continue;
                }
            }

            let mut hdr = 0u8;
            let mut extra = Vec::new();
            if lit_len <= 6 {
                hdr |= (lit_len + 1) as u8;
            } else {
                extra.push((lit_len + 1) as u8);
            }

            let mut dist = None;
            if nzero + 1 > ncopy {
                // zerofill is better
                si += nzero;
                if (1..=15).contains(&nzero) {
                    hdr |= (nzero as u8) << 4;
                } else {
                    extra.push(nzero as u8);
                }
            } else {
                si += ncopy;
                hdr |= DISTCOPY;
                let stored = ncopy - 2;
                if stored <= 15 {
                    hdr |= (stored as u8) << 4;
                } else {
                    extra.push(stored as u8);
                }
                dist = Some(copy_dist as u8);
            }

            dst.push(hdr);
            dst.extend_from_slice(&extra);
            dst.extend_from_slice(&src[lit_start..lit_start + lit_len]);
            if let Some(dist) = dist {
                dst.push(dist);
            }
            lit_start = si;
            lit_len = 0;
        }

        Encoded::Bytes(dst)
    }
}
