//! Apple PackBits, byte-level.
//!
//! The stream is a sequence of packets. A header byte `h` in `0..=127`
//! announces `h + 1` literal bytes; `h` in `129..=255` announces one byte
//! repeated `256 - h` times. Header `128` is reserved and never emitted,
//! which caps runs at 127 bytes.

use super::{Alias, Codec, CodecConfig, Encoded, ParamOrder};

const MIN_RLE: usize = 2;
// 128-byte runs would encode as the reserved header 0x80
const MAX_RLE: usize = 127;
const MAX_LIT: usize = 128;

const ALIASES: &[Alias] = &[Alias {
    symbol: "__scatterload_packbits",
    params: ParamOrder::SrcDstSize,
}];

#[derive(Debug, Clone)]
/// The `packbits` codec
pub struct PackBits {
    config: CodecConfig,
}

impl PackBits {
    /// Create a PackBits codec for `config`
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Reference decoder mirroring the boot-time routine, for round-trip
    /// testing. `src` must be a well-formed stream; a packet truncated at
    /// the end of input is dropped.
    pub fn decode(src: &[u8]) -> Vec<u8> {
        let mut dst = Vec::new();
        let mut si = 0;
        while si < src.len() {
            let hdr = src[si];
            si += 1;
            if hdr < 128 {
                let count = usize::from(hdr) + 1;
                let Some(literals) = src.get(si..si + count) else {
                    break;
                };
                dst.extend_from_slice(literals);
                si += count;
            } else {
                let count = 256 - usize::from(hdr);
                let Some(&value) = src.get(si) else {
                    break;
                };
                si += 1;
                dst.extend(std::iter::repeat(value).take(count));
            }
        }
        dst
    }

    fn flush_literals(dst: &mut Vec<u8>, src: &[u8], lit_start: usize, lit_len: usize) {
        if lit_len > 0 {
            dst.push((lit_len - 1) as u8);
            dst.extend_from_slice(&src[lit_start..lit_start + lit_len]);
        }
    }
}

impl Codec for PackBits {
    fn name(&self) -> &'static str {
        "packbits"
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
            let data = src[si];
            let cap = (si + MAX_RLE).min(size);
            let mut run_end = si;
            while run_end < cap && src[run_end] == data {
                run_end += 1;
            }
            let nrle = run_end - si;

            if nrle >= MIN_RLE {
                Self::flush_literals(&mut dst, src, lit_start, lit_len);
                si += nrle;
                dst.push((nrle as u8).wrapping_neg());
                dst.push(data);
                lit_start = si;
                lit_len = 0;
            } else {
                si += 1;
                lit_len += 1;
                if lit_len == MAX_LIT {
                    Self::flush_literals(&mut dst, src, lit_start, lit_len);
                    lit_start = si;
                    lit_len = 0;
                }
            }
        }
        Self::flush_literals(&mut dst, src, lit_start, lit_len);

        Encoded::Bytes(dst)
    }
}
