//! HPACK Huffman coding (RFC 7541 Section 5.2 and Appendix B).
//!
//! The code table ships as an embedded resource and is parsed once on first
//! use. Decoding walks the input bit by bit against a (length, code) map;
//! encoding appends MSB-aligned codes and pads the final byte with the EOS
//! prefix (all ones).

use std::collections::HashMap;
use std::sync::OnceLock;

const HUFFMAN_TABLE: &str = include_str!("../../../resources/hpack_huffman_table");

/// The EOS symbol index.
const EOS: u16 = 256;

/// Longest code length in the table.
const MAX_CODE_BITS: u8 = 30;

struct HuffmanTables {
    /// Symbol -> (code, bit count).
    encode: [(u32, u8); 257],
    /// (bit count, code) -> symbol.
    decode: HashMap<(u8, u32), u16>,
}

fn tables() -> &'static HuffmanTables {
    static TABLES: OnceLock<HuffmanTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut encode = [(0u32, 0u8); 257];
        let mut decode = HashMap::new();
        for line in HUFFMAN_TABLE.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(sym), Some(code), Some(bits)) = (parts.next(), parts.next(), parts.next())
            else {
                panic!("malformed huffman table line: {line}");
            };
            let sym: u16 = sym.parse().expect("huffman table symbol");
            let code = u32::from_str_radix(code, 16).expect("huffman table code");
            let bits: u8 = bits.parse().expect("huffman table bit count");
            encode[sym as usize] = (code, bits);
            decode.insert((bits, code), sym);
        }
        assert_eq!(decode.len(), 257, "huffman table must define 257 codes");
        HuffmanTables { encode, decode }
    })
}

/// Huffman-encodes `data`.
#[must_use]
pub fn encode(data: &[u8]) -> Vec<u8> {
    let tables = tables();
    let mut out = Vec::with_capacity(data.len());
    let mut acc: u64 = 0;
    let mut acc_bits: u8 = 0;
    for &byte in data {
        let (code, bits) = tables.encode[byte as usize];
        acc = (acc << bits) | u64::from(code);
        acc_bits += bits;
        while acc_bits >= 8 {
            acc_bits -= 8;
            out.push((acc >> acc_bits) as u8);
        }
    }
    if acc_bits > 0 {
        // pad with the most significant bits of EOS (all ones)
        let pad = 8 - acc_bits;
        out.push(((acc << pad) as u8) | ((1 << pad) - 1));
    }
    out
}

/// Decodes Huffman-coded `data`. Returns `None` on an invalid code, an EOS
/// symbol inside the string, or padding longer than seven bits or not
/// matching the EOS prefix.
#[must_use]
pub fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let tables = tables();
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut code: u32 = 0;
    let mut bits: u8 = 0;
    for &byte in data {
        for shift in (0..8).rev() {
            code = (code << 1) | u32::from((byte >> shift) & 1);
            bits += 1;
            if let Some(&sym) = tables.decode.get(&(bits, code)) {
                if sym == EOS {
                    return None;
                }
                out.push(sym as u8);
                code = 0;
                bits = 0;
            } else if bits > MAX_CODE_BITS {
                return None;
            }
        }
    }
    // trailing bits must be a strict prefix of EOS: fewer than 8 set bits
    if bits >= 8 || code != (1u32 << bits) - 1 {
        return None;
    }
    Some(out)
}
