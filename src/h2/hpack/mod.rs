//! HPACK header compression (RFC 7541).
//!
//! An [`HpackContext`] bundles the encoder and decoder of one HTTP/2
//! connection. The two directions keep separate dynamic tables; the
//! [`HpackSession`] carries the never-index name set, which may be shared
//! across connections when messages are forwarded so that confidentiality
//! markers survive the hop.

pub mod huffman;
mod table;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::headers::Headers;
use table::{static_table, DynamicTable, TableEntry};

/// Shared HPACK state: the set of header names that must only be encoded
/// with the literal-never-indexed representation. Thread-safe; updates are
/// cold-path.
#[derive(Debug, Clone, Default)]
pub struct HpackSession {
    never_index: Arc<Mutex<HashSet<String>>>,
}

impl HpackSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a header name never-index. Returns whether it was newly added.
    pub fn add_never_index(&self, name: &str) -> bool {
        self.never_index.lock().insert(name.to_owned())
    }

    #[must_use]
    pub fn is_never_index(&self, name: &str) -> bool {
        self.never_index.lock().contains(name)
    }
}

/// Encodes an integer with an N-bit prefix (RFC 7541 Section 5.1). `flags`
/// carries the representation bits of the first byte.
pub fn write_integer(buf: &mut Vec<u8>, n: u8, flags: u8, mut value: u64) {
    let max_prefix = (1u64 << n) - 1;
    if value < max_prefix {
        buf.push(flags | value as u8);
    } else {
        buf.push(flags | max_prefix as u8);
        value -= max_prefix;
        while value >= 128 {
            buf.push((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        buf.push(value as u8);
    }
}

/// Decodes an integer with an N-bit prefix, returning the value and the
/// total number of bytes consumed. `None` on truncated input or a value
/// beyond 63 bits.
#[must_use]
pub fn read_integer(data: &[u8], offset: usize, n: u8) -> Option<(u64, usize)> {
    let first = *data.get(offset)?;
    let max_prefix = (1u64 << n) - 1;
    let mut num = u128::from(u64::from(first) & max_prefix);
    if num < u128::from(max_prefix) {
        return Some((num as u64, 1));
    }
    let mut i = 0;
    let mut shift = 0u32;
    loop {
        i += 1;
        let byte = *data.get(offset + i)?;
        num += u128::from(byte & 0x7f) << shift;
        shift += 7;
        if shift >= 64 {
            return None;
        }
        if byte & 0x80 == 0 {
            break;
        }
    }
    if num > i64::MAX as u128 {
        return None;
    }
    Some((num as u64, i + 1))
}

/// 32-bit variant of [`read_integer`]: additionally rejects values above
/// `i32::MAX`.
#[must_use]
pub fn read_integer_u32(data: &[u8], offset: usize, n: u8) -> Option<(u32, usize)> {
    let (value, consumed) = read_integer(data, offset, n)?;
    if value > i32::MAX as u64 {
        return None;
    }
    Some((value as u32, consumed))
}

/// Encodes a length-prefixed string (RFC 7541 Section 5.2).
pub fn write_string(buf: &mut Vec<u8>, data: &[u8], huffman: bool) {
    if huffman {
        let encoded = huffman::encode(data);
        write_integer(buf, 7, 0x80, encoded.len() as u64);
        buf.extend_from_slice(&encoded);
    } else {
        write_integer(buf, 7, 0, data.len() as u64);
        buf.extend_from_slice(data);
    }
}

/// Decodes a length-prefixed string, returning the (possibly
/// Huffman-decoded) bytes and the total number of bytes consumed. `None` on
/// truncation or a Huffman decoding error.
#[must_use]
pub fn read_string(data: &[u8], offset: usize) -> Option<(Vec<u8>, usize)> {
    let huffman = data.get(offset)? & 0x80 != 0;
    let (len, len_len) = read_integer_u32(data, offset, 7)?;
    let len = len as usize;
    let start = offset + len_len;
    if start + len > data.len() {
        return None;
    }
    let raw = &data[start..start + len];
    let bytes = if huffman {
        huffman::decode(raw)?
    } else {
        raw.to_vec()
    };
    Some((bytes, len_len + len))
}

/// Accumulates one encoded header block across
/// [`HpackContext::encode_header`] calls.
#[derive(Debug, Default)]
pub struct EncoderContext {
    buf: Vec<u8>,
}

impl EncoderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a block with already-encoded leading bytes, e.g. the promised
    /// stream id of a PUSH_PROMISE frame.
    #[must_use]
    pub fn with_prefix(prefix: &[u8]) -> Self {
        Self { buf: prefix.to_vec() }
    }

    /// The encoded block.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// The HPACK encoder and decoder of one connection.
#[derive(Debug)]
pub struct HpackContext {
    session: HpackSession,
    use_huffman: bool,
    /// Encoder ceiling, received in the peer's SETTINGS. Starts at the RFC
    /// default so requests can be encoded before the first SETTINGS arrives.
    encoder_max_settings: u32,
    /// Encoder cap below the ceiling; advertised via a table size update in
    /// the next encoded block.
    encoder_max_current: Option<u32>,
    /// Decoder ceiling, sent in our SETTINGS.
    decoder_max_settings: u32,
    /// Decoder cap, lowered by received table size updates.
    decoder_max_current: u32,
    encoder_table: DynamicTable,
    decoder_table: DynamicTable,
    encoder_max_updated: bool,
}

impl HpackContext {
    /// Creates a context with a fresh session.
    #[must_use]
    pub fn new(use_huffman: bool, decoder_max_table_size: u32) -> Self {
        Self::with_session(HpackSession::new(), use_huffman, decoder_max_table_size)
    }

    /// Creates a context sharing an existing session.
    #[must_use]
    pub fn with_session(
        session: HpackSession,
        use_huffman: bool,
        decoder_max_table_size: u32,
    ) -> Self {
        Self {
            session,
            use_huffman,
            encoder_max_settings: 4096,
            encoder_max_current: None,
            decoder_max_settings: decoder_max_table_size,
            decoder_max_current: decoder_max_table_size,
            encoder_table: DynamicTable::default(),
            decoder_table: DynamicTable::default(),
            encoder_max_updated: true,
        }
    }

    #[must_use]
    pub fn session(&self) -> &HpackSession {
        &self.session
    }

    #[must_use]
    pub fn is_use_huffman(&self) -> bool {
        self.use_huffman
    }

    /// Decodes a complete header block. `None` signals a decoding error (the
    /// caller escalates it to COMPRESSION_ERROR).
    ///
    /// Per RFC 7540 Section 8.1.2.5, the individually-transmitted cookie
    /// crumbs are folded back into a single `cookie` header joined with
    /// `"; "`.
    pub fn decode_header_block(&mut self, data: &[u8]) -> Option<Headers> {
        let mut headers = Headers::new();
        let mut cookies: Vec<String> = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let first = data[i];
            if first & 0x80 != 0 {
                // indexed header field (6.1)
                let (index, consumed) = read_integer_u32(data, i, 7)?;
                i += consumed;
                let entry = self.decoder_entry(index as usize)?;
                let value = entry.value.clone()?;
                let name = entry.name.clone();
                push_header(&mut headers, &mut cookies, name, value);
            } else if first & 0xe0 == 0x20 {
                // dynamic table size update (6.3)
                let (size, consumed) = read_integer_u32(data, i, 5)?;
                i += consumed;
                if size > self.decoder_max_settings {
                    return None;
                }
                self.decoder_max_current = size;
                self.decoder_table.evict(size as usize, 0);
            } else {
                // literal header field (6.2)
                let add_to_index = first & 0x40 != 0;
                let never_index = !add_to_index && first & 0x10 != 0;
                let prefix = if add_to_index { 6 } else { 4 };
                let (index, consumed) = read_integer_u32(data, i, prefix)?;
                i += consumed;

                let (name, name_len) = if index > 0 {
                    let entry = self.decoder_entry(index as usize)?;
                    (entry.name.clone(), entry.name_len)
                } else {
                    let (name_bytes, consumed) = read_string(data, i)?;
                    i += consumed;
                    let len = name_bytes.len();
                    (String::from_utf8(name_bytes).ok()?, len)
                };

                let (value_bytes, consumed) = read_string(data, i)?;
                i += consumed;
                let value_len = value_bytes.len();
                let value = String::from_utf8(value_bytes).ok()?;

                if add_to_index {
                    let entry =
                        TableEntry::with_lengths(name_len, value_len, &name, Some(value.clone()));
                    self.decoder_table.add(entry, self.decoder_max_current as usize);
                } else if never_index {
                    self.session.add_never_index(&name);
                }
                push_header(&mut headers, &mut cookies, name, value);
            }
        }
        if !cookies.is_empty() {
            headers.add("cookie", cookies.join("; "));
        }
        Some(headers)
    }

    /// Encodes a whole block of headers with a fresh [`EncoderContext`].
    pub fn encode_headers<'a>(
        &mut self,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Vec<u8> {
        let mut ctx = EncoderContext::new();
        for (name, value) in headers {
            self.encode_header(&mut ctx, name, value);
        }
        ctx.into_bytes()
    }

    /// Encodes one header into `ctx`.
    pub fn encode_header(&mut self, ctx: &mut EncoderContext, name: &str, value: &str) {
        if !self.encoder_max_updated {
            let current = self.encoder_max_current();
            if current < self.encoder_max_settings {
                write_integer(&mut ctx.buf, 5, 0x20, u64::from(current));
            }
            self.encoder_max_updated = true;
        }

        let do_index = !self.session.is_never_index(name);
        let statics = static_table();

        if let Some(index) = statics.find_pair(name, value) {
            // exact static match (6.1)
            write_integer(&mut ctx.buf, 7, 0x80, index as u64);
            return;
        }

        let dynamic_base = statics.base() + statics.len();
        let dynamic_match = self.encoder_table.find(name, value);
        if let Some((offset, entry)) = dynamic_match {
            if entry.value.as_deref() == Some(value) {
                // exact dynamic match (6.1)
                write_integer(&mut ctx.buf, 7, 0x80, (dynamic_base + offset) as u64);
                return;
            }
        }

        // name reference: prefer a static name match over a dynamic one
        let name_ref = statics
            .find_name(name)
            .map(|index| (index, statics.get(index).map_or(name.len(), |e| e.name_len)))
            .or_else(|| {
                dynamic_match.map(|(offset, entry)| (dynamic_base + offset, entry.name_len))
            });

        let (flags, prefix) = if do_index { (0x40, 6) } else { (0x10, 4) };
        let name_len = match name_ref {
            Some((index, name_len)) => {
                write_integer(&mut ctx.buf, prefix, flags, index as u64);
                name_len
            }
            None => {
                ctx.buf.push(flags);
                write_string(&mut ctx.buf, name.as_bytes(), self.use_huffman);
                name.len()
            }
        };
        write_string(&mut ctx.buf, value.as_bytes(), self.use_huffman);

        if do_index {
            let entry =
                TableEntry::with_lengths(name_len, value.len(), name, Some(value.to_owned()));
            self.encoder_table.add(entry, self.encoder_max_current() as usize);
        }
    }

    fn decoder_entry(&self, index: usize) -> Option<&TableEntry> {
        let statics = static_table();
        if index < statics.base() {
            return None;
        }
        let dynamic_start = statics.base() + statics.len();
        if index < dynamic_start {
            statics.get(index)
        } else {
            self.decoder_table.get(index - dynamic_start)
        }
    }

    /// The encoder ceiling received in the peer's SETTINGS.
    #[must_use]
    pub fn encoder_max_settings(&self) -> u32 {
        self.encoder_max_settings
    }

    /// Applies the peer's HEADER_TABLE_SIZE setting to the encoder.
    pub fn set_encoder_max_settings(&mut self, max: u32) {
        self.encoder_max_settings = max;
        if self.encoder_max_current.is_some_and(|cur| cur > max) {
            self.set_encoder_max_current(Some(max));
        }
    }

    /// The effective encoder table cap: the current cap if set below the
    /// ceiling, otherwise the ceiling.
    #[must_use]
    pub fn encoder_max_current(&self) -> u32 {
        self.encoder_max_current.unwrap_or(self.encoder_max_settings)
    }

    /// Caps the encoder table below the SETTINGS ceiling. A lower cap is
    /// advertised to the peer as a dynamic table size update at the start of
    /// the next encoded block. `None` tracks the ceiling.
    ///
    /// # Panics
    /// If the cap exceeds the SETTINGS ceiling.
    pub fn set_encoder_max_current(&mut self, max: Option<u32>) {
        if let Some(max) = max {
            assert!(
                max <= self.encoder_max_settings,
                "table cap {max} exceeds SETTINGS ceiling {}",
                self.encoder_max_settings
            );
        }
        self.encoder_max_current = max;
        self.encoder_max_updated = false;
        self.encoder_table.evict(self.encoder_max_current() as usize, 0);
    }

    /// The decoder ceiling we advertised in SETTINGS.
    #[must_use]
    pub fn decoder_max_settings(&self) -> u32 {
        self.decoder_max_settings
    }

    /// Updates the decoder ceiling after advertising a new HEADER_TABLE_SIZE.
    pub fn set_decoder_max_settings(&mut self, max: u32) {
        self.decoder_max_settings = max;
        self.decoder_max_current = max;
    }

    /// The decoder cap, as lowered by received table size updates.
    #[must_use]
    pub fn decoder_max_current(&self) -> u32 {
        self.decoder_max_current
    }

    /// Current encoder dynamic table size in bytes.
    #[must_use]
    pub fn encoder_table_size(&self) -> usize {
        self.encoder_table.size()
    }

    /// Current decoder dynamic table size in bytes.
    #[must_use]
    pub fn decoder_table_size(&self) -> usize {
        self.decoder_table.size()
    }

    /// The two dynamic tables as (name, value) snapshots, newest first. Used
    /// to verify encoder/decoder coherence in tests.
    #[must_use]
    pub fn table_snapshots(&self) -> (Vec<(String, String)>, Vec<(String, String)>) {
        let snap = |t: &DynamicTable| {
            t.entries()
                .map(|e| (e.name.clone(), e.value.clone().unwrap_or_default()))
                .collect()
        };
        (snap(&self.encoder_table), snap(&self.decoder_table))
    }
}

fn push_header(headers: &mut Headers, cookies: &mut Vec<String>, name: String, value: String) {
    // cookie crumbs are folded into one header after the block completes
    if name == "cookie" {
        cookies.push(value);
    } else {
        headers.add(name, value);
    }
}
