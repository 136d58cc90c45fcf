//! HTTP/1 message body decoding.
//!
//! A [`BodyDechunker`] is built from a single message and consumes the raw
//! body bytes that follow its header block, in arbitrary fragmentation. It
//! yields decoded body chunks; a zero-length chunk signals the end of the
//! body. The transfer mode is fixed at construction: no body, `chunked`,
//! fixed Content-Length, or read-until-close.

use crate::error::InvalidMessageError;
use crate::message::Message;

/// Default size of the re-emission buffer for chunked bodies. A single
/// inbound chunk larger than this is delivered as multiple output chunks.
pub const DEFAULT_CHUNK_BUFFER_SIZE: usize = 16384;

/// Longest partial chunk-size line buffered across input boundaries.
const MAX_PARTIAL_CHUNK_HEADER: usize = 16;

const EOL_LEN: usize = 2;

/// State machine turning raw HTTP/1 body bytes into decoded chunks.
#[derive(Debug)]
pub struct BodyDechunker {
    /// `None` means the body size is not predetermined (chunked or
    /// read-until-close).
    total_size: Option<u64>,
    chunked: bool,
    chunk_buffer: Vec<u8>,
    chunk_buffer_cap: usize,
    received: u64,
    ended: bool,
    /// Bytes still owed for the current chunk, including its trailing CRLF.
    last_chunk_remaining: usize,
    last_chunk_size: usize,
    partial_chunk_header: Vec<u8>,
}

impl BodyDechunker {
    /// Builds a dechunker for `msg` with the default buffer size.
    pub fn new(msg: &Message) -> Result<Self, InvalidMessageError> {
        Self::with_buffer_size(msg, DEFAULT_CHUNK_BUFFER_SIZE)
    }

    /// Builds a dechunker for `msg`, selecting the mode from its headers and
    /// body-presence policy.
    pub fn with_buffer_size(
        msg: &Message,
        chunk_buffer_size: usize,
    ) -> Result<Self, InvalidMessageError> {
        assert!(chunk_buffer_size > 0, "chunk buffer size must be positive");
        let transfer_encoding = msg.headers().get("transfer-encoding");
        let content_length = msg.headers().get("content-length");

        let (total_size, chunked) = if let Message::Response(res) = msg {
            if !res.has_response_body() {
                (Some(0), false)
            } else {
                Self::mode_from_headers(transfer_encoding, content_length, false)?
            }
        } else {
            Self::mode_from_headers(transfer_encoding, content_length, true)?
        };

        Ok(Self {
            total_size,
            chunked,
            chunk_buffer: Vec::new(),
            chunk_buffer_cap: chunk_buffer_size,
            received: 0,
            ended: false,
            last_chunk_remaining: 0,
            last_chunk_size: 0,
            partial_chunk_header: Vec::new(),
        })
    }

    fn mode_from_headers(
        transfer_encoding: Option<&str>,
        content_length: Option<&str>,
        is_request: bool,
    ) -> Result<(Option<u64>, bool), InvalidMessageError> {
        match (transfer_encoding, content_length) {
            (Some("chunked"), _) => Ok((None, true)),
            (Some(other), _) => Err(InvalidMessageError::new(format!(
                "Unsupported transfer encoding: {other}"
            ))),
            (None, Some(len)) => {
                let total: u64 = len.parse().map_err(|_| {
                    InvalidMessageError::answerable("Invalid Content-Length header value")
                })?;
                Ok((Some(total), false))
            }
            // a request without a body declaration has no body; a response
            // without one is read until the connection closes
            (None, None) if is_request => Ok((Some(0), false)),
            (None, None) => Ok((None, false)),
        }
    }

    /// Feeds raw body bytes, returning the decoded chunks they complete. A
    /// trailing empty chunk marks the end of the body.
    pub fn add_data(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, InvalidMessageError> {
        let mut out = Vec::new();
        if self.chunked {
            self.add_chunked_data(data, &mut out)?;
        } else {
            if let Some(total) = self.total_size {
                if data.len() as u64 > total - self.received {
                    return Err(InvalidMessageError::answerable(
                        "Received more data than expected",
                    ));
                }
            }
            self.received += data.len() as u64;
            if !data.is_empty() {
                self.new_data(data.to_vec(), &mut out)?;
            }
            if self.total_size.is_some_and(|total| self.received >= total) {
                self.end_into(&mut out)?;
            }
        }
        Ok(out)
    }

    fn add_chunked_data(
        &mut self,
        data: &[u8],
        out: &mut Vec<Vec<u8>>,
    ) -> Result<(), InvalidMessageError> {
        let mut index = 0;
        while index < data.len() {
            if self.last_chunk_remaining == 0 {
                index = self.begin_chunk(data, index, out)?;
            } else {
                if index > 0 {
                    return Err(InvalidMessageError::answerable(
                        "End of incomplete chunk can only be at start of packet",
                    ));
                }
                if self.last_chunk_remaining <= data.len() {
                    // the chunk (and its CRLF) completes inside this packet
                    let data_bytes = self.last_chunk_remaining.saturating_sub(EOL_LEN);
                    if data_bytes > 0 {
                        self.write_to_chunk_buffer(&data[..data_bytes], out)?;
                    }
                    if !self.chunk_buffer.is_empty() {
                        let tail = std::mem::take(&mut self.chunk_buffer);
                        self.new_data(tail, out)?;
                    } else if self.last_chunk_size == 0 {
                        self.end_into(out)?;
                    }
                    index += self.last_chunk_remaining;
                    self.last_chunk_remaining = 0;
                } else {
                    // everything here still belongs to the current chunk;
                    // exclude any leading CRLF bytes of the terminator
                    let data_bytes = data.len().min(self.last_chunk_remaining - EOL_LEN);
                    if data_bytes > 0 {
                        self.write_to_chunk_buffer(&data[..data_bytes], out)?;
                    }
                    self.last_chunk_remaining -= data.len();
                    index = data.len();
                }
            }
        }
        Ok(())
    }

    /// Parses a chunk-size line beginning at `index` and consumes as much of
    /// the chunk as this packet holds. Returns the next read index.
    fn begin_chunk(
        &mut self,
        data: &[u8],
        index: usize,
        out: &mut Vec<Vec<u8>>,
    ) -> Result<usize, InvalidMessageError> {
        // locate the end of the size line, honoring a CRLF split across
        // packets (buffered bare CR, LF first in this one)
        let split_line_end =
            self.partial_chunk_header.last() == Some(&b'\r') && data[index] == b'\n';
        let (line_end, data_start) = if split_line_end {
            self.partial_chunk_header.pop();
            (index, index + 1)
        } else {
            match find_eol(data, index) {
                Some(end) => (end, end + EOL_LEN),
                None => {
                    if data.len() - index < 10
                        && self.partial_chunk_header.len() + (data.len() - index)
                            <= MAX_PARTIAL_CHUNK_HEADER
                    {
                        self.partial_chunk_header.extend_from_slice(&data[index..]);
                        return Ok(data.len());
                    }
                    return Err(InvalidMessageError::answerable(
                        "No chunk size in chunked response",
                    ));
                }
            }
        };

        let mut line = std::mem::take(&mut self.partial_chunk_header);
        line.extend_from_slice(&data[index..line_end]);
        // chunk extensions after ';' are ignored
        let len_end = line.iter().position(|&b| b == b';').unwrap_or(line.len());
        let size_str = std::str::from_utf8(&line[..len_end])
            .map_err(|_| InvalidMessageError::answerable("Invalid chunk size"))?;
        if size_str.starts_with('-') {
            return Err(InvalidMessageError::answerable("Chunk size is negative"));
        }
        let chunk_len = usize::from_str_radix(size_str.trim(), 16)
            .map_err(|_| InvalidMessageError::answerable("Invalid chunk size"))?;

        let datasize = data.len() - data_start;
        if datasize >= chunk_len + EOL_LEN {
            // whole chunk plus terminator present
            if chunk_len > 0 {
                self.new_data(data[data_start..data_start + chunk_len].to_vec(), out)?;
            } else {
                self.end_into(out)?;
            }
            Ok(data_start + chunk_len + EOL_LEN)
        } else {
            let write = datasize.min(chunk_len);
            if write > 0 {
                self.write_to_chunk_buffer(&data[data_start..data_start + write], out)?;
            }
            self.last_chunk_size = chunk_len;
            self.last_chunk_remaining = chunk_len + EOL_LEN - datasize;
            Ok(data.len())
        }
    }

    /// Buffers chunk payload, emitting a full buffer-sized chunk whenever the
    /// buffer fills.
    fn write_to_chunk_buffer(
        &mut self,
        mut src: &[u8],
        out: &mut Vec<Vec<u8>>,
    ) -> Result<(), InvalidMessageError> {
        while !src.is_empty() {
            let space = self.chunk_buffer_cap - self.chunk_buffer.len();
            let take = space.min(src.len());
            self.chunk_buffer.extend_from_slice(&src[..take]);
            src = &src[take..];
            if self.chunk_buffer.len() >= self.chunk_buffer_cap {
                let full = std::mem::take(&mut self.chunk_buffer);
                self.new_data(full, out)?;
            }
        }
        Ok(())
    }

    fn new_data(
        &mut self,
        chunk: Vec<u8>,
        out: &mut Vec<Vec<u8>>,
    ) -> Result<(), InvalidMessageError> {
        if self.ended {
            return Err(InvalidMessageError::answerable("Data after end"));
        }
        if chunk.is_empty() {
            self.ended = true;
        }
        out.push(chunk);
        Ok(())
    }

    fn end_into(&mut self, out: &mut Vec<Vec<u8>>) -> Result<(), InvalidMessageError> {
        if !self.ended {
            self.new_data(Vec::new(), out)?;
        }
        Ok(())
    }

    /// Forces an end-of-body, for example because the underlying connection
    /// closed. Returns the final (empty) chunk if the body was still open.
    pub fn end(&mut self) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        // cannot fail: emitting the empty end chunk only when not yet ended
        let _ = self.end_into(&mut out);
        out
    }

    /// Whether all expected bytes arrived. Always true for bodies without a
    /// predetermined size.
    #[must_use]
    pub fn has_received_all_data(&self) -> bool {
        self.total_size.map_or(true, |total| self.received >= total)
    }

    /// Whether the end-of-body chunk was emitted.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended
    }
}

fn find_eol(data: &[u8], from: usize) -> Option<usize> {
    data[from..]
        .windows(EOL_LEN)
        .position(|w| w == b"\r\n")
        .map(|p| p + from)
}
