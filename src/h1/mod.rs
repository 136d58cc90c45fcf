//! The HTTP/1.x wire protocol: header parsing, serialization and body
//! decoding (RFC 7230).

pub mod dechunker;
pub mod receiver;
pub mod transmitter;

pub use dechunker::{BodyDechunker, DEFAULT_CHUNK_BUFFER_SIZE};
pub use receiver::{RequestReceiver, ResponseReceiver, DEFAULT_MAX_HEADER_SIZE};
pub use transmitter::MessageTransmitter;

use crate::error::InvalidMessageError;
use crate::message::{RequestData, ResponseData};

/// Wraps `data` in a single chunked-transfer-encoding frame:
/// `<hex length>\r\n<data>\r\n`.
#[must_use]
pub fn to_chunk(data: &[u8]) -> Vec<u8> {
    let mut chunk = format!("{:x}\r\n", data.len()).into_bytes();
    chunk.extend_from_slice(data);
    chunk.extend_from_slice(b"\r\n");
    chunk
}

/// Parses one complete HTTP request header block from `data`, returning the
/// request and any trailing body bytes. Fails on incomplete input.
pub fn parse_request(
    data: &[u8],
    offset: usize,
    secure: bool,
) -> Result<RequestData, InvalidMessageError> {
    let mut receiver = RequestReceiver::new(secure);
    let body_start = receiver
        .receive(data, offset)?
        .ok_or_else(|| InvalidMessageError::answerable("Incomplete header block"))?;
    Ok(RequestData::with_body(receiver.request(), false, data[body_start..].to_vec()))
}

/// Parses one complete HTTP response header block from `data`, returning the
/// response and any trailing body bytes. Fails on incomplete input.
pub fn parse_response(data: &[u8], offset: usize) -> Result<ResponseData, InvalidMessageError> {
    let mut receiver = ResponseReceiver::new();
    let body_start = receiver
        .receive(data, offset)?
        .ok_or_else(|| InvalidMessageError::answerable("Incomplete header block"))?;
    Ok(ResponseData::with_body(receiver.response(), false, data[body_start..].to_vec()))
}
