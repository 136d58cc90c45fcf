//! The HTTP/2 wire protocol (RFC 7540) with HPACK header compression
//! (RFC 7541).

pub mod control;
pub mod endpoint;
pub mod frame;
pub mod hpack;
pub mod message_stream;
pub mod settings;
mod stream;

pub use endpoint::{Http2Endpoint, Http2Event};
pub use frame::{flags, frame_type, FrameHeader, FRAME_HEADER_SIZE};
pub use message_stream::{MessageStream, StreamState, ATTACHMENT_KEY_STREAM_ID};
pub use settings::{settings_id, Settings, MAX_FRAME_SIZE_MAX, MAX_FRAME_SIZE_MIN};

/// The 24-byte client connection preface (RFC 7540 Section 3.5).
pub const CLIENT_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Checks whether `data` starts with the client connection preface at
/// `offset`.
#[must_use]
pub fn is_valid_client_preface(data: &[u8], offset: usize) -> bool {
    data.len() >= offset + CLIENT_PREFACE.len()
        && &data[offset..offset + CLIENT_PREFACE.len()] == CLIENT_PREFACE
}
