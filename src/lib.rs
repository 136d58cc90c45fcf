//! http-sans-io: a sans-I/O HTTP/1.x and HTTP/2 protocol engine
//!
//! This crate implements the HTTP/1.x wire protocol (RFC 7230) and the
//! HTTP/2 wire protocol (RFC 7540 with HPACK, RFC 7541) as a pure
//! protocol-processing core: it consumes and produces byte buffers and
//! leaves sockets, event loops and TLS to the embedding application.
//!
//! # Features
//!
//! - **Sans-I/O design**: no async runtime dependencies, no socket types;
//!   bytes in, events and bytes out
//! - **HTTP/2 endpoint**: frame assembly, stream multiplexing, two-level
//!   flow control, HPACK with Huffman coding, server push, graceful and
//!   abrupt teardown
//! - **HTTP/1 engine**: incremental header parsing, message serialization,
//!   chunked/Content-Length body decoding
//! - **Shared message model**: one header container and request/response
//!   model for both protocol versions
//!
//! # HTTP/2 quick start
//!
//! ```rust,ignore
//! use http_sans_io::{share_socket, Http2Endpoint, Http2Event, Settings};
//!
//! let socket = share_socket(my_socket);
//! let mut client = Http2Endpoint::client(socket, Settings::new());
//! client.start()?;
//! let stream_id = client.create_request_stream().unwrap();
//! client.send_request(stream_id, &request, true)?;
//!
//! // feed bytes read from the connection
//! for event in client.process_data(&received) {
//!     match event {
//!         Http2Event::Message { message, .. } => { /* response head */ }
//!         Http2Event::Data { data, end_stream, .. } => { /* body */ }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! # HTTP/1 quick start
//!
//! ```rust
//! use http_sans_io::h1::RequestReceiver;
//!
//! let mut receiver = RequestReceiver::new(false);
//! let data = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n";
//! if let Some(body_start) = receiver.receive(data, 0).unwrap() {
//!     let request = receiver.request();
//!     assert_eq!(request.method(), "GET");
//!     assert_eq!(body_start, data.len());
//! }
//! ```
//!
//! It is the embedder's job to perform ALPN, hand the connected socket to
//! the engine behind the [`WritableSocket`] contract, and pump received
//! bytes into `process_data`/`receive`.

pub mod error;
pub mod h1;
pub mod h2;
pub mod headers;
pub mod message;
pub mod socket;
pub mod validate;

pub use error::{ErrorCode, Http2Error, InvalidMessageError, StreamClosedReason};
pub use h2::{
    is_valid_client_preface, Http2Endpoint, Http2Event, Settings, StreamState, CLIENT_PREFACE,
};
pub use headers::Headers;
pub use message::{Message, Request, RequestData, Response, ResponseData, Trailers, Version};
pub use socket::{share_socket, SharedSocket, WritableSocket};
