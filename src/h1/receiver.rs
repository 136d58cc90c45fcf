//! Incremental HTTP/1 header parsing.
//!
//! The receivers consume successive byte buffers and return the index at
//! which the message body begins once a full header block has arrived.
//! Partial lines straddling buffer boundaries are carried over in a spillover
//! buffer; both the spillover and the cumulative header size are bounded by
//! the configured maximum.

use crate::error::InvalidMessageError;
use crate::headers::Headers;
use crate::message::{Request, Response, Version};
use crate::validate;

/// Default maximum total header size in bytes.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8192;

const EOL: &[u8] = b"\r\n";

/// Finds the first CRLF in `data` at or after `from`, returning its index.
fn find_eol(data: &[u8], from: usize) -> Option<usize> {
    data[from..]
        .windows(EOL.len())
        .position(|w| w == EOL)
        .map(|p| p + from)
}

/// Line assembly state shared by the request and response receivers.
#[derive(Debug)]
struct ReceiverCore {
    max_header_size: usize,
    spill: Vec<u8>,
    header_size: usize,
    version: Option<Version>,
    headers: Headers,
}

impl ReceiverCore {
    fn new(max_header_size: usize) -> Self {
        Self {
            max_header_size,
            spill: Vec::new(),
            header_size: 0,
            version: None,
            headers: Headers::new(),
        }
    }

    /// Extracts the next complete CRLF-terminated line starting at `*index`,
    /// splicing in any spillover from earlier buffers. Returns `None` when
    /// the line is still incomplete (the tail has been buffered).
    fn next_line(
        &mut self,
        data: &[u8],
        index: &mut usize,
    ) -> Result<Option<Vec<u8>>, InvalidMessageError> {
        // A spillover ending in a bare CR whose LF arrives at the start of
        // this buffer terminates the buffered line.
        if self.spill.last() == Some(&b'\r') && data[*index] == b'\n' {
            let mut line = std::mem::take(&mut self.spill);
            line.pop();
            *index += 1;
            self.count_line(line.len())?;
            return Ok(Some(line));
        }
        match find_eol(data, *index) {
            None => {
                let remaining = &data[*index..];
                if self.spill.len() + remaining.len() > self.max_header_size {
                    return Err(InvalidMessageError::answerable("HTTP message is too large"));
                }
                self.spill.extend_from_slice(remaining);
                *index = data.len();
                Ok(None)
            }
            Some(end) => {
                let mut line = std::mem::take(&mut self.spill);
                line.extend_from_slice(&data[*index..end]);
                *index = end + EOL.len();
                self.count_line(line.len())?;
                Ok(Some(line))
            }
        }
    }

    fn count_line(&mut self, line_len: usize) -> Result<(), InvalidMessageError> {
        self.header_size += line_len + EOL.len();
        if self.header_size > self.max_header_size {
            return Err(InvalidMessageError::answerable("HTTP message is too large"));
        }
        Ok(())
    }

    fn receive_version(&mut self, s: &str) -> Result<(), InvalidMessageError> {
        self.version = Some(
            Version::from_h1_str(s)
                .ok_or_else(|| InvalidMessageError::answerable("Invalid version string"))?,
        );
        Ok(())
    }

    fn is_start_line_received(&self) -> bool {
        self.version.is_some()
    }

    /// Splits a header line at the first colon, lowercasing the name and
    /// trimming the value.
    fn parse_header_line(line: &[u8]) -> Result<(String, String), InvalidMessageError> {
        if !validate::bytes_in_range(line, 32, 126) {
            return Err(InvalidMessageError::answerable("Invalid characters in header line"));
        }
        let text = std::str::from_utf8(line)
            .map_err(|_| InvalidMessageError::answerable("Invalid header line"))?;
        let sep = text
            .find(':')
            .ok_or_else(|| InvalidMessageError::answerable("Invalid header line"))?;
        let name = text[..sep].to_ascii_lowercase();
        let value = text[sep + 1..].trim().to_owned();
        Ok((name, value))
    }

    fn parse_start_line(line: &[u8]) -> Result<Vec<String>, InvalidMessageError> {
        if !validate::bytes_in_range(line, 32, 126) {
            return Err(InvalidMessageError::answerable("Invalid characters in start line"));
        }
        let text = std::str::from_utf8(line)
            .map_err(|_| InvalidMessageError::answerable("Invalid start line"))?;
        Ok(text.split(' ').map(str::to_owned).collect())
    }

    fn reset(&mut self) {
        self.spill.clear();
        self.header_size = 0;
        self.version = None;
        self.headers = Headers::new();
    }
}

/// Sets the chunked-transfer flag from the parsed headers.
fn msg_init_chunked(headers: &Headers) -> bool {
    headers.get("transfer-encoding") == Some("chunked")
}

/// Incremental parser for HTTP/1 requests.
///
/// Feed buffers to [`receive`](RequestReceiver::receive); once it returns
/// `Some(body_index)`, retrieve the message with
/// [`request`](RequestReceiver::request) and call
/// [`reset`](RequestReceiver::reset) before the next message.
#[derive(Debug)]
pub struct RequestReceiver {
    core: ReceiverCore,
    scheme: &'static str,
    method: Option<String>,
    host: Option<String>,
    path: Option<String>,
}

impl RequestReceiver {
    /// `secure` selects the scheme (`https`/`http`) stamped on received
    /// requests, reflecting the TLS state of the underlying channel.
    #[must_use]
    pub fn new(secure: bool) -> Self {
        Self::with_max_header_size(DEFAULT_MAX_HEADER_SIZE, secure)
    }

    #[must_use]
    pub fn with_max_header_size(max_header_size: usize, secure: bool) -> Self {
        Self {
            core: ReceiverCore::new(max_header_size),
            scheme: if secure { "https" } else { "http" },
            method: None,
            host: None,
            path: None,
        }
    }

    /// Parses a full or partial header block from `data`, starting at
    /// `offset`. Returns `Some(i)` with the index where the body begins once
    /// the blank line arrives, `None` while the header block is incomplete.
    pub fn receive(
        &mut self,
        data: &[u8],
        offset: usize,
    ) -> Result<Option<usize>, InvalidMessageError> {
        let mut index = offset;
        while index < data.len() {
            let Some(line) = self.core.next_line(data, &mut index)? else {
                break;
            };
            if !self.core.is_start_line_received() {
                let parts = ReceiverCore::parse_start_line(&line)?;
                self.receive_start_line(&parts)?;
            } else if line.is_empty() {
                return Ok(Some(index));
            } else {
                let (name, value) = ReceiverCore::parse_header_line(&line)?;
                self.receive_header(name, value);
            }
        }
        Ok(None)
    }

    fn receive_start_line(&mut self, parts: &[String]) -> Result<(), InvalidMessageError> {
        if parts.len() != 3 || !validate::valid_method(&parts[0]) {
            return Err(InvalidMessageError::answerable("Invalid request start line"));
        }
        self.core.receive_version(&parts[2])?;

        let mut target = parts[1].as_str();
        let mut host = None;
        if !target.starts_with('/') && target != "*" {
            // absolute-URI form: scheme://authority/path
            let auth_start = target
                .find("://")
                .ok_or_else(|| InvalidMessageError::answerable("Invalid request URI"))?
                + 3;
            let path_start = target[auth_start..]
                .find('/')
                .ok_or_else(|| InvalidMessageError::answerable("Invalid request URI"))?
                + auth_start;
            host = Some(target[auth_start..path_start].to_owned());
            target = &target[path_start..];
        }
        if !validate::valid_path(target) {
            return Err(InvalidMessageError::answerable("Invalid request path"));
        }

        self.method = Some(parts[0].clone());
        self.host = host;
        self.path = Some(target.to_owned());
        Ok(())
    }

    fn receive_header(&mut self, name: String, value: String) {
        // The authority from an absolute request URI wins over any Host
        // header; the Host header itself is never kept in the header map.
        if name == "host" {
            if self.host.is_none() {
                self.host = Some(value);
            }
        } else {
            self.core.headers.add(name, value);
        }
    }

    /// The received request. Call after [`receive`](Self::receive) returned a
    /// body index.
    ///
    /// # Panics
    /// If no complete start line was received.
    pub fn request(&mut self) -> Request {
        assert!(self.core.is_start_line_received(), "no valid message received");
        let headers = std::mem::take(&mut self.core.headers);
        let chunked = msg_init_chunked(&headers);
        let mut request = Request::new(
            self.method.take().unwrap_or_default(),
            self.scheme,
            self.host.take(),
            self.path.take().unwrap_or_default(),
            self.core.version.unwrap_or(Version::Http11),
            headers,
        );
        request.set_chunked_transfer(chunked);
        request
    }

    /// The cumulative header bytes consumed so far.
    #[must_use]
    pub fn header_size(&self) -> usize {
        self.core.header_size
    }

    #[must_use]
    pub fn is_start_line_received(&self) -> bool {
        self.core.is_start_line_received()
    }

    /// Prepares this receiver for the next message.
    pub fn reset(&mut self) {
        self.core.reset();
        self.method = None;
        self.host = None;
        self.path = None;
    }
}

/// Incremental parser for HTTP/1 responses. Same contract as
/// [`RequestReceiver`].
#[derive(Debug)]
pub struct ResponseReceiver {
    core: ReceiverCore,
    status: Option<u16>,
}

impl Default for ResponseReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseReceiver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_header_size(DEFAULT_MAX_HEADER_SIZE)
    }

    #[must_use]
    pub fn with_max_header_size(max_header_size: usize) -> Self {
        Self {
            core: ReceiverCore::new(max_header_size),
            status: None,
        }
    }

    /// See [`RequestReceiver::receive`].
    pub fn receive(
        &mut self,
        data: &[u8],
        offset: usize,
    ) -> Result<Option<usize>, InvalidMessageError> {
        let mut index = offset;
        while index < data.len() {
            let Some(line) = self.core.next_line(data, &mut index)? else {
                break;
            };
            if !self.core.is_start_line_received() {
                let parts = ReceiverCore::parse_start_line(&line)?;
                self.receive_start_line(&parts)?;
            } else if line.is_empty() {
                return Ok(Some(index));
            } else {
                let (name, value) = ReceiverCore::parse_header_line(&line)?;
                self.core.headers.add(name, value);
            }
        }
        Ok(None)
    }

    fn receive_start_line(&mut self, parts: &[String]) -> Result<(), InvalidMessageError> {
        if parts.len() < 2 {
            return Err(InvalidMessageError::answerable("Invalid response start line"));
        }
        self.core.receive_version(&parts[0])?;
        self.status = Some(
            validate::parse_status(&parts[1])
                .ok_or_else(|| InvalidMessageError::answerable("Invalid response status"))?,
        );
        Ok(())
    }

    /// The received response.
    ///
    /// # Panics
    /// If no complete start line was received.
    pub fn response(&mut self) -> Response {
        assert!(self.core.is_start_line_received(), "no valid message received");
        let headers = std::mem::take(&mut self.core.headers);
        let chunked = msg_init_chunked(&headers);
        let mut response = Response::new(
            self.status.take().unwrap_or(200),
            self.core.version.unwrap_or(Version::Http11),
            headers,
        );
        response.set_chunked_transfer(chunked);
        response
    }

    #[must_use]
    pub fn header_size(&self) -> usize {
        self.core.header_size
    }

    #[must_use]
    pub fn is_start_line_received(&self) -> bool {
        self.core.is_start_line_received()
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.status = None;
    }
}
