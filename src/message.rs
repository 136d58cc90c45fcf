//! The HTTP message model shared by the HTTP/1 and HTTP/2 engines.
//!
//! [`Request`] and [`Response`] wrap a common core (version tag, chunked flag,
//! header container, creation time, lock flag, paired-message link and an
//! opaque attachment map). Both protocol engines produce and consume these
//! through the [`Message`] sum.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

use crate::headers::Headers;

/// HTTP version tag carried by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
    Http2,
}

impl Version {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
            Self::Http2 => "HTTP/2",
        }
    }

    /// Parses an HTTP/1 version string; HTTP/2 has no start-line form.
    #[must_use]
    pub fn from_h1_str(s: &str) -> Option<Self> {
        match s {
            "HTTP/1.0" => Some(Self::Http10),
            "HTTP/1.1" => Some(Self::Http11),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque caller metadata attached to a message.
pub type Attachment = Box<dyn Any + Send + Sync>;

/// State shared by requests and responses.
pub struct MessageCommon {
    version: Version,
    chunked_transfer: bool,
    created: SystemTime,
    locked: bool,
    headers: Headers,
    other: Option<Box<Message>>,
    attachments: Option<HashMap<String, Attachment>>,
}

impl fmt::Debug for MessageCommon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // attachments are opaque and have no Debug form
        f.debug_struct("MessageCommon")
            .field("version", &self.version)
            .field("chunked_transfer", &self.chunked_transfer)
            .field("locked", &self.locked)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl MessageCommon {
    fn new(version: Version, headers: Headers) -> Self {
        Self {
            version,
            chunked_transfer: false,
            created: SystemTime::now(),
            locked: false,
            headers,
            other: None,
            attachments: None,
        }
    }

    fn check_locked(&self) {
        assert!(!self.locked, "message is locked and may no longer be modified");
    }
}

/// Declares the accessors every message kind shares.
macro_rules! impl_message_common {
    ($ty:ty) => {
        impl $ty {
            /// The HTTP version tag of this message.
            #[must_use]
            pub fn version(&self) -> Version {
                self.common.version
            }

            /// Sets the HTTP version tag.
            ///
            /// # Panics
            /// If this message is locked.
            pub fn set_version(&mut self, version: Version) {
                self.common.check_locked();
                self.common.version = version;
            }

            /// The header container of this message.
            #[must_use]
            pub fn headers(&self) -> &Headers {
                &self.common.headers
            }

            /// Mutable access to the header container. The container itself
            /// enforces the lock on mutation.
            pub fn headers_mut(&mut self) -> &mut Headers {
                &mut self.common.headers
            }

            /// Whether the body is transferred in chunks rather than as a blob
            /// of predetermined size.
            #[must_use]
            pub fn is_chunked_transfer(&self) -> bool {
                self.common.chunked_transfer
            }

            /// Sets the chunked-transfer flag.
            ///
            /// # Panics
            /// If this message is locked.
            pub fn set_chunked_transfer(&mut self, chunked: bool) {
                self.common.check_locked();
                self.common.chunked_transfer = chunked;
            }

            /// When this message object was created.
            #[must_use]
            pub fn created_time(&self) -> SystemTime {
                self.common.created
            }

            /// The paired message of this exchange (response for a request and
            /// vice versa), if recorded.
            #[must_use]
            pub fn other(&self) -> Option<&Message> {
                self.common.other.as_deref()
            }

            /// Records the paired message of this exchange.
            ///
            /// # Panics
            /// If this message is locked.
            pub fn set_other(&mut self, other: Message) {
                self.common.check_locked();
                self.common.other = Some(Box::new(other));
            }

            /// Whether [`lock`](Self::lock) was called.
            #[must_use]
            pub fn is_locked(&self) -> bool {
                self.common.locked
            }

            /// Freezes this message and its headers. Irreversible; repeated
            /// calls have no further effect. Attachments stay mutable.
            pub fn lock(&mut self) {
                self.common.locked = true;
                self.common.headers.lock();
            }

            /// Stores caller metadata under `key`. Not subject to the lock.
            pub fn set_attachment(&mut self, key: impl Into<String>, value: Attachment) {
                self.common
                    .attachments
                    .get_or_insert_with(HashMap::new)
                    .insert(key.into(), value);
            }

            /// Retrieves caller metadata of type `T` stored under `key`.
            #[must_use]
            pub fn attachment<T: 'static>(&self, key: &str) -> Option<&T> {
                self.common
                    .attachments
                    .as_ref()?
                    .get(key)?
                    .downcast_ref::<T>()
            }

            /// Whether any metadata is stored under `key`.
            #[must_use]
            pub fn has_attachment(&self, key: &str) -> bool {
                self.common
                    .attachments
                    .as_ref()
                    .is_some_and(|a| a.contains_key(key))
            }

            /// Removes and returns the metadata stored under `key`.
            pub fn remove_attachment(&mut self, key: &str) -> Option<Attachment> {
                self.common.attachments.as_mut()?.remove(key)
            }
        }
    };
}

/// An HTTP request.
#[derive(Debug)]
pub struct Request {
    common: MessageCommon,
    method: String,
    scheme: String,
    authority: Option<String>,
    path: String,
}

impl_message_common!(Request);

impl Request {
    /// Creates a request. The authority may be absent while parsing HTTP/1
    /// input that carries neither an absolute URI nor a Host header.
    pub fn new(
        method: impl Into<String>,
        scheme: impl Into<String>,
        authority: Option<String>,
        path: impl Into<String>,
        version: Version,
        headers: Headers,
    ) -> Self {
        Self {
            common: MessageCommon::new(version, headers),
            method: method.into(),
            scheme: scheme.into(),
            authority,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// # Panics
    /// If this message is locked.
    pub fn set_method(&mut self, method: impl Into<String>) {
        self.common.check_locked();
        self.method = method.into();
    }

    /// # Panics
    /// If this message is locked.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) {
        self.common.check_locked();
        self.scheme = scheme.into();
    }

    /// # Panics
    /// If this message is locked.
    pub fn set_authority(&mut self, authority: Option<String>) {
        self.common.check_locked();
        self.authority = authority;
    }

    /// # Panics
    /// If this message is locked.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.common.check_locked();
        self.path = path.into();
    }

    /// The request URI: scheme, authority, and the path unless it is `*`.
    #[must_use]
    pub fn request_uri(&self) -> String {
        let path = if self.path == "*" { "" } else { &self.path };
        format!("{}://{}{}", self.scheme, self.authority.as_deref().unwrap_or(""), path)
    }

    /// An HTTP/1-style request line with the full request URI.
    #[must_use]
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.request_uri(), self.common.version)
    }

    /// The response paired with this request, if recorded.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match self.other()? {
            Message::Response(r) => Some(r),
            Message::Request(_) => None,
        }
    }
}

/// An HTTP response.
#[derive(Debug)]
pub struct Response {
    common: MessageCommon,
    status: u16,
}

impl_message_common!(Response);

impl Response {
    /// Creates a response.
    ///
    /// # Panics
    /// If `status` is zero.
    pub fn new(status: u16, version: Version, headers: Headers) -> Self {
        assert!(status > 0, "invalid status code: {status}");
        Self {
            common: MessageCommon::new(version, headers),
            status,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// # Panics
    /// If this message is locked.
    pub fn set_status(&mut self, status: u16) {
        self.common.check_locked();
        self.status = status;
    }

    /// An HTTP/1-style response line.
    #[must_use]
    pub fn response_line(&self) -> String {
        format!("{} {}", self.common.version, self.status)
    }

    /// Whether this response is an intermediate (1xx) message that does not
    /// terminate the exchange.
    #[must_use]
    pub fn is_intermediate_message(&self) -> bool {
        (100..=199).contains(&self.status)
    }

    /// Whether this response carries a body, judged against the paired
    /// request if one was recorded.
    #[must_use]
    pub fn has_response_body(&self) -> bool {
        let request = match self.other() {
            Some(Message::Request(r)) => Some(r),
            _ => None,
        };
        self.has_response_body_for(request)
    }

    /// Whether this response carries a body when initiated by `request`.
    /// False for HEAD requests, CONNECT requests answered 2xx, and the
    /// bodyless status codes.
    #[must_use]
    pub fn has_response_body_for(&self, request: Option<&Request>) -> bool {
        if let Some(req) = request {
            if req.method() == "HEAD" {
                return false;
            }
            if req.method() == "CONNECT" && (200..=299).contains(&self.status) {
                return false;
            }
        }
        Self::status_has_response_body(self.status)
    }

    /// Whether responses with `status` carry a body at all (RFC 7230 3.3.3):
    /// 1xx, 204 and 304 do not.
    #[must_use]
    pub fn status_has_response_body(status: u16) -> bool {
        !((100..=199).contains(&status) || status == 204 || status == 304)
    }

    /// The request paired with this response, if recorded.
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        match self.other()? {
            Message::Request(r) => Some(r),
            Message::Response(_) => None,
        }
    }
}

/// Either kind of HTTP message.
#[derive(Debug)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        match self {
            Self::Request(r) => r.headers(),
            Self::Response(r) => r.headers(),
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            Self::Request(r) => r.headers_mut(),
            Self::Response(r) => r.headers_mut(),
        }
    }

    #[must_use]
    pub fn version(&self) -> Version {
        match self {
            Self::Request(r) => r.version(),
            Self::Response(r) => r.version(),
        }
    }

    #[must_use]
    pub fn is_chunked_transfer(&self) -> bool {
        match self {
            Self::Request(r) => r.is_chunked_transfer(),
            Self::Response(r) => r.is_chunked_transfer(),
        }
    }

    pub fn set_chunked_transfer(&mut self, chunked: bool) {
        match self {
            Self::Request(r) => r.set_chunked_transfer(chunked),
            Self::Response(r) => r.set_chunked_transfer(chunked),
        }
    }

    pub fn lock(&mut self) {
        match self {
            Self::Request(r) => r.lock(),
            Self::Response(r) => r.lock(),
        }
    }

    #[must_use]
    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Self::Request(r) => Some(r),
            Self::Response(_) => None,
        }
    }

    #[must_use]
    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(r) => Some(r),
            Self::Request(_) => None,
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Self::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

/// A request plus (part of) its body.
#[derive(Debug)]
pub struct RequestData {
    pub request: Request,
    data: Vec<u8>,
    last_packet: bool,
}

/// A response plus (part of) its body.
#[derive(Debug)]
pub struct ResponseData {
    pub response: Response,
    data: Vec<u8>,
    last_packet: bool,
}

macro_rules! impl_message_data {
    ($ty:ty, $field:ident) => {
        impl $ty {
            #[must_use]
            pub fn data(&self) -> &[u8] {
                &self.data
            }

            /// Whether this is the final body part.
            #[must_use]
            pub fn is_last_packet(&self) -> bool {
                self.last_packet
            }

            /// Replaces the body buffer.
            ///
            /// # Panics
            /// If the message is not chunked and the new buffer length differs
            /// from the original, which would desynchronize a declared
            /// Content-Length.
            pub fn set_data(&mut self, data: Vec<u8>) {
                assert!(
                    self.$field.is_chunked_transfer() || self.data.len() == data.len(),
                    "body part must keep its size when the transfer is not chunked"
                );
                self.data = data;
            }
        }
    };
}

impl_message_data!(RequestData, request);
impl_message_data!(ResponseData, response);

impl RequestData {
    #[must_use]
    pub fn with_body(request: Request, last_packet: bool, data: Vec<u8>) -> Self {
        Self { request, data, last_packet }
    }
}

impl ResponseData {
    #[must_use]
    pub fn with_body(response: Response, last_packet: bool, data: Vec<u8>) -> Self {
        Self { response, data, last_packet }
    }
}

/// Trailing headers delivered at the end of a message body.
#[derive(Debug, Default)]
pub struct Trailers {
    headers: Headers,
}

impl Trailers {
    #[must_use]
    pub fn new(headers: Headers) -> Self {
        Self { headers }
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}
