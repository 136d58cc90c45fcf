//! Error taxonomy for both protocol generations.
//!
//! HTTP/1 parsing failures are [`InvalidMessageError`]s; HTTP/2 failures are
//! [`Http2Error`]s carrying an RFC 7540 [`ErrorCode`] and a stream-vs-connection
//! scope flag, since the same code can apply to either scope.

use std::fmt;

/// HTTP/2 error codes (RFC 7540 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl ErrorCode {
    /// Maps a wire value to an error code. Unknown codes are treated as
    /// INTERNAL_ERROR, as RFC 7540 permits.
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }

    /// The RFC's SCREAMING_SNAKE name of this code.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::FlowControlError => "FLOW_CONTROL_ERROR",
            Self::SettingsTimeout => "SETTINGS_TIMEOUT",
            Self::StreamClosed => "STREAM_CLOSED",
            Self::FrameSizeError => "FRAME_SIZE_ERROR",
            Self::RefusedStream => "REFUSED_STREAM",
            Self::Cancel => "CANCEL",
            Self::CompressionError => "COMPRESSION_ERROR",
            Self::ConnectError => "CONNECT_ERROR",
            Self::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            Self::InadequateSecurity => "INADEQUATE_SECURITY",
            Self::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code as Self
    }
}

impl fmt::Display for ErrorCode {
    /// Renders as `NAME [n]`, e.g. `PROTOCOL_ERROR [1]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name(), *self as u32)
    }
}

/// An HTTP/2 connection or stream error.
///
/// Stream errors escalate to RST_STREAM on the affected stream; connection
/// errors escalate to GOAWAY plus closing the socket.
#[derive(Debug, Clone)]
pub struct Http2Error {
    code: ErrorCode,
    stream_error: bool,
    message: Option<String>,
}

impl Http2Error {
    /// A connection-scoped error.
    #[must_use]
    pub fn connection(code: ErrorCode) -> Self {
        Self { code, stream_error: false, message: None }
    }

    /// A stream-scoped error.
    #[must_use]
    pub fn stream(code: ErrorCode) -> Self {
        Self { code, stream_error: true, message: None }
    }

    /// A connection-scoped error with a detail message.
    pub fn connection_msg(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, stream_error: false, message: Some(message.into()) }
    }

    /// A stream-scoped error with a detail message.
    pub fn stream_msg(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, stream_error: true, message: Some(message.into()) }
    }

    /// Scopes this error to a stream or the connection.
    #[must_use]
    pub fn scoped(code: ErrorCode, stream_error: bool) -> Self {
        Self { code, stream_error, message: None }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// `true` for a stream error, `false` for a connection error.
    #[must_use]
    pub fn is_stream_error(&self) -> bool {
        self.stream_error
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Http2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = if self.stream_error { "stream" } else { "connection" };
        match &self.message {
            Some(msg) => write!(f, "{scope} error: {} ({msg})", self.code),
            None => write!(f, "{scope} error: {}", self.code),
        }
    }
}

impl std::error::Error for Http2Error {}

impl From<std::io::Error> for Http2Error {
    /// Socket failures are demoted to INTERNAL_ERROR at the trust boundary.
    fn from(err: std::io::Error) -> Self {
        Self::connection_msg(ErrorCode::InternalError, err.to_string())
    }
}

/// A malformed HTTP/1 message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid HTTP message: {message}")]
pub struct InvalidMessageError {
    message: String,
    answerable: bool,
}

impl InvalidMessageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), answerable: false }
    }

    /// An error whose detail message may be surfaced to the peer, for example
    /// in the body of a 400 response.
    pub fn answerable(message: impl Into<String>) -> Self {
        Self { message: message.into(), answerable: true }
    }

    #[must_use]
    pub fn msg(&self) -> &str {
        &self.message
    }

    /// Whether the detail message may be shown to the peer.
    #[must_use]
    pub fn is_answerable(&self) -> bool {
        self.answerable
    }
}

/// Why a message stream ended, as reported to the embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClosedReason {
    Unknown,
    ProtocolError,
    InternalError,
    Cancel,
    Refused,
    EnhanceYourCalm,
    /// The peer demanded a downgrade to HTTP/1.1.
    ProtocolDowngrade,
}

impl StreamClosedReason {
    /// Derives a close reason from an RFC 7540 error code.
    #[must_use]
    pub fn from_error_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::ProtocolError => Self::ProtocolError,
            ErrorCode::InternalError => Self::InternalError,
            ErrorCode::Cancel => Self::Cancel,
            ErrorCode::RefusedStream => Self::Refused,
            ErrorCode::EnhanceYourCalm => Self::EnhanceYourCalm,
            ErrorCode::Http11Required => Self::ProtocolDowngrade,
            _ => Self::Unknown,
        }
    }
}
