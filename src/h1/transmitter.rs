//! HTTP/1 message serialization.

use std::io;

use crate::message::Message;
use crate::socket::SharedSocket;

/// Serializes messages to their HTTP/1 byte form and optionally writes them
/// to a socket.
#[derive(Default)]
pub struct MessageTransmitter {
    socket: Option<SharedSocket>,
}

impl MessageTransmitter {
    /// A transmitter usable only via [`generate`](Self::generate).
    #[must_use]
    pub fn new() -> Self {
        Self { socket: None }
    }

    /// A transmitter that [`send`](Self::send)s to the given socket.
    #[must_use]
    pub fn with_socket(socket: SharedSocket) -> Self {
        Self { socket: Some(socket) }
    }

    /// Serializes `msg` and writes it to the configured socket.
    ///
    /// # Panics
    /// If this transmitter was created without a socket.
    pub fn send(&self, msg: &Message) -> io::Result<()> {
        let socket = self.socket.as_ref().expect("no socket configured");
        socket.lock().write(&self.generate(msg))
    }

    /// Serializes `msg`: start line, headers (with a synthesized leading
    /// `host` header for requests) and the terminating blank line, as UTF-8.
    #[must_use]
    pub fn generate(&self, msg: &Message) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&self.start_line(msg));
        out.push_str("\r\n");
        if let Message::Request(req) = msg {
            append_header(&mut out, "host", req.authority().unwrap_or(""));
        }
        for (name, value) in msg.headers().iter() {
            append_header(&mut out, name, value);
        }
        out.push_str("\r\n");
        out.into_bytes()
    }

    fn start_line(&self, msg: &Message) -> String {
        match msg {
            Message::Request(req) => {
                format!("{} {} {}", req.method(), req.path(), req.version())
            }
            Message::Response(res) => format!("{} {}", res.version(), res.status()),
        }
    }
}

/// Appends one `name: value` header line.
fn append_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}
