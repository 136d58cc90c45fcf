//! The byte-sink contract the engine writes through.
//!
//! The core never performs I/O itself; the embedder supplies a
//! [`WritableSocket`] and the engine serializes frames and header blocks into
//! it. Writes of a frame header plus its payload must appear atomically on
//! the wire even under a multi-threaded embedder, so the socket is shared
//! behind a mutex and locked for the duration of each such pair.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

/// A writable byte sink plus a little connection state.
pub trait WritableSocket: Send {
    /// Writes the given bytes. May buffer internally.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flushes any buffered data toward the peer.
    fn flush(&mut self) -> io::Result<()>;

    /// Whether the underlying channel can still accept writes.
    fn is_connected(&self) -> bool;

    /// Whether additional writes can be accepted without growing a local
    /// buffer beyond a sensible bound.
    fn is_writable(&self) -> bool;

    /// A printable identity of the remote peer, used in log output.
    fn remote_name(&self) -> String;

    /// Closes the underlying channel.
    fn close(&mut self);
}

/// A socket shared between the endpoint and its streams.
pub type SharedSocket = Arc<Mutex<dyn WritableSocket>>;

/// Wraps a socket for use by the engine.
pub fn share_socket(socket: impl WritableSocket + 'static) -> SharedSocket {
    Arc::new(Mutex::new(socket))
}
