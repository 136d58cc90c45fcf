//! Test doubles and wire helpers shared across the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use http_sans_io::{share_socket, SharedSocket, WritableSocket};

/// Observable state of a [`MockSocket`], shared with the test body.
#[derive(Debug)]
pub struct MockState {
    pub written: Vec<u8>,
    pub writable: bool,
    pub connected: bool,
    pub flushes: usize,
}

impl MockState {
    /// Parses everything written so far into frames and clears the buffer.
    pub fn take_frames(&mut self) -> Vec<WireFrame> {
        let frames = parse_frames(&self.written);
        self.written.clear();
        frames
    }
}

/// A [`WritableSocket`] capturing all writes in memory.
pub struct MockSocket {
    state: Arc<Mutex<MockState>>,
}

impl WritableSocket for MockSocket {
    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.state.lock().unwrap().written.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.state.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn is_writable(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.connected && state.writable
    }

    fn remote_name(&self) -> String {
        "mock-peer".to_owned()
    }

    fn close(&mut self) {
        self.state.lock().unwrap().connected = false;
    }
}

/// Installs a compact subscriber so `--nocapture` runs show the engine's
/// trace output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A shared mock socket plus the handle to inspect what got written.
pub fn mock_socket() -> (SharedSocket, Arc<Mutex<MockState>>) {
    init_tracing();
    let state = Arc::new(Mutex::new(MockState {
        written: Vec::new(),
        writable: true,
        connected: true,
        flushes: 0,
    }));
    let socket = share_socket(MockSocket { state: state.clone() });
    (socket, state)
}

/// One frame as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
    pub payload: Vec<u8>,
}

/// Splits a byte buffer into the frames it contains.
pub fn parse_frames(mut data: &[u8]) -> Vec<WireFrame> {
    let mut frames = Vec::new();
    while data.len() >= 9 {
        let length = ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | data[2] as usize;
        let frame_type = data[3];
        let flags = data[4];
        let stream_id =
            u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7fff_ffff;
        assert!(data.len() >= 9 + length, "truncated frame in written output");
        frames.push(WireFrame {
            frame_type,
            flags,
            stream_id,
            payload: data[9..9 + length].to_vec(),
        });
        data = &data[9 + length..];
    }
    assert!(data.is_empty(), "trailing bytes after last frame");
    frames
}

/// Builds a frame with the 9-byte header.
pub fn build_frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        (payload.len() >> 16) as u8,
        (payload.len() >> 8) as u8,
        payload.len() as u8,
        frame_type,
        flags,
    ];
    frame.extend_from_slice(&stream_id.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// A SETTINGS payload from (id, value) pairs.
pub fn settings_payload(settings: &[(u16, u32)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for &(id, value) in settings {
        payload.extend_from_slice(&id.to_be_bytes());
        payload.extend_from_slice(&value.to_be_bytes());
    }
    payload
}

/// HPACK bytes of a minimal valid request header block:
/// `GET https://x/` with the authority sent as a literal.
pub const REQUEST_BLOCK: &[u8] = &[0x82, 0x87, 0x84, 0x41, 0x01, b'x'];

/// HPACK byte of a `:status: 200` response header block.
pub const RESPONSE_BLOCK: &[u8] = &[0x88];
