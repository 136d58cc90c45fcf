//! Per-stream flow-control bookkeeping shared by the control stream and
//! message streams.
//!
//! Each stream tracks two signed 32-bit windows: the peer-advertised
//! `receiver` window (credit for data we send) and the `local` window
//! (credit we granted the peer). DATA payloads consume them; WINDOW_UPDATE
//! replenishes them.

use crate::error::{ErrorCode, Http2Error};
use crate::h2::frame::{self, frame_type};
use crate::socket::SharedSocket;

#[derive(Debug, Clone, Copy)]
pub(crate) struct FlowWindows {
    /// Credit the peer granted us.
    pub receiver: i32,
    /// Credit we granted the peer.
    pub local: i32,
}

impl FlowWindows {
    pub fn new(receiver: i32, local: i32) -> Self {
        Self { receiver, local }
    }

    /// Applies an inbound WINDOW_UPDATE payload to the receiver window.
    /// `control` scopes the errors: a bad increment on a message stream is a
    /// stream error, on the control stream a connection error.
    pub fn receive_window_update(
        &mut self,
        payload: &[u8],
        control: bool,
    ) -> Result<(), Http2Error> {
        if payload.len() != 4 {
            return Err(Http2Error::connection(ErrorCode::FrameSizeError));
        }
        let raw = frame::read_u32_be(payload, 0);
        if raw == 0 || raw > i32::MAX as u32 {
            return Err(Http2Error::scoped(ErrorCode::ProtocolError, !control));
        }
        let next = self
            .receiver
            .checked_add(raw as i32)
            .ok_or_else(|| Http2Error::scoped(ErrorCode::FlowControlError, !control))?;
        tracing::trace!(from = self.receiver, to = next, "window update received");
        self.receiver = next;
        Ok(())
    }

    /// Grants the peer `increment` more bytes of local window, saturating at
    /// the window limit.
    pub fn grow_local(&mut self, increment: i32) {
        self.local = self.local.saturating_add(increment);
    }
}

/// Grants window credit and emits the matching WINDOW_UPDATE frame.
pub(crate) fn send_window_size_update(
    socket: &SharedSocket,
    stream_id: u32,
    windows: &mut FlowWindows,
    increment: u32,
) -> Result<(), Http2Error> {
    assert!(increment > 0 && increment <= i32::MAX as u32, "invalid window size increment: {increment}");
    windows.grow_local(increment as i32);
    frame::write_frame(socket, stream_id, frame_type::WINDOW_UPDATE, 0, &frame::u32_be(increment))
}
