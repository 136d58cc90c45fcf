//! The connection control stream (stream id 0).
//!
//! Carries the frames that affect the whole connection: SETTINGS, PING,
//! GOAWAY and the connection-level flow-control window.

use tracing::{debug, trace};

use crate::error::{ErrorCode, Http2Error};
use crate::h2::frame::{self, flags, frame_type};
use crate::h2::settings::{settings_id, Settings, MAX_FRAME_SIZE_MAX, MAX_FRAME_SIZE_MIN};
use crate::h2::stream::{self, FlowWindows};
use crate::socket::SharedSocket;

/// What a control-stream frame asked the endpoint to do.
#[derive(Debug)]
pub(crate) enum ControlEvent {
    None,
    /// A (non-ACK) SETTINGS frame was applied; remote settings changed.
    SettingsReceived,
    /// The connection window grew; blocked streams may resume.
    WindowUpdate,
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
    },
}

pub(crate) struct ControlStream {
    socket: SharedSocket,
    local_settings: Settings,
    remote_settings: Settings,
    settings_received: bool,
    windows: FlowWindows,
}

impl ControlStream {
    pub fn new(socket: SharedSocket, local_settings: Settings) -> Self {
        let remote_settings = Settings::new();
        let windows = FlowWindows::new(
            remote_settings.get(settings_id::INITIAL_WINDOW_SIZE) as i32,
            local_settings.get(settings_id::INITIAL_WINDOW_SIZE) as i32,
        );
        Self {
            socket,
            local_settings,
            remote_settings,
            settings_received: false,
            windows,
        }
    }

    /// Sends a GOAWAY frame naming the last processed stream id.
    pub fn send_goaway(&self, highest_stream_id: u32, error_code: ErrorCode) -> Result<(), Http2Error> {
        let mut payload = [0u8; 8];
        frame::write_u32_be(&mut payload, 0, highest_stream_id);
        frame::write_u32_be(&mut payload, 4, u32::from(error_code));
        frame::write_frame(&self.socket, 0, frame_type::GOAWAY, 0, &payload)
    }

    /// Sends our SETTINGS frame, omitting values equal to the RFC default.
    pub fn write_settings(&self) -> Result<(), Http2Error> {
        let mut payload = Vec::new();
        for id in 1..settings_id::COUNT {
            let value = self.local_settings.get(id);
            if value != Settings::default_value(id) {
                payload.extend_from_slice(&(id).to_be_bytes());
                payload.extend_from_slice(&value.to_be_bytes());
            }
        }
        frame::write_frame(&self.socket, 0, frame_type::SETTINGS, 0, &payload)
    }

    pub fn receive_frame(
        &mut self,
        frame_type_num: u8,
        frame_flags: u8,
        data: &[u8],
    ) -> Result<ControlEvent, Http2Error> {
        match frame_type_num {
            frame_type::SETTINGS => {
                if frame_flags & flags::ACK != 0 {
                    if !data.is_empty() {
                        return Err(Http2Error::connection(ErrorCode::FrameSizeError));
                    }
                    return Ok(ControlEvent::None);
                }
                if data.len() % 6 != 0 {
                    return Err(Http2Error::connection(ErrorCode::FrameSizeError));
                }
                let count = data.len() / 6;
                for i in 0..count {
                    let setting = frame::read_u16_be(data, i * 6);
                    let value = frame::read_u32_be(data, i * 6 + 2);
                    if setting == 0 || setting >= settings_id::COUNT {
                        // unknown settings are ignored
                        continue;
                    }
                    match setting {
                        settings_id::ENABLE_PUSH if value > 1 => {
                            return Err(Http2Error::connection_msg(
                                ErrorCode::ProtocolError,
                                "ENABLE_PUSH is invalid",
                            ));
                        }
                        settings_id::MAX_FRAME_SIZE
                            if !(MAX_FRAME_SIZE_MIN..=MAX_FRAME_SIZE_MAX).contains(&value) =>
                        {
                            return Err(Http2Error::connection_msg(
                                ErrorCode::ProtocolError,
                                "MAX_FRAME_SIZE is invalid",
                            ));
                        }
                        settings_id::INITIAL_WINDOW_SIZE if value > i32::MAX as u32 => {
                            return Err(Http2Error::connection_msg(
                                ErrorCode::ProtocolError,
                                "INITIAL_WINDOW_SIZE is invalid",
                            ));
                        }
                        _ => {}
                    }
                    trace!(name = Settings::name(setting), setting, value, "SETTINGS");
                    self.remote_settings.set(setting, value);
                }
                self.settings_received = true;
                debug!(count, "received and processed SETTINGS frame");
                frame::write_frame(&self.socket, 0, frame_type::SETTINGS, flags::ACK, &[])?;
                Ok(ControlEvent::SettingsReceived)
            }
            frame_type::PING => {
                if frame_flags & flags::ACK != 0 {
                    return Ok(ControlEvent::None);
                }
                if data.len() != 8 {
                    return Err(Http2Error::connection(ErrorCode::FrameSizeError));
                }
                trace!("received PING request");
                frame::write_frame(&self.socket, 0, frame_type::PING, flags::ACK, data)?;
                Ok(ControlEvent::None)
            }
            frame_type::GOAWAY => {
                if data.len() < 8 {
                    return Err(Http2Error::connection(ErrorCode::FrameSizeError));
                }
                let last_stream_id = frame::read_u32_be(data, 0) & 0x7fff_ffff;
                let error_code = ErrorCode::from_u32(frame::read_u32_be(data, 4));
                debug!(%error_code, last_stream_id, "received GOAWAY frame");
                Ok(ControlEvent::GoAway { last_stream_id, error_code })
            }
            frame_type::WINDOW_UPDATE => {
                self.windows.receive_window_update(data, true)?;
                Ok(ControlEvent::WindowUpdate)
            }
            t if t < frame_type::COUNT => Err(Http2Error::connection(ErrorCode::ProtocolError)),
            // unknown frame types are ignored
            _ => Ok(ControlEvent::None),
        }
    }

    /// Grants connection-level window and sends the WINDOW_UPDATE.
    pub fn send_window_size_update(&mut self, increment: u32) -> Result<(), Http2Error> {
        stream::send_window_size_update(&self.socket, 0, &mut self.windows, increment)
    }

    pub fn is_settings_received(&self) -> bool {
        self.settings_received
    }

    pub fn local_settings(&self) -> &Settings {
        &self.local_settings
    }

    pub fn remote_settings(&self) -> &Settings {
        &self.remote_settings
    }

    /// The peer's connection window: how much flow-controlled data we may
    /// still send connection-wide.
    pub fn receiver_window(&self) -> i32 {
        self.windows.receiver
    }

    /// Our connection window: how much flow-controlled data the peer may
    /// still send us.
    pub fn local_window(&self) -> i32 {
        self.windows.local
    }

    /// Consumes peer connection window for an outgoing flow-controlled
    /// payload.
    pub fn consume_receiver_connection_window(&mut self, size: usize) -> Result<(), Http2Error> {
        if size > self.windows.receiver.max(0) as usize {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "size is larger than receiver window size",
            ));
        }
        self.windows.receiver -= size as i32;
        Ok(())
    }

    /// Consumes local connection window for an incoming flow-controlled
    /// payload.
    pub fn consume_local_connection_window(&mut self, size: usize) -> Result<(), Http2Error> {
        if size > self.windows.local.max(0) as usize {
            return Err(Http2Error::connection_msg(
                ErrorCode::FlowControlError,
                "size is larger than local window size",
            ));
        }
        self.windows.local -= size as i32;
        Ok(())
    }
}
