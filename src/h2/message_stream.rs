//! Message streams: HTTP/2 streams with ids above 0, where requests and
//! responses are exchanged.
//!
//! A stream walks the RFC 7540 lifecycle (idle, open, reserved, half-closed,
//! closed), assembles header blocks across HEADERS/PUSH_PROMISE plus
//! CONTINUATION frames, decodes them through the connection's HPACK context,
//! enforces both flow-control windows on DATA, and buffers outbound DATA in
//! a backlog when the peer's window or the socket cannot take it.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, trace};

use crate::error::{ErrorCode, Http2Error};
use crate::h2::control::ControlStream;
use crate::h2::endpoint::Http2Event;
use crate::h2::frame::{self, flags, frame_type};
use crate::h2::hpack::{EncoderContext, HpackContext};
use crate::h2::settings::settings_id;
use crate::h2::stream::{self, FlowWindows};
use crate::headers::Headers;
use crate::message::{Message, Request, Response, Trailers, Version};
use crate::socket::SharedSocket;
use crate::validate;

/// Attachment key under which the engine records a message's stream id.
pub const ATTACHMENT_KEY_STREAM_ID: &str = "streamId";

/// The lifecycle states of a message stream (RFC 7540 Section 5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    ReservedLocal,
    Reserved,
    HalfClosedLocal,
    HalfClosed,
    Closed,
}

/// An outbound DATA frame waiting for window or socket capacity.
#[derive(Debug)]
struct QueuedDataFrame {
    end_stream: bool,
    payload: Vec<u8>,
    /// Bytes of `payload` already written.
    index: usize,
}

impl QueuedDataFrame {
    fn remaining(&self) -> usize {
        self.payload.len() - self.index
    }
}

pub struct MessageStream {
    stream_id: u32,
    socket: SharedSocket,
    /// Whether the local endpoint is the server; decides whether a first
    /// header block is read as a request or a response.
    server: bool,
    state: StreamState,
    close_time: Option<Instant>,
    close_outgoing: bool,

    headers_receiving: bool,
    headers_end_stream: bool,
    headers_buf: Vec<u8>,
    promised_stream_id: Option<u32>,
    message_received: bool,

    receive_data: bool,
    backlog: VecDeque<QueuedDataFrame>,
    windows: FlowWindows,

    /// Set once the endpoint has queued this stream for close-wait removal.
    pub(crate) close_wait_queued: bool,
}

impl MessageStream {
    /// Creates a stream; both windows start from the respective
    /// INITIAL_WINDOW_SIZE settings taken from the control stream.
    pub(crate) fn new(
        stream_id: u32,
        socket: SharedSocket,
        control: &ControlStream,
        server: bool,
    ) -> Self {
        let windows = FlowWindows::new(
            control.remote_settings().get(settings_id::INITIAL_WINDOW_SIZE) as i32,
            control.local_settings().get(settings_id::INITIAL_WINDOW_SIZE) as i32,
        );
        Self {
            stream_id,
            socket,
            server,
            state: StreamState::Idle,
            close_time: None,
            close_outgoing: false,
            headers_receiving: false,
            headers_end_stream: false,
            headers_buf: Vec::new(),
            promised_stream_id: None,
            message_received: false,
            receive_data: true,
            backlog: VecDeque::new(),
            windows,
            close_wait_queued: false,
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Whether this stream still awaits a response (we half-closed first
    /// from the peer's point of view).
    #[must_use]
    pub fn is_expecting_response(&self) -> bool {
        self.state == StreamState::HalfClosed
    }

    /// When this stream reached the closed state.
    #[must_use]
    pub fn close_time(&self) -> Option<Instant> {
        self.close_time
    }

    /// Whether the closing frame was sent by us rather than received.
    #[must_use]
    pub fn is_close_outgoing(&self) -> bool {
        self.close_outgoing
    }

    /// Whether outbound data is parked awaiting WINDOW_UPDATE.
    #[must_use]
    pub fn has_data_backlog(&self) -> bool {
        !self.backlog.is_empty()
    }

    /// Whether a header block is still being assembled (END_HEADERS not yet
    /// seen).
    #[must_use]
    pub fn is_headers_receiving(&self) -> bool {
        self.headers_receiving
    }

    /// Marks an idle, even-id stream as reserved for a pushed response:
    /// half-closed (local) when we will receive it, half-closed (remote)
    /// when we will send it.
    pub(crate) fn prepare_push(&mut self, receive: bool) -> Result<(), Http2Error> {
        if self.state != StreamState::Idle || self.stream_id % 2 != 0 {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "stream cannot be used for a server push response",
            ));
        }
        self.state = if receive {
            StreamState::HalfClosedLocal
        } else {
            StreamState::HalfClosed
        };
        Ok(())
    }

    // ------------------------------------------------------------------
    // Receive path
    // ------------------------------------------------------------------

    pub(crate) fn receive_frame(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        ftype: u8,
        fflags: u8,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if ftype != frame_type::PRIORITY && self.is_closed() && !self.close_outgoing {
            return Err(Http2Error::stream(ErrorCode::StreamClosed));
        }
        if frame::is_flow_controlled_frame_type(ftype) {
            if data.len() > self.windows.local.max(0) as usize {
                return Err(Http2Error::stream(ErrorCode::FlowControlError));
            }
            self.windows.local -= data.len() as i32;
        }
        if self.headers_receiving && ftype != frame_type::CONTINUATION {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "Expected CONTINUATION",
            ));
        }
        match ftype {
            frame_type::PRIORITY => {
                if data.len() != 5 {
                    return Err(Http2Error::stream(ErrorCode::FrameSizeError));
                }
                // priority data is accepted but not acted upon
                Ok(())
            }
            frame_type::HEADERS => self.receive_headers(hpack, fflags, data, events),
            frame_type::PUSH_PROMISE => {
                self.receive_push_promise(control, hpack, fflags, data, events)
            }
            frame_type::CONTINUATION => {
                self.receive_continuation(control, hpack, fflags, data, events)
            }
            frame_type::DATA => self.receive_data_frame(fflags, data, events),
            frame_type::RST_STREAM => {
                if data.len() != 4 {
                    return Err(Http2Error::connection(ErrorCode::FrameSizeError));
                }
                let code = ErrorCode::from_u32(frame::read_u32_be(data, 0));
                debug!(stream = self.stream_id, %code, "stream closed by RST_STREAM");
                self.close(code, false, events);
                Ok(())
            }
            frame_type::WINDOW_UPDATE => {
                self.windows.receive_window_update(data, false)?;
                self.window_update(control, events);
                Ok(())
            }
            t if t < frame_type::COUNT => Err(Http2Error::connection(ErrorCode::ProtocolError)),
            _ => Ok(()),
        }
    }

    fn receive_headers(
        &mut self,
        hpack: &mut HpackContext,
        fflags: u8,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        match self.state {
            // an incoming request opens the stream
            StreamState::Idle => self.state = StreamState::Open,
            // the promised response after a push promise
            StreamState::Reserved => self.state = StreamState::HalfClosedLocal,
            StreamState::Closed => {
                return Err(Http2Error::scoped(ErrorCode::StreamClosed, self.close_outgoing));
            }
            StreamState::HalfClosedLocal | StreamState::Open => {}
            _ => return Err(Http2Error::stream(ErrorCode::StreamClosed)),
        }
        if data.is_empty() {
            return Err(Http2Error::connection(ErrorCode::FrameSizeError));
        }
        let mut index = 0;
        let mut padding = 0usize;
        if fflags & flags::PADDED != 0 {
            padding = data[index] as usize;
            index += 1;
        }
        if fflags & flags::PRIORITY != 0 {
            if data.len() < 6 {
                return Err(Http2Error::connection(ErrorCode::FrameSizeError));
            }
            index += 5;
        }
        if padding > data.len() - index {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "padding is too high",
            ));
        }
        self.headers_end_stream = fflags & flags::END_STREAM != 0;
        let fragment = &data[index..data.len() - padding];
        if fflags & flags::END_HEADERS != 0 {
            self.receive_header_block(hpack, fragment.to_vec(), self.headers_end_stream, events)
        } else {
            self.headers_receiving = true;
            self.headers_buf.extend_from_slice(fragment);
            Ok(())
        }
    }

    fn receive_push_promise(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        fflags: u8,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if control.local_settings().get(settings_id::ENABLE_PUSH) == 0 {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "PUSH is not enabled",
            ));
        }
        match self.state {
            StreamState::HalfClosedLocal => self.state = StreamState::Reserved,
            StreamState::Closed if self.close_outgoing => {
                return Err(Http2Error::stream(ErrorCode::Cancel));
            }
            StreamState::Reserved => {}
            _ => return Err(Http2Error::connection(ErrorCode::ProtocolError)),
        }
        if data.len() < 4 {
            return Err(Http2Error::connection(ErrorCode::FrameSizeError));
        }
        let mut index = 0;
        let mut padding = 0usize;
        if fflags & flags::PADDED != 0 {
            padding = data[index] as usize;
            index += 1;
        }
        if data.len() < index + 4 {
            return Err(Http2Error::connection(ErrorCode::FrameSizeError));
        }
        let promised_stream_id = frame::read_u32_be(data, index) & 0x7fff_ffff;
        if promised_stream_id % 2 != 0 {
            // servers may only open even-numbered streams
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "Invalid promisedStreamId",
            ));
        }
        index += 4;
        if padding > data.len() - index {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "padding is too high",
            ));
        }
        self.headers_end_stream = false;
        self.promised_stream_id = Some(promised_stream_id);
        let fragment = &data[index..data.len() - padding];
        if fflags & flags::END_HEADERS != 0 {
            self.receive_header_block(hpack, fragment.to_vec(), false, events)
        } else {
            self.headers_receiving = true;
            self.headers_buf.extend_from_slice(fragment);
            Ok(())
        }
    }

    fn receive_continuation(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        fflags: u8,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if !self.headers_receiving {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "Unexpected CONTINUATION",
            ));
        }
        let max = control.local_settings().get(settings_id::MAX_HEADER_LIST_SIZE) as usize;
        if self.headers_buf.len() + data.len() > max {
            return Err(Http2Error::stream_msg(
                ErrorCode::EnhanceYourCalm,
                "Exceeded maxHeadersSize",
            ));
        }
        self.headers_buf.extend_from_slice(data);
        if fflags & flags::END_HEADERS != 0 {
            let block = std::mem::take(&mut self.headers_buf);
            self.headers_receiving = false;
            self.receive_header_block(hpack, block, self.headers_end_stream, events)
        } else {
            Ok(())
        }
    }

    fn receive_header_block(
        &mut self,
        hpack: &mut HpackContext,
        block: Vec<u8>,
        end_stream: bool,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        let push_promise = self.state == StreamState::Reserved;
        let request = push_promise || self.server;
        if end_stream {
            self.recv_end_stream()?;
        }
        let mut headers = hpack
            .decode_header_block(&block)
            .ok_or_else(|| Http2Error::connection(ErrorCode::CompressionError))?;

        if !self.message_received {
            let message_stream_id = if push_promise {
                self.promised_stream_id.unwrap_or(self.stream_id)
            } else {
                self.stream_id
            };
            let chunked = !headers.exists("content-length");
            if request {
                let method = headers.extract(":method");
                let scheme = headers.extract(":scheme");
                let authority = match headers.extract(":authority") {
                    Some(a) => {
                        headers.delete("host");
                        Some(a)
                    }
                    None => headers.extract("host"),
                };
                let path = headers.extract(":path");
                let valid = method.as_deref().is_some_and(|m| validate::valid_method(m))
                    && scheme.as_deref() == Some("https")
                    && authority.as_deref().is_some_and(|a| validate::valid_authority(a))
                    && path.as_deref().is_some_and(|p| validate::valid_path(p));
                if !valid {
                    return Err(Http2Error::stream(ErrorCode::ProtocolError));
                }
                let mut msg = Request::new(
                    method.unwrap_or_default(),
                    scheme.unwrap_or_default(),
                    authority,
                    path.unwrap_or_default(),
                    Version::Http2,
                    headers,
                );
                msg.set_attachment(ATTACHMENT_KEY_STREAM_ID, Box::new(message_stream_id));
                msg.set_chunked_transfer(chunked);
                if push_promise {
                    events.push(Http2Event::PushPromise {
                        stream_id: self.stream_id,
                        promised_stream_id: message_stream_id,
                        request: msg,
                    });
                } else {
                    self.message_received = true;
                    events.push(Http2Event::Message {
                        stream_id: self.stream_id,
                        message: Message::Request(msg),
                        end_stream,
                    });
                }
            } else {
                let status = headers
                    .extract(":status")
                    .as_deref()
                    .and_then(validate::parse_status)
                    .ok_or_else(|| Http2Error::stream(ErrorCode::ProtocolError))?;
                let mut msg = Response::new(status, Version::Http2, headers);
                msg.set_attachment(ATTACHMENT_KEY_STREAM_ID, Box::new(message_stream_id));
                msg.set_chunked_transfer(chunked);
                self.message_received = true;
                events.push(Http2Event::Message {
                    stream_id: self.stream_id,
                    message: Message::Response(msg),
                    end_stream,
                });
            }
        } else {
            // a second header block on the stream is the trailers
            if !end_stream {
                return Err(Http2Error::stream(ErrorCode::ProtocolError));
            }
            events.push(Http2Event::Trailers {
                stream_id: self.stream_id,
                trailers: Trailers::new(headers),
            });
        }
        if end_stream && self.state == StreamState::HalfClosedLocal {
            self.close(ErrorCode::NoError, false, events);
        }
        Ok(())
    }

    fn receive_data_frame(
        &mut self,
        fflags: u8,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if self.state != StreamState::HalfClosedLocal && self.state != StreamState::Open {
            return Err(Http2Error::stream(ErrorCode::StreamClosed));
        }
        let mut index = 0;
        let mut padding = 0usize;
        if fflags & flags::PADDED != 0 {
            if data.is_empty() {
                return Err(Http2Error::connection(ErrorCode::FrameSizeError));
            }
            padding = data[index] as usize;
            index += 1;
        }
        if padding > data.len() - index {
            return Err(Http2Error::connection_msg(
                ErrorCode::ProtocolError,
                "padding is too high",
            ));
        }
        let end_stream = fflags & flags::END_STREAM != 0;
        if end_stream {
            self.recv_end_stream()?;
        }
        events.push(Http2Event::Data {
            stream_id: self.stream_id,
            data: data[index..data.len() - padding].to_vec(),
            end_stream,
        });
        if end_stream && self.state == StreamState::HalfClosedLocal {
            self.close(ErrorCode::NoError, false, events);
        }
        // replenish what the whole frame consumed so the peer keeps headroom
        if self.receive_data && !self.is_closed() && !data.is_empty() {
            self.send_window_size_update(2 * data.len() as u32)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Send path
    // ------------------------------------------------------------------

    /// Encodes and sends a request or response in one HEADERS frame plus any
    /// CONTINUATION frames.
    pub(crate) fn send_message(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        message: MessageRef<'_>,
        end_stream: bool,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if self.state == StreamState::Idle {
            self.state = StreamState::Open;
        } else if self.state != StreamState::HalfClosed {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "stream is not expecting an HTTP message",
            ));
        }
        let ctx = Self::encode_message(hpack, None, message);
        self.write_headers(control, frame_type::HEADERS, ctx, end_stream, events)
    }

    /// Sends a push promise for `request` on this (half-closed) stream,
    /// naming the stream the promised response will use.
    pub(crate) fn send_push_promise(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        promised_stream_id: u32,
        request: &Request,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if self.state != StreamState::HalfClosed {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "stream is not expecting a push promise",
            ));
        }
        let ctx = Self::encode_message(
            hpack,
            Some(frame::u32_be(promised_stream_id)),
            MessageRef::Request(request),
        );
        self.write_headers(control, frame_type::PUSH_PROMISE, ctx, false, events)
    }

    /// Sends trailing headers, ending the stream.
    pub(crate) fn send_trailers(
        &mut self,
        control: &mut ControlStream,
        hpack: &mut HpackContext,
        trailers: &Trailers,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        if self.state != StreamState::Open && self.state != StreamState::HalfClosed {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "stream is not expecting trailers",
            ));
        }
        let mut ctx = EncoderContext::new();
        for (name, value) in trailers.headers().iter() {
            hpack.encode_header(&mut ctx, &name.to_ascii_lowercase(), value);
        }
        self.write_headers(control, frame_type::HEADERS, ctx, true, events)
    }

    fn encode_message(
        hpack: &mut HpackContext,
        prefix: Option<[u8; 4]>,
        message: MessageRef<'_>,
    ) -> EncoderContext {
        let mut ctx = match prefix {
            Some(p) => EncoderContext::with_prefix(&p),
            None => EncoderContext::new(),
        };
        let headers: &Headers;
        match message {
            MessageRef::Request(request) => {
                hpack.encode_header(&mut ctx, ":method", request.method());
                hpack.encode_header(&mut ctx, ":scheme", request.scheme());
                if let Some(authority) = request.authority() {
                    hpack.encode_header(&mut ctx, ":authority", authority);
                }
                hpack.encode_header(&mut ctx, ":path", request.path());
                headers = request.headers();
            }
            MessageRef::Response(response) => {
                hpack.encode_header(&mut ctx, ":status", &response.status().to_string());
                headers = response.headers();
            }
        }
        for (name, value) in headers.iter() {
            hpack.encode_header(&mut ctx, &name.to_ascii_lowercase(), value);
        }
        ctx
    }

    /// Emits an encoded header block, splitting it into CONTINUATION frames
    /// when it exceeds the peer's MAX_FRAME_SIZE. END_STREAM may only appear
    /// on the first frame; END_HEADERS only on the last.
    fn write_headers(
        &mut self,
        control: &mut ControlStream,
        ftype: u8,
        ctx: EncoderContext,
        end_stream: bool,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        let max_frame_size = control.remote_settings().get(settings_id::MAX_FRAME_SIZE) as usize;
        let data = ctx.into_bytes();
        if data.len() <= max_frame_size {
            let mut fflags = flags::END_HEADERS;
            if end_stream {
                fflags |= flags::END_STREAM;
            }
            frame::write_frame(&self.socket, self.stream_id, ftype, fflags, &data)?;
        } else {
            let mut index = 0;
            let mut first = true;
            while index < data.len() {
                let next = (data.len() - index).min(max_frame_size);
                let chunk = &data[index..index + next];
                index += next;
                if first {
                    let fflags = if end_stream { flags::END_STREAM } else { 0 };
                    frame::write_frame(&self.socket, self.stream_id, ftype, fflags, chunk)?;
                    first = false;
                } else {
                    let fflags = if index == data.len() { flags::END_HEADERS } else { 0 };
                    frame::write_frame(
                        &self.socket,
                        self.stream_id,
                        frame_type::CONTINUATION,
                        fflags,
                        chunk,
                    )?;
                }
            }
        }
        if end_stream {
            self.sent_end_stream(events)?;
        }
        Ok(())
    }

    /// Sends body data in DATA frames of at most MAX_FRAME_SIZE, consuming
    /// both flow-control windows. Returns `false` when some of the data had
    /// to be parked in the backlog; the caller retries after a
    /// `DataFlushed` event or `on_writable`.
    pub(crate) fn send_data(
        &mut self,
        control: &mut ControlStream,
        data: &[u8],
        end_stream: bool,
        events: &mut Vec<Http2Event>,
    ) -> Result<bool, Http2Error> {
        if self.state != StreamState::Open && self.state != StreamState::HalfClosed {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "stream is not expecting data",
            ));
        }
        let max_frame_size = control.remote_settings().get(settings_id::MAX_FRAME_SIZE) as usize;
        if data.len() <= max_frame_size {
            return self.write_data_frame(control, end_stream, data, events);
        }
        let mut flushed = false;
        let mut index = 0;
        while index < data.len() {
            let mut next = (data.len() - index).min(max_frame_size);
            let receiver = self.windows.receiver;
            if receiver > 0 && (receiver as usize) < next {
                next = receiver as usize;
            }
            let chunk = &data[index..index + next];
            index += next;
            flushed =
                self.write_data_frame(control, end_stream && index == data.len(), chunk, events)?;
        }
        Ok(flushed)
    }

    fn write_data_frame(
        &mut self,
        control: &mut ControlStream,
        end_stream: bool,
        data: &[u8],
        events: &mut Vec<Http2Event>,
    ) -> Result<bool, Http2Error> {
        let receiver_window = self.receiver_flow_window(control);
        let writable = self.socket.lock().is_writable();
        if writable && self.backlog.is_empty() && receiver_window > 0 {
            if (receiver_window as usize) < data.len() {
                let fit = receiver_window as usize;
                self.write_data(control, 0, &data[..fit])?;
                self.backlog.push_back(QueuedDataFrame {
                    end_stream,
                    payload: data.to_vec(),
                    index: fit,
                });
                Ok(false)
            } else {
                let fflags = if end_stream { flags::END_STREAM } else { 0 };
                self.write_data(control, fflags, data)?;
                if end_stream {
                    self.sent_end_stream(events)?;
                }
                Ok(true)
            }
        } else {
            self.backlog.push_back(QueuedDataFrame {
                end_stream,
                payload: data.to_vec(),
                index: 0,
            });
            Ok(false)
        }
    }

    /// The effective send window: the smaller of the stream window and the
    /// connection window.
    fn receiver_flow_window(&self, control: &ControlStream) -> i32 {
        control.receiver_window().min(self.windows.receiver)
    }

    /// Writes one flow-controlled frame, consuming stream and connection
    /// window.
    fn write_data(
        &mut self,
        control: &mut ControlStream,
        fflags: u8,
        payload: &[u8],
    ) -> Result<(), Http2Error> {
        if (self.receiver_flow_window(control).max(0) as usize) < payload.len() {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "flow-controlled payload is larger than the receiver window",
            ));
        }
        self.windows.receiver -= payload.len() as i32;
        control.consume_receiver_connection_window(payload.len())?;
        frame::write_frame(&self.socket, self.stream_id, frame_type::DATA, fflags, payload)
    }

    /// Drains the backlog head-first as far as the windows and the socket
    /// allow. Called on stream WINDOW_UPDATE, connection WINDOW_UPDATE and
    /// when the socket becomes writable again.
    pub(crate) fn window_update(
        &mut self,
        control: &mut ControlStream,
        events: &mut Vec<Http2Event>,
    ) {
        if self.is_closed() {
            self.backlog.clear();
            return;
        }
        let had_backlog = !self.backlog.is_empty();
        loop {
            if !self.socket.lock().is_writable() {
                break;
            }
            let window = self.receiver_flow_window(control);
            if window <= 0 {
                break;
            }
            let Some(front) = self.backlog.front() else {
                break;
            };
            if (window as usize) < front.remaining() {
                // partial send; the frame stays at the head with an advanced
                // index
                let chunk = front.payload[front.index..front.index + window as usize].to_vec();
                match self.write_data(control, 0, &chunk) {
                    Ok(()) => {
                        if let Some(front) = self.backlog.front_mut() {
                            front.index += chunk.len();
                        }
                    }
                    Err(e) => {
                        debug!(stream = self.stream_id, error = %e, "error while sending pending data");
                    }
                }
                break;
            }
            let Some(frame_entry) = self.backlog.pop_front() else {
                break;
            };
            let fflags = if frame_entry.end_stream { flags::END_STREAM } else { 0 };
            if let Err(e) =
                self.write_data(control, fflags, &frame_entry.payload[frame_entry.index..])
            {
                debug!(stream = self.stream_id, error = %e, "error while sending pending data");
                break;
            }
            if frame_entry.end_stream {
                if let Err(e) = self.sent_end_stream(events) {
                    debug!(stream = self.stream_id, error = %e, "error finishing stream");
                }
                break;
            }
        }
        if had_backlog && self.backlog.is_empty() {
            events.push(Http2Event::DataFlushed { stream_id: self.stream_id });
        }
    }

    /// Toggles receipt of flow-controlled data. While disabled, consumed
    /// window is not replenished, which backpressures the peer; re-enabling
    /// grants a fresh INITIAL_WINDOW_SIZE of credit.
    pub(crate) fn set_receive_data(&mut self, control: &ControlStream, receive: bool) {
        if !self.receive_data && receive {
            let initial = control.local_settings().get(settings_id::INITIAL_WINDOW_SIZE);
            if initial > 0 {
                if let Err(e) = self.send_window_size_update(initial) {
                    debug!(stream = self.stream_id, error = %e, "error while sending window size update");
                }
            }
        }
        self.receive_data = receive;
    }

    fn send_window_size_update(&mut self, increment: u32) -> Result<(), Http2Error> {
        stream::send_window_size_update(&self.socket, self.stream_id, &mut self.windows, increment)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Records receipt of END_STREAM.
    fn recv_end_stream(&mut self) -> Result<(), Http2Error> {
        match self.state {
            StreamState::Open => {
                self.state = StreamState::HalfClosed;
                Ok(())
            }
            StreamState::HalfClosedLocal => Ok(()),
            _ => Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "unexpected END_STREAM",
            )),
        }
    }

    /// Records that we sent END_STREAM.
    fn sent_end_stream(&mut self, events: &mut Vec<Http2Event>) -> Result<(), Http2Error> {
        match self.state {
            StreamState::Open => {
                self.state = StreamState::HalfClosedLocal;
                Ok(())
            }
            StreamState::HalfClosed => {
                self.close(ErrorCode::NoError, true, events);
                Ok(())
            }
            _ => Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "sent END_STREAM in unexpected state",
            )),
        }
    }

    /// Transitions to closed and reports it. Idempotent.
    fn close(&mut self, code: ErrorCode, outgoing: bool, events: &mut Vec<Http2Event>) {
        if self.is_closed() {
            return;
        }
        self.state = StreamState::Closed;
        self.close_time = Some(Instant::now());
        self.close_outgoing = outgoing;
        if code != ErrorCode::NoError {
            events.push(Http2Event::StreamError {
                stream_id: self.stream_id,
                error_code: code,
            });
        }
        events.push(Http2Event::Closed {
            stream_id: self.stream_id,
            error_code: code,
        });
    }

    /// Closes the stream immediately and tells the peer with RST_STREAM,
    /// when the connection is still up.
    pub(crate) fn rst(
        &mut self,
        code: ErrorCode,
        events: &mut Vec<Http2Event>,
    ) -> Result<(), Http2Error> {
        self.close(code, true, events);
        if self.socket.lock().is_connected() {
            frame::write_frame(
                &self.socket,
                self.stream_id,
                frame_type::RST_STREAM,
                0,
                &frame::u32_be(u32::from(code)),
            )?;
        } else {
            trace!(stream = self.stream_id, "skipping RST_STREAM on dead connection");
        }
        Ok(())
    }
}

/// Borrowed view of either message kind, for encoding.
pub(crate) enum MessageRef<'a> {
    Request(&'a Request),
    Response(&'a Response),
}
