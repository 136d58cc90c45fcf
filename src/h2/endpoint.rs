//! The HTTP/2 endpoint: frame reassembly, dispatch to streams, the stream
//! registry with its close-wait grace queue, error escalation and DoS
//! guards.
//!
//! An endpoint is created over a [`SharedSocket`] in either the client or
//! the server role. Inbound bytes go to [`process_data`]
//! (Http2Endpoint::process_data); everything the engine wants to tell the
//! embedder comes back as [`Http2Event`]s. Outbound operations are methods
//! taking a stream id.
//!
//! [`process_data`]: Http2Endpoint::process_data

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{ErrorCode, Http2Error};
use crate::h2::control::{ControlEvent, ControlStream};
use crate::h2::frame::{self, frame_type, FrameHeader, FRAME_HEADER_SIZE};
use crate::h2::hpack::{HpackContext, HpackSession};
use crate::h2::message_stream::{MessageRef, MessageStream, StreamState, ATTACHMENT_KEY_STREAM_ID};
use crate::h2::settings::{settings_id, Settings};
use crate::h2::CLIENT_PREFACE;
use crate::message::{Message, Request, Response, Trailers};
use crate::socket::SharedSocket;

/// Grace period during which a closed stream's id still rejects late frames
/// instead of allowing the id to be reused.
const CLOSE_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Replenish the connection window once it drops below 16 MiB.
const CONNECTION_WINDOW_THRESHOLD: i32 = 0x0100_0000;

/// Consecutive errors on an unwritable socket before the connection is torn
/// down as a denial-of-service precaution.
const MAX_UNWRITABLE_ERRORS: u32 = 500;

/// Everything the engine reports back to the embedder, in received-byte
/// order per stream.
#[derive(Debug)]
pub enum Http2Event {
    /// The peer's SETTINGS were received and applied.
    RemoteSettings(Settings),
    /// The peer announced connection shutdown. The endpoint does not close
    /// by itself; the embedder coordinates the teardown.
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
    },
    /// The first header block of a stream: a request (server side) or a
    /// response (client side).
    Message {
        stream_id: u32,
        message: Message,
        end_stream: bool,
    },
    /// A push promise preview; register it with
    /// [`Http2Endpoint::handle_push_promise`] to receive the pushed
    /// response.
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        request: Request,
    },
    /// A decoded DATA payload.
    Data {
        stream_id: u32,
        data: Vec<u8>,
        end_stream: bool,
    },
    /// Trailing headers; the stream ends here.
    Trailers { stream_id: u32, trailers: Trailers },
    /// The send backlog drained; blocked `send_data` may be retried.
    DataFlushed { stream_id: u32 },
    /// An abnormal stream end, reported before the matching `Closed`.
    StreamError {
        stream_id: u32,
        error_code: ErrorCode,
    },
    /// The stream reached its terminal state. A coarse close reason can be
    /// derived with [`StreamClosedReason::from_error_code`].
    ///
    /// [`StreamClosedReason::from_error_code`]:
    ///     crate::error::StreamClosedReason::from_error_code
    Closed {
        stream_id: u32,
        error_code: ErrorCode,
    },
}

/// Client- or server-specific endpoint state.
enum EndpointRole {
    Client {
        /// The next stream id to mint; client streams are odd.
        next_stream_id: u32,
    },
    Server {
        /// Bytes of the 24-byte client preface still outstanding.
        preface_remaining: usize,
        /// The next promised stream id to mint; pushed streams are even.
        next_push_stream_id: u32,
    },
}

pub struct Http2Endpoint {
    socket: SharedSocket,
    control: ControlStream,
    hpack: HpackContext,
    role: EndpointRole,

    frame_buf: Vec<u8>,
    /// Total size of the frame being assembled, 0 while the header is still
    /// incomplete.
    frame_expected: usize,

    streams: HashMap<u32, MessageStream>,
    close_wait: VecDeque<u32>,
    peer_initiated: HashSet<u32>,
    highest_stream_id: u32,
    /// Stream with an unterminated header block; the next frame on the
    /// whole connection must be its CONTINUATION.
    expect_continuation: Option<u32>,

    errors_while_unwritable: u32,
    events: Vec<Http2Event>,
}

impl Http2Endpoint {
    /// Creates a client endpoint. Call [`start`](Self::start) to emit the
    /// connection preface and initial SETTINGS.
    #[must_use]
    pub fn client(socket: SharedSocket, settings: Settings) -> Self {
        Self::with_session(socket, settings, HpackSession::new(), true, false)
    }

    /// Creates a server endpoint. Call [`start`](Self::start) to emit the
    /// initial SETTINGS; the client preface is consumed from the inbound
    /// byte stream.
    #[must_use]
    pub fn server(socket: SharedSocket, settings: Settings) -> Self {
        Self::with_session(socket, settings, HpackSession::new(), true, true)
    }

    /// Creates an endpoint sharing an HPACK session, for embedders that
    /// forward messages between connections.
    #[must_use]
    pub fn with_session(
        socket: SharedSocket,
        settings: Settings,
        hpack_session: HpackSession,
        use_huffman: bool,
        server: bool,
    ) -> Self {
        let hpack = HpackContext::with_session(
            hpack_session,
            use_huffman,
            settings.get(settings_id::HEADER_TABLE_SIZE),
        );
        let max_frame = settings.get(settings_id::MAX_FRAME_SIZE) as usize;
        let control = ControlStream::new(socket.clone(), settings);
        let role = if server {
            EndpointRole::Server {
                preface_remaining: CLIENT_PREFACE.len(),
                next_push_stream_id: 2,
            }
        } else {
            EndpointRole::Client { next_stream_id: 1 }
        };
        Self {
            socket,
            control,
            hpack,
            role,
            frame_buf: Vec::with_capacity(max_frame + FRAME_HEADER_SIZE),
            frame_expected: 0,
            streams: HashMap::new(),
            close_wait: VecDeque::new(),
            peer_initiated: HashSet::new(),
            highest_stream_id: 0,
            expect_continuation: None,
            errors_while_unwritable: 0,
            events: Vec::new(),
        }
    }

    /// Starts the connection: a client writes the 24-byte preface followed
    /// by its SETTINGS; a server writes its SETTINGS.
    pub fn start(&mut self) -> Result<(), Http2Error> {
        if matches!(self.role, EndpointRole::Client { .. }) {
            let mut sock = self.socket.lock();
            sock.write(CLIENT_PREFACE)?;
            sock.flush()?;
        }
        self.control.write_settings()
    }

    // ------------------------------------------------------------------
    // Inbound path
    // ------------------------------------------------------------------

    /// Feeds inbound connection bytes, in arbitrary fragmentation, and
    /// returns the resulting events. Protocol failures are handled
    /// internally (RST_STREAM or GOAWAY plus socket close).
    pub fn process_data(&mut self, data: &[u8]) -> Vec<Http2Event> {
        let mut index = 0;
        let mut preface_ok = true;
        if let EndpointRole::Server { preface_remaining, .. } = &mut self.role {
            if *preface_remaining > 0 {
                let take = (*preface_remaining).min(data.len());
                let offset = CLIENT_PREFACE.len() - *preface_remaining;
                if data[..take] == CLIENT_PREFACE[offset..offset + take] {
                    *preface_remaining -= take;
                    index = take;
                } else {
                    preface_ok = false;
                }
            }
        }
        if !preface_ok {
            warn!("invalid client connection preface");
            self.send_connection_error(ErrorCode::ProtocolError);
            return std::mem::take(&mut self.events);
        }
        while index < data.len() {
            match self.assemble_frame(data, index) {
                Ok(consumed) => index += consumed,
                Err(_) => {
                    self.send_connection_error(ErrorCode::FrameSizeError);
                    break;
                }
            }
            if self.frame_expected > 0 && self.frame_buf.len() == self.frame_expected {
                self.process_frame();
                self.frame_buf.clear();
                self.frame_expected = 0;
            }
            if !self.socket.lock().is_connected() {
                break;
            }
        }
        std::mem::take(&mut self.events)
    }

    /// Copies bytes of the current frame out of `data`, buffering partial
    /// frame headers across calls. Fails when the declared payload length
    /// exceeds the local MAX_FRAME_SIZE.
    fn assemble_frame(&mut self, data: &[u8], offset: usize) -> Result<usize, Http2Error> {
        let mut consumed = 0;
        if self.frame_expected == 0 {
            let need = FRAME_HEADER_SIZE - self.frame_buf.len();
            let take = need.min(data.len() - offset);
            self.frame_buf.extend_from_slice(&data[offset..offset + take]);
            consumed += take;
            if self.frame_buf.len() < FRAME_HEADER_SIZE {
                return Ok(consumed);
            }
            let length = ((self.frame_buf[0] as usize) << 16)
                | ((self.frame_buf[1] as usize) << 8)
                | (self.frame_buf[2] as usize);
            if length > self.control.local_settings().get(settings_id::MAX_FRAME_SIZE) as usize {
                return Err(Http2Error::connection(ErrorCode::FrameSizeError));
            }
            self.frame_expected = FRAME_HEADER_SIZE + length;
        }
        let need = self.frame_expected - self.frame_buf.len();
        let take = need.min(data.len() - offset - consumed);
        self.frame_buf
            .extend_from_slice(&data[offset + consumed..offset + consumed + take]);
        Ok(consumed + take)
    }

    fn process_frame(&mut self) {
        self.purge_closed_streams();
        let Some(header) = FrameHeader::parse(&self.frame_buf) else {
            return;
        };
        let payload = self.frame_buf[FRAME_HEADER_SIZE..].to_vec();
        trace!(
            stream = header.stream_id,
            frame_type = header.frame_type,
            flags = header.flags,
            length = payload.len(),
            "frame in"
        );
        if let Err(e) = self.dispatch_frame(&header, &payload) {
            self.handle_error(&e, header.stream_id);
        }
    }

    fn dispatch_frame(&mut self, header: &FrameHeader, payload: &[u8]) -> Result<(), Http2Error> {
        let stream_id = header.stream_id;
        // a header block in progress pins the whole connection to its
        // CONTINUATION frames
        if let Some(expected) = self.expect_continuation {
            if stream_id != expected || header.frame_type != frame_type::CONTINUATION {
                return Err(Http2Error::connection_msg(
                    ErrorCode::ProtocolError,
                    "Expected CONTINUATION",
                ));
            }
        }
        if !self.control.is_settings_received() && header.frame_type != frame_type::SETTINGS {
            return Err(Http2Error::connection(ErrorCode::ProtocolError));
        }
        if stream_id == 0 {
            match self.control.receive_frame(header.frame_type, header.flags, payload)? {
                ControlEvent::SettingsReceived => {
                    let remote = self.control.remote_settings().clone();
                    self.hpack
                        .set_encoder_max_settings(remote.get(settings_id::HEADER_TABLE_SIZE));
                    self.events.push(Http2Event::RemoteSettings(remote));
                }
                ControlEvent::WindowUpdate => self.drain_stream_backlogs(),
                ControlEvent::GoAway { last_stream_id, error_code } => {
                    self.events.push(Http2Event::GoAway { last_stream_id, error_code });
                }
                ControlEvent::None => {}
            }
            return Ok(());
        }

        if !self.streams.contains_key(&stream_id) {
            // frames for ids at or below the highest processed id belong to
            // purged streams and must not reopen them
            if stream_id < self.highest_stream_id && header.frame_type != frame_type::PRIORITY {
                return Err(Http2Error::connection(ErrorCode::ProtocolError));
            }
            match self.new_stream_for_frame(stream_id, header.frame_type)? {
                Some(stream) => {
                    self.highest_stream_id = stream_id;
                    self.peer_initiated.insert(stream_id);
                    self.streams.insert(stream_id, stream);
                }
                None => {
                    if header.frame_type != frame_type::PRIORITY
                        && header.frame_type != frame_type::WINDOW_UPDATE
                    {
                        return Err(Http2Error::connection(ErrorCode::ProtocolError));
                    }
                    return Ok(());
                }
            }
        }

        let stream = self
            .streams
            .get_mut(&stream_id)
            .ok_or_else(|| Http2Error::connection(ErrorCode::InternalError))?;
        stream.receive_frame(
            &mut self.control,
            &mut self.hpack,
            header.frame_type,
            header.flags,
            payload,
            &mut self.events,
        )?;
        self.expect_continuation = self
            .streams
            .get(&stream_id)
            .filter(|s| s.is_headers_receiving())
            .map(|_| stream_id);

        if frame::is_flow_controlled_frame_type(header.frame_type) && !payload.is_empty() {
            self.control.consume_local_connection_window(payload.len())?;
            if self.control.local_window() < CONNECTION_WINDOW_THRESHOLD {
                self.control
                    .send_window_size_update(CONNECTION_WINDOW_THRESHOLD as u32)?;
            }
        }
        self.note_stream_closed(stream_id);
        Ok(())
    }

    /// Decides whether a frame on an unknown stream id opens a new stream.
    /// Servers accept odd-id HEADERS as new request streams, subject to the
    /// concurrency guards; clients never accept peer-opened streams
    /// directly (pushes are registered via
    /// [`handle_push_promise`](Self::handle_push_promise)).
    fn new_stream_for_frame(
        &mut self,
        stream_id: u32,
        ftype: u8,
    ) -> Result<Option<MessageStream>, Http2Error> {
        match self.role {
            EndpointRole::Client { .. } => Ok(None),
            EndpointRole::Server { .. } => {
                if stream_id % 2 == 1 && ftype == frame_type::HEADERS {
                    self.check_remote_create_stream()?;
                    Ok(Some(MessageStream::new(
                        stream_id,
                        self.socket.clone(),
                        &self.control,
                        true,
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Guards against the peer opening too many streams: the active
    /// peer-initiated count is bounded by MAX_CONCURRENT_STREAMS, and the
    /// total registry size (which includes close-wait residue) by sixteen
    /// times that.
    fn check_remote_create_stream(&self) -> Result<(), Http2Error> {
        let max = self
            .control
            .local_settings()
            .get(settings_id::MAX_CONCURRENT_STREAMS) as usize;
        if self.peer_initiated.len() + 1 > max || (self.streams.len() >> 4) >= max {
            return Err(Http2Error::connection(ErrorCode::EnhanceYourCalm));
        }
        Ok(())
    }

    /// Removes streams whose close-wait grace period expired.
    fn purge_closed_streams(&mut self) {
        while let Some(&stream_id) = self.close_wait.front() {
            let expired = match self.streams.get(&stream_id) {
                Some(stream) => stream
                    .close_time()
                    .is_some_and(|t| t.elapsed() > CLOSE_WAIT_TIMEOUT),
                None => true,
            };
            if !expired {
                break;
            }
            self.close_wait.pop_front();
            self.streams.remove(&stream_id);
            trace!(stream = stream_id, "stream deleted after close-wait");
        }
    }

    /// Queues a newly closed stream for close-wait removal.
    fn note_stream_closed(&mut self, stream_id: u32) {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            if stream.is_closed() && !stream.close_wait_queued {
                stream.close_wait_queued = true;
                self.close_wait.push_back(stream_id);
                self.peer_initiated.remove(&stream_id);
            }
        }
    }

    /// Escalates a protocol failure: stream errors reset the stream,
    /// connection errors send GOAWAY and close the socket. Repeated errors
    /// while the socket is unwritable tear the connection down.
    fn handle_error(&mut self, error: &Http2Error, stream_id: u32) {
        debug!(stream = stream_id, error = %error, "error in stream");
        if !self.socket.lock().is_writable() {
            self.errors_while_unwritable += 1;
            if self.errors_while_unwritable > MAX_UNWRITABLE_ERRORS {
                warn!("peer keeps erroring while unwritable; destroying socket [DoS mitigation]");
                self.send_connection_error(ErrorCode::EnhanceYourCalm);
                return;
            }
        } else {
            self.errors_while_unwritable = 0;
        }
        if error.is_stream_error() && self.streams.contains_key(&stream_id) {
            if self.expect_continuation == Some(stream_id) {
                self.expect_continuation = None;
            }
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                if let Err(e) = stream.rst(error.code(), &mut self.events) {
                    debug!(stream = stream_id, error = %e, "error while sending RST frame");
                }
            }
            self.note_stream_closed(stream_id);
        } else {
            self.send_connection_error(error.code());
        }
    }

    /// Sends GOAWAY with the given code and closes the socket.
    fn send_connection_error(&mut self, code: ErrorCode) {
        if let Err(e) = self.control.send_goaway(self.highest_stream_id, code) {
            debug!(error = %e, "error while sending GOAWAY");
        }
        self.socket.lock().close();
    }

    /// Drains every stream's send backlog; used after connection-level
    /// WINDOW_UPDATE and when the socket becomes writable again.
    fn drain_stream_backlogs(&mut self) {
        for stream in self.streams.values_mut() {
            stream.window_update(&mut self.control, &mut self.events);
        }
    }

    // ------------------------------------------------------------------
    // Outbound API
    // ------------------------------------------------------------------

    /// Tells the endpoint the socket accepts writes again; parked DATA
    /// frames are flushed. Returns the resulting events (`DataFlushed`,
    /// possibly `Closed`).
    pub fn on_writable(&mut self) -> Vec<Http2Event> {
        self.drain_stream_backlogs();
        std::mem::take(&mut self.events)
    }

    /// Events produced by outbound operations since the last drain.
    pub fn take_events(&mut self) -> Vec<Http2Event> {
        std::mem::take(&mut self.events)
    }

    /// Allocates the next client-initiated stream for a request. Returns
    /// `None` on the server role or when the odd id space is exhausted.
    pub fn create_request_stream(&mut self) -> Option<u32> {
        let EndpointRole::Client { next_stream_id } = &mut self.role else {
            return None;
        };
        if *next_stream_id > i32::MAX as u32 {
            // stream id space exhausted; a new connection is required
            return None;
        }
        let stream_id = *next_stream_id;
        *next_stream_id += 2;
        let stream = MessageStream::new(stream_id, self.socket.clone(), &self.control, false);
        self.streams.insert(stream_id, stream);
        Some(stream_id)
    }

    /// Registers the stream promised by a `PushPromise` event so the pushed
    /// response can be received on it. The request must carry the stream-id
    /// attachment the engine placed on it.
    pub fn handle_push_promise(&mut self, promised_request: &Request) -> Result<u32, Http2Error> {
        let stream_id = *promised_request
            .attachment::<u32>(ATTACHMENT_KEY_STREAM_ID)
            .ok_or_else(|| {
                Http2Error::connection_msg(
                    ErrorCode::InternalError,
                    "promised request has no stream id attachment",
                )
            })?;
        if stream_id % 2 != 0 {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "promised stream id is not an even number",
            ));
        }
        let mut stream = MessageStream::new(stream_id, self.socket.clone(), &self.control, false);
        stream.prepare_push(true)?;
        self.highest_stream_id = stream_id;
        self.streams.insert(stream_id, stream);
        Ok(stream_id)
    }

    /// Sends a request on a stream created with
    /// [`create_request_stream`](Self::create_request_stream).
    pub fn send_request(
        &mut self,
        stream_id: u32,
        request: &Request,
        end_stream: bool,
    ) -> Result<(), Http2Error> {
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        stream.send_message(
            &mut self.control,
            &mut self.hpack,
            MessageRef::Request(request),
            end_stream,
            &mut self.events,
        )?;
        self.note_stream_closed(stream_id);
        Ok(())
    }

    /// Sends a response on a peer-initiated stream.
    pub fn send_response(
        &mut self,
        stream_id: u32,
        response: &Response,
        end_stream: bool,
    ) -> Result<(), Http2Error> {
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        stream.send_message(
            &mut self.control,
            &mut self.hpack,
            MessageRef::Response(response),
            end_stream,
            &mut self.events,
        )?;
        self.note_stream_closed(stream_id);
        Ok(())
    }

    /// Promises `request` on the (half-closed) stream `stream_id` and
    /// allocates the even stream the pushed response will use. Fails when
    /// the peer disabled push.
    pub fn send_push_promise(
        &mut self,
        stream_id: u32,
        request: &Request,
    ) -> Result<u32, Http2Error> {
        if self.control.remote_settings().get(settings_id::ENABLE_PUSH) != 1 {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "peer has push disabled",
            ));
        }
        let EndpointRole::Server { next_push_stream_id, .. } = &mut self.role else {
            return Err(Http2Error::connection_msg(
                ErrorCode::InternalError,
                "only servers push",
            ));
        };
        let promised_stream_id = *next_push_stream_id;
        *next_push_stream_id += 2;

        let mut promised =
            MessageStream::new(promised_stream_id, self.socket.clone(), &self.control, true);
        promised.prepare_push(false)?;
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        stream.send_push_promise(
            &mut self.control,
            &mut self.hpack,
            promised_stream_id,
            request,
            &mut self.events,
        )?;
        self.streams.insert(promised_stream_id, promised);
        Ok(promised_stream_id)
    }

    /// Sends trailing headers, ending the stream.
    pub fn send_trailers(&mut self, stream_id: u32, trailers: &Trailers) -> Result<(), Http2Error> {
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        stream.send_trailers(&mut self.control, &mut self.hpack, trailers, &mut self.events)?;
        self.note_stream_closed(stream_id);
        Ok(())
    }

    /// Sends body data. `Ok(false)` means part of the data was parked
    /// because of flow control or an unwritable socket; retry after
    /// `DataFlushed` or [`on_writable`](Self::on_writable).
    pub fn send_data(
        &mut self,
        stream_id: u32,
        data: &[u8],
        end_stream: bool,
    ) -> Result<bool, Http2Error> {
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        let flushed = stream.send_data(&mut self.control, data, end_stream, &mut self.events)?;
        self.note_stream_closed(stream_id);
        Ok(flushed)
    }

    /// Pauses or resumes receipt of flow-controlled data on a stream.
    pub fn set_receive_data(&mut self, stream_id: u32, receive: bool) {
        if let Some(stream) = self.streams.get_mut(&stream_id) {
            stream.set_receive_data(&self.control, receive);
        }
    }

    /// Closes one stream with the given reason code via RST_STREAM.
    pub fn rst_stream(&mut self, stream_id: u32, code: ErrorCode) -> Result<(), Http2Error> {
        let stream = Self::stream_mut(&mut self.streams, stream_id)?;
        stream.rst(code, &mut self.events)?;
        self.note_stream_closed(stream_id);
        Ok(())
    }

    /// Closes the endpoint: every open message stream is reset with CANCEL,
    /// a GOAWAY with NO_ERROR is sent, and the socket is closed.
    pub fn close(&mut self) {
        let open: Vec<u32> = self
            .streams
            .iter()
            .filter(|(_, s)| !s.is_closed())
            .map(|(&id, _)| id)
            .collect();
        for stream_id in open {
            if let Some(stream) = self.streams.get_mut(&stream_id) {
                if let Err(e) = stream.rst(ErrorCode::Cancel, &mut self.events) {
                    debug!(stream = stream_id, error = %e, "error while cancelling stream");
                }
            }
            self.note_stream_closed(stream_id);
        }
        if self.socket.lock().is_connected() {
            if let Err(e) = self
                .control
                .send_goaway(self.highest_stream_id, ErrorCode::NoError)
            {
                debug!(error = %e, "error while sending GOAWAY");
            }
        }
        self.socket.lock().close();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn local_settings(&self) -> &Settings {
        self.control.local_settings()
    }

    #[must_use]
    pub fn remote_settings(&self) -> &Settings {
        self.control.remote_settings()
    }

    /// Whether the peer's SETTINGS frame arrived.
    #[must_use]
    pub fn is_settings_received(&self) -> bool {
        self.control.is_settings_received()
    }

    #[must_use]
    pub fn highest_stream_id(&self) -> u32 {
        self.highest_stream_id
    }

    /// The lifecycle state of a stream, while it is registered.
    #[must_use]
    pub fn stream_state(&self, stream_id: u32) -> Option<StreamState> {
        self.streams.get(&stream_id).map(MessageStream::state)
    }

    /// Whether a stream has outbound data parked in its backlog.
    #[must_use]
    pub fn has_data_backlog(&self, stream_id: u32) -> bool {
        self.streams
            .get(&stream_id)
            .is_some_and(MessageStream::has_data_backlog)
    }

    /// The HPACK session, shareable with other endpoints.
    #[must_use]
    pub fn hpack_session(&self) -> HpackSession {
        self.hpack.session().clone()
    }

    fn stream_mut(
        streams: &mut HashMap<u32, MessageStream>,
        stream_id: u32,
    ) -> Result<&mut MessageStream, Http2Error> {
        streams.get_mut(&stream_id).ok_or_else(|| {
            Http2Error::connection_msg(ErrorCode::InternalError, "unknown stream")
        })
    }
}
