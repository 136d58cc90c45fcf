//! The stream lifecycle transition table.

use http_sans_io::h2::{flags, frame_type};
use http_sans_io::{
    ErrorCode, Headers, Http2Endpoint, Http2Event, Request, Response, Settings, StreamState,
    Version, CLIENT_PREFACE,
};

use crate::common::{build_frame, mock_socket, MockState, REQUEST_BLOCK, RESPONSE_BLOCK};

type Shared = std::sync::Arc<std::sync::Mutex<MockState>>;

fn started_server() -> (Http2Endpoint, Shared) {
    let (socket, state) = mock_socket();
    let mut server = Http2Endpoint::server(socket, Settings::new());
    server.start().unwrap();
    let mut data = CLIENT_PREFACE.to_vec();
    data.extend_from_slice(&build_frame(frame_type::SETTINGS, 0, 0, &[]));
    server.process_data(&data);
    state.lock().unwrap().written.clear();
    (server, state)
}

fn started_client() -> (Http2Endpoint, Shared) {
    let (socket, state) = mock_socket();
    let mut client = Http2Endpoint::client(socket, Settings::new());
    client.start().unwrap();
    client.process_data(&build_frame(frame_type::SETTINGS, 0, 0, &[]));
    state.lock().unwrap().written.clear();
    (client, state)
}

fn request() -> Request {
    Request::new("GET", "https", Some("x".into()), "/", Version::Http2, Headers::new())
}

fn response() -> Response {
    Response::new(200, Version::Http2, Headers::new())
}

#[test]
fn test_send_headers_opens_then_half_closes() {
    let (mut client, _state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Idle));

    client.send_request(stream_id, &request(), false).unwrap();
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Open));

    client.send_data(stream_id, b"body", true).unwrap();
    assert_eq!(client.stream_state(stream_id), Some(StreamState::HalfClosedLocal));
}

#[test]
fn test_recv_headers_opens_recv_end_stream_half_closes() {
    let (mut server, _state) = started_server();
    let frame = build_frame(frame_type::HEADERS, flags::END_HEADERS, 1, REQUEST_BLOCK);
    server.process_data(&frame);
    assert_eq!(server.stream_state(1), Some(StreamState::Open));

    let data = build_frame(frame_type::DATA, flags::END_STREAM, 1, b"done");
    server.process_data(&data);
    assert_eq!(server.stream_state(1), Some(StreamState::HalfClosed));
}

#[test]
fn test_full_exchange_closes_server_side() {
    let (mut server, _state) = started_server();
    let frame = build_frame(
        frame_type::HEADERS,
        flags::END_HEADERS | flags::END_STREAM,
        1,
        REQUEST_BLOCK,
    );
    server.process_data(&frame);
    assert_eq!(server.stream_state(1), Some(StreamState::HalfClosed));

    server.send_response(1, &response(), true).unwrap();
    assert_eq!(server.stream_state(1), Some(StreamState::Closed));
    let events = server.take_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, Http2Event::Closed { stream_id: 1, error_code: ErrorCode::NoError })));
}

#[test]
fn test_full_exchange_closes_client_side() {
    let (mut client, _state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    client.send_request(stream_id, &request(), true).unwrap();
    assert_eq!(client.stream_state(stream_id), Some(StreamState::HalfClosedLocal));

    let frame = build_frame(
        frame_type::HEADERS,
        flags::END_HEADERS | flags::END_STREAM,
        stream_id,
        RESPONSE_BLOCK,
    );
    let events = client.process_data(&frame);
    assert!(matches!(events[0], Http2Event::Message { .. }));
    assert!(events
        .iter()
        .any(|e| matches!(e, Http2Event::Closed { error_code: ErrorCode::NoError, .. })));
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Closed));
}

#[test]
fn test_recv_rst_closes_any_state() {
    let (mut client, _state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    client.send_request(stream_id, &request(), false).unwrap();

    let rst = build_frame(frame_type::RST_STREAM, 0, stream_id, &0x8u32.to_be_bytes());
    let events = client.process_data(&rst);
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Closed));
    assert!(events.iter().any(|e| matches!(
        e,
        Http2Event::Closed { error_code: ErrorCode::Cancel, .. }
    )));
}

#[test]
fn test_rst_from_terminal_state_is_noop() {
    let (mut client, state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    client.send_request(stream_id, &request(), true).unwrap();
    client.rst_stream(stream_id, ErrorCode::Cancel).unwrap();
    let closes = client
        .take_events()
        .iter()
        .filter(|e| matches!(e, Http2Event::Closed { .. }))
        .count();
    assert_eq!(closes, 1);

    state.lock().unwrap().written.clear();
    // a second close of a terminal stream changes nothing
    client.rst_stream(stream_id, ErrorCode::Cancel).unwrap();
    assert!(client.take_events().is_empty());
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Closed));
}

#[test]
fn test_push_promise_reserves_and_response_half_closes() {
    let (mut client, _state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    client.send_request(stream_id, &request(), true).unwrap();

    // PUSH_PROMISE for stream 2 on stream 1
    let mut payload = 2u32.to_be_bytes().to_vec();
    payload.extend_from_slice(REQUEST_BLOCK);
    let pp = build_frame(frame_type::PUSH_PROMISE, flags::END_HEADERS, stream_id, &payload);
    let events = client.process_data(&pp);
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Reserved));

    let promised = match &events[..] {
        [Http2Event::PushPromise { stream_id: 1, promised_stream_id: 2, request }] => {
            assert_eq!(request.path(), "/");
            request
        }
        other => panic!("unexpected events: {other:?}"),
    };
    let promised_id = client.handle_push_promise(promised).unwrap();
    assert_eq!(promised_id, 2);
    assert_eq!(client.stream_state(2), Some(StreamState::HalfClosedLocal));

    // the original response arrives on stream 1: RESERVED -> HALF_CLOSED_LOCAL
    let resp = build_frame(frame_type::HEADERS, flags::END_HEADERS, stream_id, RESPONSE_BLOCK);
    client.process_data(&resp);
    assert_eq!(client.stream_state(stream_id), Some(StreamState::HalfClosedLocal));

    // the pushed response closes stream 2
    let pushed = build_frame(
        frame_type::HEADERS,
        flags::END_HEADERS | flags::END_STREAM,
        2,
        RESPONSE_BLOCK,
    );
    let events = client.process_data(&pushed);
    assert!(matches!(events[0], Http2Event::Message { stream_id: 2, .. }));
    assert_eq!(client.stream_state(2), Some(StreamState::Closed));
}

#[test]
fn test_server_push_promise_send_side() {
    let (mut server, state) = started_server();
    let frame = build_frame(
        frame_type::HEADERS,
        flags::END_HEADERS | flags::END_STREAM,
        1,
        REQUEST_BLOCK,
    );
    server.process_data(&frame);

    let promised_id = server.send_push_promise(1, &request()).unwrap();
    assert_eq!(promised_id, 2);
    // promised stream waits half-closed (remote) for our response
    assert_eq!(server.stream_state(2), Some(StreamState::HalfClosed));

    let frames = state.lock().unwrap().take_frames();
    let pp = frames.iter().find(|f| f.frame_type == frame_type::PUSH_PROMISE).unwrap();
    assert_eq!(pp.stream_id, 1);
    assert_eq!(&pp.payload[..4], &2u32.to_be_bytes());

    server.send_response(2, &response(), true).unwrap();
    assert_eq!(server.stream_state(2), Some(StreamState::Closed));
}

#[test]
fn test_data_on_idle_client_stream_is_rejected() {
    let (mut client, _state) = started_client();
    let stream_id = client.create_request_stream().unwrap();
    let err = client.send_data(stream_id, b"early", false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InternalError);
    assert_eq!(client.stream_state(stream_id), Some(StreamState::Idle));
}
