//! HEADERS + CONTINUATION assembly and its ordering rules.

use http_sans_io::h2::{flags, frame_type, settings_id};
use http_sans_io::{Http2Endpoint, Http2Event, Settings, CLIENT_PREFACE};

use crate::common::{build_frame, mock_socket, MockState, REQUEST_BLOCK};

fn started_server_with(settings: Settings) -> (Http2Endpoint, std::sync::Arc<std::sync::Mutex<MockState>>) {
    let (socket, state) = mock_socket();
    let mut server = Http2Endpoint::server(socket, settings);
    server.start().unwrap();
    let mut data = CLIENT_PREFACE.to_vec();
    data.extend_from_slice(&build_frame(frame_type::SETTINGS, 0, 0, &[]));
    server.process_data(&data);
    state.lock().unwrap().written.clear();
    (server, state)
}

fn started_server() -> (Http2Endpoint, std::sync::Arc<std::sync::Mutex<MockState>>) {
    started_server_with(Settings::new())
}

#[test]
fn test_header_block_across_continuations() {
    let (mut server, _state) = started_server();
    let mut data = build_frame(frame_type::HEADERS, flags::END_STREAM, 1, &REQUEST_BLOCK[..2]);
    data.extend_from_slice(&build_frame(frame_type::CONTINUATION, 0, 1, &REQUEST_BLOCK[2..4]));
    data.extend_from_slice(&build_frame(
        frame_type::CONTINUATION,
        flags::END_HEADERS,
        1,
        &REQUEST_BLOCK[4..],
    ));
    let events = server.process_data(&data);
    // no event until END_HEADERS; END_STREAM from the HEADERS frame sticks
    match &events[..] {
        [Http2Event::Message { stream_id: 1, message, end_stream: true }] => {
            assert_eq!(message.as_request().unwrap().authority(), Some("x"));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn test_continuation_delivered_incrementally() {
    let (mut server, _state) = started_server();
    let headers = build_frame(frame_type::HEADERS, 0, 1, &REQUEST_BLOCK[..3]);
    assert!(server.process_data(&headers).is_empty());
    let cont = build_frame(frame_type::CONTINUATION, flags::END_HEADERS, 1, &REQUEST_BLOCK[3..]);
    let events = server.process_data(&cont);
    assert!(matches!(
        events[..],
        [Http2Event::Message { stream_id: 1, end_stream: false, .. }]
    ));
}

#[test]
fn test_interleaved_frame_during_headers_is_fatal() {
    let (mut server, state) = started_server();
    let mut data = build_frame(frame_type::HEADERS, 0, 1, &REQUEST_BLOCK[..3]);
    // PING on the connection while stream 1 is mid-header-block
    data.extend_from_slice(&build_frame(frame_type::PING, 0, 0, &[0; 8]));
    server.process_data(&data);
    // the protocol requires CONTINUATION next on the same stream
    let mut st = state.lock().unwrap();
    assert!(!st.connected);
    assert!(st.take_frames().iter().any(|f| f.frame_type == frame_type::GOAWAY));
}

#[test]
fn test_data_instead_of_continuation_is_fatal() {
    let (mut server, state) = started_server();
    let mut data = build_frame(frame_type::HEADERS, 0, 1, &REQUEST_BLOCK[..3]);
    data.extend_from_slice(&build_frame(frame_type::DATA, 0, 1, b"nope"));
    server.process_data(&data);
    assert!(!state.lock().unwrap().connected);
}

#[test]
fn test_unexpected_continuation_is_fatal() {
    let (mut server, state) = started_server();
    // CONTINUATION with no preceding HEADERS: the stream does not even exist
    let data = build_frame(frame_type::CONTINUATION, flags::END_HEADERS, 1, REQUEST_BLOCK);
    server.process_data(&data);
    assert!(!state.lock().unwrap().connected);
}

#[test]
fn test_header_accumulation_is_bounded() {
    let mut settings = Settings::new();
    settings.set(settings_id::MAX_HEADER_LIST_SIZE, 64);
    let (mut server, state) = started_server_with(settings);

    let mut data = build_frame(frame_type::HEADERS, 0, 1, &[0x82; 16]);
    data.extend_from_slice(&build_frame(frame_type::CONTINUATION, 0, 1, &[0x87; 64]));
    let events = server.process_data(&data);

    // over the cap: the stream is reset with ENHANCE_YOUR_CALM
    assert!(events
        .iter()
        .any(|e| matches!(e, Http2Event::Closed { stream_id: 1, error_code } if u32::from(*error_code) == 0xb)));
    let frames = state.lock().unwrap().take_frames();
    let rst = frames.iter().find(|f| f.frame_type == frame_type::RST_STREAM).unwrap();
    assert_eq!(rst.stream_id, 1);
    assert_eq!(&rst.payload[..], &[0, 0, 0, 0xb]);
    // a stream error leaves the connection alive
    assert!(state.lock().unwrap().connected);
}

#[test]
fn test_trailers_require_end_stream() {
    let (mut server, state) = started_server();
    // open stream with a full request, no END_STREAM
    let mut data = build_frame(frame_type::HEADERS, flags::END_HEADERS, 1, REQUEST_BLOCK);
    // a second header block without END_STREAM is invalid trailers
    data.extend_from_slice(&build_frame(frame_type::HEADERS, flags::END_HEADERS, 1, &[0x88]));
    let events = server.process_data(&data);
    assert!(events.iter().any(|e| matches!(
        e,
        Http2Event::StreamError { stream_id: 1, error_code } if u32::from(*error_code) == 0x1
    )));
    assert!(state.lock().unwrap().connected);
}

#[test]
fn test_trailers_delivered() {
    let (mut server, _state) = started_server();
    let mut data = build_frame(frame_type::HEADERS, flags::END_HEADERS, 1, REQUEST_BLOCK);
    // trailers: literal "x-checksum: abc" with END_STREAM
    let mut trailer_block = vec![0x40, 0x0a];
    trailer_block.extend_from_slice(b"x-checksum");
    trailer_block.push(0x03);
    trailer_block.extend_from_slice(b"abc");
    data.extend_from_slice(&build_frame(
        frame_type::HEADERS,
        flags::END_HEADERS | flags::END_STREAM,
        1,
        &trailer_block,
    ));
    let events = server.process_data(&data);
    assert!(matches!(events[0], Http2Event::Message { stream_id: 1, .. }));
    match &events[1] {
        Http2Event::Trailers { stream_id: 1, trailers } => {
            assert_eq!(trailers.headers().get("x-checksum"), Some("abc"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
