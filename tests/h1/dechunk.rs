//! Body dechunking: the chunked state machine under adversarial
//! fragmentation, plus the fixed-length and no-body modes.

use http_sans_io::h1::BodyDechunker;
use http_sans_io::{Headers, Message, Request, Response, Version};

fn request_with(headers: &[(&str, &str)]) -> Message {
    let mut h = Headers::new();
    for (k, v) in headers {
        h.add(*k, *v);
    }
    let mut req = Request::new("POST", "http", Some("h".into()), "/", Version::Http11, h);
    req.set_chunked_transfer(req.headers().get("transfer-encoding") == Some("chunked"));
    Message::Request(req)
}

fn response_with(status: u16, headers: &[(&str, &str)]) -> Message {
    let mut h = Headers::new();
    for (k, v) in headers {
        h.add(*k, *v);
    }
    Message::Response(Response::new(status, Version::Http11, h))
}

#[test]
fn test_chunked_body_single_feed() {
    let msg = request_with(&[("transfer-encoding", "chunked")]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    let chunks = d.add_data(b"5\r\nhello\r\n0\r\n\r\n").unwrap();
    assert_eq!(chunks, vec![b"hello".to_vec(), Vec::new()]);
    assert!(d.has_ended());
}

#[test]
fn test_chunked_body_across_many_packets() {
    let msg = request_with(&[("transfer-encoding", "chunked")]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    let wire = b"4\r\nwiki\r\n6\r\npedia \r\nE\r\nin \r\n\r\nchunks.\r\n0\r\n\r\n";
    // feed in every possible split position of a few sizes
    let mut collected = Vec::new();
    for piece in wire.chunks(3) {
        for chunk in d.add_data(piece).unwrap() {
            collected.push(chunk);
        }
    }
    assert_eq!(collected.last().map(Vec::len), Some(0));
    let flat: Vec<u8> = collected.into_iter().flatten().collect();
    assert_eq!(flat, b"wikipedia in \r\n\r\nchunks.");
    assert!(d.has_ended());
}

#[test]
fn test_chunk_size_line_split_across_packets() {
    let msg = request_with(&[("transfer-encoding", "chunked")]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    assert!(d.add_data(b"f").unwrap().is_empty());
    assert!(d.add_data(b"f\r").unwrap().is_empty());
    let chunks = d.add_data(&{
        let mut v = b"\n".to_vec();
        v.extend_from_slice(&[b'x'; 0xff]);
        v.extend_from_slice(b"\r\n0\r\n\r\n");
        v
    })
    .unwrap();
    assert_eq!(chunks[0].len(), 0xff);
    assert_eq!(chunks.last().map(Vec::len), Some(0));
}

#[test]
fn test_content_length_exact() {
    let msg = request_with(&[("content-length", "10")]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    let chunks = d.add_data(b"0123456789").unwrap();
    assert_eq!(chunks, vec![b"0123456789".to_vec(), Vec::new()]);
    assert!(d.has_received_all_data());
}

#[test]
fn test_content_length_overrun_fails() {
    let msg = request_with(&[("content-length", "3")]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    assert!(d.add_data(b"12345").is_err());
}

#[test]
fn test_invalid_content_length_fails_construction() {
    let msg = request_with(&[("content-length", "ten")]);
    assert!(BodyDechunker::new(&msg).is_err());
}

#[test]
fn test_head_response_has_no_body() {
    let mut res = response_with(200, &[("content-length", "100")]);
    if let Message::Response(r) = &mut res {
        let head = Request::new("HEAD", "http", Some("h".into()), "/", Version::Http11, Headers::new());
        r.set_other(Message::Request(head));
    }
    let mut d = BodyDechunker::new(&res).unwrap();
    // ends immediately on the first (empty) feed
    assert_eq!(d.add_data(b"").unwrap(), vec![Vec::new()]);
    assert!(d.has_ended());
}

#[test]
fn test_until_close_body_needs_explicit_end() {
    let msg = response_with(200, &[]);
    let mut d = BodyDechunker::new(&msg).unwrap();
    assert_eq!(d.add_data(b"part").unwrap(), vec![b"part".to_vec()]);
    assert!(!d.has_ended());
    assert!(d.has_received_all_data());
    assert_eq!(d.end(), vec![Vec::new()]);
    assert!(d.has_ended());
}
