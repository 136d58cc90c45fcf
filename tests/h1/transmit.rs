//! Serialization, including the serialize-then-parse round trip.

use std::sync::{Arc, Mutex};

use http_sans_io::h1::{MessageTransmitter, RequestReceiver};
use http_sans_io::{share_socket, Headers, Message, Request, Response, Version, WritableSocket};

#[test]
fn test_request_wire_form() {
    let mut headers = Headers::new();
    headers.set("accept", "text/html");
    headers.set("transfer-encoding", "chunked");
    let req = Request::new(
        "GET",
        "https",
        Some("example.com".into()),
        "/search?q=1",
        Version::Http11,
        headers,
    );
    let text = String::from_utf8(MessageTransmitter::new().generate(&Message::Request(req))).unwrap();
    assert!(text.starts_with("GET /search?q=1 HTTP/1.1\r\nhost: example.com\r\n"));
    assert!(text.contains("accept: text/html\r\n"));
    assert!(text.ends_with("\r\n\r\n"));
}

#[test]
fn test_response_wire_form() {
    let mut headers = Headers::new();
    headers.set("content-length", "0");
    let res = Response::new(404, Version::Http10, headers);
    let bytes = MessageTransmitter::new().generate(&Message::Response(res));
    assert_eq!(bytes, b"HTTP/1.0 404\r\ncontent-length: 0\r\n\r\n");
}

#[test]
fn test_send_writes_to_socket() {
    struct Sink(Arc<Mutex<Vec<u8>>>);
    impl WritableSocket for Sink {
        fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn is_writable(&self) -> bool {
            true
        }
        fn remote_name(&self) -> String {
            "sink".into()
        }
        fn close(&mut self) {}
    }

    let written = Arc::new(Mutex::new(Vec::new()));
    let tx = MessageTransmitter::with_socket(share_socket(Sink(written.clone())));
    let res = Response::new(200, Version::Http11, Headers::new());
    tx.send(&Message::Response(res)).unwrap();
    assert_eq!(&*written.lock().unwrap(), b"HTTP/1.1 200\r\n\r\n");
}

/// Serializing a request and parsing it back preserves the request line,
/// the chunked flag and the full header multiset.
#[test]
fn test_serialize_parse_roundtrip() {
    let cases = vec![
        ("GET", "/", vec![("accept", "*/*")], false),
        ("POST", "/upload", vec![("content-length", "12"), ("x-a", "1"), ("x-a", "2")], false),
        ("DELETE", "/x/y?z=1", vec![("transfer-encoding", "chunked")], true),
        ("OPTIONS", "*", vec![], false),
    ];
    for (method, path, header_list, chunked) in cases {
        let mut headers = Headers::new();
        for (k, v) in &header_list {
            headers.add(*k, *v);
        }
        let mut req = Request::new(
            method,
            "https",
            Some("round.example:8443".into()),
            path,
            Version::Http11,
            headers,
        );
        req.set_chunked_transfer(chunked);

        let bytes = MessageTransmitter::new().generate(&Message::Request(req));
        let mut rx = RequestReceiver::new(true);
        let body = rx.receive(&bytes, 0).unwrap();
        assert_eq!(body, Some(bytes.len()), "{method} {path}");
        let parsed = rx.request();

        assert_eq!(parsed.method(), method);
        assert_eq!(parsed.scheme(), "https");
        assert_eq!(parsed.authority(), Some("round.example:8443"));
        assert_eq!(parsed.path(), path);
        assert_eq!(parsed.version(), Version::Http11);
        assert_eq!(parsed.is_chunked_transfer(), chunked);
        for (k, v) in &header_list {
            let values: Vec<&str> = (0..parsed.headers().count(k))
                .map(|i| parsed.headers().get_at(k, i as isize).unwrap())
                .collect();
            assert!(values.contains(v), "{k}: {v} missing after round trip");
        }
        // no headers invented beyond the originals (host is folded into the
        // authority, not kept as a header)
        let original_names: std::collections::HashSet<&str> =
            header_list.iter().map(|(k, _)| *k).collect();
        for name in parsed.headers().names() {
            assert!(original_names.contains(name), "unexpected header {name}");
        }
    }
}
