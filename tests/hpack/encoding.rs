//! Header-block encoding, pinned against the RFC 7541 Appendix C examples.

use http_sans_io::h2::hpack::{EncoderContext, HpackContext, HpackSession};

/// RFC 7541 C.3: three requests on one connection, without Huffman coding.
/// The encoder's choices match the example encoder byte for byte, and the
/// decoder's dynamic table tracks the encoder's exactly.
#[test]
fn test_rfc_c3_request_sequence() {
    let mut enc = HpackContext::new(false, 4096);
    let mut dec = HpackContext::new(false, 4096);

    let block = enc.encode_headers(vec![
        (":method", "GET"),
        (":scheme", "http"),
        (":path", "/"),
        (":authority", "www.example.com"),
    ]);
    let mut expected = vec![0x82, 0x86, 0x84, 0x41, 0x0f];
    expected.extend_from_slice(b"www.example.com");
    assert_eq!(block, expected);
    let headers = dec.decode_header_block(&block).unwrap();
    assert_eq!(headers.get(":authority"), Some("www.example.com"));
    assert_eq!(enc.encoder_table_size(), 57);
    assert_eq!(dec.decoder_table_size(), 57);
    assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1);

    let block = enc.encode_headers(vec![
        (":method", "GET"),
        (":scheme", "http"),
        (":path", "/"),
        (":authority", "www.example.com"),
        ("cache-control", "no-cache"),
    ]);
    let mut expected = vec![0x82, 0x86, 0x84, 0xbe, 0x58, 0x08];
    expected.extend_from_slice(b"no-cache");
    assert_eq!(block, expected);
    dec.decode_header_block(&block).unwrap();
    assert_eq!(enc.encoder_table_size(), 110);
    assert_eq!(dec.decoder_table_size(), 110);
    assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1);

    let block = enc.encode_headers(vec![
        (":method", "GET"),
        (":scheme", "https"),
        (":path", "/index.html"),
        (":authority", "www.example.com"),
        ("custom-key", "custom-value"),
    ]);
    let mut expected = vec![0x82, 0x87, 0x85, 0xbf, 0x40, 0x0a];
    expected.extend_from_slice(b"custom-key");
    expected.push(0x0c);
    expected.extend_from_slice(b"custom-value");
    assert_eq!(block, expected);
    let headers = dec.decode_header_block(&block).unwrap();
    assert_eq!(headers.get("custom-key"), Some("custom-value"));
    assert_eq!(enc.encoder_table_size(), 164);
    assert_eq!(dec.decoder_table_size(), 164);
    assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1);
}

/// RFC 7541 C.4.1: the same request with Huffman-coded literals.
#[test]
fn test_rfc_c4_huffman_request() {
    let mut enc = HpackContext::new(true, 4096);
    let block = enc.encode_headers(vec![
        (":method", "GET"),
        (":scheme", "http"),
        (":path", "/"),
        (":authority", "www.example.com"),
    ]);
    assert_eq!(
        block,
        [
            0x82, 0x86, 0x84, 0x41, 0x8c, 0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0,
            0xab, 0x90, 0xf4, 0xff
        ]
    );
}

/// Tables stay coherent across dynamic table size updates (the cap is
/// advertised in-band and both sides evict the same entries).
#[test]
fn test_table_coherence_across_size_updates() {
    let mut enc = HpackContext::new(true, 4096);
    let mut dec = HpackContext::new(true, 4096);

    for i in 0..8 {
        let value = format!("value-{i}");
        let block = enc.encode_headers(vec![
            ("x-header-one", value.as_str()),
            ("x-header-two", "constant"),
        ]);
        dec.decode_header_block(&block).unwrap();
        assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1, "round {i}");
        assert_eq!(enc.encoder_table_size(), dec.decoder_table_size(), "round {i}");
    }

    // shrink hard, forcing evictions on both sides
    enc.set_encoder_max_current(Some(100));
    let block = enc.encode_headers(vec![("x-header-three", "after-shrink")]);
    dec.decode_header_block(&block).unwrap();
    assert!(enc.encoder_table_size() <= 100);
    assert_eq!(dec.decoder_max_current(), 100);
    assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1);
    assert_eq!(enc.encoder_table_size(), dec.decoder_table_size());
}

/// A never-index name is encoded with the 0x10 representation and never
/// enters the dynamic table, on either side.
#[test]
fn test_never_index_is_shared_within_session() {
    let session = HpackSession::new();
    session.add_never_index("proxy-authorization");

    let mut enc = HpackContext::with_session(session.clone(), false, 4096);
    let mut dec = HpackContext::new(false, 4096);
    let mut ctx = EncoderContext::new();
    enc.encode_header(&mut ctx, "proxy-authorization", "Basic xyz");
    let block = ctx.into_bytes();
    assert_eq!(block[0] & 0xf0, 0x10);

    dec.decode_header_block(&block).unwrap();
    assert_eq!(enc.encoder_table_size(), 0);
    assert_eq!(dec.decoder_table_size(), 0);
    assert!(dec.session().is_never_index("proxy-authorization"));

    // a second encoder on the same session behaves identically
    let mut enc2 = HpackContext::with_session(session, false, 4096);
    let mut ctx = EncoderContext::new();
    enc2.encode_header(&mut ctx, "proxy-authorization", "Basic abc");
    assert_eq!(ctx.into_bytes()[0] & 0xf0, 0x10);
}

/// An encoder whose ceiling is lowered by SETTINGS caps its current size
/// too and announces the change.
#[test]
fn test_settings_ceiling_lowers_current_cap() {
    let mut enc = HpackContext::new(false, 4096);
    let mut dec = HpackContext::new(false, 256);
    // warm the table
    let block = enc.encode_headers(vec![("x-warm", "1")]);
    dec.decode_header_block(&block).unwrap();

    enc.set_encoder_max_settings(256);
    assert_eq!(enc.encoder_max_current(), 256);
    let block = enc.encode_headers(vec![("x-after", "2")]);
    // no size update byte needed: current equals the (new) ceiling
    assert_ne!(block[0] & 0xe0, 0x20);
    dec.decode_header_block(&block).unwrap();
    assert_eq!(enc.table_snapshots().0, dec.table_snapshots().1);
}
