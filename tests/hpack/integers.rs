//! Prefix-integer and string primitives.

use http_sans_io::h2::hpack::{read_integer, read_string, write_integer, write_string};

#[test]
fn test_integer_roundtrip_all_prefixes() {
    // representative values across the 32-bit range, every prefix size
    let values = [
        0u64,
        1,
        5,
        30,
        31,
        32,
        126,
        127,
        128,
        255,
        256,
        1337,
        16383,
        16384,
        65535,
        1 << 20,
        (1 << 31) - 1,
        (1 << 32) - 1,
    ];
    for n in 1..=8u8 {
        for &v in &values {
            let mut buf = Vec::new();
            write_integer(&mut buf, n, 0, v);
            let (decoded, consumed) =
                read_integer(&buf, 0, n).unwrap_or_else(|| panic!("n={n} v={v}"));
            assert_eq!(decoded, v, "n={n}");
            assert_eq!(consumed, buf.len(), "n={n} v={v}");
        }
    }
}

#[test]
fn test_integer_roundtrip_with_offset() {
    let mut buf = vec![0xaa, 0xbb];
    write_integer(&mut buf, 5, 0, 1337);
    assert_eq!(read_integer(&buf, 2, 5), Some((1337, 3)));
}

#[test]
fn test_integer_rfc_wire_form() {
    // RFC 7541 C.1: 10 in a 5-bit prefix is one byte, 1337 is three
    let mut buf = Vec::new();
    write_integer(&mut buf, 5, 0, 10);
    assert_eq!(buf, [0x0a]);
    buf.clear();
    write_integer(&mut buf, 5, 0, 1337);
    assert_eq!(buf, [0x1f, 0x9a, 0x0a]);
}

#[test]
fn test_integer_rejects_unterminated_continuation() {
    assert_eq!(read_integer(&[0x1f, 0x80, 0x80], 0, 5), None);
}

#[test]
fn test_string_roundtrip() {
    for huffman in [false, true] {
        let mut buf = Vec::new();
        write_string(&mut buf, b"no-cache", huffman);
        let (decoded, consumed) = read_string(&buf, 0).unwrap();
        assert_eq!(decoded, b"no-cache");
        assert_eq!(consumed, buf.len());
    }
}

#[test]
fn test_huffman_string_is_shorter() {
    let mut plain = Vec::new();
    write_string(&mut plain, b"www.example.com", false);
    let mut huff = Vec::new();
    write_string(&mut huff, b"www.example.com", true);
    assert!(huff.len() < plain.len());
    // RFC 7541 C.4.1 wire form
    assert_eq!(
        huff,
        [0x8c, 0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff]
    );
}

#[test]
fn test_string_rejects_bad_huffman() {
    // huffman flag, length 1, a byte that is pure non-EOS padding
    assert_eq!(read_string(&[0x81, 0x00], 0), None);
}
