//! Validators for HTTP message components, shared by both protocol versions.

/// Checks an HTTP request method string: 2-10 uppercase ASCII letters.
#[must_use]
pub fn valid_method(s: &str) -> bool {
    (2..=10).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_uppercase())
}

/// Byte-slice variant of [`valid_method`].
#[must_use]
pub fn valid_method_bytes(bytes: &[u8]) -> bool {
    (2..=10).contains(&bytes.len()) && bytes.iter().all(|b| b.is_ascii_uppercase())
}

/// Checks an HTTP URL authority: non-empty, visible ASCII only.
#[must_use]
pub fn valid_authority(s: &str) -> bool {
    !s.is_empty() && valid_string(s)
}

/// Checks an HTTP URL path: starts with `/` and contains only visible ASCII,
/// or is exactly `*`.
#[must_use]
pub fn valid_path(s: &str) -> bool {
    if s == "*" {
        return true;
    }
    s.starts_with('/') && valid_string(s)
}

/// Checks an HTTP response status string: exactly three ASCII digits.
#[must_use]
pub fn valid_status(s: &str) -> bool {
    s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a three-digit HTTP response status string, or `None` if malformed.
#[must_use]
pub fn parse_status(s: &str) -> Option<u16> {
    if !valid_status(s) {
        return None;
    }
    s.parse().ok()
}

/// Checks that a string consists only of visible printable ASCII (33-126).
#[must_use]
pub fn valid_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| (33..=126).contains(&b))
}

/// Checks that every byte of `bytes` lies within `min..=max`.
#[must_use]
pub fn bytes_in_range(bytes: &[u8], min: u8, max: u8) -> bool {
    bytes.iter().all(|&b| (min..=max).contains(&b))
}
