//! URL-encoded form body decoding.
//!
//! Submissions arrive as `application/x-www-form-urlencoded` text: `&`-separated
//! `key=value` segments with `+` standing in for spaces and `%XX` percent
//! escapes for everything else. The whole body is decoded first, then split
//! into fields, mirroring what the relayed bytes actually contain.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Decode `+` and `%XX` escapes in a URL-encoded string.
///
/// Escapes are decoded at the byte level and the result is re-validated as
/// UTF-8, so multibyte characters split across several `%XX` escapes survive
/// intact. Invalid escape sequences are kept literally; decoded bytes that do
/// not form valid UTF-8 are replaced with U+FFFD.
#[must_use]
pub fn decode(input: &str) -> String {
    let mut bytes = Vec::with_capacity(input.len());
    let mut rest = input.as_bytes().iter().copied();

    while let Some(b) = rest.next() {
        match b {
            b'+' => bytes.push(b' '),
            b'%' => {
                let hi = rest.next();
                let lo = rest.next();
                match (hi.and_then(hex_value), lo.and_then(hex_value)) {
                    (Some(hi), Some(lo)) => bytes.push((hi << 4) | lo),
                    _ => {
                        // Not a valid escape, keep what we consumed
                        bytes.push(b'%');
                        bytes.extend(hi);
                        bytes.extend(lo);
                    }
                }
            }
            other => bytes.push(other),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse an already-decoded form string into a field-name → value mapping.
///
/// The input is split on `&`; every segment must contain exactly one `=`.
/// A segment violating that fails the whole submission: no partial record
/// is produced.
///
/// # Errors
///
/// Returns [`Error::MalformedField`] naming the first offending segment.
pub fn parse(decoded: &str) -> Result<Map<String, Value>> {
    let mut fields = Map::new();

    for segment in decoded.split('&') {
        let mut parts = segment.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) => {
                fields.insert(name.to_string(), Value::String(value.to_string()));
            }
            _ => return Err(Error::malformed_field(segment)),
        }
    }

    Ok(fields)
}

/// Decode and parse a raw form body in one step.
///
/// # Errors
///
/// Returns an error if any decoded segment is malformed; see [`parse`].
pub fn parse_body(raw: &str) -> Result<Map<String, Value>> {
    parse(&decode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plus_and_percent() {
        assert_eq!(decode("hello+world"), "hello world");
        assert_eq!(decode("a%3Db"), "a=b");
        assert_eq!(decode("100%25"), "100%");
    }

    #[test]
    fn test_decode_multibyte_utf8() {
        // 'п' is %D0%BF: two escapes forming one character
        assert_eq!(decode("%D0%BF%D1%80%D0%B8%D0%B2%D1%96%D1%82"), "привіт");
    }

    #[test]
    fn test_decode_invalid_escape_kept_literally() {
        assert_eq!(decode("50%ZZ"), "50%ZZ");
        assert_eq!(decode("trailing%"), "trailing%");
        assert_eq!(decode("cut%4"), "cut%4");
    }

    #[test]
    fn test_decode_invalid_utf8_replaced() {
        // %FF alone is not valid UTF-8
        assert_eq!(decode("%FF"), "\u{fffd}");
    }

    #[test]
    fn test_parse_two_fields() {
        let fields = parse("a=1&b=2").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["a"], "1");
        assert_eq!(fields["b"], "2");
    }

    #[test]
    fn test_parse_empty_value() {
        let fields = parse("name=").unwrap();
        assert_eq!(fields["name"], "");
    }

    #[test]
    fn test_parse_preserves_submission_order() {
        let fields = parse("z=1&a=2&m=3").unwrap();
        let keys: Vec<_> = fields.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_parse_rejects_segment_without_separator() {
        let err = parse("a=1&novalue&b=2").unwrap_err();
        assert!(err.is_submission_error());
        assert!(err.to_string().contains("novalue"));
    }

    #[test]
    fn test_parse_rejects_segment_with_two_separators() {
        assert!(parse("a=1=2").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_body() {
        assert!(parse("").is_err());
    }

    #[test]
    fn test_parse_body_decodes_then_splits() {
        let fields = parse_body("username=Jo+Doe&message=hi%20there").unwrap();
        assert_eq!(fields["username"], "Jo Doe");
        assert_eq!(fields["message"], "hi there");
    }

    #[test]
    fn test_parse_body_duplicate_field_keeps_last() {
        let fields = parse_body("a=1&a=2").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["a"], "2");
    }
}
