//! Filename encoding for repository and blob keys.
//!
//! Keys are arbitrary strings (`session:<id>`), filenames are not. ASCII
//! alphanumerics, `-` and `_` pass through; every other byte becomes `%XX`.
//! Encoded names therefore never start with `.`, which keeps them apart from
//! temporary and lock files.

pub(crate) fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Decodes a filename produced by [`encode_key`]; `None` for foreign names.
pub(crate) fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = name.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' => {
                decoded.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_session_key() {
        assert_eq!(encode_key("session:abc-1"), "session%3Aabc-1");
        assert_eq!(decode_key("session%3Aabc-1").as_deref(), Some("session:abc-1"));
    }

    #[test]
    fn test_dots_and_unicode_are_escaped() {
        let key = "../avatar.png";
        let encoded = encode_key(key);
        assert!(!encoded.contains('.'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_key(&encoded).as_deref(), Some(key));

        let unicode = "头像";
        assert_eq!(decode_key(&encode_key(unicode)).as_deref(), Some(unicode));
    }

    #[test]
    fn test_foreign_names_are_rejected() {
        assert_eq!(decode_key(".lock"), None);
        assert_eq!(decode_key(".session%3Aa.tmp"), None);
        assert_eq!(decode_key("bad%zz"), None);
        assert_eq!(decode_key("trunc%4"), None);
    }
}
