//! Transport-safe payload codec
//!
//! Providers exchange program text and outputs as base64 so that arbitrary
//! bytes survive JSON transport. Decoding is deliberately forgiving: output
//! that fails to transcode is degraded rather than turned into an error,
//! because a submission result with garbled stdout is still more useful to
//! the user than no result at all.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode arbitrary UTF-8 text into its transport representation.
pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode a transport string back into text.
///
/// Invalid UTF-8 inside a valid base64 payload is replaced lossily; a payload
/// that is not base64 at all is returned unchanged. Never fails.
pub fn decode(payload: &str) -> String {
    match STANDARD.decode(payload.trim_end()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                log::warn!("payload is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        },
        Err(err) => {
            log::warn!("payload is not valid base64 ({}), passing through raw", err);
            payload.to_string()
        }
    }
}

/// Decode an optional transport string, treating absence as empty.
pub fn decode_opt(payload: Option<&str>) -> String {
    payload.map(decode).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_plain_text() {
        let source = "print(\"hello, world\")\n";
        assert_eq!(decode(&encode(source)), source);
    }

    #[test]
    fn test_round_trip_empty() {
        assert_eq!(encode(""), "");
        assert_eq!(decode(""), "");
    }

    #[test]
    fn test_round_trip_control_characters() {
        let source = "a\0b\tc\r\nd\x1b[0m";
        assert_eq!(decode(&encode(source)), source);
    }

    #[test]
    fn test_round_trip_multibyte() {
        let source = "čevapčići — 🦀 — 判定";
        assert_eq!(decode(&encode(source)), source);
    }

    #[test]
    fn test_decode_invalid_utf8_is_lossy() {
        // 0xff is never valid UTF-8
        let payload = STANDARD.encode([0x66, 0x6f, 0x6f, 0xff]);
        assert_eq!(decode(&payload), "foo\u{fffd}");
    }

    #[test]
    fn test_decode_invalid_base64_passes_through() {
        assert_eq!(decode("not base64!"), "not base64!");
    }

    #[test]
    fn test_decode_tolerates_trailing_newline() {
        // Some providers append a newline to base64 bodies
        let payload = format!("{}\n", encode("1\n"));
        assert_eq!(decode(&payload), "1\n");
    }

    #[test]
    fn test_decode_opt_none_is_empty() {
        assert_eq!(decode_opt(None), "");
        assert_eq!(decode_opt(Some(encode("x").as_str())), "x");
    }
}
