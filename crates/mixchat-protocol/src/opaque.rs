//! Base64 handling for opaque message blobs and key re-encoding.
//!
//! Outgoing message payloads are encoded in the standard alphabet. The relay
//! hands queued messages back in the URL-safe alphabet, and reports the
//! caller's own identity in the standard one. Decoding is lenient about
//! padding and falls back across alphabets; encoding is always padded.

use base64::alphabet;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::ProtocolError;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_LENIENT: GeneralPurpose =
    GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

const STANDARD_LENIENT: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Encodes message text the way the send path expects: standard alphabet,
/// padded.
pub fn encode_opaque(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decodes a queued message blob back to text.
///
/// Known quirk: blobs occasionally arrive with a single corrupt control
/// byte in front of the payload. If the first decoded byte is below `0x20`
/// exactly that one byte is dropped. Nothing else is sanitized.
///
/// # Errors
/// - [`ProtocolError::Base64`] if `blob` is not base64 in either alphabet
/// - [`ProtocolError::Utf8`] if the decoded bytes are not UTF-8
pub fn decode_opaque_blob(blob: &str) -> Result<String, ProtocolError> {
    let mut bytes = decode_any(blob)?;

    if bytes.first().is_some_and(|&b| b < 0x20) {
        tracing::debug!(byte = bytes[0], "stripping leading control byte");
        bytes.remove(0);
    }

    String::from_utf8(bytes).map_err(|_| ProtocolError::Utf8 {
        raw: blob.to_owned(),
    })
}

/// Re-encodes base64 text in either alphabet into padded URL-safe form.
pub(crate) fn reencode_url_safe(text: &str) -> Result<String, ProtocolError> {
    decode_any(text).map(|bytes| URL_SAFE.encode(bytes))
}

/// Checks that `text` is base64 in either alphabet.
pub(crate) fn check(text: &str) -> Result<(), ProtocolError> {
    decode_any(text).map(|_| ())
}

fn decode_any(text: &str) -> Result<Vec<u8>, ProtocolError> {
    URL_SAFE_LENIENT
        .decode(text)
        .or_else(|_| STANDARD_LENIENT.decode(text))
        .map_err(|_| ProtocolError::Base64 {
            raw: text.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_url_safe_blob() {
        // "hi?>" encodes to "aGk_Pg==" URL-safe and "aGk/Pg==" standard.
        assert_eq!(decode_opaque_blob("aGk_Pg==").unwrap(), "hi?>");
    }

    #[test]
    fn test_decode_accepts_missing_padding() {
        assert_eq!(decode_opaque_blob("aGk_Pg").unwrap(), "hi?>");
    }

    #[test]
    fn test_decode_falls_back_to_standard_alphabet() {
        assert_eq!(decode_opaque_blob("aGk/Pg==").unwrap(), "hi?>");
    }

    #[test]
    fn test_opaque_round_trip_with_alphabet_specific_chars() {
        // Text whose standard encoding contains '+' and '/'.
        let text = "??>>~~ unicode: ünï";
        let encoded = encode_opaque(text);
        assert!(encoded.contains('/') || encoded.contains('+'));
        assert_eq!(decode_opaque_blob(&encoded).unwrap(), text);
    }

    // Known quirk: one leading control byte is corrupt upstream noise.

    #[test]
    fn test_quirk_strips_one_leading_control_byte() {
        let blob = URL_SAFE.encode(b"\x0bhello");
        assert_eq!(decode_opaque_blob(&blob).unwrap(), "hello");
    }

    #[test]
    fn test_quirk_strips_at_most_one_control_byte() {
        let blob = URL_SAFE.encode(b"\x01\x02hello");
        assert_eq!(decode_opaque_blob(&blob).unwrap(), "\u{2}hello");
    }

    #[test]
    fn test_quirk_keeps_printable_first_char() {
        let blob = URL_SAFE.encode(b" hello");
        assert_eq!(decode_opaque_blob(&blob).unwrap(), " hello");
    }

    #[test]
    fn test_quirk_boundary_is_0x20() {
        let blob = URL_SAFE.encode(b"\x1fA");
        assert_eq!(decode_opaque_blob(&blob).unwrap(), "A");
        let blob = URL_SAFE.encode(b"\x20A");
        assert_eq!(decode_opaque_blob(&blob).unwrap(), " A");
    }

    #[test]
    fn test_empty_blob_decodes_to_empty_text() {
        assert_eq!(decode_opaque_blob("").unwrap(), "");
    }

    #[test]
    fn test_malformed_blob_carries_raw_input() {
        let err = decode_opaque_blob("%%%not-base64%%%").unwrap_err();
        assert!(matches!(err, ProtocolError::Base64 { .. }));
        assert_eq!(err.raw(), Some("%%%not-base64%%%"));
    }

    #[test]
    fn test_non_utf8_payload_is_rejected() {
        let blob = URL_SAFE.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            decode_opaque_blob(&blob),
            Err(ProtocolError::Utf8 { .. })
        ));
    }

    #[test]
    fn test_reencode_standard_to_url_safe() {
        assert_eq!(reencode_url_safe("aGk/Pg==").unwrap(), "aGk_Pg==");
        assert_eq!(reencode_url_safe("MTIz").unwrap(), "MTIz");
    }
}
