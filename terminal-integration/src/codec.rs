use crate::error::SocketError;
use encoding_rs::WINDOWS_1251;

/// The terminal speaks a single-byte Cyrillic codepage on the wire. Everything
/// above the socket boundary works in UTF-8; this module is the only place
/// that knows the legacy encoding exists.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Encodes a UTF-8 line into codepage-1251 bytes, appending the protocol's
/// line terminator. Characters with no CP1251 representation are replaced
/// per `encoding_rs`'s standard lossy mapping.
pub fn encode_line(line: &str) -> Vec<u8> {
    let (bytes, _, _) = WINDOWS_1251.encode(line);
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(&bytes);
    out.push(LINE_TERMINATOR);
    out
}

/// Decodes one codepage-1251 line (terminator already stripped) into UTF-8.
pub fn decode_line(bytes: &[u8]) -> Result<String, SocketError> {
    let (text, _, had_errors) = WINDOWS_1251.decode(bytes);
    if had_errors {
        return Err(SocketError::Decode(
            "invalid cp1251 byte sequence".to_string(),
        ));
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let encoded = encode_line("hello");
        assert_eq!(encoded.last(), Some(&LINE_TERMINATOR));
        let decoded = decode_line(&encoded[..encoded.len() - 1]).unwrap();
        assert_eq!(decoded, "hello");
    }

    #[test]
    fn round_trips_cyrillic() {
        let encoded = encode_line("Портфель");
        let decoded = decode_line(&encoded[..encoded.len() - 1]).unwrap();
        assert_eq!(decoded, "Портфель");
    }
}
