//! Single-byte character set (ISO-8859-1) used for every text field on the wire.
//!
//! Each byte maps to the Unicode scalar with the same value, so decoding never
//! fails. Characters above U+00FF cannot be represented and encode as `?`.

const REPLACEMENT: u8 = b'?';

/// Decode wire bytes into a string.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encode a string into wire bytes.
pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    encode_into(text, &mut out);
    out
}

/// Encode a string, appending to `out`.
pub fn encode_into(text: &str, out: &mut Vec<u8>) {
    out.extend(
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT)),
    );
}
