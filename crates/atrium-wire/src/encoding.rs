//! Numeral codecs used throughout the protocol.
//!
//! **B64** is a fixed-width, big-endian base-64 numeral. Every character is
//! `64 + n` for a 6-bit digit `n`, so the alphabet runs from `@` (0) to DEL
//! (63). Two characters cover `0..=4095` and are used for frame lengths,
//! message ids and string lengths.
//!
//! **VL64** is a variable-length signed integer:
//!
//! ```text
//! first char:  64 | count << 3 | sign << 2 | low 2 bits
//! next chars:  64 | next 6 bits (least significant first)
//! ```
//!
//! `count` is the total number of characters (1..=6), `sign` is set for
//! negative values.

/// Smallest valid numeral character.
const BASE: u8 = 64;
/// Widest B64 numeral that still fits in a `u32`.
const MAX_B64_WIDTH: usize = 5;
/// Most characters a VL64 value can occupy.
const MAX_VL64_LEN: usize = 6;

/// Errors produced when decoding a numeral.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A byte outside the `64..=127` numeral alphabet.
    #[error("invalid numeral byte 0x{byte:02x} at position {position}")]
    InvalidByte {
        /// The offending byte.
        byte: u8,
        /// Its index in the input.
        position: usize,
    },

    /// Input is empty or shorter than the declared VL64 length.
    #[error("numeral truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// B64 input wider than a `u32` can hold.
    #[error("b64 numeral of width {0} is too wide")]
    TooWide(usize),

    /// A VL64 header declaring zero or more than six characters.
    #[error("vl64 header declares {0} characters")]
    BadLength(usize),

    /// The decoded magnitude does not fit in an `i32`.
    #[error("vl64 value out of range")]
    Overflow,
}

fn check_byte(byte: u8, position: usize) -> Result<u8, EncodingError> {
    if (BASE..=127).contains(&byte) {
        Ok(byte - BASE)
    } else {
        Err(EncodingError::InvalidByte { byte, position })
    }
}

/// Largest value a B64 numeral of `width` characters can hold.
pub const fn b64_max(width: usize) -> u32 {
    if width >= MAX_B64_WIDTH {
        (1 << (6 * MAX_B64_WIDTH)) - 1
    } else {
        (1 << (6 * width)) - 1
    }
}

/// Encode `value` as a B64 numeral of exactly `width` characters.
///
/// Bits above `6 * width` are discarded; callers clamp to [`b64_max`] first
/// when the value may not fit.
pub fn encode_b64(value: u32, width: usize) -> String {
    let width = width.min(MAX_B64_WIDTH);
    (0..width)
        .map(|i| {
            let shift = 6 * (width - 1 - i);
            char::from(BASE + ((value >> shift) & 0x3f) as u8)
        })
        .collect()
}

/// Decode a B64 numeral. Every byte of `bytes` is part of the numeral.
pub fn decode_b64(bytes: &[u8]) -> Result<u32, EncodingError> {
    if bytes.is_empty() {
        return Err(EncodingError::Truncated {
            needed: 1,
            available: 0,
        });
    }
    if bytes.len() > MAX_B64_WIDTH {
        return Err(EncodingError::TooWide(bytes.len()));
    }

    bytes
        .iter()
        .enumerate()
        .try_fold(0u32, |acc, (position, &byte)| -> Result<u32, EncodingError> {
            Ok((acc << 6) | u32::from(check_byte(byte, position)?))
        })
}

/// Encode `value` as VL64.
pub fn encode_vl64(value: i32) -> String {
    let mut out = [0u8; MAX_VL64_LEN];
    let mut magnitude = value.unsigned_abs();

    out[0] = BASE + (magnitude & 0x03) as u8;
    magnitude >>= 2;

    let mut count = 1;
    while magnitude != 0 {
        out[count] = BASE + (magnitude & 0x3f) as u8;
        magnitude >>= 6;
        count += 1;
    }

    out[0] |= (count as u8) << 3;
    if value < 0 {
        out[0] |= 0x04;
    }

    out[..count].iter().map(|&b| char::from(b)).collect()
}

/// Decode a VL64 value from the start of `bytes`.
///
/// Returns the value and the number of bytes it occupied; trailing bytes are
/// left for the caller.
pub fn decode_vl64(bytes: &[u8]) -> Result<(i32, usize), EncodingError> {
    let Some(&first) = bytes.first() else {
        return Err(EncodingError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    let header = check_byte(first, 0)?;

    let count = usize::from((header >> 3) & 0x07);
    if count == 0 || count > MAX_VL64_LEN {
        return Err(EncodingError::BadLength(count));
    }
    if bytes.len() < count {
        return Err(EncodingError::Truncated {
            needed: count,
            available: bytes.len(),
        });
    }

    let negative = header & 0x04 != 0;
    let mut magnitude = u64::from(header & 0x03);
    let mut shift = 2;
    for (position, &byte) in bytes.iter().enumerate().take(count).skip(1) {
        magnitude |= u64::from(check_byte(byte, position)?) << shift;
        shift += 6;
    }

    let signed = if negative {
        -(magnitude as i64)
    } else {
        magnitude as i64
    };
    let value = i32::try_from(signed).map_err(|_| EncodingError::Overflow)?;
    Ok((value, count))
}
