//! Radix-252 string codec.
//!
//! Digits are the characters `U+0001..=U+00FF` minus the three separators used by ids and
//! cursors (`,`, `-` and `;`). Digits are ordered by code point, and UTF-8 preserves code point
//! order, so two encodings of equal length compare like the numbers they encode.

use alloy_primitives::U256;
use thiserror::Error;

/// Number of digits in the alphabet.
pub const RADIX: u64 = 252;

/// Characters that never appear inside an encoded value.
pub const SEPARATORS: [char; 3] = [',', '-', ';'];

const ALPHABET: [char; RADIX as usize] = alphabet();

const fn alphabet() -> [char; RADIX as usize] {
    let mut out = ['\0'; RADIX as usize];
    let mut code: u16 = 1;
    let mut i = 0;
    while code <= 0xFF {
        let c = code as u8 as char;
        if c != ',' && c != '-' && c != ';' {
            out[i] = c;
            i += 1;
        }
        code += 1;
    }
    out
}

/// Errors returned when decoding a radix-252 string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadixError {
    /// The input had no digits.
    #[error("empty radix-252 value")]
    Empty,
    /// The input contained a character outside of the alphabet.
    #[error("invalid radix-252 digit {0:?}")]
    InvalidDigit(char),
    /// The decoded value does not fit the requested integer width.
    #[error("radix-252 value overflows")]
    Overflow,
}

/// Returns the numeric value of a single digit.
pub const fn digit_value(c: char) -> Option<u8> {
    let code = c as u32;
    match code {
        0x01..=0x2b => Some((code - 1) as u8),
        0x2e..=0x3a => Some((code - 3) as u8),
        0x3c..=0xff => Some((code - 4) as u8),
        _ => None,
    }
}

/// The digit encoding zero, used for left padding.
pub const fn zero_digit() -> char {
    ALPHABET[0]
}

/// Encodes `value` with no leading zero digits.
pub fn encode(value: U256) -> String {
    if value.is_zero() {
        return zero_digit().to_string();
    }
    let radix = U256::from(RADIX);
    let mut digits = Vec::new();
    let mut rest = value;
    while !rest.is_zero() {
        let (quotient, remainder) = rest.div_rem(radix);
        digits.push(ALPHABET[remainder.as_limbs()[0] as usize]);
        rest = quotient;
    }
    digits.iter().rev().collect()
}

/// Encodes `value`, left padding with the zero digit up to `width` digits.
pub fn encode_padded(value: U256, width: usize) -> String {
    let digits = encode(value);
    let len = digits.chars().count();
    if len >= width {
        return digits;
    }
    let mut out = String::with_capacity(width * 2);
    out.extend(std::iter::repeat_n(zero_digit(), width - len));
    out.push_str(&digits);
    out
}

/// Encodes a `u64`.
pub fn encode_u64(value: u64) -> String {
    encode(U256::from(value))
}

/// Decodes a radix-252 string into a 256-bit integer.
pub fn decode(input: &str) -> Result<U256, RadixError> {
    if input.is_empty() {
        return Err(RadixError::Empty);
    }
    let radix = U256::from(RADIX);
    input.chars().try_fold(U256::ZERO, |acc, c| {
        let digit = digit_value(c).ok_or(RadixError::InvalidDigit(c))?;
        acc.checked_mul(radix)
            .and_then(|v| v.checked_add(U256::from(digit)))
            .ok_or(RadixError::Overflow)
    })
}

/// Decodes a radix-252 string into a `u64`.
pub fn decode_u64(input: &str) -> Result<u64, RadixError> {
    let value = decode(input)?;
    u64::try_from(value).map_err(|_| RadixError::Overflow)
}

/// Returns true if every character of `input` is a radix-252 digit.
pub fn is_radix(input: &str) -> bool {
    !input.is_empty() && input.chars().all(|c| digit_value(c).is_some())
}
