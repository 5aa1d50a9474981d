//! Shared types, error enum, and styled-message model for caurus-core.

use thiserror::Error;

/// All errors produced by caurus-core.
#[derive(Debug, Error)]
pub enum CaurusError {
    #[error("maximum payload length exceeded: {0}")]
    PayloadTooLong(usize),
    #[error("invalid account number: {0}")]
    InvalidAccount(u32),
    #[error("packed message does not fit: {0}")]
    InvalidMessageLength(String),
    #[error("unsupported barcode size: {0} bytes")]
    InvalidBarcodeSize(usize),
    #[error("symbol not in alphabet: {0:?}")]
    UnknownSymbol(char),
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CaurusError>;

// ---------------------------------------------------------------------------
// Styled message model
// ---------------------------------------------------------------------------

/// Display style of a transaction message cell. The letter is the wire-level
/// style marker embedded after the `%%` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Black,
    Blue,
    Green,
    Red,
}

impl Style {
    /// Wire-level style letter.
    pub fn letter(self) -> char {
        match self {
            Style::Bold => 'S',
            Style::Black => 'K',
            Style::Blue => 'B',
            Style::Green => 'G',
            Style::Red => 'R',
        }
    }

    /// Parse a wire-level style letter.
    pub fn from_letter(c: char) -> Option<Style> {
        match c.to_ascii_uppercase() {
            'S' => Some(Style::Bold),
            'K' => Some(Style::Black),
            'B' => Some(Style::Blue),
            'G' => Some(Style::Green),
            'R' => Some(Style::Red),
            _ => None,
        }
    }
}

/// One cell of a transaction message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Plain(String),
    Styled(String, Style),
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Cell {
        Cell::Plain(text.into())
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Cell {
        Cell::Styled(text.into(), style)
    }
}

/// One row of a transaction message: an ordered list of cells.
pub type MessageRow = Vec<Cell>;

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, must be even length.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for chunk in hex.as_bytes().chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as lowercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

/// Decode a hex string into a fixed-size array.
pub fn hex_array<const N: usize>(hex: &str) -> Result<[u8; N]> {
    let bytes = hex_decode(hex).ok_or_else(|| CaurusError::InvalidHex(hex.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| CaurusError::InvalidHex(hex.to_string()))
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let bytes = vec![0x00, 0x48, 0xd6, 0xff];
        assert_eq!(hex_decode(&hex_encode(&bytes)), Some(bytes));
    }

    #[test]
    fn test_hex_decode_invalid() {
        assert_eq!(hex_decode("abc"), None); // odd length
        assert_eq!(hex_decode("zz"), None); // invalid chars
        assert_eq!(hex_decode("A1b2"), Some(vec![0xA1, 0xB2])); // mixed case
    }

    #[test]
    fn test_hex_array() {
        let arr: [u8; 2] = hex_array("beef").unwrap();
        assert_eq!(arr, [0xBE, 0xEF]);
        assert!(hex_array::<4>("beef").is_err());
        assert!(hex_array::<2>("bee").is_err());
    }

    #[test]
    fn test_style_letters() {
        for style in [Style::Bold, Style::Black, Style::Blue, Style::Green, Style::Red] {
            assert_eq!(Style::from_letter(style.letter()), Some(style));
        }
        assert_eq!(Style::from_letter('r'), Some(Style::Red));
        assert_eq!(Style::from_letter('X'), None);
    }
}
