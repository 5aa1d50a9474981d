//! Transaction message text handling: the 40-symbol alphabet, the
//! percent-escape table, base-40 packing, and styled-row rendering.
//!
//! The alphabet and the escape table are wire-contract constants shared with
//! the client; a character outside both is silently dropped by `escape`.

use crate::types::{CaurusError, Cell, MessageRow, Result};

/// 40-symbol message alphabet. Symbol index is the base-40 digit value.
pub const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ =&%";

/// Escape mapping (byte -> character). Characters on the right are emitted
/// as `%XX` of the byte on the left. Applied through its inverse when
/// escaping outgoing text.
pub const ESCAPED: &[(u8, char)] = &[
    (0x21, '!'),
    (0x23, '#'),
    (0x24, '$'),
    (0x25, '%'),
    (0x26, '&'),
    (0x27, '\''),
    (0x28, '('),
    (0x29, ')'),
    (0x2A, '*'),
    (0x2B, '+'),
    (0x2C, ','),
    (0x2D, '-'),
    (0x2E, '.'),
    (0x2F, '/'),
    (0x3A, ':'),
    (0x3C, '<'),
    (0x3D, '='),
    (0x3E, '>'),
    (0x3F, '?'),
    (0x40, '@'),
    (0x5F, '_'),
    (0x7B, '{'),
    (0x7D, '}'),
    (0x84, '\u{2026}'), // …
    (0xA3, '\u{00A3}'), // £
    (0xA4, '\u{20AC}'), // €
    (0xA7, '\u{00A7}'), // §
    (0xAA, '\u{00AA}'), // ª
    (0xAB, '\u{00AB}'), // «
    (0xBA, '\u{00BA}'), // º
    (0xBB, '\u{00BB}'), // »
    (0xBC, '\u{0152}'), // Œ
    (0xBE, '\u{0178}'), // Ÿ
    (0xC0, '\u{00C0}'), // À
    (0xC2, '\u{00C2}'), // Â
    (0xC4, '\u{00C4}'), // Ä
    (0xC7, '\u{00C7}'), // Ç
    (0xC8, '\u{00C8}'), // È
    (0xC9, '\u{00C9}'), // É
    (0xCA, '\u{00CA}'), // Ê
    (0xCB, '\u{00CB}'), // Ë
    (0xCC, '\u{00CC}'), // Ì
    (0xCE, '\u{00CE}'), // Î
    (0xCF, '\u{00CF}'), // Ï
    (0xD2, '\u{00D2}'), // Ò
    (0xD3, '\u{00D3}'), // Ó
    (0xD4, '\u{00D4}'), // Ô
    (0xD6, '\u{00D6}'), // Ö
    (0xD9, '\u{00D9}'), // Ù
    (0xDB, '\u{00DB}'), // Û
    (0xDC, '\u{00DC}'), // Ü
    (0xDF, '\u{00DF}'), // ß
];

fn alphabet_index(c: char) -> Option<usize> {
    ALPHABET.chars().position(|a| a == c)
}

fn escape_byte(c: char) -> Option<u8> {
    ESCAPED.iter().find(|&&(_, ch)| ch == c).map(|&(b, _)| b)
}

// ---------------------------------------------------------------------------
// Escaping and rendering
// ---------------------------------------------------------------------------

/// Percent-escape `text` against the alphabet. Escapable characters become
/// `%XX` (uppercase hex), alphabet characters pass through, everything else
/// is dropped. The escape table wins over the alphabet, so the separators
/// `=`, `&`, `%` and space in literal text never collide with framing.
pub fn escape(text: &str) -> String {
    use std::fmt::Write;

    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some(byte) = escape_byte(c) {
            write!(result, "%{byte:02X}").expect("writing to String cannot fail");
        } else if alphabet_index(c).is_some() {
            result.push(c);
        }
    }
    result
}

/// Render styled rows to the wire string: cells upper-cased, escaped and
/// prefixed `%%<letter>` when styled, joined `=` within a row, rows joined
/// `&`.
pub fn render_message(rows: &[MessageRow]) -> String {
    let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Cell::Plain(text) => escape(&text.to_uppercase()),
                    Cell::Styled(text, style) => {
                        format!("%%{}{}", style.letter(), escape(&text.to_uppercase()))
                    }
                })
                .collect::<Vec<_>>()
                .join("=")
        })
        .collect();
    rendered.join("&")
}

// ---------------------------------------------------------------------------
// Base-40 packing
// ---------------------------------------------------------------------------

/// Pack `string` into exactly `length` bytes of base-40 symbol groups.
///
/// Symbols are taken `n` at a time, each group encoded as a big-endian
/// unsigned integer (2 bytes for n = 3 since 40^3 < 2^16); missing trailing
/// symbols take the index of `padding`. Fails when `length` is not a
/// multiple of the group byte size or the input exceeds the capacity.
pub fn pack_pad_string(string: &str, n: usize, padding: char, length: usize) -> Result<Vec<u8>> {
    let radix = ALPHABET.chars().count() as u64;
    let symbol_bits = 64 - radix.pow(n as u32).leading_zeros() as usize;
    let symbol_bytes = symbol_bits.div_ceil(8);
    if length % symbol_bytes != 0 {
        return Err(CaurusError::InvalidMessageLength(format!(
            "target length {length} is not a multiple of the {symbol_bytes}-byte group size"
        )));
    }

    let symbols: Vec<usize> = string
        .chars()
        .map(|c| alphabet_index(c).ok_or(CaurusError::UnknownSymbol(c)))
        .collect::<Result<_>>()?;
    let groups = length / symbol_bytes;
    if symbols.len() > groups * n {
        return Err(CaurusError::InvalidMessageLength(format!(
            "{} symbols exceed the capacity of {} groups",
            symbols.len(),
            groups
        )));
    }
    let padding_index = alphabet_index(padding).ok_or(CaurusError::UnknownSymbol(padding))?;

    let mut result = Vec::with_capacity(length);
    for i in 0..groups {
        let mut value = 0u64;
        for j in 0..n {
            value *= radix;
            value += *symbols.get(i * n + j).unwrap_or(&padding_index) as u64;
        }
        result.extend_from_slice(&value.to_be_bytes()[8 - symbol_bytes..]);
    }
    Ok(result)
}

/// Inverse of [`pack_pad_string`]: recover the symbol string (including the
/// trailing padding) from packed bytes.
pub fn unpack_string(data: &[u8], n: usize) -> Result<String> {
    let radix = ALPHABET.chars().count() as u64;
    let symbol_bits = 64 - radix.pow(n as u32).leading_zeros() as usize;
    let symbol_bytes = symbol_bits.div_ceil(8);
    if data.len() % symbol_bytes != 0 {
        return Err(CaurusError::InvalidMessageLength(format!(
            "{} bytes is not a multiple of the {symbol_bytes}-byte group size",
            data.len()
        )));
    }

    let alphabet: Vec<char> = ALPHABET.chars().collect();
    let mut result = String::with_capacity(data.len() / symbol_bytes * n);
    for group in data.chunks(symbol_bytes) {
        let mut value = 0u64;
        for &byte in group {
            value = value << 8 | byte as u64;
        }
        let mut symbols = vec![0usize; n];
        for slot in symbols.iter_mut().rev() {
            *slot = (value % radix) as usize;
            value /= radix;
        }
        for index in symbols {
            let c = *alphabet.get(index).ok_or_else(|| {
                CaurusError::InvalidMessageLength(format!("symbol index {index} out of range"))
            })?;
            result.push(c);
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Style;

    #[test]
    fn test_escape_passthrough_and_drop() {
        assert_eq!(escape("HELLO 123"), "HELLO 123");
        // lowercase is not in the alphabet and not escapable: dropped
        assert_eq!(escape("hello"), "");
        assert_eq!(escape("A\u{1F600}B"), "AB");
    }

    #[test]
    fn test_escape_punctuation() {
        assert_eq!(escape("EUR:R"), "EUR%3AR");
        assert_eq!(escape("A=B&C"), "A%3DB%26C");
        assert_eq!(escape("100%"), "100%25");
        assert_eq!(escape("X_Y"), "X%5FY");
    }

    #[test]
    fn test_escape_high_bytes() {
        assert_eq!(escape("\u{20AC}"), "%A4"); // €
        assert_eq!(escape("\u{00DF}"), "%DF"); // ß
        assert_eq!(escape("\u{2026}"), "%84"); // …
    }

    #[test]
    fn test_render_message_plain_rows() {
        let rows = vec![
            vec![Cell::plain("pay"), Cell::plain("10 EUR")],
            vec![Cell::plain("to"), Cell::plain("alice")],
        ];
        assert_eq!(render_message(&rows), "PAY=10 EUR&TO=ALICE");
    }

    #[test]
    fn test_render_message_styles() {
        let rows = vec![
            vec![Cell::plain("PAY"), Cell::styled("EUR:R", Style::Red)],
            vec![Cell::plain("TO"), Cell::plain("ALICE")],
        ];
        assert_eq!(render_message(&rows), "PAY=%%REUR%3AR&TO=ALICE");
    }

    #[test]
    fn test_pack_pad_string_abc() {
        let packed = pack_pad_string("ABC", 3, ' ', 58).unwrap();
        assert_eq!(packed.len(), 58);
        // 'A' = 10, 'B' = 11, 'C' = 12
        let first = (10 * 40 * 40 + 11 * 40 + 12) as u16;
        assert_eq!(&packed[..2], &first.to_be_bytes());
        // remaining groups are pure padding: ' ' = 36 in every position
        let pad_group = (36 * (40 * 40 + 40 + 1)) as u16;
        for chunk in packed[2..].chunks(2) {
            assert_eq!(chunk, &pad_group.to_be_bytes());
        }
    }

    #[test]
    fn test_pack_pad_string_errors() {
        // target not a multiple of the group size
        assert!(pack_pad_string("A", 3, ' ', 57).is_err());
        // 88 symbols exceed the 87-symbol capacity of 58 bytes
        let long = "0".repeat(88);
        assert!(pack_pad_string(&long, 3, ' ', 58).is_err());
        // symbol outside the alphabet
        assert!(pack_pad_string("a", 3, ' ', 58).is_err());
    }

    #[test]
    fn test_pack_pad_capacity_boundary() {
        let exact = "Z".repeat(87);
        assert_eq!(pack_pad_string(&exact, 3, ' ', 58).unwrap().len(), 58);
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let message = "PAY=%%REUR%3AR&TO=ALICE";
        let packed = pack_pad_string(message, 3, ' ', 58).unwrap();
        let unpacked = unpack_string(&packed, 3).unwrap();
        assert_eq!(unpacked.len(), 87);
        assert!(unpacked.starts_with(message));
        assert!(unpacked[message.len()..].chars().all(|c| c == ' '));
    }

    #[test]
    fn test_alphabet_layout() {
        assert_eq!(ALPHABET.chars().count(), 40);
        assert_eq!(alphabet_index(' '), Some(36));
        assert_eq!(alphabet_index('='), Some(37));
        assert_eq!(alphabet_index('&'), Some(38));
        assert_eq!(alphabet_index('%'), Some(39));
    }

    #[test]
    fn test_escape_table_is_injective() {
        for (i, &(_, c1)) in ESCAPED.iter().enumerate() {
            for &(_, c2) in &ESCAPED[i + 1..] {
                assert_ne!(c1, c2);
            }
        }
    }
}
