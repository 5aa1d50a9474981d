//! Barcode transport helpers: module stream <-> urlsafe base64, and the
//! text grid used by `barcode print`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use caurus_core::bits::BitBuffer;

/// Pack the 2-bit module stream and encode it urlsafe-base64 without
/// padding.
pub fn serialize_barcode(modules: &[u8]) -> String {
    let mut bits = BitBuffer::new();
    for &module in modules {
        bits.push_uint(module as u64, 2);
    }
    URL_SAFE_NO_PAD.encode(bits.to_bytes())
}

/// Decode a serialized barcode back into modules, trimmed to the largest
/// full square (the padding bits of the final byte fall away).
pub fn deserialize_barcode(encoded: &str) -> Option<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    let mut modules = Vec::with_capacity(bytes.len() * 4);
    for byte in bytes {
        for shift in [6u8, 4, 2, 0] {
            modules.push((byte >> shift) & 0b11);
        }
    }
    let size = (modules.len() as f64).sqrt() as usize;
    if size == 0 {
        return None;
    }
    modules.truncate(size * size);
    Some(modules)
}

/// Render the square module grid as digit rows (column-major storage, like
/// the SVG renderer).
pub fn format_grid(modules: &[u8]) -> String {
    let size = (modules.len() as f64).sqrt() as usize;
    let mut out = String::with_capacity(size * (size + 1));
    for y in 0..size {
        for x in 0..size {
            out.push((b'0' + modules[y + x * size]) as char);
        }
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
