//! Coloured-module matrix assembly.
//!
//! The 89-byte frame gains a CRC-24, is Reed-Solomon coded to 142 bytes,
//! expanded to 2-bit modules (MSB pair first, interleaved across blocks),
//! and finally spliced with the fixed alignment pattern. Module values are
//! 0 = blank, 1 = red, 2 = green, 3 = blue. The output length is a perfect
//! square (625 = 25 x 25) so callers can render a square matrix.

use crate::crc;
use crate::rs;
use crate::types::{CaurusError, Result};

/// Reed-Solomon block size in bytes.
pub const BLOCK_SIZE: usize = 142;

/// Parity symbols per block.
pub const ECC_SYMBOLS: usize = 50;

/// Fixed alignment interleave: each entry appends its chunk of modules
/// verbatim, then consumes `take` data modules. Wire-contract constant.
const ALIGNMENT: &[(&[u8], usize)] = &[
    (&[0, 0, 0], 8),
    (&[0, 3, 0], 8),
    (&[0, 0, 3, 0, 3, 0], 8),
    (&[0, 0, 0], 9),
    (&[0, 0, 0, 0, 0], 222),
    (&[0, 0], 9),
    (&[0, 0, 0], 9),
    (&[0, 0, 3, 0], 9),
    (&[0, 3, 0], 9),
    (&[0, 3, 0, 0], 9),
    (&[0, 0, 0], 9),
    (&[0, 0], 225),
    (&[0, 0], 9),
    (&[0, 0, 0], 9),
    (&[0, 0, 3, 0, 0], 8),
    (&[0, 3, 0], 8),
    (&[3, 0, 3], 0),
];

/// Encode a frame into the final 2-bit module sequence.
pub fn encode_barcode(frame: &[u8]) -> Result<Vec<u8>> {
    let mut data = frame.to_vec();
    data.extend_from_slice(&crc::crc24_bytes(frame));

    if data.len() != BLOCK_SIZE - ECC_SYMBOLS {
        return Err(CaurusError::InvalidBarcodeSize(data.len()));
    }
    let data = rs::encode(&data, ECC_SYMBOLS);

    let blocks = data.len() / BLOCK_SIZE;
    let mut modules = Vec::with_capacity(data.len() * 4);
    for i in 0..BLOCK_SIZE {
        for block in 0..blocks {
            let byte = data[block * BLOCK_SIZE + i];
            for shift in [6u8, 4, 2, 0] {
                modules.push((byte >> shift) & 0b11);
            }
        }
    }
    let forced = modules.len() - 3;
    modules[forced] = 0;

    let mut result = Vec::with_capacity(625);
    let mut offset = 0;
    for &(alignment, take) in ALIGNMENT {
        result.extend_from_slice(alignment);
        result.extend_from_slice(&modules[offset..offset + take]);
        offset += take;
    }
    debug_assert_eq!(offset, modules.len());
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
