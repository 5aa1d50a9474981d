//! Authenticated barcode frame assembly.
//!
//! A frame is 712 bits (89 bytes): version, type nibble, service id,
//! account, one reserved bit, a 64-bit truncated MAC, and the first 604
//! bits of the AES-CTR output (16-byte nonce plus 60-byte ciphertext; the
//! last 4 ciphertext bits are discarded, which CTR tolerates on the
//! decrypting side). The MAC is computed over the frame with the MAC field
//! still zeroed, then written back in place.

use crate::bits::BitBuffer;
use crate::crypto::{aes_ctr_encrypt, hmac_sha256, RandomSource};
use crate::types::{CaurusError, Result};

/// Wire format version byte.
pub const VERSION: u8 = 3;

/// Frame length in bytes.
pub const FRAME_LEN: usize = 89;

/// Bit offset of the 64-bit MAC field.
pub const MAC_OFFSET: usize = 44;

/// Bit offset of the embedded 128-bit AES-CTR nonce.
pub const NONCE_OFFSET: usize = 108;

/// Plaintext is always padded to this many bytes before encryption.
const PLAINTEXT_LEN: usize = 60;

/// Number of encrypted bits carried by the frame.
const ENCRYPTED_BITS: usize = 604;

/// Barcode type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeKind {
    Transaction = 0,
    ActivationStart = 1,
    ActivationContinue = 2,
}

/// Frame payload: raw bytes (up to 59) or a pre-assembled bit string
/// (up to 476 bits).
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Bits(&'a BitBuffer),
}

/// Assemble an authenticated frame around an encrypted payload.
pub fn build_barcode<R: RandomSource>(
    kind: BarcodeKind,
    account: u16,
    payload: Payload<'_>,
    encryption_key: &[u8],
    mac_key: &[u8],
    service_id: u8,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut plaintext = match payload {
        Payload::Bits(bits) => {
            if bits.len() > 476 {
                return Err(CaurusError::PayloadTooLong(bits.len()));
            }
            bits.to_bytes()
        }
        Payload::Bytes(bytes) => {
            // the last byte of the 60 is truncated to 4 bits on the wire
            if bytes.len() > PLAINTEXT_LEN - 1 {
                return Err(CaurusError::PayloadTooLong(bytes.len()));
            }
            bytes.to_vec()
        }
    };
    plaintext.resize(PLAINTEXT_LEN, 0);
    let encrypted = aes_ctr_encrypt(encryption_key, &plaintext, rng);

    let mut message = BitBuffer::new();
    message.push_uint(VERSION as u64, 8);
    message.push_uint(kind as u64, 4);
    message.push_uint(service_id as u64, 6);
    message.push_uint(account as u64, 25);
    message.push_bit(true); // reserved
    message.push_zeros(64); // MAC placeholder
    message.push_bits(&encrypted, ENCRYPTED_BITS);
    debug_assert_eq!(message.len(), FRAME_LEN * 8);

    let mac = hmac_sha256(mac_key, &message.to_bytes());
    message.overwrite(MAC_OFFSET, &mac[..8]);

    Ok(message.to_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits;
    use crate::crypto::aes_ctr_decrypt;

    struct ZeroRandom;

    impl RandomSource for ZeroRandom {
        fn fill(&mut self, buf: &mut [u8]) {
            buf.fill(0);
        }
    }

    fn frame_with_zeroed_mac(frame: &[u8]) -> Vec<u8> {
        let mut buffer = BitBuffer::from_bytes(frame);
        buffer.overwrite(MAC_OFFSET, &[0u8; 8]);
        buffer.to_bytes()
    }

    #[test]
    fn test_frame_length() {
        let mut rng = ZeroRandom;
        let frame = build_barcode(
            BarcodeKind::ActivationStart,
            42,
            Payload::Bytes(&[1, 2, 3]),
            &[0u8; 16],
            &[0u8; 16],
            1,
            &mut rng,
        )
        .unwrap();
        assert_eq!(frame.len(), FRAME_LEN);
    }

    #[test]
    fn test_header_fields() {
        let mut rng = ZeroRandom;
        let frame = build_barcode(
            BarcodeKind::ActivationContinue,
            1023,
            Payload::Bytes(&[]),
            &[0u8; 16],
            &[0u8; 16],
            63,
            &mut rng,
        )
        .unwrap();
        // version 3, type 2, service 63, account 1023, reserved bit
        assert_eq!(frame[0], 3);
        assert_eq!(bits::extract(&frame, 8, 4), vec![0x20]);
        assert_eq!(bits::extract(&frame, 12, 6), vec![0xFC]);
        assert_eq!(bits::extract(&frame, 18, 25), vec![0x00, 0x01, 0xFF, 0x80]);
        assert_eq!(bits::extract(&frame, 43, 1), vec![0x80]);
    }

    #[test]
    fn test_mac_over_zeroed_field() {
        // spot check against the frame with the MAC re-zeroed
        let mut rng = ZeroRandom;
        let frame = build_barcode(
            BarcodeKind::Transaction,
            1023,
            Payload::Bytes(&[0u8; 59]),
            &[0u8; 16],
            &[0u8; 16],
            0,
            &mut rng,
        )
        .unwrap();
        let expected = hmac_sha256(&[0u8; 16], &frame_with_zeroed_mac(&frame));
        assert_eq!(bits::extract(&frame, MAC_OFFSET, 64), expected[..8].to_vec());
    }

    #[test]
    fn test_payload_recoverable() {
        let mut rng = ZeroRandom;
        let key = [0x11u8; 16];
        let payload = [0xAB; 33];
        let frame = build_barcode(
            BarcodeKind::ActivationStart,
            7,
            Payload::Bytes(&payload),
            &key,
            &[0u8; 16],
            1,
            &mut rng,
        )
        .unwrap();
        // encrypted field spans bits [108, 712); nonce is its first 16 bytes
        let nonce = bits::extract(&frame, NONCE_OFFSET, 128);
        assert_eq!(nonce, vec![0u8; 16]);
        // only 604 of the 608 encrypted bits are carried; the dropped 4 bits
        // sit in the final ciphertext byte, so the first 59 plaintext bytes
        // survive intact
        let mut carried = bits::extract(&frame, NONCE_OFFSET, ENCRYPTED_BITS);
        carried.resize(76, 0);
        let decrypted = aes_ctr_decrypt(&key, &carried);
        assert_eq!(&decrypted[..33], &payload[..]);
        assert_eq!(&decrypted[33..59], &[0u8; 26][..]);
    }

    #[test]
    fn test_payload_bits() {
        let mut rng = ZeroRandom;
        let mut payload = BitBuffer::new();
        payload.push_bit(false);
        payload.push_zeros(475);
        assert!(build_barcode(
            BarcodeKind::Transaction,
            0,
            Payload::Bits(&payload),
            &[0u8; 16],
            &[0u8; 16],
            1,
            &mut rng,
        )
        .is_ok());
    }

    #[test]
    fn test_payload_too_long() {
        let mut rng = ZeroRandom;
        let result = build_barcode(
            BarcodeKind::Transaction,
            0,
            Payload::Bytes(&[0u8; 60]),
            &[0u8; 16],
            &[0u8; 16],
            1,
            &mut rng,
        );
        assert!(matches!(result, Err(CaurusError::PayloadTooLong(60))));

        let mut bits = BitBuffer::new();
        bits.push_zeros(477);
        let result = build_barcode(
            BarcodeKind::Transaction,
            0,
            Payload::Bits(&bits),
            &[0u8; 16],
            &[0u8; 16],
            1,
            &mut rng,
        );
        assert!(matches!(result, Err(CaurusError::PayloadTooLong(477))));
    }
}
