//! Cryptographic primitives: HMAC-SHA-256, keyed derivation, AES-128-CTR,
//! and the injectable random source.
//!
//! Nothing here is hand-rolled; AES and HMAC come from the RustCrypto
//! crates. Derived key material is handed out in [`Zeroizing`] buffers so it
//! is wiped when the invocation that produced it returns.

use aes::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Domain-separation label bound into every derived key.
const DERIVE_LABEL: &[u8] = b"\0cronto-v3\0";

// ---------------------------------------------------------------------------
// Random source
// ---------------------------------------------------------------------------

/// Injectable CSPRNG capability. Production code uses [`OsRandom`]; tests
/// supply scripted byte streams for reproducible frames and codes.
pub trait RandomSource {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}

/// Draw `n` fresh random bytes.
pub fn random_bytes<R: RandomSource>(n: usize, rng: &mut R) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rng.fill(&mut buf);
    buf
}

// ---------------------------------------------------------------------------
// HMAC and key derivation
// ---------------------------------------------------------------------------

/// HMAC-SHA-256 of `message` under `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Derive `n` bytes of key material bound to a role label and salt:
/// the first `n` bytes of
/// `HMAC(key, 0x00000001 || id || label || salt || be32(n * 8))`.
pub fn derive(key: &[u8], id: &[u8], salt: &[u8], n: usize) -> Zeroizing<Vec<u8>> {
    debug_assert!(n <= 32);
    let mut data = Vec::with_capacity(4 + id.len() + DERIVE_LABEL.len() + salt.len() + 4);
    data.extend_from_slice(&[0, 0, 0, 1]);
    data.extend_from_slice(id);
    data.extend_from_slice(DERIVE_LABEL);
    data.extend_from_slice(salt);
    data.extend_from_slice(&((n as u32) * 8).to_be_bytes());
    let mac = Zeroizing::new(hmac_sha256(key, &data));
    Zeroizing::new(mac[..n].to_vec())
}

// ---------------------------------------------------------------------------
// AES-CTR
// ---------------------------------------------------------------------------

/// Encrypt `message` under AES-128-CTR with a fresh 16-byte nonce drawn from
/// `rng`. Returns `nonce || ciphertext`. The nonce seeds the full 128-bit
/// big-endian block counter.
pub fn aes_ctr_encrypt<R: RandomSource>(key: &[u8], message: &[u8], rng: &mut R) -> Vec<u8> {
    let mut nonce = [0u8; 16];
    rng.fill(&mut nonce);
    let mut out = Vec::with_capacity(16 + message.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(message);
    let mut cipher =
        Aes128Ctr::new_from_slices(key, &nonce).expect("AES-128 key is 16 bytes");
    cipher.apply_keystream(&mut out[16..]);
    out
}

/// Decrypt the output of [`aes_ctr_encrypt`] (`nonce || ciphertext`).
/// CTR mode is its own inverse; this exists for the verifying side of tests.
pub fn aes_ctr_decrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let (nonce, ciphertext) = data.split_at(16);
    let mut out = ciphertext.to_vec();
    let mut cipher =
        Aes128Ctr::new_from_slices(key, nonce).expect("AES-128 key is 16 bytes");
    cipher.apply_keystream(&mut out);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out a fixed byte pattern; good enough to pin down nonces.
    struct FixedRandom(u8);

    impl RandomSource for FixedRandom {
        fn fill(&mut self, buf: &mut [u8]) {
            buf.fill(self.0);
        }
    }

    #[test]
    fn test_hmac_sha256_rfc4231_case_2() {
        // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        let expected = crate::types::hex_decode(
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
        )
        .unwrap();
        assert_eq!(mac.to_vec(), expected);
    }

    #[test]
    fn test_derive_structure() {
        // derive() must equal a manual HMAC over the documented layout
        let key = [0x22u8; 16];
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(b"KRES");
        data.extend_from_slice(b"\0cronto-v3\0");
        data.extend_from_slice(&128u32.to_be_bytes());
        let expected = &hmac_sha256(&key, &data)[..16];
        assert_eq!(&derive(&key, b"KRES", b"", 16)[..], expected);
    }

    #[test]
    fn test_derive_salt_and_label_matter() {
        let key = [7u8; 16];
        let base = derive(&key, b"KDER", b"", 16);
        assert_ne!(&derive(&key, b"KENC", b"", 16)[..], &base[..]);
        assert_ne!(&derive(&key, b"KDER", b"salt", 16)[..], &base[..]);
        assert_eq!(derive(&key, b"KDER", b"", 8).len(), 8);
    }

    #[test]
    fn test_aes_ctr_roundtrip() {
        let key = [0x01u8; 16];
        let mut rng = FixedRandom(0xA5);
        let plaintext = vec![0x42u8; 60];
        let encrypted = aes_ctr_encrypt(&key, &plaintext, &mut rng);
        assert_eq!(encrypted.len(), 76);
        assert_eq!(&encrypted[..16], &[0xA5u8; 16]);
        assert_eq!(aes_ctr_decrypt(&key, &encrypted), plaintext);
    }

    #[test]
    fn test_aes_ctr_zero_key_zero_nonce() {
        // AES-128-CTR keystream block 0 for all-zero key/counter is the ECB
        // encryption of the zero block.
        let mut rng = FixedRandom(0x00);
        let encrypted = aes_ctr_encrypt(&[0u8; 16], &[0u8; 16], &mut rng);
        let expected = crate::types::hex_decode("66e94bd4ef8a2c3b884cfa59ca342b2e").unwrap();
        assert_eq!(&encrypted[16..], &expected[..]);
    }

    #[test]
    fn test_random_bytes_uses_source() {
        let mut rng = FixedRandom(0x5C);
        assert_eq!(random_bytes(4, &mut rng), vec![0x5C; 4]);
    }
}
