//! Protocol entry points: the three-phase activation ceremony and
//! transaction authorization.
//!
//! Each operation is a single synchronous computation; the only mutable
//! dependency is the injected random source, so callers may run operations
//! in parallel on separate contexts. Derived keys live in zeroize-on-drop
//! buffers, and the final code comparison in [`complete_activation`] is
//! constant-time.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::bits::{self, BitBuffer};
use crate::code::{code, code_c, deshuffle_code, shuffle_code};
use crate::crypto::{derive, hmac_sha256, RandomSource};
use crate::frame::{build_barcode, BarcodeKind, Payload, MAC_OFFSET, NONCE_OFFSET};
use crate::matrix::encode_barcode;
use crate::types::{CaurusError, MessageRow, Result};
use crate::text::{pack_pad_string, render_message};

/// Accounts are 10-bit.
pub const MAX_ACCOUNT: u16 = 1 << 10;

/// How strictly [`complete_activation`] validates the counter recovered
/// from the client's code. `Strict` requires `c mod 8 == 2`; `Lenient`
/// accepts any counter whose code verifies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodePolicy {
    #[default]
    Strict,
    Lenient,
}

/// Service identity plus the injected random source.
pub struct ServiceContext<R: RandomSource> {
    pub service_id: u8,
    pub service_mac: [u8; 16],
    pub service_key: [u8; 16],
    rng: R,
}

/// Result of [`ServiceContext::start_activation`].
pub struct StartActivation {
    pub account: u16,
    pub id: [u8; 16],
    pub key: [u8; 16],
    /// 7-digit confirmation code the client must display.
    pub code: String,
    pub modules: Vec<u8>,
}

/// Server-side state carried from `continue_activation` to
/// `complete_activation`.
pub struct ActivationState {
    pub salt_server: [u8; 16],
    pub frame: Vec<u8>,
}

/// Result of [`ServiceContext::continue_activation`].
pub struct ContinueActivation {
    pub state: ActivationState,
    pub modules: Vec<u8>,
}

/// Result of [`ServiceContext::transaction`].
pub struct Transaction {
    /// 6-digit confirmation code the client must display.
    pub code: String,
    pub modules: Vec<u8>,
}

fn check_account(account: u16) -> Result<u16> {
    if account < MAX_ACCOUNT {
        Ok(account)
    } else {
        Err(CaurusError::InvalidAccount(account as u32))
    }
}

impl<R: RandomSource> ServiceContext<R> {
    pub fn new(service_id: u8, service_mac: [u8; 16], service_key: [u8; 16], rng: R) -> Self {
        debug_assert!(service_id < 64);
        ServiceContext {
            service_id,
            service_mac,
            service_key,
            rng,
        }
    }

    fn fill_array<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        self.rng.fill(&mut buf);
        buf
    }

    /// Phase one of activation: issue fresh account credentials inside a
    /// barcode encrypted under the service keys, plus the 7-digit code the
    /// client derives from it.
    pub fn start_activation(&mut self, account: Option<u16>) -> Result<StartActivation> {
        let account = match account {
            Some(account) => check_account(account)?,
            None => u16::from_be_bytes(self.fill_array::<2>()) & (MAX_ACCOUNT - 1),
        };
        let id: [u8; 16] = self.fill_array();
        let key: [u8; 16] = self.fill_array();

        let mut payload = Zeroizing::new(Vec::with_capacity(33));
        payload.extend_from_slice(&key);
        payload.extend_from_slice(&id);
        payload.push(0);
        let service_key = self.service_key;
        let service_mac = self.service_mac;
        let frame = build_barcode(
            BarcodeKind::ActivationStart,
            account,
            Payload::Bytes(&payload),
            &service_key,
            &service_mac,
            self.service_id,
            &mut self.rng,
        )?;

        let kres = derive(&key, b"KRES", b"", 16);
        let c: u16 = 2;
        let mut b_data = BitBuffer::from_bytes(&frame);
        b_data.overwrite(MAC_OFFSET, &[0u8; 8]);
        b_data.push_uint(c as u64, 16);
        let b = hmac_sha256(&kres, &b_data.to_bytes());
        let code = shuffle_code(code(&[], &b, 3, c as u32, 7), 7);

        let modules = encode_barcode(&frame)?;
        Ok(StartActivation {
            account,
            id,
            key,
            code,
            modules,
        })
    }

    /// Phase two: send the server salt to the client, encrypted under keys
    /// derived from the account key established in phase one.
    pub fn continue_activation(
        &mut self,
        account: u16,
        id: &[u8; 16],
        key: &[u8; 16],
    ) -> Result<ContinueActivation> {
        check_account(account)?;
        let salt_server: [u8; 16] = self.fill_array();

        let mut payload = Zeroizing::new(Vec::with_capacity(32));
        payload.extend_from_slice(&salt_server);
        payload.extend_from_slice(id);
        let account_key = derive(key, b"KENC", b"", 16);
        let account_mac = derive(key, b"KMAC", b"", 16);
        let frame = build_barcode(
            BarcodeKind::ActivationContinue,
            account,
            Payload::Bytes(&payload),
            &account_key,
            &account_mac,
            self.service_id,
            &mut self.rng,
        )?;

        let modules = encode_barcode(&frame)?;
        Ok(ContinueActivation {
            state: ActivationState { salt_server, frame },
            modules,
        })
    }

    /// Authorize a transaction message, returning the barcode and the
    /// 6-digit code expected back from the user.
    pub fn transaction(
        &mut self,
        account: u16,
        key: &[u8; 16],
        salt: &[u8; 18],
        message: &[MessageRow],
    ) -> Result<Transaction> {
        check_account(account)?;
        let packed = pack_pad_string(&render_message(message), 3, ' ', 58)?;

        let mut payload = BitBuffer::new();
        payload.push_bit(false); // no amount
        payload.push_zeros(11);
        payload.push_bytes(&packed);
        debug_assert_eq!(payload.len(), 476);

        let kenc = derive(key, b"KENC", b"", 16);
        let kmac = derive(key, b"KMAC", b"", 16);
        let kder = derive(key, b"KDER", b"", 16);
        let kdres = derive(&kder, b"KDRES", salt, 16);

        let frame = build_barcode(
            BarcodeKind::Transaction,
            account,
            Payload::Bits(&payload),
            &kenc,
            &kmac,
            self.service_id,
            &mut self.rng,
        )?;

        let a = bits::extract(&frame, NONCE_OFFSET, 128);
        let c: u16 = 3;
        let mut b_data = frame.clone();
        b_data.extend_from_slice(&c.to_be_bytes());
        let b = hmac_sha256(&kdres, &b_data);
        let code = shuffle_code(code(&a, &b, 2, c as u32, 6), 6);

        let modules = encode_barcode(&frame)?;
        Ok(Transaction { code, modules })
    }
}

/// Phase three of activation: verify the 7-digit code the user transcribed
/// from the client and recover the shared 18-byte account salt.
///
/// Returns `None` on any verification failure; the comparison itself is
/// constant-time.
pub fn complete_activation(
    key: &[u8; 16],
    state: &ActivationState,
    code_input: &str,
    policy: CodePolicy,
) -> Option<[u8; 18]> {
    if code_input.len() != 7 {
        return None;
    }
    let given = deshuffle_code(code_input)?;

    let a = bits::extract(&state.frame, NONCE_OFFSET, 128);
    let c = code_c(given, &a, 13, 7);
    if policy == CodePolicy::Strict && c % 8 != 2 {
        return None;
    }
    let seed = (c / 8) as u16;

    let mut salt = [0u8; 18];
    salt[..2].copy_from_slice(&seed.to_be_bytes());
    salt[2..].copy_from_slice(&state.salt_server);

    let kder = derive(key, b"KDER", b"", 16);
    let kdres = derive(&kder, b"KDRES", &salt, 16);

    let mut b_data = state.frame.clone();
    b_data.extend_from_slice(&(c as u16).to_be_bytes());
    let b = hmac_sha256(&kdres, &b_data);

    let expected = code(&a, &b, 13, c, 7);
    if bool::from(expected.ct_eq(&given)) {
        Some(salt)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    /// Deterministic source: an incrementing byte counter.
    struct CounterRandom(u8);

    impl RandomSource for CounterRandom {
        fn fill(&mut self, buf: &mut [u8]) {
            for b in buf.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    fn test_context() -> ServiceContext<CounterRandom> {
        ServiceContext::new(1, [0xAA; 16], [0xBB; 16], CounterRandom(0))
    }

    #[test]
    fn test_start_activation_shape() {
        let mut ctx = test_context();
        let started = ctx.start_activation(Some(42)).unwrap();
        assert_eq!(started.account, 42);
        assert_eq!(started.code.len(), 7);
        assert!(started.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(started.modules.len(), 625);
    }

    #[test]
    fn test_start_activation_random_account() {
        let mut ctx = test_context();
        let started = ctx.start_activation(None).unwrap();
        assert!(started.account < MAX_ACCOUNT);
    }

    #[test]
    fn test_start_activation_rejects_account() {
        let mut ctx = test_context();
        assert!(matches!(
            ctx.start_activation(Some(1024)),
            Err(CaurusError::InvalidAccount(1024))
        ));
    }

    #[test]
    fn test_continue_activation_shape() {
        let mut ctx = test_context();
        let continued = ctx
            .continue_activation(5, &[0x11; 16], &[0x22; 16])
            .unwrap();
        assert_eq!(continued.state.frame.len(), 89);
        assert_eq!(continued.modules.len(), 625);
    }

    #[test]
    fn test_activation_code_is_deterministic() {
        // same RNG script, same code
        let first = test_context().start_activation(Some(1)).unwrap();
        let second = test_context().start_activation(Some(1)).unwrap();
        assert_eq!(first.code, second.code);
        assert_eq!(first.modules, second.modules);
    }

    #[test]
    fn test_transaction_shape() {
        let mut ctx = test_context();
        let message = vec![vec![Cell::plain("PAY"), Cell::plain("10 EUR")]];
        let result = ctx
            .transaction(3, &[0x22; 16], &[0x33; 18], &message)
            .unwrap();
        assert_eq!(result.code.len(), 6);
        assert!(result.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(result.modules.len(), 625);
    }

    #[test]
    fn test_transaction_rejects_account() {
        let mut ctx = test_context();
        assert!(ctx
            .transaction(60_000, &[0x22; 16], &[0x33; 18], &[])
            .is_err());
    }

    #[test]
    fn test_complete_activation_rejects_wrong_length() {
        let state = ActivationState {
            salt_server: [0; 16],
            frame: vec![0; 89],
        };
        assert!(complete_activation(&[0; 16], &state, "123456", CodePolicy::Strict).is_none());
        assert!(complete_activation(&[0; 16], &state, "abcdefg", CodePolicy::Strict).is_none());
    }
}
