//! caurus-core: server side of the cronto-v3 two-factor scheme.
//!
//! Pure pipeline, no network: each operation builds an authenticated,
//! encrypted colour barcode (CRC-24 + Reed-Solomon + fixed alignment
//! interleave) and derives the short decimal code a scanning client will
//! display back to the user. This crate is the shared core used by the
//! `caurus` CLI.

pub mod bits;
pub mod code;
pub mod config;
pub mod crc;
pub mod crypto;
pub mod frame;
pub mod matrix;
pub mod protocol;
pub mod rs;
pub mod text;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{load_config, save_config, AccountRecord, Config, ServiceConfig};
pub use crypto::{OsRandom, RandomSource};
pub use frame::{build_barcode, BarcodeKind, Payload};
pub use matrix::encode_barcode;
pub use protocol::{
    complete_activation, ActivationState, CodePolicy, ContinueActivation, ServiceContext,
    StartActivation, Transaction,
};
pub use types::*;
