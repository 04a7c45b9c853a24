//! Delegated wallet management
//!
//! Private keys are only materialized inside this module, for the duration
//! of a single trade.

mod keystore;
mod signer;

pub use keystore::{DerivedKeyStore, KeyStore};
pub use signer::SessionSigner;
