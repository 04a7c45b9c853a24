//! Session signer
//!
//! SECURITY: the only holder of a session's private key.
//! - Keys are held in alloy's PrivateKeySigner
//! - Keys are never serialized or logged
//! - A signer lives for one trade and is dropped afterwards

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

pub struct SessionSigner {
    address: Address,
    wallet: EthereumWallet,
}

impl SessionSigner {
    /// Build from a hex-encoded key held in a secret
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        let key_hex = key.expose_secret();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|_| Error::Wallet("Invalid private key".to_string()))?;
        Ok(Self::from_signer(signer))
    }

    /// Build from raw key bytes
    pub fn from_bytes(key: &B256) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(key)
            .map_err(|_| Error::Wallet("Derived key is not a valid secp256k1 scalar".to_string()))?;
        Ok(Self::from_signer(signer))
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self {
            address,
            wallet: EthereumWallet::from(signer),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signing wallet for alloy providers; exposes no key material
    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("address", &self.address)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}
