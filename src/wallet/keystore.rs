//! Delegated wallet keys
//!
//! Each session trades from its own wallet. The key is derived on demand as
//! `keccak256(master_secret || session_id)` and never stored.

use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use super::SessionSigner;
use crate::{Error, Result};

/// Source of the private key controlling a session's delegated wallet
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Hex-encoded key, or `None` when the session has no wallet
    async fn private_key(&self, session_id: Uuid) -> Result<Option<SecretString>>;
}

/// Derives session keys from a master secret
pub struct DerivedKeyStore {
    master: SecretString,
}

impl DerivedKeyStore {
    pub fn new(master: SecretString) -> Result<Self> {
        if master.expose_secret().trim().is_empty() {
            return Err(Error::Config("Master key is empty".to_string()));
        }
        Ok(Self { master })
    }

    /// Read the master secret from `var_name`
    pub fn from_env(var_name: &str) -> Result<Self> {
        let master = std::env::var(var_name).map_err(|_| {
            Error::Config(format!(
                "Environment variable {} not set. Required to derive session wallets.",
                var_name
            ))
        })?;
        Self::new(SecretString::from(master))
    }

    fn derive(&self, session_id: Uuid) -> B256 {
        let master = self.master.expose_secret().as_bytes();
        let mut material = Vec::with_capacity(master.len() + 16);
        material.extend_from_slice(master);
        material.extend_from_slice(session_id.as_bytes());
        keccak256(&material)
    }

    /// Address of the wallet a session should be funded at
    pub fn derive_wallet_address(&self, session_id: Uuid) -> Result<Address> {
        Ok(SessionSigner::from_bytes(&self.derive(session_id))?.address())
    }
}

#[async_trait]
impl KeyStore for DerivedKeyStore {
    async fn private_key(&self, session_id: Uuid) -> Result<Option<SecretString>> {
        Ok(Some(SecretString::from(self.derive(session_id).to_string())))
    }
}

impl std::fmt::Debug for DerivedKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeyStore")
            .field("master", &"[REDACTED]")
            .finish()
    }
}
