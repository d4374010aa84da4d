//! Secret vault backed by the OS credential store
//!
//! Passwords live in Windows Credential Manager (or the platform keyring on
//! other hosts), addressed by an opaque per-account key. Callers never get to
//! enumerate what is stored.

use crate::error::VaultError;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Prefix for every secret key, and the keyring service name
pub const APP_PREFIX: &str = "LoLAccountLauncher";

/// Generate a fresh, unique secret key for a new account
pub fn new_secret_key() -> String {
    format!("{}_{}", APP_PREFIX, Uuid::new_v4())
}

/// A secret as read back from the vault
#[derive(Debug, Clone)]
pub struct StoredSecret {
    pub username: String,
    pub password: SecretString,
}

/// Store of account secrets keyed by opaque identifiers
pub trait SecretVault: Send + Sync {
    /// Create or overwrite the secret at `key`
    fn store(&self, key: &str, username: &str, password: &SecretString) -> Result<(), VaultError>;

    /// Read the secret at `key`
    ///
    /// Returns `Ok(None)` when nothing is stored there; that is not an error.
    fn retrieve(&self, key: &str) -> Result<Option<StoredSecret>, VaultError>;

    /// Delete the secret at `key`. Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), VaultError>;
}

/// Where a secret lives in the platform store
///
/// On Windows the credential's target name is the key itself and the account
/// username goes in the credential's user field, so Credential Manager shows
/// `LoLAccountLauncher_<id>` entries holding just the password. Other keyrings
/// file the secret under the app service with the key as user.
#[derive(Debug, PartialEq, Eq)]
struct CredentialAddress<'a> {
    target: Option<&'a str>,
    service: &'a str,
    user: &'a str,
}

fn credential_address<'a>(key: &'a str, username: &'a str) -> CredentialAddress<'a> {
    if cfg!(target_os = "windows") {
        CredentialAddress {
            target: Some(key),
            service: APP_PREFIX,
            user: username,
        }
    } else {
        CredentialAddress {
            target: None,
            service: APP_PREFIX,
            user: key,
        }
    }
}

/// Vault backed by the `keyring` crate (Credential Manager on Windows)
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringVault;

impl KeyringVault {
    pub fn new() -> Self {
        Self
    }

    fn entry(key: &str, username: &str) -> Result<keyring::Entry, VaultError> {
        let address = credential_address(key, username);
        let entry = match address.target {
            Some(target) => keyring::Entry::new_with_target(target, address.service, address.user),
            None => keyring::Entry::new(address.service, address.user),
        };
        entry.map_err(map_keyring_error)
    }

    /// Entry for reads and deletes. Lookups go by target, so the user field
    /// only needs to be non-empty.
    fn lookup_entry(key: &str) -> Result<keyring::Entry, VaultError> {
        Self::entry(key, key)
    }
}

fn map_keyring_error(err: keyring::Error) -> VaultError {
    match err {
        keyring::Error::NoStorageAccess(e) => VaultError::AccessDenied(e.to_string()),
        other => VaultError::StorageFailure(other.to_string()),
    }
}

/// Username saved alongside the password, read back from the credential
#[cfg(target_os = "windows")]
fn stored_username(entry: &keyring::Entry) -> String {
    entry
        .get_credential()
        .downcast_ref::<keyring::windows::WinCredential>()
        .and_then(|credential| credential.get_credential().ok())
        .map(|credential| credential.username)
        .unwrap_or_default()
}

#[cfg(not(target_os = "windows"))]
fn stored_username(_entry: &keyring::Entry) -> String {
    String::new()
}

impl SecretVault for KeyringVault {
    fn store(&self, key: &str, username: &str, password: &SecretString) -> Result<(), VaultError> {
        let entry = Self::entry(key, username)?;
        entry
            .set_password(password.expose_secret())
            .map_err(map_keyring_error)?;
        debug!("Stored secret under {}", key);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<StoredSecret>, VaultError> {
        let entry = Self::lookup_entry(key)?;
        match entry.get_password() {
            Ok(password) => Ok(Some(StoredSecret {
                username: stored_username(&entry),
                password: SecretString::from(password),
            })),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_keyring_error(e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        let entry = Self::lookup_entry(key)?;
        match entry.delete_credential() {
            Ok(()) => {
                debug!("Deleted secret {}", key);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_keyring_error(e)),
        }
    }
}

/// In-process vault for tests and dry runs
#[derive(Default)]
pub struct MemoryVault {
    secrets: Mutex<HashMap<String, StoredSecret>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredSecret>>, VaultError> {
        self.secrets
            .lock()
            .map_err(|_| VaultError::StorageFailure("vault lock poisoned".to_string()))
    }
}

impl SecretVault for MemoryVault {
    fn store(&self, key: &str, username: &str, password: &SecretString) -> Result<(), VaultError> {
        self.lock()?.insert(
            key.to_string(),
            StoredSecret {
                username: username.to_string(),
                password: password.clone(),
            },
        );
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<StoredSecret>, VaultError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
