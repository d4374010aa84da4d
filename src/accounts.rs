//! Account registry
//!
//! Keeps the saved accounts and their display order in `accounts.db`. Each
//! account points at exactly one vault secret through `credential_key`; the
//! registry creates that secret with the account and deletes it with it.

use crate::error::{LauncherError, Result};
use crate::vault::{new_secret_key, SecretVault};
use rusqlite::{params, Connection, OptionalExtension, Row};
use secrecy::SecretString;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    /// Vault key of the account's password; never the password itself
    pub secret_key: String,
    pub display_name: String,
    pub order_index: i64,
}

impl Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            // Rows from before the vault existed have no key
            secret_key: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            display_name: row.get(3)?,
            order_index: row.get(4)?,
        })
    }
}

const SELECT_ACCOUNT: &str = "SELECT id, username, credential_key, \
     COALESCE(display_name, username, ''), COALESCE(order_index, id) FROM accounts";

pub struct AccountRegistry {
    conn: Connection,
}

impl AccountRegistry {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(5_000))?;
        let registry = Self { conn };
        registry.init_schema()?;
        debug!("Opened account registry at {}", path.display());
        Ok(registry)
    }

    pub fn open_in_memory() -> Result<Self> {
        let registry = Self {
            conn: Connection::open_in_memory()?,
        };
        registry.init_schema()?;
        Ok(registry)
    }

    /// Creates the table and upgrades databases written before credential keys,
    /// display names or ordering existed
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                credential_key TEXT NOT NULL,
                display_name TEXT,
                order_index INTEGER
            );",
        )?;

        self.ensure_column("credential_key", "TEXT")?;
        self.ensure_column("display_name", "TEXT")?;
        self.ensure_column("order_index", "INTEGER")?;

        self.conn.execute_batch(
            "UPDATE accounts SET display_name = username WHERE display_name IS NULL;
             UPDATE accounts SET order_index = id WHERE order_index IS NULL;",
        )?;
        Ok(())
    }

    fn ensure_column(&self, name: &str, definition: &str) -> Result<()> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(accounts)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if !columns.iter().any(|c| c == name) {
            info!("Adding column accounts.{}", name);
            self.conn.execute_batch(&format!(
                "ALTER TABLE accounts ADD COLUMN {} {};",
                name, definition
            ))?;
        }
        Ok(())
    }

    /// All accounts in display order
    pub fn list(&self) -> Result<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY order_index, id", SELECT_ACCOUNT))?;
        let accounts = stmt
            .query_map([], Account::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    /// `(account_username, secret_key)` pairs in display order
    pub fn credential_refs(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|a| (a.username, a.secret_key))
            .collect())
    }

    pub fn get(&self, id: i64) -> Result<Account> {
        self.conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_ACCOUNT),
                [id],
                Account::from_row,
            )
            .optional()?
            .ok_or_else(|| LauncherError::AccountNotFound(id.to_string()))
    }

    /// Look up by numeric id, then username, then display name (case-insensitive)
    pub fn find(&self, query: &str) -> Result<Account> {
        if let Ok(id) = query.parse::<i64>() {
            if let Ok(account) = self.get(id) {
                return Ok(account);
            }
        }

        let accounts = self.list()?;
        accounts
            .iter()
            .find(|a| a.username.eq_ignore_ascii_case(query))
            .or_else(|| {
                accounts
                    .iter()
                    .find(|a| a.display_name.eq_ignore_ascii_case(query))
            })
            .cloned()
            .ok_or_else(|| LauncherError::AccountNotFound(query.to_string()))
    }

    /// Save a new account at the end of the list, with a fresh vault secret
    pub fn add(
        &self,
        vault: &dyn SecretVault,
        username: &str,
        display_name: Option<&str>,
        password: &SecretString,
    ) -> Result<Account> {
        let username = validate_username(username)?;
        let display_name = display_name
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(username);

        let secret_key = new_secret_key();
        vault.store(&secret_key, username, password)?;

        let inserted = self.conn.execute(
            "INSERT INTO accounts (username, credential_key, display_name, order_index)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(order_index), -1) + 1 FROM accounts))",
            params![username, secret_key, display_name],
        );

        if let Err(e) = inserted {
            // Don't leave an orphaned secret behind
            if let Err(cleanup) = vault.delete(&secret_key) {
                warn!("Could not remove secret {}: {}", secret_key, cleanup);
            }
            return Err(e.into());
        }

        let account = self.get(self.conn.last_insert_rowid())?;
        info!("Account '{}' added", account.username);
        Ok(account)
    }

    /// Change username, display name and/or password. The secret key stays.
    pub fn update(
        &self,
        vault: &dyn SecretVault,
        id: i64,
        username: Option<&str>,
        display_name: Option<&str>,
        password: Option<&SecretString>,
    ) -> Result<Account> {
        let current = self.get(id)?;
        let username = match username {
            Some(name) => validate_username(name)?.to_string(),
            None => current.username.clone(),
        };
        let display_name = match display_name.map(str::trim) {
            Some("") => username.clone(),
            Some(name) => name.to_string(),
            None if current.display_name == current.username => username.clone(),
            None => current.display_name.clone(),
        };

        // A keyless legacy row gets its first key when a password is set
        let secret_key = if current.secret_key.is_empty() && password.is_some() {
            new_secret_key()
        } else {
            current.secret_key.clone()
        };

        match password {
            Some(password) => vault.store(&secret_key, &username, password)?,
            None if username != current.username && !secret_key.is_empty() => {
                match vault.retrieve(&secret_key)? {
                    Some(secret) => vault.store(&secret_key, &username, &secret.password)?,
                    None => warn!("No secret for account {} to rename", id),
                }
            }
            None => {}
        }

        self.conn.execute(
            "UPDATE accounts SET username = ?1, display_name = ?2, credential_key = ?3 WHERE id = ?4",
            params![username, display_name, secret_key, id],
        )?;

        info!("Account '{}' updated", username);
        self.get(id)
    }

    /// Delete the account and its secret
    pub fn remove(&self, vault: &dyn SecretVault, id: i64) -> Result<()> {
        let account = self.get(id)?;
        if !account.secret_key.is_empty() {
            vault.delete(&account.secret_key)?;
        }
        self.conn
            .execute("DELETE FROM accounts WHERE id = ?1", [id])?;
        info!("Account '{}' removed", account.username);
        Ok(())
    }

    /// Rewrite the display order to follow `ids`
    pub fn reorder(&self, ids: &[i64]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (index, id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE accounts SET order_index = ?1 WHERE id = ?2",
                params![index as i64, id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Move one account to `position` (0-based) in the display order
    pub fn move_to(&self, id: i64, position: usize) -> Result<()> {
        self.get(id)?;
        let mut ids: Vec<i64> = self.list()?.into_iter().map(|a| a.id).collect();
        ids.retain(|&other| other != id);
        ids.insert(position.min(ids.len()), id);
        self.reorder(&ids)
    }
}

fn validate_username(username: &str) -> Result<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidInput(
            "username cannot be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;
    use secrecy::ExposeSecret;
    use tempfile::tempdir;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn usernames(registry: &AccountRegistry) -> Vec<String> {
        registry
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.username)
            .collect()
    }

    #[test]
    fn test_add_stores_secret_under_fresh_key() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();

        let account = registry.add(&vault, "  Faker ", None, &secret("pw1")).unwrap();

        assert_eq!(account.username, "Faker");
        assert_eq!(account.display_name, "Faker");
        assert!(account.secret_key.starts_with("LoLAccountLauncher_"));
        let stored = vault.retrieve(&account.secret_key).unwrap().unwrap();
        assert_eq!(stored.username, "Faker");
        assert_eq!(stored.password.expose_secret(), "pw1");
    }

    #[test]
    fn test_empty_username_rejected() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();

        assert!(matches!(
            registry.add(&vault, "   ", None, &secret("pw")),
            Err(LauncherError::InvalidInput(_))
        ));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_in_display_order() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();
        let a = registry.add(&vault, "a", None, &secret("1")).unwrap();
        let b = registry.add(&vault, "b", None, &secret("2")).unwrap();
        let c = registry.add(&vault, "c", Some("Smurf"), &secret("3")).unwrap();

        assert_eq!(usernames(&registry), vec!["a", "b", "c"]);

        registry.reorder(&[c.id, a.id, b.id]).unwrap();
        assert_eq!(usernames(&registry), vec!["c", "a", "b"]);
        assert_eq!(
            registry.credential_refs().unwrap()[0],
            ("c".to_string(), c.secret_key.clone())
        );

        registry.move_to(c.id, 10).unwrap();
        assert_eq!(usernames(&registry), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_keys_are_stable_and_unique() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();
        let a = registry.add(&vault, "a", None, &secret("1")).unwrap();
        let b = registry.add(&vault, "b", None, &secret("2")).unwrap();
        assert_ne!(a.secret_key, b.secret_key);

        let renamed = registry
            .update(&vault, a.id, Some("a2"), None, Some(&secret("new")))
            .unwrap();
        assert_eq!(renamed.secret_key, a.secret_key);
        assert_eq!(renamed.display_name, "a2");
        let stored = vault.retrieve(&a.secret_key).unwrap().unwrap();
        assert_eq!(stored.username, "a2");
        assert_eq!(stored.password.expose_secret(), "new");
    }

    #[test]
    fn test_rename_keeps_password() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();
        let a = registry.add(&vault, "a", Some("Main"), &secret("keep-me")).unwrap();

        let renamed = registry.update(&vault, a.id, Some("b"), None, None).unwrap();

        assert_eq!(renamed.display_name, "Main");
        let stored = vault.retrieve(&a.secret_key).unwrap().unwrap();
        assert_eq!(stored.username, "b");
        assert_eq!(stored.password.expose_secret(), "keep-me");
    }

    #[test]
    fn test_remove_deletes_secret() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();
        let a = registry.add(&vault, "a", None, &secret("1")).unwrap();

        registry.remove(&vault, a.id).unwrap();

        assert!(vault.retrieve(&a.secret_key).unwrap().is_none());
        assert!(registry.list().unwrap().is_empty());
        assert!(matches!(
            registry.remove(&vault, a.id),
            Err(LauncherError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_find_by_id_username_or_display_name() {
        let vault = MemoryVault::new();
        let registry = AccountRegistry::open_in_memory().unwrap();
        let a = registry.add(&vault, "Faker", Some("Mid main"), &secret("1")).unwrap();

        assert_eq!(registry.find(&a.id.to_string()).unwrap(), a);
        assert_eq!(registry.find("faker").unwrap(), a);
        assert_eq!(registry.find("MID MAIN").unwrap(), a);
        assert!(registry.find("nobody").is_err());
    }

    #[test]
    fn test_upgrades_legacy_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE accounts (id INTEGER PRIMARY KEY, username TEXT, credential_key TEXT);
                 INSERT INTO accounts (username, credential_key) VALUES ('old', 'LoLAccountLauncher_x');",
            )
            .unwrap();
        }

        let registry = AccountRegistry::open(&path).unwrap();
        let accounts = registry.list().unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].display_name, "old");
        assert_eq!(accounts[0].order_index, accounts[0].id);
    }

    #[test]
    fn test_upgrades_schema_without_credential_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE accounts (id INTEGER PRIMARY KEY, username TEXT);
                 INSERT INTO accounts (username) VALUES ('ancient');",
            )
            .unwrap();
        }

        let vault = MemoryVault::new();
        let registry = AccountRegistry::open(&path).unwrap();
        let accounts = registry.list().unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].username, "ancient");
        assert_eq!(accounts[0].secret_key, "");
        assert_eq!(registry.find("ancient").unwrap(), accounts[0]);

        let added = registry.add(&vault, "fresh", None, &secret("pw")).unwrap();
        assert_eq!(usernames(&registry), vec!["ancient", "fresh"]);
        assert!(!added.secret_key.is_empty());

        registry.remove(&vault, accounts[0].id).unwrap();
        assert_eq!(usernames(&registry), vec!["fresh"]);
    }

    #[test]
    fn test_null_credential_key_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE accounts (id INTEGER PRIMARY KEY, username TEXT, credential_key TEXT);
                 INSERT INTO accounts (username, credential_key) VALUES ('keyless', NULL);
                 INSERT INTO accounts (username, credential_key) VALUES ('kept', 'LoLAccountLauncher_y');",
            )
            .unwrap();
        }

        let vault = MemoryVault::new();
        let registry = AccountRegistry::open(&path).unwrap();
        let accounts = registry.list().unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].secret_key, "");
        assert_eq!(accounts[1].secret_key, "LoLAccountLauncher_y");

        let rekeyed = registry
            .update(&vault, accounts[0].id, None, None, Some(&secret("pw")))
            .unwrap();
        assert!(rekeyed.secret_key.starts_with("LoLAccountLauncher_"));
        assert!(vault.retrieve(&rekeyed.secret_key).unwrap().is_some());

        registry.remove(&vault, accounts[1].id).unwrap();
        assert_eq!(usernames(&registry), vec!["keyless"]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("accounts.db");
        let vault = MemoryVault::new();
        {
            let registry = AccountRegistry::open(&path).unwrap();
            registry.add(&vault, "a", None, &secret("1")).unwrap();
        }

        let registry = AccountRegistry::open(&path).unwrap();
        assert_eq!(usernames(&registry), vec!["a"]);
    }
}
