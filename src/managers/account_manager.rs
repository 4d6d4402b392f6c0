//! Account Manager for Bookshelf.
//!
//! Stores user accounts with PBKDF2-hashed passwords. Plaintext passwords
//! never reach the database.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::services::crypto_service::{CryptoService, CryptoServiceTrait};
use crate::types::account::Account;
use crate::types::errors::AccountError;

/// Trait defining account storage operations.
pub trait AccountManagerTrait {
    /// Lists accounts whose username contains `keyword` (all when empty).
    fn get_accounts(&self, keyword: &str) -> Result<Vec<Account>, AccountError>;
    fn get_account(&self, username: &str) -> Result<Account, AccountError>;
    /// Creates or replaces the account with the given username.
    fn save_account(&self, username: &str, password: &str, owner: bool) -> Result<Account, AccountError>;
    fn verify_password(&self, username: &str, password: &str) -> Result<bool, AccountError>;
    /// Changes password and owner flag after checking the old password.
    fn update_account(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
        owner: bool,
    ) -> Result<Account, AccountError>;
    fn delete_accounts(&self, usernames: &[String]) -> Result<(), AccountError>;
}

/// Account manager backed by a SQLite connection.
pub struct AccountManager<'a> {
    conn: &'a Connection,
    crypto: CryptoService,
}

impl<'a> AccountManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_crypto(conn, CryptoService::new())
    }

    /// Creates a manager with a specific crypto service (e.g. fewer iterations in tests).
    pub fn with_crypto(conn: &'a Connection, crypto: CryptoService) -> Self {
        Self { conn, crypto }
    }

    fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            owner: row.get(3)?,
        })
    }

    fn validate(username: &str, password: &str) -> Result<(), AccountError> {
        if username.trim().is_empty() {
            return Err(AccountError::InvalidInput("username must not be empty".to_string()));
        }
        if password.len() < 8 {
            return Err(AccountError::InvalidInput(
                "password must be at least 8 characters".to_string(),
            ));
        }
        Ok(())
    }
}

impl<'a> AccountManagerTrait for AccountManager<'a> {
    fn get_accounts(&self, keyword: &str) -> Result<Vec<Account>, AccountError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, password, owner FROM account \
                 WHERE username LIKE ?1 ORDER BY username",
            )
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        let pattern = format!("%{}%", keyword.trim());
        let rows = stmt
            .query_map(params![pattern], Self::row_to_account)
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AccountError::DatabaseError(e.to_string()))
    }

    fn get_account(&self, username: &str) -> Result<Account, AccountError> {
        self.conn
            .query_row(
                "SELECT id, username, password, owner FROM account WHERE username = ?1",
                params![username],
                Self::row_to_account,
            )
            .optional()
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?
            .ok_or_else(|| AccountError::NotFound(username.to_string()))
    }

    fn save_account(&self, username: &str, password: &str, owner: bool) -> Result<Account, AccountError> {
        Self::validate(username, password)?;
        let hash = self.crypto.hash_password(password).map_err(AccountError::Crypto)?;

        self.conn
            .execute(
                "INSERT INTO account (username, password, owner) VALUES (?1, ?2, ?3)
                 ON CONFLICT(username) DO UPDATE SET password = excluded.password, owner = excluded.owner",
                params![username, hash, owner],
            )
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        self.get_account(username)
    }

    fn verify_password(&self, username: &str, password: &str) -> Result<bool, AccountError> {
        let account = self.get_account(username)?;
        self.crypto
            .verify_password(password, &account.password)
            .map_err(AccountError::Crypto)
    }

    fn update_account(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
        owner: bool,
    ) -> Result<Account, AccountError> {
        if !self.verify_password(username, old_password)? {
            return Err(AccountError::PasswordMismatch);
        }
        self.save_account(username, new_password, owner)
    }

    fn delete_accounts(&self, usernames: &[String]) -> Result<(), AccountError> {
        if usernames.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM account WHERE username IN ({})",
            vec!["?"; usernames.len()].join(", ")
        );
        self.conn
            .execute(&sql, params_from_iter(usernames.iter()))
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
