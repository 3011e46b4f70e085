//! In-memory accounts and login tokens.

use std::collections::HashMap;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::error::{SessionError, SessionResult};

/// Longest accepted username, in bytes.
const MAX_USERNAME: usize = 32;

/// Registered accounts. Passwords are kept only as keyed SipHash digests.
#[derive(Debug)]
pub struct AccountStore {
    digests: HashMap<String, u64>,
    tokens: HashMap<String, String>,
    keys: (u64, u64),
}

impl AccountStore {
    /// Creates an empty store digesting with the given SipHash keys.
    #[must_use]
    pub fn new(key0: u64, key1: u64) -> Self {
        Self {
            digests: HashMap::new(),
            tokens: HashMap::new(),
            keys: (key0, key1),
        }
    }

    fn digest(&self, username: &str, password: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(self.keys.0, self.keys.1);
        hasher.write(username.as_bytes());
        hasher.write_u8(0xFF);
        hasher.write(password.as_bytes());
        hasher.finish()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Returns true if nobody registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// `AuthFailure` for empty or oversized credentials or a taken name.
    pub fn register(&mut self, username: &str, password: &str) -> SessionResult<()> {
        if username.is_empty() || password.is_empty() {
            return Err(SessionError::AuthFailure("empty credentials"));
        }
        if username.len() > MAX_USERNAME {
            return Err(SessionError::AuthFailure("username too long"));
        }
        if self.digests.contains_key(username) {
            return Err(SessionError::AuthFailure("username taken"));
        }
        let digest = self.digest(username, password);
        self.digests.insert(username.to_owned(), digest);
        Ok(())
    }

    /// Checks a password.
    ///
    /// # Errors
    ///
    /// `AuthFailure` for an unknown user or a wrong password.
    pub fn verify(&self, username: &str, password: &str) -> SessionResult<()> {
        match self.digests.get(username) {
            Some(&digest) if digest == self.digest(username, password) => Ok(()),
            _ => Err(SessionError::AuthFailure("bad credentials")),
        }
    }

    /// Binds `token` to `username`, revoking any token issued before.
    pub fn issue_token(&mut self, username: &str, token: String) {
        self.tokens.retain(|_, owner| owner != username);
        self.tokens.insert(token, username.to_owned());
    }

    /// Username a token belongs to.
    #[must_use]
    pub fn redeem(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_verify() {
        let mut accounts = AccountStore::new(1, 2);
        accounts.register("ada", "lovelace").unwrap();
        assert!(accounts.verify("ada", "lovelace").is_ok());
        assert!(accounts.verify("ada", "babbage").is_err());
        assert!(accounts.verify("bob", "lovelace").is_err());
        assert_eq!(
            accounts.register("ada", "other"),
            Err(SessionError::AuthFailure("username taken"))
        );
        assert_eq!(accounts.len(), 1);
    }

    #[test]
    fn test_digest_depends_on_key() {
        let a = AccountStore::new(1, 2);
        let b = AccountStore::new(3, 4);
        assert_ne!(a.digest("ada", "pw"), b.digest("ada", "pw"));
    }

    #[test]
    fn test_new_token_revokes_old() {
        let mut accounts = AccountStore::new(0, 0);
        accounts.issue_token("ada", "first".into());
        accounts.issue_token("ada", "second".into());
        assert_eq!(accounts.redeem("first"), None);
        assert_eq!(accounts.redeem("second"), Some("ada"));
    }
}
