//! The credential boundary: the core only asks for a key on demand.

use sentinel_core::SentinelError;
use std::sync::RwLock;

pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;

    /// Forget any key held in memory. Sources the process does not own
    /// (environment, OS keychain) are left alone.
    fn purge(&self) {}
}

/// Resolve the key or produce the user-facing "key missing" condition.
pub fn require_key(credentials: &dyn CredentialProvider) -> Result<String, SentinelError> {
    credentials
        .api_key()
        .filter(|k| !k.trim().is_empty())
        .ok_or(SentinelError::MissingCredential)
}

/// Reads the named environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl CredentialProvider for EnvCredentials {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// In-memory vault, cleared on purge.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    key: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: RwLock::new(key),
        }
    }

    pub fn store(&self, key: &str) {
        if let Ok(mut slot) = self.key.write() {
            *slot = Some(key.to_string());
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        self.key.read().ok().and_then(|k| k.clone())
    }

    fn purge(&self) {
        if let Ok(mut slot) = self.key.write() {
            *slot = None;
        }
    }
}

/// The session vault first, then the environment. Purging clears only the
/// vault, so an environment key survives it.
#[derive(Debug)]
pub struct VaultThenEnv {
    vault: StaticCredentials,
    env: EnvCredentials,
}

impl VaultThenEnv {
    pub fn new(env_var: &str) -> Self {
        Self {
            vault: StaticCredentials::default(),
            env: EnvCredentials::new(env_var),
        }
    }

    pub fn store(&self, key: &str) {
        self.vault.store(key);
    }
}

impl CredentialProvider for VaultThenEnv {
    fn api_key(&self) -> Option<String> {
        self.vault
            .api_key()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.env.api_key())
    }

    fn purge(&self) {
        self.vault.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_vault_lifecycle() {
        let vault = StaticCredentials::default();
        assert_eq!(require_key(&vault), Err(SentinelError::MissingCredential));

        vault.store("sk-test");
        assert_eq!(require_key(&vault).unwrap(), "sk-test");

        vault.purge();
        assert!(vault.api_key().is_none());
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let vault = StaticCredentials::new(Some("   ".into()));
        assert_eq!(require_key(&vault), Err(SentinelError::MissingCredential));
    }

    #[test]
    fn test_env_credentials_read_live() {
        let creds = EnvCredentials::new("SENTINEL_TEST_KEY_CREDENTIALS_RS");
        assert!(creds.api_key().is_none());
        std::env::set_var("SENTINEL_TEST_KEY_CREDENTIALS_RS", "abc");
        assert_eq!(creds.api_key().as_deref(), Some("abc"));
        std::env::remove_var("SENTINEL_TEST_KEY_CREDENTIALS_RS");
    }

    #[test]
    fn test_vault_wins_and_env_survives_purge() {
        let var = "SENTINEL_TEST_KEY_VAULT_THEN_ENV";
        std::env::set_var(var, "env-key");
        let creds = VaultThenEnv::new(var);
        assert_eq!(require_key(&creds).unwrap(), "env-key");

        creds.store("vault-key");
        assert_eq!(require_key(&creds).unwrap(), "vault-key");

        creds.purge();
        assert_eq!(require_key(&creds).unwrap(), "env-key");

        std::env::remove_var(var);
        assert_eq!(require_key(&creds), Err(SentinelError::MissingCredential));
    }
}
