use anyhow::{Result, anyhow};
use keyring::Entry;

const APP_NAME: &str = "mailpost";

/// Secrets that may live in the OS keyring instead of `settings.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    SmtpPassword,
    ApiKey,
}

impl Secret {
    pub const ALL: [Secret; 2] = [Secret::SmtpPassword, Secret::ApiKey];

    pub fn key(&self) -> &'static str {
        match self {
            Secret::SmtpPassword => "smtp_password",
            Secret::ApiKey => "api_key",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == name)
    }
}

pub struct RingStorage;

impl RingStorage {
    fn entry(secret: Secret) -> Result<Entry> {
        Entry::new(APP_NAME, secret.key()).map_err(|e| anyhow!("Keyring error: {}", e))
    }

    pub fn get(&self, secret: Secret) -> Result<Option<String>> {
        match Self::entry(secret)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow!("Keyring error: {}", e)),
        }
    }

    pub fn set(&self, secret: Secret, value: &str) -> Result<()> {
        Self::entry(secret)?
            .set_password(value)
            .map_err(|e| anyhow!("Keyring error: {}", e))
    }

    pub fn clear(&self, secret: Secret) -> Result<()> {
        match Self::entry(secret)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow!("Keyring error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_lookup_by_name() {
        for secret in Secret::ALL {
            assert_eq!(Secret::from_name(secret.key()), Some(secret));
        }
        assert_eq!(Secret::from_name("password"), None);
    }
}
