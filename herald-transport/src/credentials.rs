//! Where transports look up secrets.
//!
//! Credentials are read every time a transport needs them rather than once at
//! start-up, so a key exported after the process started is still picked up.

use std::{collections::HashMap, fmt::Debug};

use parking_lot::RwLock;

pub const EMAIL_USER: &str = "EMAIL_USER";
pub const EMAIL_PASS: &str = "EMAIL_PASS";
pub const BREVO_API_KEY: &str = "BREVO_API_KEY";
pub const BREVO_SENDER_EMAIL: &str = "BREVO_SENDER_EMAIL";
pub const BREVO_SENDER_NAME: &str = "BREVO_SENDER_NAME";
pub const BREVO_LOGIN: &str = "BREVO_LOGIN";
pub const BREVO_TEST_RECIPIENT: &str = "BREVO_TEST_RECIPIENT";

pub trait CredentialSource: Send + Sync + Debug {
    /// Look up `key`, treating an empty value the same as a missing one
    fn get(&self, key: &str) -> Option<String>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Reads from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

/// An in-memory credential store that can be changed while transports hold it
#[derive(Debug, Default)]
pub struct StaticCredentials {
    values: RwLock<HashMap<String, String>>,
}

impl StaticCredentials {
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .get(key)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_missing() {
        let creds = StaticCredentials::new([(BREVO_API_KEY, "  "), (EMAIL_USER, "user")]);

        assert!(!creds.contains(BREVO_API_KEY));
        assert_eq!(creds.get(EMAIL_USER).as_deref(), Some("user"));
    }

    #[test]
    fn values_can_change_after_construction() {
        let creds = StaticCredentials::default();
        assert!(creds.get(BREVO_API_KEY).is_none());

        creds.set(BREVO_API_KEY, "xkeysib-123");
        assert_eq!(creds.get(BREVO_API_KEY).as_deref(), Some("xkeysib-123"));

        creds.remove(BREVO_API_KEY);
        assert!(creds.get(BREVO_API_KEY).is_none());
    }
}
