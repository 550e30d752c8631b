use crate::secrets::string::SecretString;
use crate::secrets::{SecretManager, SERVICE_NAME};
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache for secrets resolved by `SecretManager`.
///
/// Avoids hitting the OS keychain on every Jira or LLM request.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    /// Creates a new SecretCache wrapping the provided SecretManager
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a cache pre-populated with fixed values and no backing lookup
    /// beyond the environment. Used by tests and embedders that inject
    /// credentials directly.
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        let cache = Self::new(Arc::new(SecretManager::new(SERVICE_NAME)));
        if let Ok(mut map) = cache.cache.write() {
            for (key, value) in values {
                map.insert(key.to_string(), SecretString::new(*value));
            }
        }
        cache
    }

    /// Retrieves a secret, checking the memory cache first.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| EngineError::KeyringError("Secret cache lock poisoned".to_string()))?;
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let secret = SecretString::new(self.manager.get_secret(key)?);

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|_| EngineError::KeyringError("Secret cache lock poisoned".to_string()))?;
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// Whether `key` resolves without error
    pub fn has_secret(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}
