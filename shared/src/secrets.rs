//! Secret retrieval from SSM Parameter Store or Secrets Manager.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client as SecretsClient;
use aws_sdk_ssm::Client as SsmClient;
use tokio::sync::OnceCell;

use crate::{Error, Result};

/// A backend that can resolve a named secret to its string value.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// SSM Parameter Store, reading `SecureString` parameters with decryption.
pub struct SsmParameterStore {
    client: SsmClient,
}

impl SsmParameterStore {
    pub fn new(client: SsmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SsmParameterStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to get parameter: {}", e)))?;

        response
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| Error::Aws(format!("Parameter {} has no value", name)))
    }
}

/// AWS Secrets Manager, reading the secret string.
pub struct SecretsManagerStore {
    client: SecretsClient,
}

impl SecretsManagerStore {
    pub fn new(client: SecretsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))
    }
}

/// A single secret fetched on first use and reused for the rest of the process.
///
/// Failed lookups are not cached; the next call retries.
pub struct CachedSecret {
    store: Arc<dyn SecretStore>,
    name: String,
    value: OnceCell<String>,
}

impl CachedSecret {
    pub fn new(store: Arc<dyn SecretStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
            value: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self) -> Result<&str> {
        let value = self
            .value
            .get_or_try_init(|| self.store.get_secret(&self.name))
            .await?;
        Ok(value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSecret;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_secret_is_fetched_once() {
        let store = Arc::new(StaticSecret::new(Some("sk-test")));
        let secret = CachedSecret::new(store.clone(), "/sunset/STABILITY_API_KEY");

        assert_eq!(secret.get().await.unwrap(), "sk-test");
        assert_eq!(secret.get().await.unwrap(), "sk-test");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_retried() {
        let store = Arc::new(StaticSecret::new(None));
        let secret = CachedSecret::new(store.clone(), "/sunset/STABILITY_API_KEY");

        assert!(secret.get().await.is_err());
        assert!(secret.get().await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
