//! Provider configuration and lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::CourierAdapter;
use crate::error::{CourierError, Result};
use crate::providers::{PathaoCourier, SteadfastCourier};

/// Connection and webhook settings for one provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API base URL, without a trailing slash.
    pub base_url: String,

    /// API key, or the OAuth client id for token-based providers.
    pub api_key: String,

    /// API secret, or the OAuth client secret.
    pub api_secret: String,

    /// Merchant account user, used by token-based providers.
    pub username: String,
    pub password: String,

    /// Shared secret for webhook signature checks.
    pub webhook_secret: Option<String>,

    /// Accept webhooks without a signature check.
    pub allow_unsigned: bool,
}

/// Courier subsystem configuration.
#[derive(Debug, Clone)]
pub struct CourierConfig {
    /// Provider used when a caller does not name one.
    pub default_provider: String,

    /// HTTP timeout applied to every provider call.
    pub request_timeout: Duration,

    pub pathao: Option<ProviderConfig>,
    pub steadfast: Option<ProviderConfig>,
}

/// Looks up courier adapters by provider name.
///
/// Built once at startup from [`CourierConfig`] and shared behind an
/// `Arc`. Construction is where webhook policy is enforced: an adapter
/// with no webhook secret and no explicit unsigned opt-in refuses to
/// build, and so does a registry whose default provider is missing.
#[derive(Debug)]
pub struct CourierRegistry {
    adapters: HashMap<String, Arc<dyn CourierAdapter>>,
    default_provider: String,
}

impl CourierRegistry {
    /// Creates an empty registry with the given default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            adapters: HashMap::new(),
            default_provider: default_provider.into().to_lowercase(),
        }
    }

    /// Builds a registry holding every configured provider.
    pub fn from_config(config: &CourierConfig) -> Result<Self> {
        let mut registry = Self::new(&config.default_provider);
        if let Some(provider) = &config.pathao {
            registry.register(Arc::new(PathaoCourier::new(
                provider.clone(),
                config.request_timeout,
            )?));
        }
        if let Some(provider) = &config.steadfast {
            registry.register(Arc::new(SteadfastCourier::new(
                provider.clone(),
                config.request_timeout,
            )?));
        }
        if !registry.adapters.contains_key(&registry.default_provider) {
            return Err(CourierError::Config(format!(
                "default courier '{}' is not configured",
                registry.default_provider
            )));
        }
        Ok(registry)
    }

    /// Adds an adapter under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn CourierAdapter>) {
        self.adapters.insert(adapter.name().to_lowercase(), adapter);
    }

    /// Looks up an adapter by name, case-insensitively.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CourierAdapter>> {
        self.adapters
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| CourierError::UnknownProvider(name.to_string()))
    }

    /// The adapter used when no provider is named.
    pub fn default_adapter(&self) -> Result<Arc<dyn CourierAdapter>> {
        self.get(&self.default_provider)
    }

    /// Name of the default provider.
    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Names of every registered provider.
    pub fn provider_names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubCourier;

    fn provider_config() -> ProviderConfig {
        ProviderConfig {
            base_url: "http://localhost:9".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            username: "merchant".to_string(),
            password: "pw".to_string(),
            webhook_secret: Some("shhh".to_string()),
            allow_unsigned: false,
        }
    }

    #[test]
    fn test_from_config_registers_configured_providers() {
        let registry = CourierRegistry::from_config(&CourierConfig {
            default_provider: "pathao".to_string(),
            request_timeout: Duration::from_secs(5),
            pathao: Some(provider_config()),
            steadfast: Some(provider_config()),
        })
        .unwrap();

        assert_eq!(registry.get("pathao").unwrap().name(), "pathao");
        assert_eq!(registry.get("steadfast").unwrap().name(), "steadfast");
        assert_eq!(registry.default_adapter().unwrap().name(), "pathao");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = CourierRegistry::from_config(&CourierConfig {
            default_provider: "Pathao".to_string(),
            request_timeout: Duration::from_secs(5),
            pathao: Some(provider_config()),
            steadfast: None,
        })
        .unwrap();

        assert!(registry.get("PATHAO").is_ok());
        assert_eq!(registry.default_provider(), "pathao");
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let mut registry = CourierRegistry::new("stub");
        registry.register(Arc::new(StubCourier::new()));

        let err = registry.get("redx").unwrap_err();
        assert!(matches!(err, CourierError::UnknownProvider(name) if name == "redx"));
    }

    #[test]
    fn test_missing_default_provider_fails_construction() {
        let err = CourierRegistry::from_config(&CourierConfig {
            default_provider: "pathao".to_string(),
            request_timeout: Duration::from_secs(5),
            pathao: None,
            steadfast: Some(provider_config()),
        })
        .unwrap_err();

        assert!(matches!(err, CourierError::Config(_)));
    }

    #[test]
    fn test_missing_webhook_secret_fails_construction() {
        let err = CourierRegistry::from_config(&CourierConfig {
            default_provider: "pathao".to_string(),
            request_timeout: Duration::from_secs(5),
            pathao: Some(ProviderConfig {
                webhook_secret: None,
                allow_unsigned: false,
                ..provider_config()
            }),
            steadfast: None,
        })
        .unwrap_err();

        assert!(matches!(err, CourierError::Config(_)));
    }
}
