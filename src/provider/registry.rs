//! Process-wide cache of provider clients.
//!
//! Clients are built on first use and live until the process exits. There is
//! no eviction and no credential refresh.

use super::client::ProviderClient;
use crate::config::BackendSettings;
use crate::conversation::DEFAULT_HISTORY_LIMIT;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
#[error("Unknown backend: {0}")]
pub struct UnknownBackend(pub String);

/// Lazily builds and caches one [`ProviderClient`] per backend id.
pub struct ClientRegistry {
    settings: HashMap<String, BackendSettings>,
    clients: Mutex<HashMap<String, Arc<ProviderClient>>>,
    history_limit: usize,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(settings: HashMap<String, BackendSettings>) -> Self {
        Self {
            settings,
            clients: Mutex::new(HashMap::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// History cap for clients built from now on (0 = unbounded).
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Configured backend ids, sorted.
    #[must_use]
    pub fn backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.settings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return the cached client for `backend`, building it on first use.
    ///
    /// Construction runs under the lock, so concurrent first calls for one id
    /// still produce a single client.
    pub fn resolve(&self, backend: &str) -> Result<Arc<ProviderClient>, UnknownBackend> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = clients.get(backend) {
            return Ok(Arc::clone(client));
        }

        let settings = self
            .settings
            .get(backend)
            .ok_or_else(|| UnknownBackend(backend.to_string()))?;

        tracing::info!(backend, model = settings.model(), "Creating provider client");
        let client = Arc::new(
            ProviderClient::from_settings(backend, settings).with_history_limit(self.history_limit),
        );
        clients.insert(backend.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Insert a prebuilt client, replacing any cached one.
    #[cfg(test)]
    pub(crate) fn seed(&self, client: ProviderClient) -> Arc<ProviderClient> {
        let client = Arc::new(client);
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client.name().to_string(), Arc::clone(&client));
        client
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("backends", &self.backends())
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ClientRegistry {
        ClientRegistry::new(HashMap::from([(
            "acme".to_string(),
            BackendSettings::OpenAiCompatible {
                base_url: "http://localhost:9/v1".into(),
                api_key: "sk".into(),
                model: "acme-large".into(),
            },
        )]))
    }

    #[test]
    fn test_resolve_is_cached() {
        let registry = registry();
        let first = registry.resolve("acme").unwrap();
        let second = registry.resolve("acme").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_history_shared_through_cache() {
        let registry = registry();
        registry
            .resolve("acme")
            .unwrap()
            .append_to_history(crate::provider::Role::User, "hi");
        assert_eq!(registry.resolve("acme").unwrap().history_len(), 1);
    }

    #[test]
    fn test_built_clients_use_history_limit() {
        let registry = registry().with_history_limit(1);
        let client = registry.resolve("acme").unwrap();
        client.append_to_history(crate::provider::Role::User, "one");
        client.append_to_history(crate::provider::Role::User, "two");
        assert_eq!(client.history_tail(5)[0].content, "two");
        assert_eq!(client.history_len(), 1);
    }

    #[test]
    fn test_unknown_backend() {
        let err = registry().resolve("nope").unwrap_err();
        assert_eq!(err.0, "nope");
        assert_eq!(err.to_string(), "Unknown backend: nope");
    }

    #[test]
    fn test_concurrent_resolve_single_instance() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve("acme").unwrap())
            })
            .collect();
        let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    }
}
