//! Application state shared across HTTP handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::registry::{RegistrationCoordinator, TokenDomainGuard};
use crate::storage::traits::RegistryStorage;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
    /// Registration workflow engine
    pub coordinator: Arc<RegistrationCoordinator>,
    /// Allowed-domain management for applications and tokens
    pub domain_guard: Arc<TokenDomainGuard>,
    /// Registration state store
    pub storage: Arc<dyn RegistryStorage>,
}

#[cfg(test)]
pub(crate) fn test_app_state() -> AppState {
    use crate::keymanager::MemoryKeyManager;
    use crate::registry::{KeyedLocks, types::TokenValidity};
    use crate::storage::inmemory::MemoryRegistryStorage;

    let key_manager = Arc::new(MemoryKeyManager::new());
    let storage: Arc<MemoryRegistryStorage> = Arc::new(MemoryRegistryStorage::new());
    let token_locks = Arc::new(KeyedLocks::new());

    let coordinator = Arc::new(RegistrationCoordinator::new(
        key_manager.clone(),
        storage.clone(),
        token_locks.clone(),
        TokenValidity::KeyManagerDefault,
    ));
    let domain_guard = Arc::new(TokenDomainGuard::new(
        key_manager,
        storage.clone(),
        token_locks,
    ));

    let config = Arc::new(Config {
        version: "test".to_string(),
        http_port: "3000".to_string().try_into().unwrap(),
        certificate_bundles: "".to_string().try_into().unwrap(),
        user_agent: "test-user-agent".to_string(),
        http_client_timeout: "10s".to_string().try_into().unwrap(),
        key_manager_base: "".to_string().try_into().unwrap(),
        default_token_validity: "default".to_string().try_into().unwrap(),
        storage_backend: "memory".to_string(),
        database_url: None,
    });

    AppState {
        http_client: reqwest::Client::new(),
        config,
        coordinator,
        domain_guard,
        storage,
    }
}
