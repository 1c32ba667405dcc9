//! Repository locator - maps a kind to the repository that stores it

use std::sync::Arc;

use dashmap::DashMap;

use super::Repository;
use crate::error::{OrmError, OrmResult};
use crate::record::KindId;

/// Finds the repository responsible for a record kind
pub trait RepositoryLocator: Send + Sync {
    /// The repository for `kind`, or `OrmError::RepositoryNotFound`
    fn locate(&self, kind: &KindId) -> OrmResult<Arc<dyn Repository>>;
}

/// Token-keyed repository map.
///
/// A kind resolves to its own name as token unless a custom repository token
/// was registered for it, in which case the custom repository is used.
#[derive(Clone, Default)]
pub struct RepositoryRegistry {
    repositories: Arc<DashMap<String, Arc<dyn Repository>>>,
    custom_tokens: Arc<DashMap<KindId, String>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under its own kind
    pub fn register(&self, repository: Arc<dyn Repository>) {
        let token = repository.kind().to_string();
        tracing::debug!("Registering repository for kind '{}'", token);
        self.repositories.insert(token, repository);
    }

    /// Register a custom repository token that serves `kind`
    pub fn register_custom(&self, kind: impl Into<KindId>, token: &str, repository: Arc<dyn Repository>) {
        let kind = kind.into();
        tracing::debug!("Registering custom repository '{}' for kind '{}'", token, kind);
        self.custom_tokens.insert(kind, token.to_string());
        self.repositories.insert(token.to_string(), repository);
    }

    /// The repository token used for a kind
    pub fn resolve_token(&self, kind: &KindId) -> String {
        self.custom_tokens
            .get(kind)
            .map(|token| token.value().clone())
            .unwrap_or_else(|| kind.to_string())
    }

    pub fn contains(&self, kind: &KindId) -> bool {
        self.repositories.contains_key(&self.resolve_token(kind))
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

impl RepositoryLocator for RepositoryRegistry {
    fn locate(&self, kind: &KindId) -> OrmResult<Arc<dyn Repository>> {
        let token = self.resolve_token(kind);
        self.repositories
            .get(&token)
            .map(|repository| repository.value().clone())
            .ok_or(OrmError::RepositoryNotFound(token))
    }
}
