//! Shared fixtures for polymorphic repository integration tests
#![allow(dead_code)]

use std::sync::Arc;

use polymorphic_orm::{
    InMemoryRepository, Journal, PolymorphicRegistry, PolymorphicRepository, Record, Repository,
    RepositoryRegistry, ResolverConfig, SaveOptions,
};

/// In-memory engines sharing one journal and one locator
pub struct Fixture {
    pub registry: Arc<PolymorphicRegistry>,
    pub repositories: RepositoryRegistry,
    pub journal: Journal,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(PolymorphicRegistry::new()),
            repositories: RepositoryRegistry::new(),
            journal: Journal::new(),
        }
    }

    /// Create an engine for `kind` and register it with the locator
    pub fn engine(&self, kind: &str) -> Arc<InMemoryRepository> {
        let engine = Arc::new(InMemoryRepository::new(kind).with_journal(self.journal.clone()));
        self.repositories.register(engine.clone());
        engine
    }

    /// Create an engine for `kind` without registering it
    pub fn unregistered_engine(&self, kind: &str) -> Arc<InMemoryRepository> {
        Arc::new(InMemoryRepository::new(kind).with_journal(self.journal.clone()))
    }

    pub fn polymorphic(&self, engine: Arc<InMemoryRepository>) -> PolymorphicRepository {
        self.polymorphic_with(engine, ResolverConfig::default())
    }

    pub fn polymorphic_with(&self, engine: Arc<InMemoryRepository>, config: ResolverConfig) -> PolymorphicRepository {
        PolymorphicRepository::new(engine, self.registry.clone(), Arc::new(self.repositories.clone()))
            .with_config(config)
    }
}

/// Save directly through an engine, bypassing any resolver
pub async fn insert(engine: &InMemoryRepository, record: Record) -> Record {
    engine.save(record, SaveOptions::default()).await.unwrap()
}

pub fn kinds(records: &[Record]) -> Vec<&str> {
    records.iter().map(|record| record.kind().as_str()).collect()
}
