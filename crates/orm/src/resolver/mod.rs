//! Resolver Module - polymorphic repository layered over a storage engine
//!
//! `PolymorphicRepository` holds the underlying engine for one kind and
//! exposes the same `Repository` surface. Kinds without polymorphic
//! declarations go straight through to the engine. Declared kinds get
//! their relations hydrated after loads and their discriminators stamped
//! (and optionally old children deleted) before saves.

mod hydrator;
mod persistence;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ResolverConfig;
use crate::error::OrmResult;
use crate::record::{KindId, Record};
use crate::relationships::{PolymorphicRegistry, RelationDescriptor};
use crate::repository::{Criteria, FindOne, Repository, RepositoryLocator, SaveOptions};

/// Repository for one record kind that resolves its polymorphic relations.
///
/// Because it is itself a `Repository`, it can be registered with a
/// locator as the target for another kind, in which case lookups against
/// it hydrate recursively. Two kinds that eagerly load each other through
/// polymorphic repositories recurse without bound; register the plain
/// engine for one side of such a pair.
#[derive(Clone)]
pub struct PolymorphicRepository {
    kind: KindId,
    inner: Arc<dyn Repository>,
    registry: Arc<PolymorphicRegistry>,
    locator: Arc<dyn RepositoryLocator>,
    config: ResolverConfig,
}

impl PolymorphicRepository {
    pub fn new(
        inner: Arc<dyn Repository>,
        registry: Arc<PolymorphicRegistry>,
        locator: Arc<dyn RepositoryLocator>,
    ) -> Self {
        Self {
            kind: inner.kind().clone(),
            inner,
            registry,
            locator,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The wrapped storage engine
    pub fn inner(&self) -> &Arc<dyn Repository> {
        &self.inner
    }

    pub fn is_polymorphic(&self) -> bool {
        self.registry.is_polymorphic(&self.kind)
    }

    /// Descriptors declared on the bound kind, in declaration order
    pub fn descriptors(&self) -> OrmResult<Arc<Vec<RelationDescriptor>>> {
        self.registry.descriptors(&self.kind)
    }
}

#[async_trait]
impl Repository for PolymorphicRepository {
    fn kind(&self) -> &KindId {
        &self.kind
    }

    fn primary_column(&self) -> &str {
        self.inner.primary_column()
    }

    async fn find(&self, criteria: &Criteria) -> OrmResult<Vec<Record>> {
        let records = self.inner.find(criteria).await?;
        if !self.is_polymorphic() {
            return Ok(records);
        }
        self.hydrate_records(records, true).await
    }

    async fn find_one(&self, query: &FindOne) -> OrmResult<Option<Record>> {
        let record = self.inner.find_one(query).await?;
        match record {
            Some(record) if self.is_polymorphic() => Ok(Some(self.hydrate_record(record, true).await?)),
            other => Ok(other),
        }
    }

    async fn create(&self, input: Option<Record>) -> OrmResult<Record> {
        self.create_with_relations(input).await
    }

    async fn save(&self, mut record: Record, options: SaveOptions) -> OrmResult<Record> {
        if !self.is_polymorphic() {
            return self.inner.save(record, options).await;
        }

        self.stamp_parents(&mut record)?;
        self.delete_polymorphs(std::slice::from_ref(&record)).await?;
        self.inner.save(record, options).await
    }

    async fn save_many(&self, mut records: Vec<Record>, options: SaveOptions) -> OrmResult<Vec<Record>> {
        if !self.is_polymorphic() {
            return self.inner.save_many(records, options).await;
        }

        for record in &mut records {
            self.stamp_parents(record)?;
        }
        self.delete_polymorphs(&records).await?;
        self.inner.save_many(records, options).await
    }

    async fn delete(&self, criteria: &Criteria) -> OrmResult<u64> {
        self.inner.delete(criteria).await
    }
}
