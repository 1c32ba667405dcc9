//! Repository Module - the generic storage engine seam
//!
//! The resolver never talks to a database directly. Every engine it layers
//! over, and every target kind it hydrates from, is reached through the
//! `Repository` trait:
//!
//! - `criteria`: equality-style lookup conditions
//! - `locator`: kind -> repository mapping
//! - `memory`: in-process reference engine
//! - `postgres`: sqlx-backed engine

pub mod criteria;
pub mod locator;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrmResult;
use crate::record::{KindId, Record};
use crate::relationships::metadata::DEFAULT_PRIMARY_COLUMN;

pub use criteria::{Condition, Criteria, Operator};
pub use locator::{RepositoryLocator, RepositoryRegistry};
pub use memory::{InMemoryRepository, Journal, JournalEntry, Operation};
pub use postgres::{create_pool, PoolConfig, PostgresRepository};

/// Single-record lookup: by primary key or by criteria
#[derive(Debug, Clone, PartialEq)]
pub enum FindOne {
    ById(Value),
    Where(Criteria),
}

impl FindOne {
    pub fn by_id(id: impl Into<Value>) -> Self {
        FindOne::ById(id.into())
    }

    /// Express the lookup as criteria against the given primary column
    pub fn to_criteria(&self, primary_column: &str) -> Criteria {
        match self {
            FindOne::ById(id) => Criteria::new().where_eq(primary_column, id.clone()),
            FindOne::Where(criteria) => criteria.clone(),
        }
    }
}

impl From<Criteria> for FindOne {
    fn from(criteria: Criteria) -> Self {
        FindOne::Where(criteria)
    }
}

/// Options passed through to the engine's save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Refresh the returned record from the stored row
    pub reload: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { reload: true }
    }
}

impl SaveOptions {
    /// Skip the post-save reload
    pub fn no_reload() -> Self {
        Self { reload: false }
    }
}

/// Generic record storage bound to one record kind
#[async_trait]
pub trait Repository: Send + Sync {
    /// The kind of record this repository stores
    fn kind(&self) -> &KindId;

    /// Primary key column of the stored kind
    fn primary_column(&self) -> &str {
        DEFAULT_PRIMARY_COLUMN
    }

    /// All records matching the criteria
    async fn find(&self, criteria: &Criteria) -> OrmResult<Vec<Record>>;

    /// The first record matching the lookup
    async fn find_one(&self, query: &FindOne) -> OrmResult<Option<Record>>;

    /// Build a new, unsaved record from optional input
    async fn create(&self, input: Option<Record>) -> OrmResult<Record>;

    async fn create_many(&self, inputs: Vec<Record>) -> OrmResult<Vec<Record>> {
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            created.push(self.create(Some(input)).await?);
        }
        Ok(created)
    }

    /// Insert or update a record
    async fn save(&self, record: Record, options: SaveOptions) -> OrmResult<Record>;

    /// Insert or update records, preserving input order
    async fn save_many(&self, records: Vec<Record>, options: SaveOptions) -> OrmResult<Vec<Record>>;

    /// Delete matching records, returning the number removed
    async fn delete(&self, criteria: &Criteria) -> OrmResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_one_by_id_criteria() {
        let criteria = FindOne::by_id(5).to_criteria("uuid");
        assert_eq!(criteria, Criteria::new().where_eq("uuid", 5));

        let explicit = FindOne::from(Criteria::new().where_eq("slug", "hello"));
        assert_eq!(explicit.to_criteria("id"), Criteria::new().where_eq("slug", json!("hello")));
    }

    #[test]
    fn test_save_options_default_reloads() {
        assert!(SaveOptions::default().reload);
        assert!(!SaveOptions::no_reload().reload);
    }
}
