//! In-memory repository with auto-increment primary keys
//!
//! Rows are kept in insertion order. An optional `Journal`, shared between
//! repositories, records every operation so callers can assert on ordering
//! across kinds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use super::criteria::{values_equal, Criteria};
use super::{FindOne, Repository, SaveOptions};
use crate::error::{OrmError, OrmResult};
use crate::record::{KindId, Record};
use crate::relationships::metadata::DEFAULT_PRIMARY_COLUMN;

/// Kind of operation recorded in a journal
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Find,
    FindOne,
    Create,
    Save { primary_key: Value },
    Delete { criteria: Criteria, affected: u64 },
}

/// A recorded repository operation
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub kind: KindId,
    pub operation: Operation,
}

/// Shared, ordered operation log
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: &KindId, operation: Operation) {
        self.entries.lock().push(JournalEntry {
            kind: kind.clone(),
            operation,
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Reference storage engine backed by process memory
#[derive(Debug)]
pub struct InMemoryRepository {
    kind: KindId,
    primary_column: String,
    rows: RwLock<Vec<Map<String, Value>>>,
    next_id: AtomicI64,
    journal: Option<Journal>,
    delete_failure: Mutex<Option<String>>,
}

impl InMemoryRepository {
    pub fn new(kind: impl Into<KindId>) -> Self {
        Self {
            kind: kind.into(),
            primary_column: DEFAULT_PRIMARY_COLUMN.to_string(),
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            journal: None,
            delete_failure: Mutex::new(None),
        }
    }

    pub fn with_primary_column(mut self, column: &str) -> Self {
        self.primary_column = column.to_string();
        self
    }

    /// Record operations into a shared journal
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Make every subsequent delete fail with the given engine message
    pub fn fail_deletes(&self, message: Option<&str>) {
        *self.delete_failure.lock() = message.map(str::to_string);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Snapshot of every stored row as a record
    pub fn all(&self) -> Vec<Record> {
        self.rows
            .read()
            .iter()
            .map(|row| Record::from_fields(self.kind.clone(), row.clone()))
            .collect()
    }

    fn journal(&self, operation: Operation) {
        if let Some(journal) = &self.journal {
            journal.record(&self.kind, operation);
        }
    }

    fn matching(&self, criteria: &Criteria) -> Vec<Record> {
        self.rows
            .read()
            .iter()
            .map(|row| Record::from_fields(self.kind.clone(), row.clone()))
            .filter(|record| criteria.matches(record))
            .collect()
    }

    fn store(&self, mut record: Record, options: SaveOptions) -> OrmResult<Record> {
        if record.kind() != &self.kind {
            return Err(OrmError::Query(format!(
                "Cannot save record of kind '{}' into repository for '{}'",
                record.kind(),
                self.kind
            )));
        }

        let primary_key = match record.primary_key(&self.primary_column) {
            Some(key) => {
                if let Some(numeric) = key.as_i64() {
                    self.next_id.fetch_max(numeric.saturating_add(1), Ordering::SeqCst);
                }
                key.clone()
            }
            None => {
                let next = self
                    .next_id
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| current.checked_add(1))
                    .map_err(|_| OrmError::Database(format!("Id sequence for '{}' is exhausted", self.kind)))?;
                let generated = Value::from(next);
                record.set(&self.primary_column, generated.clone());
                generated
            }
        };

        let stored = {
            let mut rows = self.rows.write();
            let existing = rows.iter_mut().find(|row| {
                row.get(&self.primary_column)
                    .map(|value| values_equal(value, &primary_key))
                    .unwrap_or(false)
            });

            match existing {
                Some(row) => {
                    for (column, value) in record.fields() {
                        row.insert(column.clone(), value.clone());
                    }
                    row.clone()
                }
                None => {
                    rows.push(record.fields().clone());
                    record.fields().clone()
                }
            }
        };

        self.journal(Operation::Save { primary_key });

        if options.reload {
            record.merge_fields(&stored);
        }
        Ok(record)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    fn kind(&self) -> &KindId {
        &self.kind
    }

    fn primary_column(&self) -> &str {
        &self.primary_column
    }

    async fn find(&self, criteria: &Criteria) -> OrmResult<Vec<Record>> {
        self.journal(Operation::Find);
        Ok(self.matching(criteria))
    }

    async fn find_one(&self, query: &FindOne) -> OrmResult<Option<Record>> {
        self.journal(Operation::FindOne);
        let criteria = query.to_criteria(&self.primary_column);
        Ok(self.matching(&criteria).into_iter().next())
    }

    async fn create(&self, input: Option<Record>) -> OrmResult<Record> {
        self.journal(Operation::Create);
        // Only columns survive construction; relations are not known here.
        let fields = input.map(Record::into_fields).unwrap_or_default();
        Ok(Record::from_fields(self.kind.clone(), fields))
    }

    async fn save(&self, record: Record, options: SaveOptions) -> OrmResult<Record> {
        self.store(record, options)
    }

    async fn save_many(&self, records: Vec<Record>, options: SaveOptions) -> OrmResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.store(record, options))
            .collect()
    }

    async fn delete(&self, criteria: &Criteria) -> OrmResult<u64> {
        if let Some(message) = self.delete_failure.lock().clone() {
            return Err(OrmError::Database(message));
        }

        let affected = {
            let mut rows = self.rows.write();
            let before = rows.len();
            rows.retain(|row| !criteria.matches(&Record::from_fields(self.kind.clone(), row.clone())));
            (before - rows.len()) as u64
        };

        self.journal(Operation::Delete {
            criteria: criteria.clone(),
            affected,
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_assigns_incrementing_ids() {
        let repository = InMemoryRepository::new("Post");
        let first = repository.save(Record::new("Post").with("title", "a"), SaveOptions::default()).await.unwrap();
        let second = repository.save(Record::new("Post").with("title", "b"), SaveOptions::default()).await.unwrap();

        assert_eq!(first.get("id"), Some(&json!(1)));
        assert_eq!(second.get("id"), Some(&json!(2)));
        assert_eq!(repository.len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_ids_advance_sequence() {
        let repository = InMemoryRepository::new("Post");
        repository.save(Record::new("Post").with("id", 10), SaveOptions::default()).await.unwrap();
        let next = repository.save(Record::new("Post"), SaveOptions::default()).await.unwrap();
        assert_eq!(next.get("id"), Some(&json!(11)));
    }

    #[tokio::test]
    async fn test_explicit_max_id_exhausts_sequence() {
        let repository = InMemoryRepository::new("Post");
        repository
            .save(Record::new("Post").with("id", i64::MAX), SaveOptions::default())
            .await
            .unwrap();

        let err = repository.save(Record::new("Post"), SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, OrmError::Database(_)));
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_save_updates_existing_row() {
        let repository = InMemoryRepository::new("Post");
        let saved = repository
            .save(Record::new("Post").with("title", "draft").with("views", 1), SaveOptions::default())
            .await
            .unwrap();

        let update = Record::new("Post").with("id", saved.get("id").cloned().unwrap()).with("title", "final");
        let reloaded = repository.save(update.clone(), SaveOptions::default()).await.unwrap();
        assert_eq!(reloaded.get("views"), Some(&json!(1)));
        assert_eq!(reloaded.get("title"), Some(&json!("final")));

        let not_reloaded = repository.save(update, SaveOptions::no_reload()).await.unwrap();
        assert!(not_reloaded.get("views").is_none());
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_foreign_kind() {
        let repository = InMemoryRepository::new("Post");
        let err = repository.save(Record::new("Photo"), SaveOptions::default()).await.unwrap_err();
        assert!(matches!(err, OrmError::Query(_)));
    }

    #[tokio::test]
    async fn test_find_and_delete_by_criteria() {
        let repository = InMemoryRepository::new("Tag");
        for owner in [3, 3, 4] {
            repository
                .save(Record::new("Tag").with("entityType", "Post").with("entityId", owner), SaveOptions::default())
                .await
                .unwrap();
        }

        let owned_by_three = Criteria::new().where_eq("entityId", 3);
        assert_eq!(repository.find(&owned_by_three).await.unwrap().len(), 2);
        assert_eq!(repository.delete(&owned_by_three).await.unwrap(), 2);
        assert_eq!(repository.len(), 1);
        assert!(repository.find_one(&FindOne::by_id(1)).await.unwrap().is_none());
        assert!(repository.find_one(&FindOne::by_id(3)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_drops_relations() {
        use crate::relationships::Resolved;

        let repository = InMemoryRepository::new("Comment");
        let input = Record::new("Comment")
            .with("body", "hi")
            .with_relation("owner", Resolved::Single(None));
        let created = repository.create(Some(input)).await.unwrap();

        assert_eq!(created.get("body"), Some(&json!("hi")));
        assert!(created.relation("owner").is_none());
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_journal_and_delete_failure() {
        let journal = Journal::new();
        let repository = InMemoryRepository::new("Tag").with_journal(journal.clone());

        repository.find(&Criteria::new()).await.unwrap();
        repository.fail_deletes(Some("disk full"));
        let err = repository.delete(&Criteria::new()).await.unwrap_err();
        assert_eq!(err, OrmError::Database("disk full".to_string()));

        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Find);
        assert_eq!(entries[0].kind.as_str(), "Tag");
    }
}
