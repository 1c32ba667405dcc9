//! Hydration - resolving polymorphic relations onto loaded records

use futures::future::try_join_all;
use serde_json::Value;

use super::PolymorphicRepository;
use crate::config::DiscriminatorMatch;
use crate::error::OrmResult;
use crate::record::{KindId, Record};
use crate::relationships::{Lookup, RelationDescriptor, Resolved};
use crate::repository::{Criteria, FindOne};

impl PolymorphicRepository {
    /// Resolve every declared relation of a record
    pub async fn hydrate_one(&self, record: Record) -> OrmResult<Record> {
        self.hydrate_record(record, false).await
    }

    /// Resolve every declared relation of each record, keeping input order
    pub async fn hydrate_many(&self, records: Vec<Record>) -> OrmResult<Vec<Record>> {
        self.hydrate_records(records, false).await
    }

    pub(super) async fn hydrate_records(&self, records: Vec<Record>, eager_only: bool) -> OrmResult<Vec<Record>> {
        try_join_all(
            records
                .into_iter()
                .map(|record| self.hydrate_record(record, eager_only)),
        )
        .await
    }

    pub(super) async fn hydrate_record(&self, mut record: Record, eager_only: bool) -> OrmResult<Record> {
        let descriptors = self.descriptors()?;
        let selected: Vec<&RelationDescriptor> = descriptors
            .iter()
            .filter(|descriptor| !eager_only || descriptor.eager)
            .collect();

        if selected.is_empty() {
            return Ok(record);
        }

        let resolutions = try_join_all(
            selected
                .iter()
                .map(|descriptor| self.find_polymorphs(&record, descriptor)),
        )
        .await?;

        for (descriptor, resolved) in selected.iter().zip(resolutions) {
            record.set_relation(&descriptor.property_key, resolved);
        }
        Ok(record)
    }

    /// Resolve a single relation of a record without assigning it
    pub async fn find_polymorphs(&self, record: &Record, descriptor: &RelationDescriptor) -> OrmResult<Resolved> {
        if descriptor.is_parent() {
            self.find_parent(record, descriptor).await
        } else {
            self.find_children(record, descriptor).await
        }
    }

    /// A parent is always a single record or absent, whatever `has_many` says.
    async fn find_parent(&self, record: &Record, descriptor: &RelationDescriptor) -> OrmResult<Resolved> {
        let parent_kind = match record.get(descriptor.entity_type_column()) {
            Some(Value::String(kind)) if !kind.is_empty() => KindId::from(kind.as_str()),
            _ => return Ok(Resolved::Single(None)),
        };
        let Some(parent_id) = record.primary_key(descriptor.entity_id_column()) else {
            return Ok(Resolved::Single(None));
        };

        let repository = self.locator.locate(&parent_kind)?;
        tracing::debug!(
            "Resolving parent '{}' of {} from {} where {} = {}",
            descriptor.property_key,
            self.kind,
            parent_kind,
            descriptor.primary_column(),
            parent_id
        );

        let criteria = Criteria::new().where_eq(descriptor.primary_column(), parent_id.clone());
        let found = repository.find_one(&FindOne::Where(criteria)).await?;
        Ok(Resolved::single(found))
    }

    async fn find_children(&self, record: &Record, descriptor: &RelationDescriptor) -> OrmResult<Resolved> {
        // Unsaved owners cannot be referenced by anything yet.
        let Some(owner_id) = record.primary_key(descriptor.primary_column()) else {
            return Ok(Resolved::empty(descriptor.has_many));
        };

        let lookups = try_join_all(descriptor.target_kinds.iter().map(|target| async move {
            let repository = self.locator.locate(target)?;
            let criteria = Criteria::new()
                .where_eq(descriptor.entity_id_column(), owner_id.clone())
                .where_eq(descriptor.entity_type_column(), self.discriminator_for(target));

            tracing::debug!(
                "Resolving children '{}' of {} {} from {}",
                descriptor.property_key,
                self.kind,
                owner_id,
                target
            );

            if descriptor.has_many {
                repository.find(&criteria).await.map(Lookup::Many)
            } else {
                repository.find_one(&FindOne::Where(criteria)).await.map(Lookup::One)
            }
        }))
        .await?;

        Ok(Resolved::merge(descriptor.has_many, lookups))
    }

    /// The type discriminator children rows are hydrated by
    fn discriminator_for(&self, target: &KindId) -> KindId {
        match self.config.discriminator_match {
            DiscriminatorMatch::OwnerKind => self.kind.clone(),
            DiscriminatorMatch::TargetKind => target.clone(),
        }
    }
}
