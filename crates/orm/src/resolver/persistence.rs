//! Persistence - relation-aware create, discriminator stamping and
//! delete-before-update cleanup

use futures::future::try_join_all;

use super::PolymorphicRepository;
use crate::config::DeletePolicy;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::relationships::Resolved;
use crate::repository::Criteria;

impl PolymorphicRepository {
    /// Build through the engine, then put declared relations from the input
    /// back onto the new record
    pub(super) async fn create_with_relations(&self, input: Option<Record>) -> OrmResult<Record> {
        let relations: Vec<(String, Resolved)> = match &input {
            Some(record) if self.is_polymorphic() => self
                .descriptors()?
                .iter()
                .filter_map(|descriptor| {
                    record
                        .relation(&descriptor.property_key)
                        .map(|resolved| (descriptor.property_key.clone(), resolved.clone()))
                })
                .collect(),
            _ => Vec::new(),
        };

        let mut created = self.inner.create(input).await?;
        for (property, resolved) in relations {
            created.set_relation(&property, resolved);
        }
        Ok(created)
    }

    /// Write parent discriminators from in-memory parent references.
    ///
    /// Records that already carry a discriminator id are left untouched.
    pub fn stamp_parents(&self, record: &mut Record) -> OrmResult<()> {
        let descriptors = self.descriptors()?;

        for descriptor in descriptors.iter().filter(|descriptor| descriptor.is_parent()) {
            if record.has_value(descriptor.entity_id_column()) {
                continue;
            }

            let Some(parent) = record.parent(&descriptor.property_key) else {
                continue;
            };

            let parent_id = parent
                .primary_key(descriptor.primary_column())
                .cloned()
                .ok_or_else(|| OrmError::MissingPrimaryKey(parent.kind().to_string()))?;
            let parent_kind = parent.kind().clone();

            tracing::debug!(
                "Stamping {} '{}' with {} {}",
                self.kind,
                descriptor.property_key,
                parent_kind,
                parent_id
            );
            record.set(descriptor.entity_id_column(), parent_id);
            record.set(descriptor.entity_type_column(), parent_kind);
        }

        Ok(())
    }

    /// Delete existing rows of every delete-before-update relation.
    ///
    /// Rows are matched by owner id and by the target kind as discriminator.
    /// All deletes run concurrently. An unmapped target kind always fails,
    /// even for new records; engine failures follow the configured
    /// `DeletePolicy`.
    pub async fn delete_polymorphs(&self, records: &[Record]) -> OrmResult<()> {
        let descriptors = self.descriptors()?;
        let mut deletes = Vec::new();

        for record in records {
            for descriptor in descriptors.iter().filter(|descriptor| descriptor.delete_before_update) {
                let repositories = descriptor
                    .target_kinds
                    .iter()
                    .map(|target| self.locator.locate(target).map(|repository| (target, repository)))
                    .collect::<OrmResult<Vec<_>>>()?;

                // New records own nothing yet.
                let Some(owner_id) = record.primary_key(descriptor.primary_column()) else {
                    continue;
                };

                for (target, repository) in repositories {
                    let criteria = Criteria::new()
                        .where_eq(descriptor.entity_type_column(), target.clone())
                        .where_eq(descriptor.entity_id_column(), owner_id.clone());

                    deletes.push(async move {
                        match repository.delete(&criteria).await {
                            Ok(affected) => {
                                tracing::debug!(
                                    "Deleted {} {} rows for {} '{}'",
                                    affected,
                                    target,
                                    self.kind,
                                    descriptor.property_key
                                );
                                Ok::<(), OrmError>(())
                            }
                            Err(e) if self.config.delete_policy == DeletePolicy::BestEffort => {
                                tracing::warn!(
                                    "Delete before update of {} for {} '{}' failed, continuing: {}",
                                    target,
                                    self.kind,
                                    descriptor.property_key,
                                    e
                                );
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    });
                }
            }
        }

        try_join_all(deletes).await?;
        Ok(())
    }
}
