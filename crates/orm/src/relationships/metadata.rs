//! Polymorphic relation metadata - declarations and resolved descriptors

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::record::KindId;

/// Default name of the discriminator column holding the owner's kind
pub const DEFAULT_ENTITY_TYPE_COLUMN: &str = "entityType";

/// Default name of the discriminator column holding the owner's primary key
pub const DEFAULT_ENTITY_ID_COLUMN: &str = "entityId";

/// Default primary key column
pub const DEFAULT_PRIMARY_COLUMN: &str = "id";

/// Direction of a polymorphic relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// This record points outward at one record of the kind named by its
    /// own discriminator columns
    Parent,
    /// Records of one or more kinds point inward at this record
    Children,
}

impl RelationKind {
    pub fn is_parent(self) -> bool {
        matches!(self, Self::Parent)
    }

    pub fn is_children(self) -> bool {
        matches!(self, Self::Children)
    }
}

/// Column names used by a polymorphic relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNames {
    /// Discriminator column storing the owner kind
    pub entity_type: String,
    /// Discriminator column storing the owner primary key
    pub entity_id: String,
    /// Primary key column
    pub primary: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            entity_type: DEFAULT_ENTITY_TYPE_COLUMN.to_string(),
            entity_id: DEFAULT_ENTITY_ID_COLUMN.to_string(),
            primary: DEFAULT_PRIMARY_COLUMN.to_string(),
        }
    }
}

impl ColumnNames {
    pub fn new(entity_type: &str, entity_id: &str, primary: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            primary: primary.to_string(),
        }
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.entity_type.is_empty() {
            return Err(OrmError::Configuration(
                "Polymorphic type column cannot be empty".to_string(),
            ));
        }

        if self.entity_id.is_empty() {
            return Err(OrmError::Configuration(
                "Polymorphic ID column cannot be empty".to_string(),
            ));
        }

        if self.primary.is_empty() {
            return Err(OrmError::Configuration(
                "Primary column cannot be empty".to_string(),
            ));
        }

        if self.entity_type == self.entity_id {
            return Err(OrmError::Configuration(
                "Polymorphic type column and ID column must be different".to_string(),
            ));
        }

        Ok(())
    }
}

/// Options attached to a polymorphic relation declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolymorphicOptions {
    /// Resolve to a collection instead of a single optional record
    pub has_many: bool,
    /// Resolve automatically when records are loaded
    pub eager: bool,
    /// Writes cascade (only discriminator stamping is enforced)
    pub cascade: bool,
    /// Delete all matching rows before every save of the owner
    pub delete_before_update: bool,
    pub columns: ColumnNames,
}

impl PolymorphicOptions {
    /// Defaults for a children relation
    pub fn children() -> Self {
        Self {
            has_many: true,
            eager: true,
            cascade: true,
            delete_before_update: false,
            columns: ColumnNames::default(),
        }
    }

    /// Defaults for a parent relation
    pub fn parent() -> Self {
        Self {
            has_many: false,
            ..Self::children()
        }
    }
}

/// Lazily evaluated list of target kinds.
///
/// Kinds that reference each other can be declared in any order because
/// the closure runs only when the descriptors are first read.
pub type TargetKinds = Arc<dyn Fn() -> Vec<KindId> + Send + Sync>;

/// A polymorphic relation as declared on a record kind
#[derive(Clone)]
pub struct RelationDeclaration {
    pub property_key: String,
    pub kind: RelationKind,
    pub targets: TargetKinds,
    pub options: PolymorphicOptions,
}

impl fmt::Debug for RelationDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDeclaration")
            .field("property_key", &self.property_key)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RelationDeclaration {
    /// Declare a parent relation on `property_key`
    pub fn parent<F>(property_key: &str, targets: F) -> Self
    where
        F: Fn() -> Vec<KindId> + Send + Sync + 'static,
    {
        Self {
            property_key: property_key.to_string(),
            kind: RelationKind::Parent,
            targets: Arc::new(targets),
            options: PolymorphicOptions::parent(),
        }
    }

    /// Declare a children relation on `property_key`
    pub fn children<F>(property_key: &str, targets: F) -> Self
    where
        F: Fn() -> Vec<KindId> + Send + Sync + 'static,
    {
        Self {
            property_key: property_key.to_string(),
            kind: RelationKind::Children,
            targets: Arc::new(targets),
            options: PolymorphicOptions::children(),
        }
    }

    pub fn with_options(mut self, options: PolymorphicOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_many(mut self, has_many: bool) -> Self {
        self.options.has_many = has_many;
        self
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.options.eager = eager;
        self
    }

    pub fn cascade(mut self, cascade: bool) -> Self {
        self.options.cascade = cascade;
        self
    }

    pub fn delete_before_update(mut self, delete_before_update: bool) -> Self {
        self.options.delete_before_update = delete_before_update;
        self
    }

    pub fn entity_type_column(mut self, column: &str) -> Self {
        self.options.columns.entity_type = column.to_string();
        self
    }

    pub fn entity_id_column(mut self, column: &str) -> Self {
        self.options.columns.entity_id = column.to_string();
        self
    }

    pub fn primary_column(mut self, column: &str) -> Self {
        self.options.columns.primary = column.to_string();
        self
    }

    /// Checks that do not require evaluating the target closure
    pub fn validate(&self) -> OrmResult<()> {
        if self.property_key.is_empty() {
            return Err(OrmError::Configuration(
                "Polymorphic relation property key cannot be empty".to_string(),
            ));
        }

        self.options.columns.validate()
    }

    /// Evaluate the target closure and freeze the declaration
    pub fn resolve(&self) -> OrmResult<RelationDescriptor> {
        let target_kinds = (self.targets)();
        if target_kinds.is_empty() {
            return Err(OrmError::Configuration(format!(
                "Polymorphic relation '{}' declares no target kinds",
                self.property_key
            )));
        }

        Ok(RelationDescriptor {
            property_key: self.property_key.clone(),
            kind: self.kind,
            target_kinds,
            has_many: self.options.has_many,
            eager: self.options.eager,
            cascade: self.options.cascade,
            delete_before_update: self.options.delete_before_update,
            columns: self.options.columns.clone(),
        })
    }
}

/// A resolved, immutable polymorphic relation descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub property_key: String,
    pub kind: RelationKind,
    pub target_kinds: Vec<KindId>,
    pub has_many: bool,
    pub eager: bool,
    pub cascade: bool,
    pub delete_before_update: bool,
    pub columns: ColumnNames,
}

impl RelationDescriptor {
    pub fn is_parent(&self) -> bool {
        self.kind.is_parent()
    }

    pub fn is_children(&self) -> bool {
        self.kind.is_children()
    }

    pub fn entity_type_column(&self) -> &str {
        &self.columns.entity_type
    }

    pub fn entity_id_column(&self) -> &str {
        &self.columns.entity_id
    }

    pub fn primary_column(&self) -> &str {
        &self.columns.primary
    }
}
