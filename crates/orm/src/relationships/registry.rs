//! Polymorphic Registry - per-kind relation declarations and descriptor cache

use std::sync::Arc;

use dashmap::DashMap;

use super::metadata::{RelationDeclaration, RelationDescriptor, RelationKind};
use crate::error::{OrmError, OrmResult};
use crate::record::KindId;

/// Thread-safe registry of polymorphic relation declarations, keyed by kind.
///
/// Declarations are registered during startup. The first read of a kind
/// evaluates its target closures and caches the resulting descriptors for
/// the life of the registry.
#[derive(Debug, Clone, Default)]
pub struct PolymorphicRegistry {
    /// Kind -> declarations, in declaration order
    declarations: Arc<DashMap<KindId, Vec<RelationDeclaration>>>,

    /// Kind -> resolved descriptors
    resolved: Arc<DashMap<KindId, Arc<Vec<RelationDescriptor>>>>,
}

impl PolymorphicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a polymorphic relation for a kind
    pub fn register(&self, kind: impl Into<KindId>, declaration: RelationDeclaration) -> OrmResult<()> {
        let kind = kind.into();
        declaration.validate()?;

        // Holding the entry guard keeps a concurrent first read from caching
        // descriptors between the check and the push.
        let mut declarations = self.declarations.entry(kind.clone()).or_default();
        if self.resolved.contains_key(&kind) {
            return Err(OrmError::Configuration(format!(
                "Cannot register '{}' on kind '{}': its descriptors have already been read",
                declaration.property_key, kind
            )));
        }

        if declarations
            .iter()
            .any(|existing| existing.property_key == declaration.property_key)
        {
            return Err(OrmError::Configuration(format!(
                "Polymorphic relation '{}' is already registered on kind '{}'",
                declaration.property_key, kind
            )));
        }

        tracing::debug!(
            "Registered polymorphic {:?} relation '{}' on kind '{}'",
            declaration.kind,
            declaration.property_key,
            kind
        );
        declarations.push(declaration);
        Ok(())
    }

    /// Resolved descriptors for a kind, in declaration order.
    ///
    /// Kinds without declarations yield an empty list.
    pub fn descriptors(&self, kind: &KindId) -> OrmResult<Arc<Vec<RelationDescriptor>>> {
        if let Some(cached) = self.resolved.get(kind) {
            return Ok(cached.clone());
        }

        // Kinds without declarations are not cached, so they stay open for
        // registration.
        let Some(declarations) = self.declarations.get(kind) else {
            return Ok(Arc::new(Vec::new()));
        };
        let descriptors = declarations
            .iter()
            .map(RelationDeclaration::resolve)
            .collect::<OrmResult<Vec<_>>>()?;

        // The declarations guard is held until the cache entry exists.
        // A concurrent reader may have resolved the same kind; first insert wins.
        let cached = self
            .resolved
            .entry(kind.clone())
            .or_insert_with(|| Arc::new(descriptors))
            .clone();
        drop(declarations);
        Ok(cached)
    }

    /// True if the kind declares at least one polymorphic relation
    pub fn is_polymorphic(&self, kind: &KindId) -> bool {
        self.declarations
            .get(kind)
            .map(|declarations| !declarations.is_empty())
            .unwrap_or(false)
    }

    /// Kinds with at least one declaration
    pub fn declared_kinds(&self) -> Vec<KindId> {
        let mut kinds: Vec<KindId> = self
            .declarations
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        kinds.sort();
        kinds
    }

    /// Resolve every registered kind, surfacing declaration errors early
    pub fn validate_all(&self) -> OrmResult<()> {
        for kind in self.declared_kinds() {
            self.descriptors(&kind).map_err(|e| {
                OrmError::Configuration(format!("Validation failed for kind '{}': {}", kind, e))
            })?;
        }
        Ok(())
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            total_kinds: self.declarations.len(),
            resolved_kinds: self.resolved.len(),
            ..RegistryStats::default()
        };

        for entry in self.declarations.iter() {
            for declaration in entry.value() {
                stats.total_relations += 1;
                match declaration.kind {
                    RelationKind::Parent => stats.parent_relations += 1,
                    RelationKind::Children => stats.children_relations += 1,
                }
                if declaration.options.delete_before_update {
                    stats.delete_before_update_relations += 1;
                }
            }
        }

        stats
    }
}

/// Statistics about the polymorphic registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_kinds: usize,
    pub resolved_kinds: usize,
    pub total_relations: usize,
    pub parent_relations: usize,
    pub children_relations: usize,
    pub delete_before_update_relations: usize,
}

static GLOBAL_REGISTRY: std::sync::OnceLock<PolymorphicRegistry> = std::sync::OnceLock::new();

/// Process-wide polymorphic registry
pub fn global_registry() -> &'static PolymorphicRegistry {
    GLOBAL_REGISTRY.get_or_init(PolymorphicRegistry::new)
}

/// Register a polymorphic relation in the global registry
#[macro_export]
macro_rules! register_polymorphic {
    ($kind:expr, $declaration:expr) => {
        $crate::relationships::registry::global_registry()
            .register($kind, $declaration)
            .expect("Failed to register polymorphic relation");
    };
}
