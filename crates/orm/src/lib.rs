//! # polymorphic-orm: polymorphic relations over a generic repository
//!
//! A record kind can declare *parent* relations (it points at one record of
//! a kind named by its own discriminator columns) and *children* relations
//! (records of several kinds point back at it). `PolymorphicRepository`
//! wraps any `Repository` for that kind and:
//!
//! - hydrates declared relations after `find` / `find_one`
//! - stamps `entityType` / `entityId` from in-memory parents on `save`
//! - deletes stale children first for `delete_before_update` relations
//!
//! Kinds without declarations pass straight through to the wrapped engine.
//!
//! ```
//! use std::sync::Arc;
//! use polymorphic_orm::{
//!     InMemoryRepository, PolymorphicRegistry, PolymorphicRepository, RelationDeclaration,
//!     Repository, RepositoryRegistry,
//! };
//!
//! let registry = Arc::new(PolymorphicRegistry::new());
//! registry
//!     .register("Comment", RelationDeclaration::parent("owner", || vec!["Post".into()]))
//!     .unwrap();
//!
//! let repositories = RepositoryRegistry::new();
//! repositories.register(Arc::new(InMemoryRepository::new("Post")));
//!
//! let comments = PolymorphicRepository::new(
//!     Arc::new(InMemoryRepository::new("Comment")),
//!     registry,
//!     Arc::new(repositories),
//! );
//! assert!(comments.is_polymorphic());
//! assert_eq!(comments.kind().as_str(), "Comment");
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod relationships;
pub mod repository;
pub mod resolver;
pub mod security;

pub use config::{ConfigError, ConfigSource, DeletePolicy, DiscriminatorMatch, EnvConfig, ResolverConfig};
pub use error::{OrmError, OrmResult};
pub use record::{KindId, Record};
pub use relationships::{
    global_registry, ColumnNames, Lookup, PolymorphicOptions, PolymorphicRegistry, RegistryStats,
    RelationDeclaration, RelationDescriptor, RelationKind, Resolved,
};
pub use repository::{
    create_pool, Criteria, FindOne, InMemoryRepository, Journal, JournalEntry, Operation, PoolConfig,
    PostgresRepository, Repository, RepositoryLocator, RepositoryRegistry, SaveOptions,
};
pub use resolver::PolymorphicRepository;
