//! Relationships Module - polymorphic relation metadata and resolution shapes

pub mod metadata;
pub mod registry;
pub mod resolution;

pub use metadata::*;
pub use registry::*;
pub use resolution::*;
