//! Definition synchronization for the analytics janitor.
//!
//! Walks a hierarchy of definition records and pushes each one into the
//! datastore, isolating failures per node.

pub mod error;
pub mod hierarchy;
pub mod push;
pub mod sync;

pub use error::SyncError;
pub use hierarchy::{DefinitionItem, DefinitionRoot, HierarchySource, JsonHierarchy, DEFINITION_ROOTS};
pub use push::{DefinitionPusher, PushError, TemplateDefinitionPusher};
pub use sync::DefinitionSynchronizer;
