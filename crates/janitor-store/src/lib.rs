//! Datastore layer for the analytics janitor.
//!
//! Provides:
//! - The `Datastore` capability and its Postgres implementation over sqlx
//! - `ScriptExecutor`: single statements with a timeout, composite scripts
//!   with per-statement fault isolation
//! - `ConstraintGovernor`: the serialized cascade/standard constraint bracket
//!   around bulk deletes
//! - Script template resolution and parameter rendering
//! - Literal type inference for custom filter rules

pub mod datastore;
pub mod error;
pub mod executor;
pub mod governor;
pub mod literal;
pub mod templates;

pub use datastore::{Datastore, PgDatastore};
pub use error::StoreError;
pub use executor::{split_statements, ScriptExecutor};
pub use governor::ConstraintGovernor;
pub use literal::{is_plain_identifier, parse_literal_type, quote_literal, LiteralType, TypedLiteral};
pub use templates::{
    render, DirectoryTemplateResolver, StaticTemplateResolver, TemplateName, TemplateResolver,
};
