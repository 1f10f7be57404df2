//! Pushing a single definition into the datastore.

use std::sync::Arc;

use async_trait::async_trait;
use janitor_store::{quote_literal, render, ScriptExecutor, TemplateName, TemplateResolver};
use janitor_types::DatastoreError;
use thiserror::Error;

use crate::hierarchy::DefinitionItem;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("no '{template}' template for dialect '{dialect}'")]
    MissingTemplate {
        template: TemplateName,
        dialect: String,
    },

    #[error(transparent)]
    Datastore(#[from] DatastoreError),

    #[error("{0}")]
    Other(String),
}

/// Capability that writes one definition into the datastore.
#[async_trait]
pub trait DefinitionPusher: Send + Sync {
    async fn push(&self, item: &DefinitionItem, parent_id: &str) -> Result<(), PushError>;
}

/// Pushes definitions by running the `deploy-definition` template.
pub struct TemplateDefinitionPusher {
    executor: ScriptExecutor,
    templates: Arc<dyn TemplateResolver>,
    dialect: String,
}

impl TemplateDefinitionPusher {
    pub fn new(
        executor: ScriptExecutor,
        templates: Arc<dyn TemplateResolver>,
        dialect: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            templates,
            dialect: dialect.into(),
        }
    }
}

#[async_trait]
impl DefinitionPusher for TemplateDefinitionPusher {
    async fn push(&self, item: &DefinitionItem, parent_id: &str) -> Result<(), PushError> {
        let template = self
            .templates
            .resolve(TemplateName::DeployDefinition, &self.dialect);
        if template.trim().is_empty() {
            return Err(PushError::MissingTemplate {
                template: TemplateName::DeployDefinition,
                dialect: self.dialect.clone(),
            });
        }

        let id = quote_literal(&item.id);
        let name = quote_literal(&item.name);
        let kind = quote_literal(&item.kind);
        let parent = quote_literal(parent_id);
        let script = render(
            &template,
            &[
                ("id", id.as_str()),
                ("name", name.as_str()),
                ("kind", kind.as_str()),
                ("parent_id", parent.as_str()),
            ],
        );
        self.executor.run_one(&script).await?;
        Ok(())
    }
}
