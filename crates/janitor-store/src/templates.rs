//! Script template resolution.
//!
//! Templates are parameterized script bodies looked up by logical name and
//! dialect. Placeholders use `{name}` syntax and are filled by [`render`].

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

/// Logical names of every template the janitor resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    DropConstraints,
    AddConstraints,
    AddConstraintsCascadeDelete,
    CleanAll,
    CleanGeoIpLookupData,
    CleanHelperData,
    CleanFilteredOlderThan,
    CleanFilteredBounceVisits,
    CleanFilteredCustomRule,
    RemoveUnusedVisitors,
    RebuildIndex,
    RebuildIndexOnline,
    RemoveBots,
    BackupDatabase,
    DeployDefinition,
}

impl TemplateName {
    pub const ALL: [TemplateName; 15] = [
        TemplateName::DropConstraints,
        TemplateName::AddConstraints,
        TemplateName::AddConstraintsCascadeDelete,
        TemplateName::CleanAll,
        TemplateName::CleanGeoIpLookupData,
        TemplateName::CleanHelperData,
        TemplateName::CleanFilteredOlderThan,
        TemplateName::CleanFilteredBounceVisits,
        TemplateName::CleanFilteredCustomRule,
        TemplateName::RemoveUnusedVisitors,
        TemplateName::RebuildIndex,
        TemplateName::RebuildIndexOnline,
        TemplateName::RemoveBots,
        TemplateName::BackupDatabase,
        TemplateName::DeployDefinition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateName::DropConstraints => "drop-constraints",
            TemplateName::AddConstraints => "add-constraints",
            TemplateName::AddConstraintsCascadeDelete => "add-constraints-cascade-delete",
            TemplateName::CleanAll => "clean-all",
            TemplateName::CleanGeoIpLookupData => "clean-geoip-lookup-data",
            TemplateName::CleanHelperData => "clean-helper-data",
            TemplateName::CleanFilteredOlderThan => "clean-filtered-older-than",
            TemplateName::CleanFilteredBounceVisits => "clean-filtered-bounce-visits",
            TemplateName::CleanFilteredCustomRule => "clean-filtered-custom-rule",
            TemplateName::RemoveUnusedVisitors => "remove-unused-visitors",
            TemplateName::RebuildIndex => "rebuild-index",
            TemplateName::RebuildIndexOnline => "rebuild-index-online",
            TemplateName::RemoveBots => "remove-bots",
            TemplateName::BackupDatabase => "backup-database",
            TemplateName::DeployDefinition => "deploy-definition",
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a logical template name and dialect to a script body.
pub trait TemplateResolver: Send + Sync {
    /// Returns the script body, or an empty string if no such template exists.
    fn resolve(&self, name: TemplateName, dialect: &str) -> String;
}

/// Template store backed by `<root>/<dialect>/<name>.sql` files.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateResolver {
    root: PathBuf,
}

impl DirectoryTemplateResolver {
    /// Open the store at `root`. A missing root is a configuration error.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::TemplateRootMissing(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: TemplateName, dialect: &str) -> PathBuf {
        self.root.join(dialect).join(format!("{}.sql", name.as_str()))
    }
}

impl TemplateResolver for DirectoryTemplateResolver {
    fn resolve(&self, name: TemplateName, dialect: &str) -> String {
        let path = self.path_for(name, dialect);
        match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(template = %name, dialect, "Template not found");
                String::new()
            }
            Err(e) => {
                warn!(template = %name, path = ?path, error = %e, "Failed to read template");
                String::new()
            }
        }
    }
}

/// In-memory template store.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateResolver {
    templates: HashMap<(TemplateName, String), String>,
}

impl StaticTemplateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: TemplateName, dialect: &str, body: impl Into<String>) -> Self {
        self.insert(name, dialect, body);
        self
    }

    pub fn insert(&mut self, name: TemplateName, dialect: &str, body: impl Into<String>) {
        self.templates
            .insert((name, dialect.to_string()), body.into());
    }
}

impl TemplateResolver for StaticTemplateResolver {
    fn resolve(&self, name: TemplateName, dialect: &str) -> String {
        self.templates
            .get(&(name, dialect.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Substitute `{key}` placeholders. Unknown placeholders are left as they are.
///
/// The template is scanned once; substituted values are never scanned again.
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    let mut script = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        script.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];
        let substitution = candidate.find('}').and_then(|close| {
            let key = &candidate[..close];
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close + 1))
        });
        match substitution {
            Some((value, consumed)) => {
                script.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                script.push('{');
                rest = candidate;
            }
        }
    }

    script.push_str(rest);
    script
}
