//! The definition hierarchy and where its roots live.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;

/// One definition record with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionItem {
    /// Stable identifier, used in scripts and log messages
    pub id: String,
    pub name: String,
    /// Definition kind (campaign, goal, page event, ...)
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub children: Vec<DefinitionItem>,
}

impl DefinitionItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: String::new(),
            children: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_child(mut self, child: DefinitionItem) -> Self {
        self.children.push(child);
        self
    }

    /// Number of descendants, not counting this item.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// A hierarchy root that is synchronized, with the label used when
/// reporting its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefinitionRoot {
    pub label: &'static str,
    pub path: &'static str,
}

/// The synchronized roots, in the order they are processed.
pub const DEFINITION_ROOTS: [DefinitionRoot; 5] = [
    DefinitionRoot {
        label: "Engagement Plans",
        path: "/marketing/engagement-plans",
    },
    DefinitionRoot {
        label: "Campaign items",
        path: "/marketing/campaigns",
    },
    DefinitionRoot {
        label: "MV items",
        path: "/marketing/test-lab",
    },
    DefinitionRoot {
        label: "PageEvent items",
        path: "/settings/analytics/page-events",
    },
    DefinitionRoot {
        label: "Goal items",
        path: "/marketing/goals",
    },
];

/// Source of definition trees.
pub trait HierarchySource: Send + Sync {
    /// The item at `path`, with its whole subtree, if there is one.
    fn root(&self, path: &str) -> Option<DefinitionItem>;
}

/// Hierarchy loaded from a JSON file mapping root paths to item trees.
///
/// ```json
/// { "/marketing/goals": { "id": "g0", "name": "Goals", "children": [] } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonHierarchy {
    roots: HashMap<String, DefinitionItem>,
}

impl JsonHierarchy {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let roots: HashMap<String, DefinitionItem> =
            serde_json::from_str(&raw).map_err(|source| SyncError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = ?path, roots = roots.len(), "Loaded definition hierarchy");
        Ok(Self { roots })
    }

    pub fn from_roots(roots: impl IntoIterator<Item = (String, DefinitionItem)>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }
}

impl HierarchySource for JsonHierarchy {
    fn root(&self, path: &str) -> Option<DefinitionItem> {
        self.roots.get(path).cloned()
    }
}
