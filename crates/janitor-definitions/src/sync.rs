//! Fault-tolerant walk over a definition tree.

use janitor_types::{SyncFailurePolicy, SyncResult};
use tracing::{debug, error};

use crate::hierarchy::DefinitionItem;
use crate::push::DefinitionPusher;

/// Pushes every descendant of a root, counting successes and failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionSynchronizer {
    policy: SyncFailurePolicy,
}

impl DefinitionSynchronizer {
    pub fn new(policy: SyncFailurePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SyncFailurePolicy {
        self.policy
    }

    /// Push every descendant of `root` (not `root` itself).
    ///
    /// Items are visited depth-first in their native child order: an item is
    /// pushed, then its subtree, then its next sibling. When a push fails the
    /// item is logged and counted, and under [`SyncFailurePolicy::SkipSubtree`]
    /// its descendants are never visited.
    pub async fn sync(&self, root: &DefinitionItem, pusher: &dyn DefinitionPusher) -> SyncResult {
        let mut result = SyncResult::default();

        // Children are stacked in reverse so they pop in native order.
        let mut pending: Vec<(&DefinitionItem, &str)> = root
            .children
            .iter()
            .rev()
            .map(|child| (child, root.id.as_str()))
            .collect();

        while let Some((item, parent_id)) = pending.pop() {
            let descend = match pusher.push(item, parent_id).await {
                Ok(()) => {
                    debug!(item_id = %item.id, "Definition pushed");
                    result.success_count += 1;
                    true
                }
                Err(e) => {
                    error!(
                        item_id = %item.id,
                        item_name = %item.name,
                        error = %e,
                        "Error during the processing of definition"
                    );
                    result.fail_count += 1;
                    self.policy == SyncFailurePolicy::ContinueIntoChildren
                }
            };

            if descend {
                pending.extend(
                    item.children
                        .iter()
                        .rev()
                        .map(|child| (child, item.id.as_str())),
                );
            }
        }

        result
    }
}
