//! Fakes shared by the unit tests of this crate.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use janitor_definitions::{DefinitionItem, DefinitionPusher, JsonHierarchy};
use janitor_store::{Datastore, StaticTemplateResolver, TemplateName};
use janitor_types::{DatastoreError, Settings};

use crate::audit::MemoryAuditLog;
use crate::context::MaintenanceContext;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub(crate) struct FakeStore {
    statements: Mutex<Vec<String>>,
    rows: Mutex<Vec<(String, u64)>>,
    failures: Mutex<Vec<(String, DatastoreError)>>,
    delays: Mutex<Vec<(String, Duration)>>,
    panics: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn set_rows(&self, marker: &str, rows: u64) {
        lock(&self.rows).push((marker.to_string(), rows));
    }

    pub fn fail_on(&self, marker: &str, message: &str) {
        self.fail_with(marker, DatastoreError::classify(message));
    }

    pub fn fail_with(&self, marker: &str, error: DatastoreError) {
        lock(&self.failures).push((marker.to_string(), error));
    }

    pub fn delay_on(&self, marker: &str, delay: Duration) {
        lock(&self.delays).push((marker.to_string(), delay));
    }

    pub fn panic_on(&self, marker: &str) {
        lock(&self.panics).push(marker.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).clone()
    }

    /// Statements other than constraint toggles.
    pub fn body_statements(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| !s.contains("CONSTRAINT"))
            .collect()
    }

    /// True when the last constraint statement re-created standard constraints.
    pub fn constraints_restored(&self) -> bool {
        self.statements()
            .iter()
            .rev()
            .find(|s| s.contains("CONSTRAINT"))
            .map_or(true, |s| s.starts_with("ADD CONSTRAINT") && !s.contains("CASCADE"))
    }
}

#[async_trait]
impl Datastore for FakeStore {
    async fn execute(&self, script: &str, _timeout: Duration) -> Result<u64, DatastoreError> {
        lock(&self.statements).push(script.to_string());

        let delay = lock(&self.delays)
            .iter()
            .find(|(m, _)| script.contains(m.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let panics = lock(&self.panics).iter().any(|m| script.contains(m.as_str()));
        if panics {
            panic!("fake datastore panicked on {script}");
        }

        if let Some((_, err)) = lock(&self.failures)
            .iter()
            .find(|(m, _)| script.contains(m.as_str()))
        {
            return Err(err.clone());
        }

        Ok(lock(&self.rows)
            .iter()
            .find(|(m, _)| script.contains(m.as_str()))
            .map_or(0, |(_, rows)| *rows))
    }

    fn database_name(&self) -> &str {
        "analytics"
    }
}

pub(crate) fn templates() -> StaticTemplateResolver {
    let d = "postgres";
    StaticTemplateResolver::new()
        .with(TemplateName::DropConstraints, d, "DROP CONSTRAINT fk_visits;DROP CONSTRAINT fk_pages")
        .with(TemplateName::AddConstraints, d, "ADD CONSTRAINT fk_visits;ADD CONSTRAINT fk_pages")
        .with(
            TemplateName::AddConstraintsCascadeDelete,
            d,
            "ADD CONSTRAINT CASCADE fk_visits;ADD CONSTRAINT CASCADE fk_pages",
        )
        .with(TemplateName::CleanAll, d, "DELETE ALL")
        .with(TemplateName::CleanGeoIpLookupData, d, "DELETE IPS")
        .with(TemplateName::CleanHelperData, d, "DELETE HELPER")
        .with(TemplateName::CleanFilteredOlderThan, d, "DELETE OLDER THAN '{threshold}'")
        .with(TemplateName::CleanFilteredBounceVisits, d, "DELETE BOUNCES")
        .with(
            TemplateName::CleanFilteredCustomRule,
            d,
            "DELETE WHERE {column} = CAST({value} AS {type})",
        )
        .with(TemplateName::RemoveUnusedVisitors, d, "DELETE ORPHANS")
        .with(TemplateName::RebuildIndex, d, "REINDEX")
        .with(TemplateName::RebuildIndexOnline, d, "REINDEX CONCURRENTLY")
        .with(TemplateName::RemoveBots, d, "DELETE BOTS")
        .with(TemplateName::BackupDatabase, d, "BACKUP {database} TO {path}")
        .with(TemplateName::DeployDefinition, d, "DEPLOY {id} UNDER {parent_id}")
}

pub(crate) fn hierarchy() -> Vec<(String, DefinitionItem)> {
    vec![
        (
            "/marketing/engagement-plans".to_string(),
            DefinitionItem::new("e0", "Engagement Plans").with_child(DefinitionItem::new("e1", "Onboarding")),
        ),
        (
            "/marketing/campaigns".to_string(),
            DefinitionItem::new("c0", "Campaigns")
                .with_child(DefinitionItem::new("c1", "Spring"))
                .with_child(DefinitionItem::new("c2", "Summer").with_child(DefinitionItem::new("c3", "Beach"))),
        ),
        ("/marketing/test-lab".to_string(), DefinitionItem::new("t0", "Test Lab")),
        (
            "/settings/analytics/page-events".to_string(),
            DefinitionItem::new("p0", "Page Events").with_child(DefinitionItem::new("p1", "Download")),
        ),
        (
            "/marketing/goals".to_string(),
            DefinitionItem::new("g0", "Goals")
                .with_child(DefinitionItem::new("g1", "Register").with_child(DefinitionItem::new("g2", "Newsletter"))),
        ),
    ]
}

fn settings() -> Settings {
    Settings {
        actor: "tester".to_string(),
        ..Settings::default()
    }
}

pub(crate) struct TestContext {
    pub store: Arc<FakeStore>,
    pub audit: Arc<MemoryAuditLog>,
    pub ctx: Arc<MaintenanceContext>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(templates(), hierarchy())
    }

    pub fn with_templates(edit: impl FnOnce(&mut StaticTemplateResolver)) -> Self {
        let mut templates = templates();
        edit(&mut templates);
        Self::build(templates, hierarchy())
    }

    pub fn with_hierarchy(roots: Vec<(String, DefinitionItem)>) -> Self {
        Self::build(templates(), roots)
    }

    pub fn with_pusher(pusher: Arc<dyn DefinitionPusher>) -> Self {
        let t = Self::new();
        let ctx = MaintenanceContext::new(
            t.store.clone(),
            t.ctx.templates.clone(),
            t.ctx.hierarchy.clone(),
            t.audit.clone(),
            &settings(),
        )
        .with_pusher(pusher);
        Self {
            ctx: Arc::new(ctx),
            ..t
        }
    }

    fn build(templates: StaticTemplateResolver, roots: Vec<(String, DefinitionItem)>) -> Self {
        let store = Arc::new(FakeStore::default());
        let audit = Arc::new(MemoryAuditLog::new());
        let settings = settings();
        let ctx = MaintenanceContext::new(
            store.clone(),
            Arc::new(templates),
            Arc::new(JsonHierarchy::from_roots(roots)),
            audit.clone(),
            &settings,
        );
        Self {
            store,
            audit,
            ctx: Arc::new(ctx),
        }
    }

    pub fn shared(&self) -> Arc<MaintenanceContext> {
        self.ctx.clone()
    }
}
