//! End-to-end test infrastructure for the analytics janitor.
//!
//! Provides a shared TestHarness wired like the real binary: a directory
//! template store on disk, the default template-backed definition pusher,
//! and a recording fake in place of the Postgres datastore.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use janitor_definitions::{DefinitionItem, JsonHierarchy};
use janitor_scheduler::{JobRunner, JobScheduler, MaintenanceContext, MemoryAuditLog};
use janitor_store::{Datastore, DirectoryTemplateResolver, TemplateName};
use janitor_types::{DatastoreError, Job, JobSnapshot, JobState, MaintenanceOperation, Settings};

pub const DIALECT: &str = "postgres";
pub const DATABASE: &str = "analytics";
pub const ACTOR: &str = "e2e";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Template bodies written to the harness template directory.
pub fn template_body(name: TemplateName) -> &'static str {
    match name {
        TemplateName::DropConstraints => {
            "ALTER TABLE visits DROP CONSTRAINT fk_visits_contacts;\nALTER TABLE page_views DROP CONSTRAINT fk_page_views_visits;\n"
        }
        TemplateName::AddConstraints => {
            "ALTER TABLE visits ADD CONSTRAINT fk_visits_contacts FOREIGN KEY (contact_id) REFERENCES contacts (id);\nALTER TABLE page_views ADD CONSTRAINT fk_page_views_visits FOREIGN KEY (visit_id) REFERENCES visits (id);\n"
        }
        TemplateName::AddConstraintsCascadeDelete => {
            "ALTER TABLE visits ADD CONSTRAINT fk_visits_contacts FOREIGN KEY (contact_id) REFERENCES contacts (id) ON DELETE CASCADE;\nALTER TABLE page_views ADD CONSTRAINT fk_page_views_visits FOREIGN KEY (visit_id) REFERENCES visits (id) ON DELETE CASCADE;\n"
        }
        TemplateName::CleanAll => "DELETE FROM contacts",
        TemplateName::CleanGeoIpLookupData => "DELETE FROM geo_locations",
        TemplateName::CleanHelperData => "TRUNCATE report_cache",
        TemplateName::CleanFilteredOlderThan => {
            "DELETE FROM visits WHERE started_at < TIMESTAMP '{threshold}'"
        }
        TemplateName::CleanFilteredBounceVisits => "DELETE FROM visits WHERE page_count = 1",
        TemplateName::CleanFilteredCustomRule => {
            "DELETE FROM visits WHERE {column} = CAST({value} AS {type})"
        }
        TemplateName::RemoveUnusedVisitors => {
            "DELETE FROM contacts c WHERE NOT EXISTS (SELECT 1 FROM visits v WHERE v.contact_id = c.id)"
        }
        TemplateName::RebuildIndex => "REINDEX DATABASE analytics",
        TemplateName::RebuildIndexOnline => "REINDEX DATABASE CONCURRENTLY analytics",
        TemplateName::RemoveBots => "DELETE FROM visits WHERE is_robot",
        TemplateName::BackupDatabase => "BACKUP DATABASE {database} TO {path}",
        TemplateName::DeployDefinition => {
            "INSERT INTO definitions (id, name, kind, parent_id) VALUES ({id}, {name}, {kind}, {parent_id})"
        }
    }
}

/// How a recorded statement relates to the constraint bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    DropConstraints,
    CascadeConstraints,
    StandardConstraints,
    Body,
}

impl StatementKind {
    pub fn of(sql: &str) -> Self {
        if sql.contains("DROP CONSTRAINT") {
            StatementKind::DropConstraints
        } else if sql.contains("ADD CONSTRAINT") && sql.contains("ON DELETE CASCADE") {
            StatementKind::CascadeConstraints
        } else if sql.contains("ADD CONSTRAINT") {
            StatementKind::StandardConstraints
        } else {
            StatementKind::Body
        }
    }
}

/// One statement the fake datastore received.
#[derive(Debug, Clone)]
pub struct RecordedStatement {
    pub seq: usize,
    pub sql: String,
    pub kind: StatementKind,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// A span during which the datastore was in cascade mode.
#[derive(Debug, Clone)]
pub struct CascadeWindow {
    pub opened_at: Instant,
    pub closed_at: Instant,
    pub bodies: Vec<String>,
}

/// Records every statement and answers from configured rules.
///
/// Rules match when the statement contains the given marker; the first
/// matching rule wins.
#[derive(Default)]
pub struct FakeDatastore {
    log: Mutex<Vec<RecordedStatement>>,
    rows: Mutex<Vec<(String, u64)>>,
    failures: Mutex<Vec<(String, DatastoreError)>>,
    delays: Mutex<Vec<(String, Duration)>>,
    panics: Mutex<Vec<String>>,
    /// Datastore-wide constraint lock shared by every client of the fake.
    constraint_lock: Arc<tokio::sync::Mutex<()>>,
    lock_holder: Mutex<Option<OwnedMutexGuard<()>>>,
    lock_acquisitions: Mutex<usize>,
}

impl FakeDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, marker: &str, rows: u64) {
        lock(&self.rows).push((marker.to_string(), rows));
    }

    /// Fail matching statements with an error classified from `message`.
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

    /// Times the constraint lock was taken.
    pub fn lock_acquisitions(&self) -> usize {
        *lock(&self.lock_acquisitions)
    }

    pub fn constraint_lock_held(&self) -> bool {
        lock(&self.lock_holder).is_some()
    }

    pub fn log(&self) -> Vec<RecordedStatement> {
        lock(&self.log).clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log().into_iter().map(|s| s.sql).collect()
    }

    pub fn statements_of(&self, kind: StatementKind) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.sql)
            .collect()
    }

    pub fn body_statements(&self) -> Vec<String> {
        self.statements_of(StatementKind::Body)
    }

    /// Number of completed switches back to standard constraints.
    pub fn restore_count(&self) -> usize {
        self.statements_of(StatementKind::StandardConstraints).len()
            / statement_count(TemplateName::AddConstraints)
    }

    /// Cascade windows in the order they were opened.
    ///
    /// Fails when a window is entered again before the previous one was
    /// closed and after it already ran body statements, which is what two
    /// interleaved governed operations look like.
    pub fn cascade_windows(&self) -> Result<Vec<CascadeWindow>, String> {
        let mut windows = Vec::new();
        let mut open: Option<CascadeWindow> = None;
        let mut closing = false;

        for statement in self.log() {
            match statement.kind {
                StatementKind::CascadeConstraints => match open.as_mut() {
                    Some(window) if !window.bodies.is_empty() || closing => {
                        return Err(format!(
                            "statement #{} re-entered cascade mode inside an open window running {:?}",
                            statement.seq, window.bodies
                        ));
                    }
                    Some(_) => {}
                    None => {
                        open = Some(CascadeWindow {
                            opened_at: statement.started_at,
                            closed_at: statement.finished_at,
                            bodies: Vec::new(),
                        });
                    }
                },
                StatementKind::Body => {
                    if let Some(window) = open.as_mut() {
                        if closing {
                            return Err(format!(
                                "statement #{} ran while cascade window was closing: {}",
                                statement.seq, statement.sql
                            ));
                        }
                        window.bodies.push(statement.sql);
                    }
                }
                StatementKind::DropConstraints => {
                    if open.is_some() {
                        closing = true;
                    }
                }
                StatementKind::StandardConstraints => {
                    if let Some(mut window) = open.take() {
                        window.closed_at = statement.finished_at;
                        windows.push(window);
                        closing = false;
                    } else if let Some(last) = windows.last_mut() {
                        last.closed_at = statement.finished_at;
                    }
                }
            }
        }

        match open {
            Some(window) => Err(format!("cascade window never closed: {:?}", window.bodies)),
            None => Ok(windows),
        }
    }
}

/// Statements in a harness template.
pub fn statement_count(name: TemplateName) -> usize {
    janitor_store::split_statements(template_body(name), ';').count()
}

#[async_trait]
impl Datastore for FakeDatastore {
    async fn execute(&self, script: &str, _timeout: Duration) -> Result<u64, DatastoreError> {
        let started_at = Instant::now();

        let delay = lock(&self.delays)
            .iter()
            .find(|(m, _)| script.contains(m.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut log = lock(&self.log);
            let seq = log.len();
            log.push(RecordedStatement {
                seq,
                sql: script.to_string(),
                kind: StatementKind::of(script),
                started_at,
                finished_at: Instant::now(),
            });
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
        DATABASE
    }

    async fn acquire_constraint_lock(&self) -> Result<(), DatastoreError> {
        let guard = self.constraint_lock.clone().lock_owned().await;
        *lock(&self.lock_holder) = Some(guard);
        *lock(&self.lock_acquisitions) += 1;
        Ok(())
    }

    async fn release_constraint_lock(&self) -> Result<(), DatastoreError> {
        lock(&self.lock_holder).take();
        Ok(())
    }
}

/// The five definition roots with a small tree under each.
///
/// ```text
/// engagement-plans  e0 -> e1
/// campaigns         c0 -> c1, c2 -> c3
/// test-lab          t0
/// page-events       p0 -> p1
/// goals             g0 -> g1 -> g2
/// ```
pub fn definition_roots() -> Vec<(String, DefinitionItem)> {
    vec![
        (
            "/marketing/engagement-plans".to_string(),
            DefinitionItem::new("e0", "Engagement Plans")
                .with_child(DefinitionItem::new("e1", "Onboarding").with_kind("plan")),
        ),
        (
            "/marketing/campaigns".to_string(),
            DefinitionItem::new("c0", "Campaigns")
                .with_child(DefinitionItem::new("c1", "Spring").with_kind("campaign"))
                .with_child(
                    DefinitionItem::new("c2", "Summer")
                        .with_kind("campaign")
                        .with_child(DefinitionItem::new("c3", "Beach").with_kind("campaign")),
                ),
        ),
        (
            "/marketing/test-lab".to_string(),
            DefinitionItem::new("t0", "Test Lab"),
        ),
        (
            "/settings/analytics/page-events".to_string(),
            DefinitionItem::new("p0", "Page Events")
                .with_child(DefinitionItem::new("p1", "Download").with_kind("page-event")),
        ),
        (
            "/marketing/goals".to_string(),
            DefinitionItem::new("g0", "Goals").with_child(
                DefinitionItem::new("g1", "Register")
                    .with_kind("goal")
                    .with_child(DefinitionItem::new("g2", "Newsletter").with_kind("goal")),
            ),
        ),
    ]
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub templates_dir: PathBuf,
    /// Scratch directory for backup destinations
    pub backup_dir: PathBuf,
    pub settings: Settings,
    pub datastore: Arc<FakeDatastore>,
    pub audit: Arc<MemoryAuditLog>,
    pub ctx: Arc<MaintenanceContext>,
}

impl TestHarness {
    /// Harness with every template present and the standard definition tree.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Run `operation` to completion on the calling task.
    pub async fn run(&self, operation: MaintenanceOperation) -> JobSnapshot {
        let runner = JobRunner::new(self.ctx.clone());
        let job = Job::new(&operation);
        job.advance(JobState::Running);
        runner.execute(&job, &operation).await;
        job.snapshot()
    }

    /// A separate context over the same datastore, as a second janitor
    /// process would build it.
    pub fn other_client(&self) -> Arc<MaintenanceContext> {
        let templates = DirectoryTemplateResolver::new(self.settings.templates_path())
            .expect("Failed to open template directory");
        Arc::new(MaintenanceContext::new(
            self.datastore.clone(),
            Arc::new(templates),
            Arc::new(JsonHierarchy::from_roots(definition_roots())),
            self.audit.clone(),
            &self.settings,
        ))
    }

    pub fn scheduler(&self) -> JobScheduler {
        JobScheduler::new(self.ctx.clone(), self.settings.job_retention())
    }

    pub fn audit_messages(&self) -> Vec<String> {
        self.audit.messages()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for [`TestHarness`].
pub struct HarnessBuilder {
    missing_templates: Vec<TemplateName>,
    roots: Vec<(String, DefinitionItem)>,
    settings: Settings,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            missing_templates: Vec::new(),
            roots: definition_roots(),
            settings: Settings {
                dialect: DIALECT.to_string(),
                actor: ACTOR.to_string(),
                ..Settings::default()
            },
        }
    }
}

impl HarnessBuilder {
    /// Leave `name` out of the template directory.
    pub fn without_template(mut self, name: TemplateName) -> Self {
        self.missing_templates.push(name);
        self
    }

    pub fn roots(mut self, roots: Vec<(String, DefinitionItem)>) -> Self {
        self.roots = roots;
        self
    }

    pub fn settings(mut self, edit: impl FnOnce(&mut Settings)) -> Self {
        edit(&mut self.settings);
        self
    }

    pub fn build(self) -> TestHarness {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let templates_dir = temp_dir.path().join("templates");
        write_templates(&templates_dir, &self.settings.dialect, &self.missing_templates);

        let backup_dir = temp_dir.path().join("backups");
        std::fs::create_dir_all(&backup_dir).expect("Failed to create backup dir");

        let mut settings = self.settings;
        settings.templates_dir = templates_dir.to_string_lossy().into_owned();

        let templates = DirectoryTemplateResolver::new(settings.templates_path())
            .expect("Failed to open template directory");
        let datastore = Arc::new(FakeDatastore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let ctx = MaintenanceContext::new(
            datastore.clone(),
            Arc::new(templates),
            Arc::new(JsonHierarchy::from_roots(self.roots)),
            audit.clone(),
            &settings,
        );

        TestHarness {
            _temp_dir: temp_dir,
            templates_dir,
            backup_dir,
            settings,
            datastore,
            audit,
            ctx: Arc::new(ctx),
        }
    }
}

fn write_templates(root: &Path, dialect: &str, missing: &[TemplateName]) {
    let dir = root.join(dialect);
    std::fs::create_dir_all(&dir).expect("Failed to create template dir");
    for name in TemplateName::ALL {
        if missing.contains(&name) {
            continue;
        }
        std::fs::write(dir.join(format!("{}.sql", name.as_str())), template_body(name))
            .expect("Failed to write template");
    }
}

/// Every operation, with a backup destination inside `backup_dir`.
pub fn all_operations(backup_dir: &Path) -> Vec<MaintenanceOperation> {
    vec![
        MaintenanceOperation::FullClean { remove_ips: true },
        MaintenanceOperation::FilteredCleanOlderThan {
            threshold: MaintenanceOperation::parse_threshold("2024-01-01 00:00:00")
                .expect("valid threshold"),
        },
        MaintenanceOperation::FilteredCleanBounce,
        MaintenanceOperation::FilteredCleanCustomRule {
            column: "TrafficType".to_string(),
            literal: "20".to_string(),
        },
        MaintenanceOperation::RebuildIndex { online: false },
        MaintenanceOperation::RemoveBots,
        MaintenanceOperation::Backup {
            destination_path: backup_dir.join("nightly.bak"),
        },
        MaintenanceOperation::SyncDefinitions,
    ]
}
