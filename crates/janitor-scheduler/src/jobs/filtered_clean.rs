//! Filtered cleans: delete visits matching one filter, then the visitors
//! left without visits.

use chrono::NaiveDateTime;
use janitor_store::{is_plain_identifier, parse_literal_type, render, TemplateName};
use janitor_types::{Job, JobError, THRESHOLD_FORMAT};
use tracing::info;

use crate::context::MaintenanceContext;

/// Render the older-than script for `threshold`.
pub fn older_than_script(template: &str, threshold: NaiveDateTime) -> String {
    let formatted = threshold.format(THRESHOLD_FORMAT).to_string();
    render(template, &[("threshold", formatted.as_str())])
}

/// Render the custom-rule script. `column` must be a plain identifier.
pub fn custom_rule_script(
    template: &str,
    column: &str,
    literal: &str,
    dialect: &str,
) -> Result<String, JobError> {
    if !is_plain_identifier(column) {
        return Err(JobError::precondition(format!(
            "Column name is not a valid identifier: {column}"
        )));
    }
    let typed = parse_literal_type(literal);
    Ok(render(
        template,
        &[
            ("column", column),
            ("value", typed.formatted.as_str()),
            ("type", typed.literal_type.sql_type(dialect)),
        ],
    ))
}

/// Delete visits older than `threshold`.
pub async fn older_than(
    ctx: &MaintenanceContext,
    job: &Job,
    threshold: NaiveDateTime,
) -> Result<u64, JobError> {
    let template = ctx.required_template(TemplateName::CleanFilteredOlderThan)?;
    apply_clean_filter(ctx, job, older_than_script(&template, threshold)).await
}

/// Delete bounce visits.
pub async fn bounce(ctx: &MaintenanceContext, job: &Job) -> Result<u64, JobError> {
    let script = ctx.required_template(TemplateName::CleanFilteredBounceVisits)?;
    apply_clean_filter(ctx, job, script).await
}

/// Delete visits whose `column` equals `literal`.
pub async fn custom_rule(
    ctx: &MaintenanceContext,
    job: &Job,
    column: &str,
    literal: &str,
) -> Result<u64, JobError> {
    let template = ctx.required_template(TemplateName::CleanFilteredCustomRule)?;
    let script = custom_rule_script(&template, column, literal, &ctx.dialect)?;
    apply_clean_filter(ctx, job, script).await
}

async fn apply_clean_filter(
    ctx: &MaintenanceContext,
    job: &Job,
    script: String,
) -> Result<u64, JobError> {
    let orphans = ctx.optional_template(TemplateName::RemoveUnusedVisitors);

    ctx.audit_started(job);

    let (script, orphans) = (&script, orphans.as_deref());
    let removed = ctx
        .governor
        .governed(move || async move {
            let removed = ctx.executor.run_one(script).await?;
            if let Some(orphans) = orphans {
                ctx.executor.run_one(orphans).await?;
            }
            Ok::<_, JobError>(removed)
        })
        .await?;

    info!(removed, "Filtered clean complete");
    job.set_processed(removed);
    ctx.report(job, format!("Visits removed: {removed}"));
    Ok(removed)
}
