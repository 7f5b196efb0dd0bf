/// Entry point of a run: one targeted user or a sweep over every user
///
/// Users run sequentially. A failed user is recorded in the report and the
/// sweep moves on; only a fatal error (bad configuration or input) aborts
/// before anything else happens.
use crate::{
    error::AppResult,
    models::{RunMode, RunReport, RunRequest, Severity},
    services::{context::RunContext, pipeline::Engine, report::ReportBuilder},
};

/// Users with records, admin first, then everyone else in discovery order.
/// An admin without records is not added.
pub fn sweep_order(users: Vec<String>, admin_user_id: &str) -> Vec<String> {
    let mut ordered = Vec::with_capacity(users.len());
    if users.iter().any(|u| u == admin_user_id) {
        ordered.push(admin_user_id.to_string());
    }
    for user in users {
        if !ordered.contains(&user) {
            ordered.push(user);
        }
    }
    ordered
}

#[tracing::instrument(skip_all, fields(run_id = %ctx.run_id, mode = ?request.mode(), dry_run = ctx.dry_run))]
pub async fn execute(engine: &Engine, ctx: &RunContext, request: &RunRequest) -> AppResult<RunReport> {
    request.validate()?;

    let report = match &request.user_id {
        Some(user_id) => targeted(engine, ctx, request, user_id).await?,
        None => sweep(engine, ctx).await?,
    };

    ctx.update_progress(|p| {
        p.phase = "finished".to_string();
        p.current_user = None;
        p.current_library = None;
    });
    tracing::info!(
        status = ?report.status,
        users_succeeded = report.users_succeeded,
        users_failed = report.users_failed,
        issues = report.issues.len(),
        "Run finished"
    );
    Ok(report)
}

async fn targeted(
    engine: &Engine,
    ctx: &RunContext,
    request: &RunRequest,
    user_id: &str,
) -> AppResult<RunReport> {
    let batches = request.batches_by_library();
    let mut builder = ReportBuilder::new(ctx, RunMode::Targeted);

    ctx.update_progress(|p| {
        p.phase = "targeted".to_string();
        p.users_total = 1;
        p.current_user = Some(user_id.to_string());
    });

    let user = engine
        .run_user(ctx, user_id, request.library_id.as_deref(), batches.as_ref())
        .await?;
    builder.push_user(user);
    ctx.update_progress(|p| p.users_done = 1);

    if ctx.is_cancelled() {
        builder.note(Severity::Warning, user_id, "run cancelled before all libraries were processed");
    }
    Ok(builder.finish())
}

async fn sweep(engine: &Engine, ctx: &RunContext) -> AppResult<RunReport> {
    let users = sweep_order(
        engine.store().list_users().await?,
        &engine.settings().admin_user_id,
    );
    let mut builder = ReportBuilder::new(ctx, RunMode::Sweep);

    ctx.update_progress(|p| {
        p.phase = "sweep".to_string();
        p.users_total = users.len() as u32;
    });
    tracing::info!(users = users.len(), "Starting sweep");

    for (done, user_id) in users.iter().enumerate() {
        if ctx.is_cancelled() {
            builder.note(
                Severity::Warning,
                "run",
                format!("run cancelled; {} users not processed", users.len() - done),
            );
            break;
        }
        ctx.update_progress(|p| p.current_user = Some(user_id.clone()));

        let user = engine.run_user(ctx, user_id, None, None).await?;
        builder.push_user(user);
        ctx.update_progress(|p| p.users_done = done as u32 + 1);
    }

    Ok(builder.finish())
}
