use chrono::Utc;

use crate::{
    models::{
        Issue, LibraryReport, RunMode, RunReport, RunStatus, ScopeStatus, Severity, UserReport,
    },
    services::context::RunContext,
};

/// One-line, human readable outcome of a library
pub fn status_line(library: &LibraryReport) -> String {
    let head = format!(
        "{}/{} \"{}\"",
        library.media_kind, library.library_id, library.collection_name
    );
    match library.status {
        ScopeStatus::Failed => format!(
            "{} failed: {}",
            head,
            library.error.as_deref().unwrap_or("unknown error")
        ),
        ScopeStatus::Skipped => format!(
            "{} skipped ({}) active={} pending={}",
            head,
            library.reconcile.skip_reason.as_deref().unwrap_or("nothing to do"),
            library.active,
            library.pending
        ),
        ScopeStatus::Success => {
            let mut line = format!(
                "{} ok: +{} -{} moved={} shown={} active={} pending={}",
                head,
                library.reconcile.added,
                library.reconcile.removed,
                library.reconcile.moved,
                library.reconcile.desired,
                library.active,
                library.pending
            );
            if library.reconcile.move_failed > 0 {
                line.push_str(&format!(" move_failed={}", library.reconcile.move_failed));
            }
            if library.missing_from_library > 0 {
                line.push_str(&format!(" missing={}", library.missing_from_library));
            }
            line
        }
    }
}

/// Failed if any library failed; skipped when nothing ran
pub fn user_status(libraries: &[LibraryReport]) -> ScopeStatus {
    if libraries.iter().any(|l| l.status == ScopeStatus::Failed) {
        ScopeStatus::Failed
    } else if libraries.iter().all(|l| l.status == ScopeStatus::Skipped) {
        ScopeStatus::Skipped
    } else {
        ScopeStatus::Success
    }
}

pub fn run_status(users: &[UserReport]) -> RunStatus {
    let failed = users.iter().filter(|u| u.status == ScopeStatus::Failed).count();
    let move_failures = users
        .iter()
        .flat_map(|u| &u.libraries)
        .any(|l| l.reconcile.move_failed > 0);

    if !users.is_empty() && failed == users.len() {
        RunStatus::Failed
    } else if failed > 0 || move_failures {
        RunStatus::Partial
    } else {
        RunStatus::Success
    }
}

/// Collects user reports into a `RunReport`
pub struct ReportBuilder {
    run_id: uuid::Uuid,
    mode: RunMode,
    dry_run: bool,
    started_at: chrono::DateTime<Utc>,
    users: Vec<UserReport>,
    issues: Vec<Issue>,
}

impl ReportBuilder {
    pub fn new(ctx: &RunContext, mode: RunMode) -> Self {
        Self {
            run_id: ctx.run_id,
            mode,
            dry_run: ctx.dry_run,
            started_at: ctx.started_at,
            users: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn note(&mut self, severity: Severity, scope: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            severity,
            scope: scope.into(),
            message: message.into(),
        });
    }

    pub fn push_user(&mut self, user: UserReport) {
        if user.status == ScopeStatus::Failed && user.libraries.is_empty() {
            let message = user.error.clone().unwrap_or_else(|| "failed".to_string());
            self.note(Severity::Error, user.user_id.clone(), message);
        }

        for library in &user.libraries {
            let scope = format!("{}/{}", user.user_id, library.library_id);
            if library.status == ScopeStatus::Failed {
                let message = library.error.clone().unwrap_or_else(|| "failed".to_string());
                self.note(Severity::Error, scope.clone(), message);
            }
            if library.reconcile.move_failed > 0 {
                self.note(
                    Severity::Warning,
                    scope.clone(),
                    format!("{} reorder moves failed", library.reconcile.move_failed),
                );
            }
            if library.downloads.request_failed > 0 {
                self.note(
                    Severity::Warning,
                    scope.clone(),
                    format!("{} download requests failed", library.downloads.request_failed),
                );
            }
            if library.downloads.skipped_no_client > 0 {
                self.note(
                    Severity::Info,
                    scope,
                    format!(
                        "{} approved items waiting for a download service",
                        library.downloads.skipped_no_client
                    ),
                );
            }
        }

        self.users.push(user);
    }

    pub fn finish(self) -> RunReport {
        let users_failed = self
            .users
            .iter()
            .filter(|u| u.status == ScopeStatus::Failed)
            .count() as u32;
        RunReport {
            run_id: self.run_id,
            mode: self.mode,
            dry_run: self.dry_run,
            started_at: self.started_at,
            finished_at: Utc::now(),
            status: run_status(&self.users),
            users_succeeded: self.users.len() as u32 - users_failed,
            users_failed,
            users: self.users,
            issues: self.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaKind, ReconcileSummary};

    fn library(status: ScopeStatus) -> LibraryReport {
        LibraryReport {
            library_id: "1".to_string(),
            media_kind: MediaKind::Movie,
            collection_name: "Inspired by your Immaculate Taste".to_string(),
            status,
            error: (status == ScopeStatus::Failed).then(|| "plex unreachable".to_string()),
            bootstrapped: 0,
            ledger: None,
            activation: Default::default(),
            downloads: Default::default(),
            reconcile: ReconcileSummary {
                desired: 3,
                added: 2,
                ..Default::default()
            },
            active: 3,
            pending: 1,
            missing_from_library: 0,
            status_line: String::new(),
        }
    }

    fn user(id: &str, libraries: Vec<LibraryReport>) -> UserReport {
        UserReport {
            user_id: id.to_string(),
            status: user_status(&libraries),
            error: None,
            libraries,
        }
    }

    #[test]
    fn test_status_lines() {
        let ok = status_line(&library(ScopeStatus::Success));
        assert!(ok.contains("movie/1"));
        assert!(ok.contains("+2"));
        assert!(ok.contains("active=3"));

        let failed = status_line(&library(ScopeStatus::Failed));
        assert!(failed.ends_with("failed: plex unreachable"));
    }

    #[test]
    fn test_user_status() {
        assert_eq!(user_status(&[]), ScopeStatus::Skipped);
        assert_eq!(
            user_status(&[library(ScopeStatus::Success), library(ScopeStatus::Skipped)]),
            ScopeStatus::Success
        );
        assert_eq!(
            user_status(&[library(ScopeStatus::Success), library(ScopeStatus::Failed)]),
            ScopeStatus::Failed
        );
    }

    #[test]
    fn test_run_status() {
        let ok = user("admin", vec![library(ScopeStatus::Success)]);
        let bad = user("friend", vec![library(ScopeStatus::Failed)]);

        assert_eq!(run_status(&[]), RunStatus::Success);
        assert_eq!(run_status(&[ok.clone()]), RunStatus::Success);
        assert_eq!(run_status(&[ok.clone(), bad.clone()]), RunStatus::Partial);
        assert_eq!(run_status(&[bad]), RunStatus::Failed);

        let mut shaky = library(ScopeStatus::Success);
        shaky.reconcile.move_failed = 1;
        assert_eq!(run_status(&[user("admin", vec![shaky])]), RunStatus::Partial);
    }

    #[test]
    fn test_builder_collects_issues() {
        let ctx = RunContext::new(false);
        let mut builder = ReportBuilder::new(&ctx, RunMode::Sweep);
        builder.push_user(user("admin", vec![library(ScopeStatus::Success)]));
        builder.push_user(user("friend", vec![library(ScopeStatus::Failed)]));

        let report = builder.finish();
        assert_eq!(report.users_succeeded, 1);
        assert_eq!(report.users_failed, 1);
        assert_eq!(report.status, RunStatus::Partial);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].scope, "friend/1");
        assert_eq!(report.issues[0].severity, Severity::Error);
    }
}
