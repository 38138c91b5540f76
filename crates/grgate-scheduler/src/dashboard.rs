//! Dashboard issue summarizing GRGate's view of a repository.

use chrono::{DateTime, Utc};
use grgate_config::{DashboardConfig, Template, TemplateResult};
use grgate_core::{Issue, Platform};
use serde::Serialize;
use tracing::{debug, info};

use crate::{SchedulerError, SchedulerResult};

/// Values available to the dashboard template.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashboardData {
    pub enabled: bool,
    pub errors: Vec<String>,
    pub last_execution_time: String,
}

/// Format a time the way the dashboard reports it, e.g. `Tue Mar  5 14:02:11 UTC 2024`.
pub fn format_execution_time(time: DateTime<Utc>) -> String {
    time.format("%a %b %e %H:%M:%S UTC %Y").to_string()
}

pub fn render_dashboard(template: &str, data: &DashboardData) -> TemplateResult<String> {
    Template::parse("dashboard", template)?.render(data)
}

/// Update the dashboard issue, or open it when it does not exist yet.
///
/// The issue is the one with the configured title opened by the configured
/// author, or by the authenticated account when no author is configured.
pub async fn upsert_dashboard(
    platform: &dyn Platform,
    owner: &str,
    repository: &str,
    config: &DashboardConfig,
    body: String,
) -> SchedulerResult<()> {
    let author = match &config.author {
        Some(author) => author.clone(),
        None => platform
            .current_user()
            .await
            .map_err(SchedulerError::platform("resolve dashboard author"))?,
    };

    let issues = platform
        .list_issues_by_author(owner, repository, &author)
        .await
        .map_err(SchedulerError::platform("list dashboard issues"))?;

    match issues.into_iter().find(|issue| issue.title == config.title) {
        Some(existing) => {
            debug!(owner, repository, issue = existing.id, "Updating dashboard issue");
            let issue = Issue { body, ..existing };
            platform
                .update_issue(owner, repository, &issue)
                .await
                .map_err(SchedulerError::platform("update dashboard issue"))?;
        }
        None => {
            info!(owner, repository, title = %config.title, "Creating dashboard issue");
            let issue = Issue {
                id: 0,
                title: config.title.clone(),
                body,
            };
            platform
                .create_issue(owner, repository, &issue)
                .await
                .map_err(SchedulerError::platform("create dashboard issue"))?;
        }
    }

    Ok(())
}
