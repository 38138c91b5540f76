//! GitLab platform over the REST API (v4).
//!
//! GitLab has no draft releases: a release whose `released_at` lies in the
//! future is treated as a draft, and publishing sets `released_at` to now.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grgate_config::GitlabConfig;
use grgate_core::{
    Issue, Platform, PlatformError, PlatformKind, PlatformResult, Release, ReleaseId, Status,
};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::http::{PER_PAGE, client, parse_json, send};

pub struct GitlabPlatform {
    client: reqwest::Client,
    url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    name: Option<String>,
    description: Option<String>,
    released_at: Option<DateTime<Utc>>,
    commit: ApiCommit,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiCommitStatus {
    sha: String,
    name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    iid: u64,
    title: String,
    description: Option<String>,
}

/// Map GitHub check-run lifecycle values onto GitLab commit states.
/// Values GitLab already understands pass through.
pub fn map_github_status(status: &str) -> &str {
    match status {
        "completed" => "success",
        "in_progress" => "running",
        "queued" => "pending",
        other => other,
    }
}

fn is_draft(released_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    released_at.is_some_and(|at| at > now)
}

fn release_from_api(release: ApiRelease, now: DateTime<Utc>) -> Release {
    Release {
        commit_sha: release.commit.id,
        id: ReleaseId::Gitlab(release.tag_name.clone()),
        name: release.name.unwrap_or_default(),
        draft: is_draft(release.released_at, now),
        tag: release.tag_name,
        release_note: release.description.unwrap_or_default(),
        platform: PlatformKind::Gitlab,
    }
}

fn release_tag(release: &Release) -> PlatformResult<&str> {
    match &release.id {
        ReleaseId::Gitlab(tag) => Ok(tag),
        other => Err(PlatformError::Unsupported(format!(
            "release id {} does not belong to gitlab",
            other
        ))),
    }
}

impl GitlabPlatform {
    pub fn new(config: &GitlabConfig) -> PlatformResult<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| PlatformError::Config("gitlab token is not set".to_string()))?;

        Ok(Self {
            client: client()?,
            url: config.url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a request against a project endpoint. The project is addressed
    /// by its URL-encoded `owner/repository` path.
    fn request(&self, method: Method, owner: &str, repository: &str, path: &str) -> RequestBuilder {
        let project = urlencoding::encode(&format!("{}/{}", owner, repository)).into_owned();
        self.client
            .request(
                method,
                format!("{}/api/v4/projects/{}{}", self.url, project, path),
            )
            .header("PRIVATE-TOKEN", &self.token)
    }

    /// Fetch every page of a list endpoint, following `X-Next-Page`.
    async fn get_pages<T: DeserializeOwned>(
        &self,
        owner: &str,
        repository: &str,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> PlatformResult<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let builder = self
                .request(Method::GET, owner, repository, path)
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let response = send(builder, what).await?;

            let next = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<usize>().ok());

            all.extend(parse_json::<Vec<T>>(response, what).await?);

            match next {
                Some(next) if next > page => page = next,
                _ => return Ok(all),
            }
        }
    }
}

#[async_trait]
impl Platform for GitlabPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Gitlab
    }

    async fn read_file(&self, owner: &str, repository: &str, path: &str) -> PlatformResult<String> {
        debug!(owner, repository, path, "Reading file from GitLab");
        let builder = self.request(
            Method::GET,
            owner,
            repository,
            // The file path is a single URL segment, slashes included.
            &format!(
                "/repository/files/{}/raw",
                urlencoding::encode(path.trim_start_matches('/'))
            ),
        );
        let what = format!("file {} in {}/{}", path, owner, repository);

        send(builder, &what)
            .await?
            .text()
            .await
            .map_err(|e| PlatformError::Parse(format!("{}: {}", what, e)))
    }

    async fn list_releases(&self, owner: &str, repository: &str) -> PlatformResult<Vec<Release>> {
        debug!(owner, repository, "Listing GitLab releases");
        let releases: Vec<ApiRelease> = self
            .get_pages(
                owner,
                repository,
                "/releases",
                &[],
                &format!("releases of {}/{}", owner, repository),
            )
            .await?;

        let now = Utc::now();
        Ok(releases
            .into_iter()
            .map(|release| release_from_api(release, now))
            .collect())
    }

    async fn update_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<()> {
        let tag = release_tag(release)?;
        debug!(owner, repository, tag, "Updating GitLab release");
        let builder = self
            .request(
                Method::PUT,
                owner,
                repository,
                &format!("/releases/{}", urlencoding::encode(tag)),
            )
            .json(&json!({ "name": release.name, "description": release.release_note }));
        send(builder, &format!("update release {}", tag)).await?;
        Ok(())
    }

    async fn publish_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<bool> {
        let tag = release_tag(release)?;
        debug!(owner, repository, tag, "Publishing GitLab release");
        let builder = self
            .request(
                Method::PUT,
                owner,
                repository,
                &format!("/releases/{}", urlencoding::encode(tag)),
            )
            .json(&json!({ "released_at": Utc::now().to_rfc3339() }));
        send(builder, &format!("publish release {}", tag)).await?;
        Ok(true)
    }

    async fn list_statuses(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
    ) -> PlatformResult<Vec<Status>> {
        debug!(owner, repository, commit_sha, "Listing GitLab commit statuses");
        let statuses: Vec<ApiCommitStatus> = self
            .get_pages(
                owner,
                repository,
                &format!("/repository/commits/{}/statuses", commit_sha),
                &[],
                &format!("statuses of {}", commit_sha),
            )
            .await?;

        Ok(statuses
            .into_iter()
            .map(|status| Status {
                commit_sha: status.sha,
                name: status.name,
                status: status.status,
                state: String::new(),
            })
            .collect())
    }

    async fn create_status(
        &self,
        owner: &str,
        repository: &str,
        status: &Status,
    ) -> PlatformResult<()> {
        let state = map_github_status(&status.status);
        debug!(owner, repository, name = %status.name, state, "Creating GitLab commit status");
        let builder = self
            .request(
                Method::POST,
                owner,
                repository,
                &format!("/statuses/{}", status.commit_sha),
            )
            .json(&json!({ "state": state, "name": status.name }));
        send(builder, &format!("create status {}", status.name)).await?;
        Ok(())
    }

    async fn current_user(&self) -> PlatformResult<String> {
        let what = "authenticated user";
        let builder = self
            .client
            .get(format!("{}/api/v4/user", self.url))
            .header("PRIVATE-TOKEN", &self.token);
        Ok(parse_json::<ApiUser>(send(builder, what).await?, what).await?.username)
    }

    async fn list_issues_by_author(
        &self,
        owner: &str,
        repository: &str,
        author: &str,
    ) -> PlatformResult<Vec<Issue>> {
        debug!(owner, repository, author, "Listing GitLab issues");
        let issues: Vec<ApiIssue> = self
            .get_pages(
                owner,
                repository,
                "/issues",
                &[("author_username", author), ("state", "opened")],
                &format!("issues of {}/{}", owner, repository),
            )
            .await?;

        Ok(issues
            .into_iter()
            .map(|issue| Issue {
                id: issue.iid,
                title: issue.title,
                body: issue.description.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        debug!(owner, repository, title = %issue.title, "Creating GitLab issue");
        let builder = self
            .request(Method::POST, owner, repository, "/issues")
            .json(&json!({ "title": issue.title, "description": issue.body }));
        send(builder, &format!("create issue {}", issue.title)).await?;
        Ok(())
    }

    async fn update_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        debug!(owner, repository, iid = issue.id, "Updating GitLab issue");
        let builder = self
            .request(Method::PUT, owner, repository, &format!("/issues/{}", issue.id))
            .json(&json!({ "title": issue.title, "description": issue.body }));
        send(builder, &format!("update issue {}", issue.id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::serve;
    use axum::extract::{Path, Query, State};
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::Duration;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn platform(url: String) -> GitlabPlatform {
        GitlabPlatform::new(&GitlabConfig {
            token: Some("glpat".to_string()),
            webhook_secret: None,
            url,
        })
        .unwrap()
    }

    #[test]
    fn test_map_github_status() {
        assert_eq!(map_github_status("completed"), "success");
        assert_eq!(map_github_status("in_progress"), "running");
        assert_eq!(map_github_status("queued"), "pending");
        assert_eq!(map_github_status("failed"), "failed");
    }

    #[test]
    fn test_future_release_is_draft() {
        let now = Utc::now();
        assert!(is_draft(Some(now + Duration::days(365)), now));
        assert!(!is_draft(Some(now - Duration::seconds(1)), now));
        assert!(!is_draft(None, now));
    }

    #[tokio::test]
    async fn test_list_releases_follows_next_page_header() {
        async fn releases(
            Path(project): Path<String>,
            Query(query): Query<HashMap<String, String>>,
            headers: HeaderMap,
        ) -> impl IntoResponse {
            assert_eq!(project, "org/repo");
            assert_eq!(headers["private-token"], "glpat");

            let future = (Utc::now() + Duration::days(30)).to_rfc3339();
            let past = (Utc::now() - Duration::days(30)).to_rfc3339();
            match query["page"].as_str() {
                "1" => (
                    [("x-next-page", "2")],
                    Json(json!([{
                        "tag_name": "v1.1.0",
                        "name": "v1.1.0",
                        "description": "next",
                        "released_at": future,
                        "commit": {"id": "abc123"},
                    }])),
                ),
                _ => (
                    [("x-next-page", "")],
                    Json(json!([{
                        "tag_name": "v1.0.0",
                        "name": null,
                        "description": null,
                        "released_at": past,
                        "commit": {"id": "def456"},
                    }])),
                ),
            }
        }

        let url = serve(Router::new().route("/api/v4/projects/{project}/releases", get(releases))).await;
        let releases = platform(url).list_releases("org", "repo").await.unwrap();

        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].id, ReleaseId::Gitlab("v1.1.0".to_string()));
        assert!(releases[0].draft);
        assert_eq!(releases[0].commit_sha, "abc123");
        assert!(!releases[1].draft);
        assert_eq!(releases[1].name, "");
    }

    #[tokio::test]
    async fn test_create_status_maps_github_values() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let router = Router::new()
            .route(
                "/api/v4/projects/{project}/statuses/{sha}",
                post(
                    |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                        Json(json!({}))
                    },
                ),
            )
            .with_state(received.clone());
        let url = serve(router).await;

        let status = Status {
            commit_sha: "abc123".to_string(),
            name: "e2e".to_string(),
            status: "completed".to_string(),
            state: "success".to_string(),
        };
        platform(url).create_status("org", "repo", &status).await.unwrap();

        assert_eq!(
            received.lock().unwrap()[0],
            json!({"state": "success", "name": "e2e"})
        );
    }

    #[tokio::test]
    async fn test_list_statuses_and_issues() {
        let router = Router::new()
            .route(
                "/api/v4/projects/{project}/repository/commits/{sha}/statuses",
                get(|| async {
                    Json(json!([{"sha": "abc123", "name": "e2e", "status": "success"}]))
                }),
            )
            .route(
                "/api/v4/projects/{project}/issues",
                get(|Query(query): Query<HashMap<String, String>>| async move {
                    assert_eq!(query["author_username"], "grgate-bot");
                    Json(json!([{"iid": 7, "title": "GRGate dashboard", "description": null}]))
                }),
            );
        let url = serve(router).await;
        let platform = platform(url);

        let statuses = platform.list_statuses("org", "repo", "abc123").await.unwrap();
        assert!(statuses[0].is_success());
        assert_eq!(statuses[0].state, "");

        let issues = platform
            .list_issues_by_author("org", "repo", "grgate-bot")
            .await
            .unwrap();
        assert_eq!(issues[0].id, 7);
        assert_eq!(issues[0].body, "");
    }

    #[tokio::test]
    async fn test_current_user_is_the_token_owner() {
        async fn user(headers: HeaderMap) -> Json<Value> {
            assert_eq!(headers["PRIVATE-TOKEN"], "glpat");
            Json(json!({"id": 12, "username": "project_42_bot", "bot": true}))
        }

        let url = serve(Router::new().route("/api/v4/user", get(user))).await;
        assert_eq!(platform(url).current_user().await.unwrap(), "project_42_bot");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let url = serve(Router::new()).await;
        let err = platform(url).read_file("org", "repo", ".grgate.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
