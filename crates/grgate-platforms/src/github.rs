//! GitHub platform over the REST API.
//!
//! Statuses are GitHub check runs. Draft releases are native. A release's
//! commit is its `target_commitish`, which may be a SHA or a branch name;
//! the check-runs endpoint accepts either.

use async_trait::async_trait;
use grgate_config::GithubConfig;
use grgate_core::{
    Issue, Platform, PlatformError, PlatformKind, PlatformResult, Release, ReleaseId, Status,
};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::http::{PER_PAGE, client, encode_path, parse_json, send};

pub struct GithubPlatform {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    id: u64,
    tag_name: String,
    name: Option<String>,
    body: Option<String>,
    draft: bool,
    target_commitish: String,
}

#[derive(Debug, Deserialize)]
struct ApiCheckRuns {
    check_runs: Vec<ApiCheckRun>,
}

#[derive(Debug, Deserialize)]
struct ApiCheckRun {
    name: String,
    head_sha: String,
    status: String,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    body: Option<String>,
    pull_request: Option<serde_json::Value>,
}

fn release_from_api(release: ApiRelease) -> Release {
    Release {
        commit_sha: release.target_commitish,
        id: ReleaseId::Github(release.id),
        name: release.name.unwrap_or_default(),
        tag: release.tag_name,
        release_note: release.body.unwrap_or_default(),
        draft: release.draft,
        platform: PlatformKind::Github,
    }
}

fn status_from_check_run(check: ApiCheckRun) -> Status {
    Status {
        commit_sha: check.head_sha,
        name: check.name,
        status: check.status,
        state: check.conclusion.unwrap_or_default(),
    }
}

/// The issues endpoint also returns pull requests; those are dropped.
fn issue_from_api(issue: ApiIssue) -> Option<Issue> {
    if issue.pull_request.is_some() {
        return None;
    }
    Some(Issue {
        id: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
    })
}

fn release_number(release: &Release) -> PlatformResult<u64> {
    match &release.id {
        ReleaseId::Github(id) => Ok(*id),
        other => Err(PlatformError::Unsupported(format!(
            "release id {} does not belong to github",
            other
        ))),
    }
}

impl GithubPlatform {
    pub fn new(config: &GithubConfig) -> PlatformResult<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| PlatformError::Config("github token is not set".to_string()))?;

        Ok(Self {
            client: client()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Fetch every page of a list endpoint.
    async fn get_pages<R, T>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
        items: impl Fn(R) -> Vec<T>,
    ) -> PlatformResult<Vec<T>>
    where
        R: DeserializeOwned,
    {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let builder = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch = items(parse_json::<R>(send(builder, what).await?, what).await?);
            let count = batch.len();
            all.extend(batch);

            if count < PER_PAGE {
                return Ok(all);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Platform for GithubPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Github
    }

    async fn read_file(&self, owner: &str, repository: &str, path: &str) -> PlatformResult<String> {
        debug!(owner, repository, path, "Reading file from GitHub");
        let builder = self
            .request(
                Method::GET,
                &format!("/repos/{}/{}/contents/{}", owner, repository, encode_path(path)),
            )
            .header("Accept", "application/vnd.github.raw+json");
        let what = format!("file {} in {}/{}", path, owner, repository);

        send(builder, &what)
            .await?
            .text()
            .await
            .map_err(|e| PlatformError::Parse(format!("{}: {}", what, e)))
    }

    async fn list_releases(&self, owner: &str, repository: &str) -> PlatformResult<Vec<Release>> {
        debug!(owner, repository, "Listing GitHub releases");
        self.get_pages(
            &format!("/repos/{}/{}/releases", owner, repository),
            &[],
            &format!("releases of {}/{}", owner, repository),
            |releases: Vec<ApiRelease>| releases.into_iter().map(release_from_api).collect(),
        )
        .await
    }

    async fn update_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<()> {
        let id = release_number(release)?;
        debug!(owner, repository, tag = %release.tag, "Updating GitHub release");
        let builder = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/{}/releases/{}", owner, repository, id),
            )
            .json(&json!({ "name": release.name, "body": release.release_note }));
        send(builder, &format!("update release {}", release.tag)).await?;
        Ok(())
    }

    async fn publish_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<bool> {
        let id = release_number(release)?;
        debug!(owner, repository, tag = %release.tag, "Publishing GitHub release");
        let builder = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/{}/releases/{}", owner, repository, id),
            )
            .json(&json!({ "draft": false }));
        send(builder, &format!("publish release {}", release.tag)).await?;
        Ok(true)
    }

    async fn list_statuses(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
    ) -> PlatformResult<Vec<Status>> {
        debug!(owner, repository, commit_sha, "Listing GitHub check runs");
        self.get_pages(
            &format!(
                "/repos/{}/{}/commits/{}/check-runs",
                owner,
                repository,
                urlencoding::encode(commit_sha)
            ),
            &[],
            &format!("check runs of {}", commit_sha),
            |runs: ApiCheckRuns| {
                runs.check_runs
                    .into_iter()
                    .map(status_from_check_run)
                    .collect()
            },
        )
        .await
    }

    async fn create_status(
        &self,
        owner: &str,
        repository: &str,
        status: &Status,
    ) -> PlatformResult<()> {
        debug!(owner, repository, name = %status.name, "Creating GitHub check run");
        let mut body = json!({
            "name": status.name,
            "head_sha": status.commit_sha,
            "status": status.status,
        });
        if !status.state.is_empty() {
            body["conclusion"] = json!(status.state);
        }

        let builder = self
            .request(Method::POST, &format!("/repos/{}/{}/check-runs", owner, repository))
            .json(&body);
        send(builder, &format!("create check run {}", status.name)).await?;
        Ok(())
    }

    async fn current_user(&self) -> PlatformResult<String> {
        let what = "authenticated user";
        let response = send(self.request(Method::GET, "/user"), what).await?;
        Ok(parse_json::<ApiUser>(response, what).await?.login)
    }

    async fn list_issues_by_author(
        &self,
        owner: &str,
        repository: &str,
        author: &str,
    ) -> PlatformResult<Vec<Issue>> {
        debug!(owner, repository, author, "Listing GitHub issues");
        self.get_pages(
            &format!("/repos/{}/{}/issues", owner, repository),
            &[("creator", author), ("state", "open")],
            &format!("issues of {}/{}", owner, repository),
            |issues: Vec<ApiIssue>| issues.into_iter().filter_map(issue_from_api).collect(),
        )
        .await
    }

    async fn create_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        debug!(owner, repository, title = %issue.title, "Creating GitHub issue");
        let builder = self
            .request(Method::POST, &format!("/repos/{}/{}/issues", owner, repository))
            .json(&json!({ "title": issue.title, "body": issue.body }));
        send(builder, &format!("create issue {}", issue.title)).await?;
        Ok(())
    }

    async fn update_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        debug!(owner, repository, number = issue.id, "Updating GitHub issue");
        let builder = self
            .request(
                Method::PATCH,
                &format!("/repos/{}/{}/issues/{}", owner, repository, issue.id),
            )
            .json(&json!({ "title": issue.title, "body": issue.body }));
        send(builder, &format!("update issue {}", issue.id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::serve;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, patch};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn platform(api_url: String) -> GithubPlatform {
        GithubPlatform::new(&GithubConfig {
            token: Some("token".to_string()),
            webhook_secret: None,
            api_url,
        })
        .unwrap()
    }

    #[test]
    fn test_new_requires_token() {
        let err = GithubPlatform::new(&GithubConfig::default()).err().unwrap();
        assert!(matches!(err, PlatformError::Config(_)));
    }

    #[test]
    fn test_issue_mapping_drops_pull_requests() {
        let pr = ApiIssue {
            number: 1,
            title: "PR".to_string(),
            body: None,
            pull_request: Some(json!({"url": "..."})),
        };
        assert!(issue_from_api(pr).is_none());

        let issue = ApiIssue {
            number: 2,
            title: "GRGate dashboard".to_string(),
            body: None,
            pull_request: None,
        };
        assert_eq!(issue_from_api(issue).unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_list_releases_follows_pages() {
        async fn releases(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
            let page: usize = query["page"].parse().unwrap();
            let count = if page == 1 { PER_PAGE } else { 1 };
            let items: Vec<Value> = (0..count)
                .map(|i| {
                    json!({
                        "id": page * 1000 + i,
                        "tag_name": format!("v{}.{}", page, i),
                        "name": null,
                        "body": "notes",
                        "draft": i == 0,
                        "target_commitish": "abc123",
                    })
                })
                .collect();
            Json(Value::Array(items))
        }

        let url = serve(Router::new().route("/repos/org/repo/releases", get(releases))).await;
        let releases = platform(url).list_releases("org", "repo").await.unwrap();

        assert_eq!(releases.len(), PER_PAGE + 1);
        assert_eq!(releases[0].id, ReleaseId::Github(1000));
        assert_eq!(releases[0].commit_sha, "abc123");
        assert_eq!(releases[0].release_note, "notes");
        assert!(releases[0].draft);
        assert!(!releases[1].draft);
        assert_eq!(releases[PER_PAGE].tag, "v2.0");
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let router = Router::new().route(
            "/repos/org/repo/contents/.grgate.yaml",
            get(|| async { (StatusCode::NOT_FOUND, "Not Found") }),
        );
        let url = serve(router).await;

        let err = platform(url).read_file("org", "repo", ".grgate.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_statuses_maps_check_runs() {
        let router = Router::new().route(
            "/repos/org/repo/commits/abc123/check-runs",
            get(|| async {
                Json(json!({
                    "total_count": 2,
                    "check_runs": [
                        {"name": "e2e", "head_sha": "abc123", "status": "completed", "conclusion": "success"},
                        {"name": "lint", "head_sha": "abc123", "status": "in_progress", "conclusion": null},
                    ]
                }))
            }),
        );
        let url = serve(router).await;

        let statuses = platform(url).list_statuses("org", "repo", "abc123").await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].is_success());
        assert_eq!(statuses[1].status, "in_progress");
        assert_eq!(statuses[1].state, "");
    }

    #[tokio::test]
    async fn test_list_statuses_of_branch_target() {
        async fn check_runs(Path(reference): Path<String>) -> Json<Value> {
            assert_eq!(reference, "release/1.0");
            Json(json!({
                "total_count": 1,
                "check_runs": [
                    {"name": "e2e", "head_sha": "def456", "status": "completed", "conclusion": "success"},
                ]
            }))
        }

        let router =
            Router::new().route("/repos/org/repo/commits/{reference}/check-runs", get(check_runs));
        let url = serve(router).await;

        let statuses = platform(url).list_statuses("org", "repo", "release/1.0").await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].commit_sha, "def456");
        assert!(statuses[0].is_success());
    }

    #[tokio::test]
    async fn test_current_user_is_the_token_owner() {
        let router = Router::new().route(
            "/user",
            get(|| async { Json(json!({"login": "release-bot", "id": 1, "type": "User"})) }),
        );
        let url = serve(router).await;

        assert_eq!(platform(url).current_user().await.unwrap(), "release-bot");
    }

    #[tokio::test]
    async fn test_publish_release_clears_draft() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let router = Router::new()
            .route(
                "/repos/org/repo/releases/42",
                patch(
                    |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                        Json(json!({}))
                    },
                ),
            )
            .with_state(received.clone());
        let url = serve(router).await;

        let release = Release {
            commit_sha: "abc123".to_string(),
            id: ReleaseId::Github(42),
            name: "v1.0.0".to_string(),
            tag: "v1.0.0".to_string(),
            release_note: String::new(),
            draft: true,
            platform: PlatformKind::Github,
        };
        assert!(platform(url).publish_release("org", "repo", &release).await.unwrap());
        assert_eq!(received.lock().unwrap()[0], json!({"draft": false}));
    }

    #[tokio::test]
    async fn test_rejects_gitlab_release_ids() {
        let release = Release {
            commit_sha: String::new(),
            id: ReleaseId::Gitlab("v1".to_string()),
            name: String::new(),
            tag: "v1".to_string(),
            release_note: String::new(),
            draft: true,
            platform: PlatformKind::Gitlab,
        };
        let err = platform("http://127.0.0.1:1".to_string())
            .update_release("org", "repo", &release)
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_list_issues_filters_by_creator() {
        async fn issues(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
            assert_eq!(query["creator"], "grgate[bot]");
            Json(json!([
                {"number": 3, "title": "GRGate dashboard", "body": "ok"},
                {"number": 4, "title": "Bump deps", "body": null, "pull_request": {}},
            ]))
        }

        let url = serve(Router::new().route("/repos/org/repo/issues", get(issues))).await;
        let issues = platform(url)
            .list_issues_by_author("org", "repo", "grgate[bot]")
            .await
            .unwrap();
        assert_eq!(issues, vec![Issue {
            id: 3,
            title: "GRGate dashboard".to_string(),
            body: "ok".to_string(),
        }]);
    }
}
