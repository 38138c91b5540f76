//! Webhook endpoints for Git providers.
//!
//! Every qualifying event queues a job for the repository it concerns.
//! Other events are acknowledged and dropped.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use grgate_core::PlatformKind;
use grgate_scheduler::Job;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::error::ApiError;

/// GitLab events that can change the outcome of a gating run.
const GITLAB_EVENTS: &[&str] = &["Release Hook", "Pipeline Hook"];

pub fn router(platform: PlatformKind) -> Router<AppState> {
    match platform {
        PlatformKind::Github => Router::new().route("/github/webhook", post(github_webhook)),
        PlatformKind::Gitlab => Router::new().route("/gitlab/webhook", post(gitlab_webhook)),
    }
}

#[derive(Debug, Deserialize)]
struct GithubEvent {
    action: Option<String>,
    state: Option<String>,
    repository: GithubRepository,
}

#[derive(Debug, Deserialize)]
struct GithubRepository {
    name: String,
    owner: GithubOwner,
}

#[derive(Debug, Deserialize)]
struct GithubOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitlabEvent {
    project: GitlabProject,
}

#[derive(Debug, Deserialize)]
struct GitlabProject {
    path_with_namespace: String,
}

/// Handle GitHub webhook events.
async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if let Some(secret) = state.config.github.webhook_secret.as_deref() {
        let signature = header(&headers, "X-Hub-Signature-256");
        if !verify_github_signature(secret, &body, signature) {
            warn!("Invalid webhook signature");
            return Err(ApiError::Unauthorized("invalid signature".to_string()));
        }
    }

    let event_type = header(&headers, "X-GitHub-Event").unwrap_or("unknown");
    if event_type == "ping" {
        info!("Ping event received - webhook is configured correctly");
        return Ok(StatusCode::OK);
    }

    let event: GithubEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    if !github_event_qualifies(event_type, &event) {
        debug!(event = %event_type, action = ?event.action, "Ignoring GitHub event");
        return Ok(StatusCode::OK);
    }

    enqueue(&state, &event.repository.owner.login, &event.repository.name).await
}

fn github_event_qualifies(event_type: &str, event: &GithubEvent) -> bool {
    match event_type {
        "status" => event.state.as_deref() == Some("success"),
        "check_suite" | "check_run" => event.action.as_deref() == Some("completed"),
        "release" => matches!(event.action.as_deref(), Some("created" | "edited")),
        _ => false,
    }
}

/// Handle GitLab webhook events.
async fn gitlab_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if let Some(secret) = state.config.gitlab.webhook_secret.as_deref() {
        if header(&headers, "X-Gitlab-Token") != Some(secret) {
            warn!("Token validation failed");
            return Err(ApiError::Unauthorized("invalid token".to_string()));
        }
    }

    let event_type = header(&headers, "X-Gitlab-Event").unwrap_or_default().trim();
    if !GITLAB_EVENTS.contains(&event_type) {
        debug!(event = %event_type, "Ignoring GitLab event");
        return Ok(StatusCode::OK);
    }

    let event: GitlabEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let Some((owner, repository)) = event.project.path_with_namespace.rsplit_once('/') else {
        return Err(ApiError::BadRequest(format!(
            "invalid project path {}",
            event.project.path_with_namespace
        )));
    };

    enqueue(&state, owner, repository).await
}

/// Resolve the repository configuration and queue a job for it.
async fn enqueue(state: &AppState, owner: &str, repository: &str) -> Result<StatusCode, ApiError> {
    let job = Job::resolve(state.platform.clone(), owner, repository, &state.config)
        .await
        .inspect_err(|e| error!(owner, repository, error = %e, "Couldn't create job"))?;
    let job_id = job.id;

    match state.job_queue.try_send(job) {
        Ok(()) => {
            info!(%job_id, owner, repository, "Queued job");
            Ok(StatusCode::ACCEPTED)
        }
        Err(TrySendError::Full(_)) => {
            warn!(owner, repository, "Job queue is full, rejecting event");
            Err(ApiError::ServiceUnavailable("job queue is full".to_string()))
        }
        Err(TrySendError::Closed(_)) => Err(ApiError::ServiceUnavailable(
            "worker pool is shutting down".to_string(),
        )),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Verify GitHub webhook signature.
fn verify_github_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };

    // Signature format: "sha256=<hex>"
    let Some(sig_hex) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };

    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use grgate_config::MainConfig;
    use grgate_core::fakes::MemoryPlatform;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const SECRET: &str = "s3cr3t";

    fn app(kind: PlatformKind, capacity: usize) -> (Router, mpsc::Receiver<Job>) {
        let mut config = MainConfig {
            platform: kind,
            ..Default::default()
        };
        config.github.webhook_secret = Some(SECRET.to_string());
        config.gitlab.webhook_secret = Some(SECRET.to_string());

        let (job_queue, jobs) = mpsc::channel(capacity);
        let state = AppState::new(
            Arc::new(MemoryPlatform::new(kind)),
            Arc::new(config),
            job_queue,
        );
        (crate::routes::router(state), jobs)
    }

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn github_request(event: &str, body: &serde_json::Value) -> Request<Body> {
        let body = body.to_string();
        Request::post("/github/webhook")
            .header("X-GitHub-Event", event)
            .header("X-Hub-Signature-256", sign(&body))
            .body(Body::from(body))
            .unwrap()
    }

    fn github_payload(extra: serde_json::Value) -> serde_json::Value {
        let mut payload = json!({
            "repository": { "name": "grgate", "owner": { "login": "fikaworks" } }
        });
        if let (Some(payload), Some(extra)) = (payload.as_object_mut(), extra.as_object()) {
            payload.extend(extra.clone());
        }
        payload
    }

    fn gitlab_request(event: &str, token: &str) -> Request<Body> {
        let body = json!({ "project": { "path_with_namespace": "group/sub/project" } });
        Request::post("/gitlab/webhook")
            .header("X-Gitlab-Event", event)
            .header("X-Gitlab-Token", token)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_verify_github_signature() {
        let body = r#"{"zen":"Keep it logically awesome."}"#;
        assert!(verify_github_signature(SECRET, body.as_bytes(), Some(&sign(body))));
        assert!(!verify_github_signature("other", body.as_bytes(), Some(&sign(body))));
        assert!(!verify_github_signature(SECRET, body.as_bytes(), Some("sha1=abc")));
        assert!(!verify_github_signature(SECRET, body.as_bytes(), None));
    }

    #[tokio::test]
    async fn test_github_success_status_queues_job() {
        let (app, mut jobs) = app(PlatformKind::Github, 1);

        let response = app
            .oneshot(github_request("status", &github_payload(json!({ "state": "success" }))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job = jobs.try_recv().unwrap();
        assert_eq!(job.owner, "fikaworks");
        assert_eq!(job.repository, "grgate");
    }

    #[tokio::test]
    async fn test_github_non_qualifying_events_are_dropped() {
        let cases = [
            ("status", json!({ "state": "pending" })),
            ("check_run", json!({ "action": "created" })),
            ("release", json!({ "action": "published" })),
            ("push", json!({})),
        ];

        for (event, extra) in cases {
            let (app, mut jobs) = app(PlatformKind::Github, 1);
            let response = app
                .oneshot(github_request(event, &github_payload(extra)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "event {}", event);
            assert!(jobs.try_recv().is_err(), "event {}", event);
        }
    }

    #[tokio::test]
    async fn test_github_ping_is_acknowledged() {
        let (app, _jobs) = app(PlatformKind::Github, 1);
        let response = app
            .oneshot(github_request("ping", &json!({ "zen": "Design for failure." })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_github_invalid_signature_is_rejected() {
        let (app, mut jobs) = app(PlatformKind::Github, 1);
        let request = Request::post("/github/webhook")
            .header("X-GitHub-Event", "check_suite")
            .header("X-Hub-Signature-256", "sha256=deadbeef")
            .body(Body::from(
                github_payload(json!({ "action": "completed" })).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_returns_service_unavailable() {
        let (app, _jobs) = app(PlatformKind::Github, 1);
        let request = || github_request("check_suite", &github_payload(json!({ "action": "completed" })));

        let first = app.clone().oneshot(request()).await.unwrap();
        let second = app.oneshot(request()).await.unwrap();

        assert_eq!(first.status(), StatusCode::ACCEPTED);
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_gitlab_pipeline_event_queues_job() {
        let (app, mut jobs) = app(PlatformKind::Gitlab, 1);

        let response = app
            .oneshot(gitlab_request("Pipeline Hook", SECRET))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let job = jobs.try_recv().unwrap();
        assert_eq!(job.owner, "group/sub");
        assert_eq!(job.repository, "project");
    }

    #[tokio::test]
    async fn test_gitlab_rejects_wrong_token() {
        let (app, mut jobs) = app(PlatformKind::Gitlab, 1);

        let response = app
            .oneshot(gitlab_request("Release Hook", "wrong"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_gitlab_unsupported_event_is_dropped() {
        let (app, mut jobs) = app(PlatformKind::Gitlab, 1);

        let response = app
            .oneshot(gitlab_request("Push Hook", SECRET))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(jobs.try_recv().is_err());
    }
}
