//! In-memory platform (testing only)
//!
//! `MemoryPlatform` satisfies the [`Platform`] contract without any network
//! access, and records every call so tests can assert on side effects.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::{Issue, Platform, PlatformError, PlatformKind, PlatformResult, Release, Status};

#[derive(Debug, Default)]
struct RepositoryState {
    files: HashMap<String, String>,
    releases: Vec<Release>,
    statuses: Vec<Status>,
    issues: Vec<Issue>,
    issue_authors: HashMap<u64, String>,
}

/// In-memory platform keyed by `owner/repository`.
#[derive(Debug)]
pub struct MemoryPlatform {
    kind: PlatformKind,
    repositories: Mutex<HashMap<String, RepositoryState>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    issue_author: String,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(PlatformKind::Github)
    }
}

fn key(owner: &str, repository: &str) -> String {
    format!("{}/{}", owner, repository)
}

/// Tracks concurrent calls for the duration of one simulated request.
struct InFlight<'a>(&'a MemoryPlatform);

impl<'a> InFlight<'a> {
    fn enter(platform: &'a MemoryPlatform) -> Self {
        let current = platform.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        platform.peak.fetch_max(current, Ordering::SeqCst);
        Self(platform)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryPlatform {
    pub fn new(kind: PlatformKind) -> Self {
        Self {
            kind,
            repositories: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            issue_author: "grgate".to_string(),
        }
    }

    /// Delay every `list_releases` call, to observe concurrent jobs.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Account the platform is authenticated as. Issues it creates are
    /// opened by this author.
    pub fn with_issue_author(mut self, author: impl Into<String>) -> Self {
        self.issue_author = author.into();
        self
    }

    /// Make every later call to `method` fail with a request error.
    pub fn fail_on(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn add_file(&self, owner: &str, repository: &str, path: &str, content: &str) {
        self.with_repo(owner, repository, |repo| {
            repo.files.insert(path.to_string(), content.to_string());
        });
    }

    pub fn add_release(&self, owner: &str, repository: &str, release: Release) {
        self.with_repo(owner, repository, |repo| repo.releases.push(release));
    }

    pub fn add_status(&self, owner: &str, repository: &str, status: Status) {
        self.with_repo(owner, repository, |repo| repo.statuses.push(status));
    }

    /// Seed an existing issue opened by `author`.
    pub fn add_issue(&self, owner: &str, repository: &str, author: &str, issue: Issue) {
        self.with_repo(owner, repository, |repo| {
            repo.issue_authors.insert(issue.id, author.to_string());
            repo.issues.push(issue);
        });
    }

    pub fn releases(&self, owner: &str, repository: &str) -> Vec<Release> {
        self.with_repo(owner, repository, |repo| repo.releases.clone())
    }

    pub fn issues(&self, owner: &str, repository: &str) -> Vec<Issue> {
        self.with_repo(owner, repository, |repo| repo.issues.clone())
    }

    pub fn statuses(&self, owner: &str, repository: &str) -> Vec<Status> {
        self.with_repo(owner, repository, |repo| repo.statuses.clone())
    }

    /// Number of times `method` was called.
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Highest number of `list_releases` calls observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn with_repo<T>(
        &self,
        owner: &str,
        repository: &str,
        f: impl FnOnce(&mut RepositoryState) -> T,
    ) -> T {
        let mut repositories = self.repositories.lock().unwrap();
        f(repositories.entry(key(owner, repository)).or_default())
    }

    fn record(&self, method: &'static str) -> PlatformResult<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(method) {
            return Err(PlatformError::Request(format!("{} failed", method)));
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    async fn read_file(&self, owner: &str, repository: &str, path: &str) -> PlatformResult<String> {
        self.record("read_file")?;
        self.with_repo(owner, repository, |repo| repo.files.get(path).cloned())
            .ok_or_else(|| PlatformError::NotFound(format!("{}/{}", key(owner, repository), path)))
    }

    async fn list_releases(&self, owner: &str, repository: &str) -> PlatformResult<Vec<Release>> {
        self.record("list_releases")?;
        let _guard = InFlight::enter(self);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.releases(owner, repository))
    }

    async fn update_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<()> {
        self.record("update_release")?;
        self.with_repo(owner, repository, |repo| {
            let existing = repo
                .releases
                .iter_mut()
                .find(|r| r.id == release.id)
                .ok_or_else(|| PlatformError::NotFound(format!("release {}", release.id)))?;
            existing.name = release.name.clone();
            existing.release_note = release.release_note.clone();
            Ok(())
        })
    }

    async fn publish_release(
        &self,
        owner: &str,
        repository: &str,
        release: &Release,
    ) -> PlatformResult<bool> {
        self.record("publish_release")?;
        self.with_repo(owner, repository, |repo| {
            let existing = repo
                .releases
                .iter_mut()
                .find(|r| r.id == release.id)
                .ok_or_else(|| PlatformError::NotFound(format!("release {}", release.id)))?;
            existing.draft = false;
            Ok(true)
        })
    }

    async fn list_statuses(
        &self,
        owner: &str,
        repository: &str,
        commit_sha: &str,
    ) -> PlatformResult<Vec<Status>> {
        self.record("list_statuses")?;
        Ok(self.with_repo(owner, repository, |repo| {
            repo.statuses
                .iter()
                .filter(|s| s.commit_sha == commit_sha)
                .cloned()
                .collect()
        }))
    }

    async fn create_status(
        &self,
        owner: &str,
        repository: &str,
        status: &Status,
    ) -> PlatformResult<()> {
        self.record("create_status")?;
        self.add_status(owner, repository, status.clone());
        Ok(())
    }

    async fn current_user(&self) -> PlatformResult<String> {
        self.record("current_user")?;
        Ok(self.issue_author.clone())
    }

    async fn list_issues_by_author(
        &self,
        owner: &str,
        repository: &str,
        author: &str,
    ) -> PlatformResult<Vec<Issue>> {
        self.record("list_issues_by_author")?;
        Ok(self.with_repo(owner, repository, |repo| {
            repo.issues
                .iter()
                .filter(|i| repo.issue_authors.get(&i.id).map(String::as_str) == Some(author))
                .cloned()
                .collect()
        }))
    }

    async fn create_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        self.record("create_issue")?;
        let author = self.issue_author.clone();
        self.with_repo(owner, repository, |repo| {
            let id = repo.issues.iter().map(|i| i.id).max().unwrap_or(0) + 1;
            repo.issue_authors.insert(id, author);
            repo.issues.push(Issue {
                id,
                title: issue.title.clone(),
                body: issue.body.clone(),
            });
        });
        Ok(())
    }

    async fn update_issue(&self, owner: &str, repository: &str, issue: &Issue) -> PlatformResult<()> {
        self.record("update_issue")?;
        self.with_repo(owner, repository, |repo| {
            let existing = repo
                .issues
                .iter_mut()
                .find(|i| i.id == issue.id)
                .ok_or_else(|| PlatformError::NotFound(format!("issue {}", issue.id)))?;
            existing.title = issue.title.clone();
            existing.body = issue.body.clone();
            Ok(())
        })
    }
}
