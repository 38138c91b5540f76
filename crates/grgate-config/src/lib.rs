//! Configuration and templating for GRGate.
//!
//! This crate handles:
//! - The global configuration file (KDL)
//! - Per-repository configuration layered over the globals
//! - The text template language used for release notes and the dashboard

pub mod error;
pub mod global;
mod node;
pub mod repo;
pub mod template;

pub use error::{ConfigError, ConfigResult};
pub use global::{
    DEFAULT_CONFIG_PATH, GithubConfig, GitlabConfig, LogFormat, MainConfig, ServerConfig,
};
pub use repo::{DashboardConfig, ReleaseNoteConfig, RepoConfig, resolve_repo_config};
pub use template::{Template, TemplateError, TemplateResult};
