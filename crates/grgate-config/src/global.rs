//! Global configuration.

use std::path::Path;

use grgate_core::PlatformKind;
use kdl::KdlDocument;
use serde::{Deserialize, Serialize};

use crate::node::{children, get_first_string_arg, integer_arg, string_arg};
use crate::{ConfigError, ConfigResult, RepoConfig};

/// Location of the global configuration file when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/grgate/config.kdl";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("log format {} is not recognized", s)),
        }
    }
}

/// Global configuration shared by every job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainConfig {
    pub platform: PlatformKind,
    /// Number of jobs processed concurrently in server mode.
    pub workers: usize,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Path of the configuration file read from each repository.
    pub repo_config_path: String,
    pub server: ServerConfig,
    pub github: GithubConfig,
    pub gitlab: GitlabConfig,
    /// Defaults every repository configuration is layered on.
    pub globals: RepoConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_address: String,
    /// Address the Prometheus scrape endpoint listens on.
    pub metrics_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitlabConfig {
    pub token: Option<String>,
    pub webhook_secret: Option<String>,
    pub url: String,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::Github,
            workers: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            repo_config_path: ".grgate.yaml".to_string(),
            server: ServerConfig::default(),
            github: GithubConfig::default(),
            gitlab: GitlabConfig::default(),
            globals: RepoConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            metrics_address: "0.0.0.0:9101".to_string(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            webhook_secret: None,
            api_url: "https://api.github.com".to_string(),
        }
    }
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            token: None,
            webhook_secret: None,
            url: "https://gitlab.com".to_string(),
        }
    }
}

impl MainConfig {
    /// Parse global configuration from KDL text, starting from the defaults.
    pub fn parse(kdl: &str) -> ConfigResult<Self> {
        let doc: KdlDocument = kdl.parse()?;
        let mut config = Self::default();

        for node in doc.nodes() {
            match node.name().value() {
                "platform" => {
                    let value = string_arg(node, "platform")?;
                    config.platform = value
                        .parse()
                        .map_err(|e: String| ConfigError::invalid("platform", e))?;
                }
                "workers" => {
                    let workers = integer_arg(node, "workers")?;
                    if workers < 1 {
                        return Err(ConfigError::invalid("workers", "must be at least 1"));
                    }
                    config.workers = usize::try_from(workers)
                        .map_err(|_| ConfigError::invalid("workers", "out of range"))?;
                }
                "log-level" => config.log_level = string_arg(node, "log-level")?,
                "log-format" => {
                    let value = string_arg(node, "log-format")?;
                    config.log_format = value
                        .parse()
                        .map_err(|e: String| ConfigError::invalid("log-format", e))?;
                }
                "repo-config-path" => {
                    config.repo_config_path = string_arg(node, "repo-config-path")?
                }
                "server" => {
                    for child in children(node) {
                        match child.name().value() {
                            "listen-address" => {
                                config.server.listen_address =
                                    string_arg(child, "server.listen-address")?
                            }
                            "metrics-address" => {
                                config.server.metrics_address =
                                    string_arg(child, "server.metrics-address")?
                            }
                            _ => {}
                        }
                    }
                }
                "github" => {
                    for child in children(node) {
                        match child.name().value() {
                            "token" => config.github.token = get_first_string_arg(child),
                            "webhook-secret" => {
                                config.github.webhook_secret = get_first_string_arg(child)
                            }
                            "api-url" => config.github.api_url = string_arg(child, "github.api-url")?,
                            _ => {}
                        }
                    }
                }
                "gitlab" => {
                    for child in children(node) {
                        match child.name().value() {
                            "token" => config.gitlab.token = get_first_string_arg(child),
                            "webhook-secret" => {
                                config.gitlab.webhook_secret = get_first_string_arg(child)
                            }
                            "url" => config.gitlab.url = string_arg(child, "gitlab.url")?,
                            _ => {}
                        }
                    }
                }
                "globals" => config.globals.apply_nodes(children(node))?,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Load the global configuration file.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// read when present and the defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Webhook secret of the configured platform.
    pub fn webhook_secret(&self) -> Option<&str> {
        match self.platform {
            PlatformKind::Github => self.github.webhook_secret.as_deref(),
            PlatformKind::Gitlab => self.gitlab.webhook_secret.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MainConfig::parse("").unwrap();
        assert_eq!(config, MainConfig::default());
        assert_eq!(config.platform, PlatformKind::Github);
        assert_eq!(config.workers, 5);
        assert_eq!(config.server.listen_address, "0.0.0.0:8080");
        assert_eq!(config.server.metrics_address, "0.0.0.0:9101");
        assert_eq!(config.repo_config_path, ".grgate.yaml");
        assert!(config.globals.enabled);
        assert_eq!(config.globals.tag_regexp, ".*");
        assert!(config.globals.statuses.is_empty());
        assert_eq!(config.globals.dashboard.author, None);
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            platform "gitlab"
            workers 2
            log-level "debug"
            log-format "json"
            repo-config-path ".github/grgate.yaml"
            server {
                listen-address "127.0.0.1:9000"
                metrics-address "127.0.0.1:9102"
            }
            gitlab {
                token "glpat-xxx"
                webhook-secret "s3cr3t"
                url "https://gitlab.example.org"
            }
            globals {
                tag-regexp "^v"
                statuses "e2e-happyflow" "feature-B"
                release-note {
                    enabled #false
                }
                dashboard {
                    author "grgate[bot]"
                }
            }
        "#;

        let config = MainConfig::parse(kdl).unwrap();
        assert_eq!(config.platform, PlatformKind::Gitlab);
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.repo_config_path, ".github/grgate.yaml");
        assert_eq!(config.server.listen_address, "127.0.0.1:9000");
        assert_eq!(config.server.metrics_address, "127.0.0.1:9102");
        assert_eq!(config.gitlab.token.as_deref(), Some("glpat-xxx"));
        assert_eq!(config.gitlab.url, "https://gitlab.example.org");
        assert_eq!(config.webhook_secret(), Some("s3cr3t"));
        assert_eq!(config.globals.tag_regexp, "^v");
        assert_eq!(config.globals.statuses, vec!["e2e-happyflow", "feature-B"]);
        assert!(!config.globals.release_note.enabled);
        assert!(config.globals.dashboard.enabled);
        assert_eq!(config.globals.dashboard.author.as_deref(), Some("grgate[bot]"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            MainConfig::parse("workers 0").unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
        assert!(matches!(
            MainConfig::parse("platform \"bitbucket\"").unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let err = MainConfig::load(Some(Path::new("/nonexistent/grgate.kdl"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
