//! Per-repository configuration.
//!
//! A repository may commit a YAML file (`.grgate.yaml` by default). Every
//! field present in the file overrides the global value; absent fields
//! inherit it.
//!
//! ```yaml
//! enabled: true
//! tagRegexp: "^v\\d+\\.\\d+\\.\\d+$"
//! statuses:
//!   - e2e-happyflow
//!   - feature-B
//! releaseNote:
//!   enabled: true
//! dashboard:
//!   enabled: false
//! ```

use grgate_core::Platform;
use kdl::KdlNode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::node::{bool_arg, children, get_all_string_args, string_arg};
use crate::{ConfigResult, MainConfig};

/// Release note template used when none is configured.
pub const DEFAULT_RELEASE_NOTE_TEMPLATE: &str = r#"{{ .ReleaseNote }}<!-- GRGate start -->
<details><summary>Status check</summary>
{{ range .Statuses }}
- [{{ if or (and (eq .Status "completed") (eq .State "success")) (eq .Status "success") }}x{{ else }} {{ end }}] {{ .Name }}
{{- end }}

</details>
<!-- GRGate end -->"#;

/// Dashboard issue template used when none is configured.
pub const DEFAULT_DASHBOARD_TEMPLATE: &str = r#"GRGate is {{ if .Enabled }}enabled{{- else }}disabled{{ end }} for this repository.
{{- if .Errors }}

Incorrect configuration detected with the following error(s):
{{- range .Errors }}
- {{ . }}
{{- end }}
{{- end }}

Last time GRGate processed this repository: {{ .LastExecutionTime }}"#;

pub const DEFAULT_DASHBOARD_TITLE: &str = "GRGate dashboard";

/// Fully resolved configuration for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// When false, releases are evaluated but never updated or published.
    pub enabled: bool,
    /// Only releases whose tag matches are considered.
    pub tag_regexp: String,
    /// Status names that must all succeed before publishing.
    pub statuses: Vec<String>,
    pub release_note: ReleaseNoteConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNoteConfig {
    pub enabled: bool,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    /// Account the dashboard issue is opened by. When unset, the account the
    /// platform client is authenticated as.
    pub author: Option<String>,
    pub title: String,
    pub template: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tag_regexp: ".*".to_string(),
            statuses: Vec::new(),
            release_note: ReleaseNoteConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for ReleaseNoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: DEFAULT_RELEASE_NOTE_TEMPLATE.to_string(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            author: None,
            title: DEFAULT_DASHBOARD_TITLE.to_string(),
            template: DEFAULT_DASHBOARD_TEMPLATE.to_string(),
        }
    }
}

/// Repository file as written, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoFile {
    enabled: Option<bool>,
    tag_regexp: Option<String>,
    statuses: Option<Vec<String>>,
    release_note: Option<ReleaseNoteFile>,
    dashboard: Option<DashboardFile>,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseNoteFile {
    enabled: Option<bool>,
    template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DashboardFile {
    enabled: Option<bool>,
    author: Option<String>,
    title: Option<String>,
    template: Option<String>,
}

impl RepoConfig {
    /// Parse a repository YAML file, inheriting absent fields from `base`.
    /// Unknown keys are ignored and an empty file yields `base` unchanged.
    pub fn parse_with_base(yaml: &str, base: &RepoConfig) -> ConfigResult<RepoConfig> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if value.is_null() {
            return Ok(base.clone());
        }
        let file: RepoFile = serde_yaml::from_value(value)?;

        let mut config = base.clone();
        if let Some(enabled) = file.enabled {
            config.enabled = enabled;
        }
        if let Some(tag_regexp) = file.tag_regexp {
            config.tag_regexp = tag_regexp;
        }
        if let Some(statuses) = file.statuses {
            config.statuses = statuses;
        }
        if let Some(release_note) = file.release_note {
            let target = &mut config.release_note;
            target.enabled = release_note.enabled.unwrap_or(target.enabled);
            if let Some(template) = release_note.template {
                target.template = template;
            }
        }
        if let Some(dashboard) = file.dashboard {
            let target = &mut config.dashboard;
            target.enabled = dashboard.enabled.unwrap_or(target.enabled);
            if dashboard.author.is_some() {
                target.author = dashboard.author;
            }
            if let Some(title) = dashboard.title {
                target.title = title;
            }
            if let Some(template) = dashboard.template {
                target.template = template;
            }
        }

        Ok(config)
    }

    /// Override fields with the values found in the KDL `globals` block.
    /// Unknown nodes are ignored.
    pub(crate) fn apply_nodes(&mut self, nodes: &[KdlNode]) -> ConfigResult<()> {
        for node in nodes {
            match node.name().value() {
                "enabled" => self.enabled = bool_arg(node, "enabled")?,
                "tag-regexp" => self.tag_regexp = string_arg(node, "tag-regexp")?,
                "statuses" => self.statuses = get_all_string_args(node),
                "release-note" => {
                    for child in children(node) {
                        match child.name().value() {
                            "enabled" => {
                                self.release_note.enabled = bool_arg(child, "release-note.enabled")?
                            }
                            "template" => {
                                self.release_note.template =
                                    string_arg(child, "release-note.template")?
                            }
                            _ => {}
                        }
                    }
                }
                "dashboard" => {
                    for child in children(node) {
                        match child.name().value() {
                            "enabled" => {
                                self.dashboard.enabled = bool_arg(child, "dashboard.enabled")?
                            }
                            "author" => {
                                self.dashboard.author = Some(string_arg(child, "dashboard.author")?)
                            }
                            "title" => self.dashboard.title = string_arg(child, "dashboard.title")?,
                            "template" => {
                                self.dashboard.template = string_arg(child, "dashboard.template")?
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Resolve the configuration of a repository.
///
/// Reads the repository file through the platform and layers it over the
/// global defaults. A missing file yields the globals unchanged.
pub async fn resolve_repo_config(
    platform: &dyn Platform,
    owner: &str,
    repository: &str,
    main: &MainConfig,
) -> ConfigResult<RepoConfig> {
    let path = main.repo_config_path.as_str();

    let content = match platform.read_file(owner, repository, path).await {
        Ok(content) => content,
        Err(e) if e.is_not_found() => {
            info!(owner, repository, path, "No repository configuration found, using defaults");
            return Ok(main.globals.clone());
        }
        Err(e) => return Err(e.into()),
    };

    info!(owner, repository, path, "Found repository configuration, overriding defaults");
    let config = RepoConfig::parse_with_base(&content, &main.globals)?;
    debug!(owner, repository, ?config, "Resolved repository configuration");
    Ok(config)
}
