//! Status report embedded in release notes.
//!
//! The rendered report sits between two HTML comments so it stays invisible
//! in the rendered note and can be found again on the next run. Before
//! rendering, a previous report is cut out of the note, which keeps repeated
//! runs from stacking reports.

use grgate_config::{Template, TemplateResult};
use grgate_core::Status;
use serde::Serialize;

pub const MARKER_START: &str = "<!-- GRGate start -->";
pub const MARKER_END: &str = "<!-- GRGate end -->";

/// Values available to the release note template.
#[derive(Debug, Clone, Default)]
pub struct ReleaseNoteData {
    pub release_note: String,
    pub statuses: Vec<Status>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplateData<'a> {
    release_note: String,
    statuses: Vec<StatusView<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusView<'a> {
    commit_sha: &'a str,
    name: &'a str,
    status: &'a str,
    state: &'a str,
}

/// Remove a previously rendered report, markers included.
/// The note is returned unchanged unless both markers are present in order.
pub fn strip_report(note: &str) -> String {
    let Some(start) = note.find(MARKER_START) else {
        return note.to_string();
    };
    let Some(end) = note[start..].find(MARKER_END).map(|i| start + i) else {
        return note.to_string();
    };

    format!("{}{}", &note[..start], &note[end + MARKER_END.len()..])
}

/// Render `template` over the release note with any previous report removed.
pub fn render_release_note(template: &str, data: &ReleaseNoteData) -> TemplateResult<String> {
    let template = Template::parse("release-note", template)?;
    template.render(&TemplateData {
        release_note: strip_report(&data.release_note),
        statuses: data
            .statuses
            .iter()
            .map(|s| StatusView {
                commit_sha: &s.commit_sha,
                name: &s.name,
                status: &s.status,
                state: &s.state,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grgate_config::TemplateError;
    use grgate_config::repo::DEFAULT_RELEASE_NOTE_TEMPLATE;

    fn status(name: &str, status: &str, state: &str) -> Status {
        Status {
            commit_sha: "abc123".to_string(),
            name: name.to_string(),
            status: status.to_string(),
            state: state.to_string(),
        }
    }

    fn data(note: &str) -> ReleaseNoteData {
        ReleaseNoteData {
            release_note: note.to_string(),
            statuses: vec![
                status("e2e-happyflow", "completed", "success"),
                status("feature-B", "in_progress", ""),
                status("gitlab-job", "success", ""),
            ],
        }
    }

    #[test]
    fn test_default_template_output() {
        let note = render_release_note(DEFAULT_RELEASE_NOTE_TEMPLATE, &data("Release v1")).unwrap();
        assert_eq!(
            note,
            "Release v1<!-- GRGate start -->\n\
             <details><summary>Status check</summary>\n\
             \n\
             - [x] e2e-happyflow\n\
             - [ ] feature-B\n\
             - [x] gitlab-job\n\
             \n\
             </details>\n\
             <!-- GRGate end -->"
        );
    }

    #[test]
    fn test_default_template_is_idempotent() {
        let first = render_release_note(DEFAULT_RELEASE_NOTE_TEMPLATE, &data("Notes\n")).unwrap();
        let second = render_release_note(DEFAULT_RELEASE_NOTE_TEMPLATE, &data(&first)).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.matches(MARKER_START).count(), 1);
    }

    #[test]
    fn test_report_is_replaced_in_place() {
        let note = "Intro\n<!-- GRGate start -->\nold report\n<!-- GRGate end -->\nOutro";
        let out = render_release_note("{{ .ReleaseNote }}", &data(note)).unwrap();
        assert_eq!(out, "Intro\n\nOutro");
    }

    #[test]
    fn test_note_is_kept_whole_without_both_markers() {
        for note in [
            "no markers",
            "only <!-- GRGate start --> here",
            "<!-- GRGate end --> before <!-- GRGate start -->",
        ] {
            assert_eq!(strip_report(note), note);
        }
    }

    #[test]
    fn test_custom_template() {
        let template = r#"{{- .ReleaseNote -}}
{{ range .Statuses }}
- [{{ if or (eq .Status "completed" ) (eq .Status "success") }}x{{ else }} {{ end }}] {{ .Name }}
{{- end }}"#;

        let out = render_release_note(template, &data("My release")).unwrap();
        assert_eq!(
            out,
            "My release\n- [x] e2e-happyflow\n- [ ] feature-B\n- [x] gitlab-job"
        );
    }

    #[test]
    fn test_template_errors_propagate() {
        let err = render_release_note("{{ if .ReleaseNote }}", &data("x")).unwrap_err();
        assert!(matches!(err, TemplateError::Parse { .. }));

        let err = render_release_note("{{ .Unknown }}", &data("x")).unwrap_err();
        assert!(matches!(err, TemplateError::Execute { .. }));
    }
}
