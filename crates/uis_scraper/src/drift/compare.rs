//! Classified diff between two baselines.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::{Baseline, FormSnapshot, PageSnapshot};

/// How bad a structural change is for the parsers depending on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Form or input count changed, action changed, input removed
    Critical,
    /// Input added, select count changed, page removed or not captured
    Warning,
    /// New page
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub severity: Severity,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_index: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    pub changes: Vec<Change>,
}

impl DriftReport {
    fn push(&mut self, severity: Severity, url: &str, form_index: Option<usize>, message: String) {
        self.changes.push(Change {
            severity,
            url: url.to_string(),
            form_index,
            message,
        });
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.severity == severity)
    }

    pub fn has_critical(&self) -> bool {
        self.with_severity(Severity::Critical).next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compares `old` against `new`, page by page in URL order.
pub fn compare_baselines(old: &Baseline, new: &Baseline) -> DriftReport {
    let mut report = DriftReport::default();
    let urls: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    for url in urls {
        match (old.get(url), new.get(url)) {
            (None, Some(_)) => report.push(Severity::Info, url, None, format!("New page added: {url}")),
            (Some(_), None) => report.push(Severity::Warning, url, None, format!("Page removed: {url}")),
            (Some(before), Some(after)) => compare_pages(&mut report, url, before, after),
            (None, None) => {}
        }
    }

    report
}

fn compare_pages(report: &mut DriftReport, url: &str, before: &PageSnapshot, after: &PageSnapshot) {
    // An uncaptured page says nothing about structure
    for (label, snapshot) in [("old", before), ("new", after)] {
        if let Some(error) = &snapshot.error {
            report.push(
                Severity::Warning,
                url,
                None,
                format!("Page not captured in {label} baseline: {error}"),
            );
        }
    }
    if before.error.is_some() || after.error.is_some() {
        return;
    }

    if before.fingerprint.is_some() && before.fingerprint == after.fingerprint {
        return;
    }

    if before.forms.len() != after.forms.len() {
        report.push(
            Severity::Critical,
            url,
            None,
            format!("Form count changed: {} → {}", before.forms.len(), after.forms.len()),
        );
    }

    for (index, (old_form, new_form)) in before.forms.iter().zip(&after.forms).enumerate() {
        compare_forms(report, url, index, old_form, new_form);
    }
}

fn compare_forms(report: &mut DriftReport, url: &str, index: usize, before: &FormSnapshot, after: &FormSnapshot) {
    let at = Some(index);

    if before.attributes.action != after.attributes.action {
        report.push(
            Severity::Critical,
            url,
            at,
            format!(
                "Form action changed: \"{}\" → \"{}\"",
                before.attributes.action, after.attributes.action
            ),
        );
    }

    if before.inputs.len() != after.inputs.len() {
        report.push(
            Severity::Critical,
            url,
            at,
            format!("Input count changed: {} → {}", before.inputs.len(), after.inputs.len()),
        );
    }

    let old_names: HashSet<&str> = before.inputs.iter().map(|i| i.name.as_str()).collect();
    let new_names: HashSet<&str> = after.inputs.iter().map(|i| i.name.as_str()).collect();

    for input in &after.inputs {
        if !input.name.is_empty() && !old_names.contains(input.name.as_str()) {
            report.push(Severity::Warning, url, at, format!("New input added: \"{}\"", input.name));
        }
    }
    for input in &before.inputs {
        if !input.name.is_empty() && !new_names.contains(input.name.as_str()) {
            report.push(Severity::Critical, url, at, format!("Input removed: \"{}\"", input.name));
        }
    }

    if before.selects.len() != after.selects.len() {
        report.push(
            Severity::Warning,
            url,
            at,
            format!("Select count changed: {} → {}", before.selects.len(), after.selects.len()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::extract_forms;

    const URL: &str = "https://is.mendelu.cz/auth/katalog/rozvrhy_view.pl";

    fn baseline(pages: &[(&str, &str)]) -> Baseline {
        pages
            .iter()
            .map(|(url, html)| (url.to_string(), PageSnapshot::captured(extract_forms(html))))
            .collect()
    }

    const FORM: &str = r#"<form action="rozvrhy_view.pl"><input name="rozvrh"><input name="osoba"><select name="format"></select></form>"#;

    #[test]
    fn test_identical_baselines_have_no_changes() {
        let report = compare_baselines(&baseline(&[(URL, FORM)]), &baseline(&[(URL, FORM)]));
        assert!(report.is_empty());
        assert!(!report.has_critical());
    }

    #[test]
    fn test_removed_input_and_changed_action_are_critical() {
        let changed = r#"<form action="rozvrhy_view2.pl"><input name="rozvrh"><input name="novy"></form>"#;
        let report = compare_baselines(&baseline(&[(URL, FORM)]), &baseline(&[(URL, changed)]));

        let critical: Vec<&str> = report.with_severity(Severity::Critical).map(|c| c.message.as_str()).collect();
        assert_eq!(
            critical,
            vec![
                "Form action changed: \"rozvrhy_view.pl\" → \"rozvrhy_view2.pl\"",
                "Input removed: \"osoba\"",
            ]
        );

        let warnings: Vec<&str> = report.with_severity(Severity::Warning).map(|c| c.message.as_str()).collect();
        assert_eq!(warnings, vec!["New input added: \"novy\"", "Select count changed: 1 → 0"]);
        assert!(report.changes.iter().all(|c| c.form_index == Some(0)));
    }

    #[test]
    fn test_form_and_input_count_changes() {
        let more = format!(r#"{FORM}<form action="hledani.pl"></form>"#);
        let report = compare_baselines(&baseline(&[(URL, FORM)]), &baseline(&[(URL, &more)]));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].severity, Severity::Critical);
        assert_eq!(report.changes[0].message, "Form count changed: 1 → 2");

        let fewer = r#"<form action="rozvrhy_view.pl"><input name="rozvrh"><select name="format"></select></form>"#;
        let report = compare_baselines(&baseline(&[(URL, FORM)]), &baseline(&[(URL, fewer)]));
        assert!(report
            .with_severity(Severity::Critical)
            .any(|c| c.message == "Input count changed: 2 → 1"));
    }

    #[test]
    fn test_unnamed_inputs_only_change_the_count() {
        let unnamed = r#"<form action="rozvrhy_view.pl"><input name="rozvrh"><input name="osoba"><input type="hidden"><select name="format"></select></form>"#;
        let report = compare_baselines(&baseline(&[(URL, FORM)]), &baseline(&[(URL, unnamed)]));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].message, "Input count changed: 2 → 3");

        let report = compare_baselines(&baseline(&[(URL, unnamed)]), &baseline(&[(URL, FORM)]));
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].message, "Input count changed: 3 → 2");
    }

    #[test]
    fn test_pages_added_removed_and_uncaptured() {
        let other = "https://is.mendelu.cz/auth/student/list.pl";
        let old = baseline(&[(URL, FORM)]);
        let mut new = baseline(&[(other, FORM)]);

        let report = compare_baselines(&old, &new);
        assert_eq!(report.with_severity(Severity::Info).count(), 1);
        assert_eq!(report.with_severity(Severity::Warning).count(), 1);
        assert!(!report.has_critical());

        new.insert(URL.to_string(), PageSnapshot::failed("Session expired while loading"));
        let report = compare_baselines(&old, &new);
        let uncaptured: Vec<&Change> = report.changes.iter().filter(|c| c.url == URL).collect();
        assert_eq!(uncaptured.len(), 1);
        assert_eq!(uncaptured[0].severity, Severity::Warning);
        assert!(uncaptured[0].message.contains("new baseline"));
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
    }
}
