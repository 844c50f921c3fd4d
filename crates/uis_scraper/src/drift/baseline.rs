//! Baseline files: `forms-baseline-<timestamp>.json` plus `forms-baseline-latest.json`.

use chrono::{SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::Baseline;

pub const LATEST_BASELINE: &str = "forms-baseline-latest.json";

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Baseline IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Baseline {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BaselineError + '_ {
    move |source| BaselineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes the baseline twice: once timestamped, once as the latest pointer.
///
/// # Returns
/// * `Ok((timestamped, latest))` - paths of both files
pub fn write_baseline(dir: &Path, baseline: &Baseline) -> Result<(PathBuf, PathBuf), BaselineError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    let json = serde_json::to_string_pretty(baseline).map_err(|source| BaselineError::Json {
        path: dir.to_path_buf(),
        source,
    })?;

    let timestamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    let stamped = dir.join(format!("forms-baseline-{timestamp}.json"));
    let latest = dir.join(LATEST_BASELINE);

    fs::write(&stamped, &json).map_err(io_error(&stamped))?;
    fs::write(&latest, &json).map_err(io_error(&latest))?;

    info!(pages = baseline.len(), path = %stamped.display(), "Baseline saved");
    Ok((stamped, latest))
}

pub fn load_baseline(path: &Path) -> Result<Baseline, BaselineError> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    serde_json::from_str(&content).map_err(|source| BaselineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::{extract_forms, PageSnapshot};

    #[test]
    fn test_write_then_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let mut baseline = Baseline::new();
        baseline.insert(
            "https://is.mendelu.cz/auth/student/list.pl".to_string(),
            PageSnapshot::captured(extract_forms(r#"<form action="list.pl"><input name="studium"></form>"#)),
        );
        baseline.insert(
            "https://is.mendelu.cz/auth/student/studium.pl".to_string(),
            PageSnapshot::failed("Network error: timeout"),
        );

        let (stamped, latest) = write_baseline(&dir.path().join("baselines"), &baseline).unwrap();
        assert!(stamped
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("forms-baseline-20"));
        assert_eq!(latest.file_name().unwrap(), LATEST_BASELINE);

        assert_eq!(load_baseline(&latest).unwrap(), baseline);
        assert_eq!(load_baseline(&stamped).unwrap(), baseline);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(load_baseline(&missing), Err(BaselineError::Io { .. })));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let err = load_baseline(&broken).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_reads_files_without_fingerprints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        fs::write(
            &path,
            r#"{"https://is.mendelu.cz/auth/katalog/plany.pl": {
                "scannedAt": "2025-01-01T00:00:00.000Z",
                "formCount": 1,
                "forms": [{
                    "formIndex": 0,
                    "attributes": {"action": "plany.pl", "method": "get", "name": "form-0", "id": ""},
                    "inputs": [{"name": "fakulta", "type": "hidden", "id": "", "required": false, "value": "2"}],
                    "selects": [], "textareas": [], "buttons": [], "totalElements": 1
                }]
            }}"#,
        )
        .unwrap();

        let baseline = load_baseline(&path).unwrap();
        let page = &baseline["https://is.mendelu.cz/auth/katalog/plany.pl"];
        assert!(page.fingerprint.is_none());
        assert_eq!(page.forms[0].inputs[0].input_type, "hidden");
    }
}
