/// Runtime configuration for the crawler, the navigator and the drift detector
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Faculty as listed on the statistics overview page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacultyConfig {
    pub id: String,
    pub name: String,
}

impl FacultyConfig {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// `--faculty` accepts either the numeric id or the name.
    pub fn matches(&self, filter: &str) -> bool {
        self.id == filter || self.name.eq_ignore_ascii_case(filter)
    }
}

/// Top-level configuration. Every field has a default, so a config file only
/// needs to list what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub base_url: String,
    /// Links and navigation are only trusted on this host (or its subdomains)
    pub allowed_host: String,
    pub faculties: Vec<FacultyConfig>,
    /// Semesters older than this many years are not walked
    pub max_history_years: i32,
    pub db_path: PathBuf,
    pub baseline_dir: PathBuf,
    /// Base delay between requests; up to 20% random jitter is added
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Pages whose forms the drift detector snapshots
    pub monitored_urls: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://is.mendelu.cz".to_string(),
            allowed_host: "is.mendelu.cz".to_string(),
            faculties: vec![
                FacultyConfig::new("2", "PEF"),
                FacultyConfig::new("14", "Agronomická"),
                FacultyConfig::new("23", "FRRMS"),
                FacultyConfig::new("38", "LDF"),
                FacultyConfig::new("60", "Zahradnická"),
                FacultyConfig::new("220", "ICV"),
            ],
            max_history_years: 15,
            db_path: PathBuf::from("success_rates.db"),
            baseline_dir: PathBuf::from("baselines"),
            request_delay_ms: 500,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            monitored_urls: [
                "/auth/katalog/rozvrhy_view.pl",
                "/auth/student/studium.pl",
                "/auth/student/list.pl",
                "/auth/dok_server/vyhledavani.pl",
                "/auth/student/moje_studium.pl",
                "/auth/student/hodnoceni.pl",
                "/auth/katalog/plany.pl",
                "/auth/dok_server/slozka.pl",
            ]
            .iter()
            .map(|path| format!("https://is.mendelu.cz{path}"))
            .collect(),
        }
    }
}

impl CrawlerConfig {
    /// Loads a JSON config file
    ///
    /// # Returns
    /// * `Ok(CrawlerConfig)` - file values layered over the defaults
    /// * `Err` - if the file can't be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Loads from `path` if given, otherwise returns the defaults
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Statistics overview page, `hodnoceni.pl`
    pub fn stats_url(&self) -> String {
        format!("{}/auth/student/hodnoceni.pl", self.base_url)
    }

    pub fn login_url(&self) -> String {
        format!("{}/system/login.pl", self.base_url)
    }
}

/// Portal credentials, read from `UIS_USER` / `UIS_PASS`.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("UIS_USER").ok().filter(|u| !u.is_empty())?;
        let password = std::env::var("UIS_PASS").ok().filter(|p| !p.is_empty())?;
        Some(Self { username, password })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
