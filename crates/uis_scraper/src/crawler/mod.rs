//! Resumable success-rate crawler.
//!
//! One pass walks `faculty -> semester -> course -> statistics rows` on the
//! `hodnoceni.pl` pages:
//! 1. Each level's links are collected in full before any child is visited
//! 2. A page whose header lacks the expected column is skipped with a warning
//! 3. A failed fetch skips that item only; the walk moves on to its sibling
//! 4. Rows are validated and written as soon as a course is parsed, and the
//!    course is stamped only after all of its rows are in
//!
//! Nothing is retried within a run. Running again with `resume` only fills
//! the gaps, and over an unchanged source writes nothing at all.

mod error;
mod navigator;
mod pages;

pub use error::ScrapeError;
pub use navigator::{is_login_page, HttpNavigator, Navigator, Page};
pub use pages::{parse_courses, parse_semesters, parse_stats, CourseLink, SemesterLink, ALL_TERMS};

#[cfg(test)]
pub(crate) use navigator::fake::FakeNavigator;

use chrono::{Datelike, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{CrawlerConfig, FacultyConfig};
use crate::db::{StatsDb, SuccessRateRow};
use crate::schema::validate;
use crate::util::validate_url;

/// What to crawl. The default is a full, unfiltered run.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Faculty id or name
    pub faculty: Option<String>,
    /// Skip `(course, semester)` pairs that already have rows
    pub resume: bool,
    /// Stop after this many newly scraped courses
    pub limit: Option<usize>,
}

/// Summary of one run.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub run_id: String,
    pub newly_scraped: usize,
    /// Courses skipped because resume found their rows already persisted
    pub resumed: usize,
    pub structural_warnings: usize,
    pub failures: usize,
    /// Rows dropped at the validation boundary
    pub rejected_rows: usize,
}

impl CrawlReport {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    fn limit_reached(&self, options: &CrawlOptions) -> bool {
        options.limit.is_some_and(|limit| self.newly_scraped >= limit)
    }

    /// Logs a skipped item and counts it as a warning or a failure.
    fn skip(&mut self, err: &ScrapeError, item: &str) {
        if err.is_structural() {
            warn!(run_id = %self.run_id, item = %item, error = %err, "Skipping page with unexpected structure");
            self.structural_warnings += 1;
        } else {
            error!(run_id = %self.run_id, item = %item, error = %err, "Skipping item after failed fetch");
            self.failures += 1;
        }
    }
}

/// Crawler over an injected navigator and statistics store.
pub struct Crawler<N: Navigator> {
    navigator: N,
    db: Arc<StatsDb>,
    config: CrawlerConfig,
}

impl<N: Navigator> Crawler<N> {
    pub fn new(navigator: N, db: Arc<StatsDb>, config: CrawlerConfig) -> Self {
        Self { navigator, db, config }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Runs one pass.
    ///
    /// # Returns
    /// * `Ok(CrawlReport)` - the run finished; skipped items are counted in the report
    /// * `Err(ScrapeError)` - only when the store itself fails
    pub async fn run(&self, options: &CrawlOptions) -> Result<CrawlReport, ScrapeError> {
        let mut report = CrawlReport::new(generate_correlation_id());
        let start = Instant::now();
        let writes_before = self.db.write_count();

        info!(
            run_id = %report.run_id,
            faculty = ?options.faculty,
            resume = options.resume,
            limit = ?options.limit,
            "Starting success rate crawl"
        );

        let faculties: Vec<&FacultyConfig> = self
            .config
            .faculties
            .iter()
            .filter(|f| options.faculty.as_deref().map_or(true, |filter| f.matches(filter)))
            .collect();
        if faculties.is_empty() {
            warn!(run_id = %report.run_id, filter = ?options.faculty, "No faculty matches the filter");
        }

        for faculty in faculties {
            if report.limit_reached(options) {
                break;
            }
            self.db.upsert_faculty(&faculty.id, &faculty.name)?;
            self.crawl_faculty(faculty, options, &mut report).await?;
        }

        info!(
            run_id = %report.run_id,
            newly_scraped = report.newly_scraped,
            resumed = report.resumed,
            structural_warnings = report.structural_warnings,
            failures = report.failures,
            rejected_rows = report.rejected_rows,
            writes = self.db.write_count() - writes_before,
            duration_ms = start.elapsed().as_millis() as u64,
            "Crawl finished"
        );

        Ok(report)
    }

    async fn crawl_faculty(
        &self,
        faculty: &FacultyConfig,
        options: &CrawlOptions,
        report: &mut CrawlReport,
    ) -> Result<(), ScrapeError> {
        let url = format!("{}?fakulta={};lang=cz", self.config.stats_url(), faculty.id);
        info!(run_id = %report.run_id, faculty = %faculty.name, "Processing faculty");

        let semesters = match self.load(&url, parse_semesters).await {
            Ok(semesters) => semesters,
            Err(e) => {
                report.skip(&e, &url);
                return Ok(());
            }
        };

        let oldest = Utc::now().year() - self.config.max_history_years;
        let semesters: Vec<SemesterLink> = semesters.into_iter().filter(|s| s.year >= oldest).collect();
        debug!(run_id = %report.run_id, faculty = %faculty.name, count = semesters.len(), "Relevant semesters");

        for semester in semesters {
            if report.limit_reached(options) {
                break;
            }
            self.db
                .upsert_semester(&semester.id, &faculty.id, &semester.name, Some(semester.year))?;
            self.crawl_semester(faculty, &semester, options, report).await?;
        }

        Ok(())
    }

    async fn crawl_semester(
        &self,
        faculty: &FacultyConfig,
        semester: &SemesterLink,
        options: &CrawlOptions,
        report: &mut CrawlReport,
    ) -> Result<(), ScrapeError> {
        let courses = match self.semester_url(&semester.href) {
            Ok(url) => self.load(&url, parse_courses).await,
            Err(e) => Err(e),
        };
        let courses = match courses {
            Ok(courses) => courses,
            Err(e) => {
                report.skip(&e, &semester.name);
                return Ok(());
            }
        };
        debug!(run_id = %report.run_id, semester = %semester.name, count = courses.len(), "Found courses");

        let scraped_before = report.newly_scraped;
        for course in courses {
            if report.limit_reached(options) {
                break;
            }

            let course_id = self
                .db
                .upsert_course(&course.code, &course.name, Some(&course.external_id))?;
            if options.resume && self.db.has_success_rates(course_id, &semester.id)? {
                report.resumed += 1;
                continue;
            }

            let url = format!(
                "{}?fakulta={};obdobi={};predmet={};lang=cz",
                self.config.stats_url(),
                faculty.id,
                semester.id,
                course.external_id
            );
            let rows = match self.load(&url, parse_stats).await {
                Ok(rows) => rows,
                Err(e) => {
                    report.skip(&e, &course.code);
                    continue;
                }
            };

            let mut written = 0;
            for (term_name, grades) in rows {
                let row = SuccessRateRow {
                    course_code: course.code.clone(),
                    semester_id: semester.id.clone(),
                    term_name,
                    grades,
                    source_url: url.clone(),
                };
                match validate(row) {
                    Ok(row) => {
                        self.db.insert_success_rate(course_id, &row)?;
                        written += 1;
                    }
                    Err(_) => report.rejected_rows += 1,
                }
            }

            if written > 0 {
                self.db.mark_course_scraped(course_id)?;
                report.newly_scraped += 1;
                info!(
                    run_id = %report.run_id,
                    course = %course.code,
                    semester = %semester.name,
                    rows = written,
                    scraped = report.newly_scraped,
                    "Scraped course"
                );
            } else {
                debug!(run_id = %report.run_id, course = %course.code, "No statistics for course");
            }
        }

        if !options.resume || report.newly_scraped > scraped_before {
            self.db.mark_semester_scraped(&semester.id)?;
        }
        Ok(())
    }

    /// Fetches a page and runs an extractor over it.
    async fn load<T>(
        &self,
        url: &str,
        extract: fn(&str, &str) -> Result<T, ScrapeError>,
    ) -> Result<T, ScrapeError> {
        let page = self.navigator.fetch(url).await?;
        extract(&page.html, url)
    }

    /// Semester links are relative to `/auth/student/`. Links that leave the
    /// portal are refused.
    fn semester_url(&self, href: &str) -> Result<String, ScrapeError> {
        let base = Url::parse(&format!("{}/auth/student/", self.config.base_url))?;
        let joined = base.join(href)?;
        validate_url(joined.as_str(), &self.config.allowed_host).ok_or_else(|| ScrapeError::Structure {
            url: joined.to_string(),
            message: "semester link points outside the portal".to_string(),
        })
    }
}

/// Generates a unique correlation ID for a crawl run.
fn generate_correlation_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    let random: u32 = rand::thread_rng().gen();
    format!("{:x}-{:08x}", timestamp & 0xFFFFFFFF, random)
}
