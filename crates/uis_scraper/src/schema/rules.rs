//! Field rules per record kind.

use regex::Regex;
use std::sync::LazyLock;

use super::{RecordKind, Schema};
use crate::db::{CourseSuccessRate, SuccessRateRow};
use crate::exam::{ExamSubject, ExamTerm, SectionStatus, EXAM_SCHEMA_VERSION};
use crate::search::{Person, SearchSubject};
use crate::syllabus::{SyllabusRequirements, SYLLABUS_SCHEMA_VERSION};
use crate::util::NOT_APPLICABLE;

static CANONICAL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}( \d{2}:\d{2})?$").unwrap());
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").unwrap());
static SUBJECT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9-]*[A-Z0-9]$").unwrap());
static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#[a-fA-F0-9]{6}$").unwrap());

fn require(issues: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(format!("{field} is empty"));
    }
}

fn require_date(issues: &mut Vec<String>, field: &str, value: &str) {
    if !CANONICAL_DATE.is_match(value) {
        issues.push(format!("{field} `{value}` is not DD.MM.YYYY"));
    }
}

fn require_time(issues: &mut Vec<String>, field: &str, value: &str) {
    if !value.is_empty() && !CLOCK_TIME.is_match(value) {
        issues.push(format!("{field} `{value}` is not HH:MM"));
    }
}

fn require_max_len(issues: &mut Vec<String>, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        issues.push(format!("{field} longer than {max} characters"));
    }
}

fn check_term(issues: &mut Vec<String>, at: &str, term: &ExamTerm) {
    require(issues, &format!("{at}.id"), &term.id);
    require_date(issues, &format!("{at}.date"), &term.date);
    require_time(issues, &format!("{at}.time"), &term.time);

    match &term.capacity {
        Some(cap) if term.full != (cap.occupied >= cap.total) => {
            issues.push(format!("{at}.full contradicts capacity {}", cap.raw));
        }
        None if term.full => issues.push(format!("{at}.full set without capacity")),
        _ => {}
    }
    if term.full && term.can_register_now {
        issues.push(format!("{at} is full but marked registrable"));
    }

    if let Some(window) = &term.registration_window {
        for (name, value) in [("start", &window.start), ("end", &window.end)] {
            if let Some(value) = value {
                require_date(issues, &format!("{at}.registrationWindow.{name}"), value);
            }
        }
    }
}

impl Schema for ExamSubject {
    const KIND: RecordKind = RecordKind::Exams;
    const VERSIONS: &'static [u32] = &[EXAM_SCHEMA_VERSION];

    fn version(&self) -> Option<u32> {
        Some(self.version)
    }

    fn key(&self) -> String {
        self.code.clone()
    }

    fn check(&self, issues: &mut Vec<String>) {
        require(issues, "id", &self.id);
        require(issues, "code", &self.code);
        require(issues, "name", &self.name);

        for (i, section) in self.sections.iter().enumerate() {
            let at = format!("sections[{i}]");
            require(issues, &format!("{at}.id"), &section.id);
            require(issues, &format!("{at}.name"), &section.name);

            let registered = section.status == SectionStatus::Registered;
            if registered != section.registered_term.is_some() {
                issues.push(format!("{at}.status disagrees with registeredTerm"));
            }

            if let Some(reg) = &section.registered_term {
                require_date(issues, &format!("{at}.registeredTerm.date"), &reg.date);
                require_time(issues, &format!("{at}.registeredTerm.time"), &reg.time);
                if let Some(deadline) = &reg.deregistration_deadline {
                    if deadline != NOT_APPLICABLE {
                        require_date(issues, &format!("{at}.registeredTerm.deregistrationDeadline"), deadline);
                    }
                }
            }

            for (j, term) in section.terms.iter().enumerate() {
                check_term(issues, &format!("{at}.terms[{j}]"), term);
            }
        }
    }
}

impl Schema for SyllabusRequirements {
    const KIND: RecordKind = RecordKind::Syllabus;
    const VERSIONS: &'static [u32] = &[1, SYLLABUS_SCHEMA_VERSION];

    fn version(&self) -> Option<u32> {
        Some(self.version)
    }

    fn key(&self) -> String {
        self.course_id.clone().unwrap_or_else(|| "?".to_string())
    }

    /// Trims teacher entries and pads short table rows to the header width.
    fn canonicalize(mut self) -> Self {
        if let Some(info) = self.course_info.as_mut() {
            for teacher in &mut info.teachers {
                teacher.name = teacher.name.trim().to_string();
                teacher.roles = teacher.roles.trim().to_string();
            }
        }
        if let Some(width) = self.requirements_table.first().map(Vec::len) {
            for row in self.requirements_table.iter_mut().skip(1) {
                if row.len() < width {
                    row.resize(width, String::new());
                }
            }
        }
        self
    }

    /// Empty requirements text is allowed: the heading was there, its cell was blank.
    fn check(&self, issues: &mut Vec<String>) {
        if let Some(width) = self.requirements_table.first().map(Vec::len) {
            if width == 0 {
                issues.push("requirementsTable header row is empty".to_string());
            }
            for (i, row) in self.requirements_table.iter().enumerate() {
                if row.len() != width {
                    issues.push(format!(
                        "requirementsTable row {i} has {} cells, header has {width}",
                        row.len()
                    ));
                }
            }
        }

        if let Some(info) = &self.course_info {
            for (i, teacher) in info.teachers.iter().enumerate() {
                require(issues, &format!("courseInfo.teachers[{i}].name"), &teacher.name);
            }
        }

        if let Some(criteria) = &self.assessment_criteria {
            for (i, c) in criteria.iter().enumerate() {
                require(issues, &format!("assessmentCriteria[{i}].requirementType"), &c.requirement_type);
            }
        }
    }
}

impl Schema for Person {
    const KIND: RecordKind = RecordKind::People;

    fn key(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.name.clone())
    }

    fn check(&self, issues: &mut Vec<String>) {
        require(issues, "name", &self.name);
        require_max_len(issues, "name", &self.name, 200);
        require_max_len(issues, "faculty", &self.faculty, 100);
        require_max_len(issues, "programAndMode", &self.program_and_mode, 200);
        require_max_len(issues, "status", &self.status, 100);
        require_max_len(issues, "rawDetails", &self.raw_details, 500);

        if let Some(id) = &self.id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                issues.push(format!("id `{id}` is not numeric"));
            }
        }
        if !self.link.is_empty() && !self.link.starts_with("https://") {
            issues.push("link is not https".to_string());
        }
    }
}

impl Schema for SearchSubject {
    const KIND: RecordKind = RecordKind::Subjects;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn check(&self, issues: &mut Vec<String>) {
        if self.id.is_empty() || !self.id.chars().all(|c| c.is_ascii_digit()) {
            issues.push(format!("id `{}` is not numeric", self.id));
        }
        if !SUBJECT_CODE.is_match(&self.code) {
            issues.push(format!("code `{}` is not a subject code", self.code));
        }
        require(issues, "name", &self.name);
        if !HEX_COLOR.is_match(&self.faculty_color) {
            issues.push(format!("facultyColor `{}` is not #rrggbb", self.faculty_color));
        }
        if !self.link.starts_with("https://") {
            issues.push("link is not https".to_string());
        }
    }
}

impl Schema for SuccessRateRow {
    const KIND: RecordKind = RecordKind::SuccessRates;

    fn key(&self) -> String {
        format!("{}/{}/{}", self.course_code, self.semester_id, self.term_name)
    }

    fn check(&self, issues: &mut Vec<String>) {
        require(issues, "courseCode", &self.course_code);
        require(issues, "semesterId", &self.semester_id);
        require(issues, "termName", &self.term_name);
        if self.grades.is_empty() {
            issues.push("all grade counts are zero".to_string());
        }
    }
}

impl Schema for CourseSuccessRate {
    const KIND: RecordKind = RecordKind::CourseStats;

    fn key(&self) -> String {
        self.course_code.clone()
    }

    fn check(&self, issues: &mut Vec<String>) {
        require(issues, "courseCode", &self.course_code);
        if chrono::DateTime::parse_from_rfc3339(&self.last_updated).is_err() {
            issues.push(format!("lastUpdated `{}` is not RFC 3339", self.last_updated));
        }

        for semester in &self.stats {
            let at = &semester.semester_name;
            let pass: u32 = semester.terms.iter().map(|t| t.pass).sum();
            let fail: u32 = semester.terms.iter().map(|t| t.fail).sum();
            if pass != semester.total_pass || fail != semester.total_fail {
                issues.push(format!("{at}: totals do not match term sums"));
            }
            for term in &semester.terms {
                if term.pass != term.grades.pass() || term.fail != term.grades.fail() {
                    issues.push(format!("{at}/{}: pass/fail do not match grades", term.term));
                }
            }
        }
    }
}
