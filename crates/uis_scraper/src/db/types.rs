//! Database types for success-rate statistics
use serde::{Deserialize, Serialize};

/// Counts per grade letter for one exam term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCounts {
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
    #[serde(rename = "C")]
    pub c: u32,
    #[serde(rename = "D")]
    pub d: u32,
    #[serde(rename = "E")]
    pub e: u32,
    #[serde(rename = "F")]
    pub f: u32,
    #[serde(rename = "FN")]
    pub fn_: u32,
}

impl GradeCounts {
    /// A through E.
    pub fn pass(&self) -> u32 {
        self.a + self.b + self.c + self.d + self.e
    }

    /// F plus FN (failed, and did not show up).
    pub fn fail(&self) -> u32 {
        self.f + self.fn_
    }

    pub fn is_empty(&self) -> bool {
        self.pass() + self.fail() == 0
    }
}

/// One statistics row as it is written: a term of a course in a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRateRow {
    pub course_code: String,
    pub semester_id: String,
    pub term_name: String,
    pub grades: GradeCounts,
    pub source_url: String,
}

#[derive(Debug, Clone)]
pub struct DbFaculty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DbSemester {
    pub id: String,
    pub faculty_id: String,
    pub name: String,
    pub year: Option<i32>,
    pub last_scraped: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DbCourse {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub external_id: Option<String>,
    pub last_scraped: Option<String>,
}

/// Per-term entry of the read contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermStats {
    pub term: String,
    pub grades: GradeCounts,
    pub pass: u32,
    pub fail: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterStats {
    pub semester_id: String,
    pub semester_name: String,
    pub year: Option<i32>,
    pub total_pass: u32,
    pub total_fail: u32,
    pub terms: Vec<TermStats>,
}

/// Everything known about one course code, newest semester first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSuccessRate {
    pub course_code: String,
    pub stats: Vec<SemesterStats>,
    /// RFC 3339
    pub last_updated: String,
}
