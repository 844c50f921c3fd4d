use serde::{Deserialize, Serialize};

/// Version written by the current parser. Version 1 records (no course
/// metadata) are still accepted on read.
pub const SYLLABUS_SCHEMA_VERSION: u32 = 2;

/// Returned instead of an error when the requirements heading is missing.
pub const SECTION_NOT_FOUND: &str = "Error: Section not found";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusRequirements {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    pub requirements_text: String,
    /// First row is the header; empty when the page has no breakdown table
    pub requirements_table: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_info: Option<CourseInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_methods: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_criteria: Option<Vec<AssessmentCriterion>>,
}

impl SyllabusRequirements {
    /// True when the requirements heading was not found on the page.
    pub fn is_missing(&self) -> bool {
        self.requirements_text == SECTION_NOT_FOUND
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInfo {
    #[serde(default)]
    pub name_cs: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    pub credits: Option<String>,
    pub garant: Option<String>,
    pub teachers: Vec<Teacher>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub name: String,
    /// Parenthetical after the link, e.g. `přednášející, cvičící`
    pub roles: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentCriterion {
    pub requirement_type: String,
    pub daily_attendance: String,
    pub combined_form: String,
}
