use serde::{Deserialize, Serialize};

/// Colour used when the faculty swatch is missing.
pub const DEFAULT_FACULTY_COLOR: &str = "#6b7280";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonType {
    Student,
    Teacher,
    Staff,
    Unknown,
}

/// One entry of a people search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Absent on profile pages that hide the identification number
    pub id: Option<String>,
    pub name: String,
    pub link: String,
    pub faculty: String,
    pub program_and_mode: String,
    pub status: String,
    pub raw_details: String,
    #[serde(rename = "type")]
    pub person_type: PersonType,
}

/// A course hit from the combined search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSubject {
    /// `predmet` id from the syllabus link
    pub id: String,
    pub code: String,
    pub name: String,
    pub link: String,
    pub faculty: String,
    pub faculty_color: String,
    /// e.g. `ZS 2025/2026`; empty when not shown
    pub semester: String,
}
