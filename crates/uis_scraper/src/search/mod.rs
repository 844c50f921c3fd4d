//! Directory search parsers: people, and the combined people + subjects search.

mod people;
mod subjects;
mod types;

pub use people::{classify_person, is_student_details, parse_global_people, parse_people};
pub use subjects::parse_subjects;
pub use types::{Person, PersonType, SearchSubject, DEFAULT_FACULTY_COLOR};

use scraper::Html;
use tracing::debug;

use crate::schema::Validated;

/// The only host result links may point at.
pub const PORTAL_HOST: &str = "is.mendelu.cz";
/// People search lives here; its result links are relative to it.
pub const PEOPLE_BASE: &str = "https://is.mendelu.cz/auth/lide/";
/// Combined search page; links go `../lide/...` and `../katalog/...` from here.
pub const SEARCH_BASE: &str = "https://is.mendelu.cz/auth/hledani/";

/// Parses the combined search page into people and subjects.
pub fn parse_global_search(html: &str) -> (Vec<Validated<Person>>, Vec<Validated<SearchSubject>>) {
    let doc = Html::parse_document(html);
    let people = parse_global_people(&doc);
    let subjects = parse_subjects(&doc);
    debug!(people = people.len(), subjects = subjects.len(), "Parsed global search");
    (people, subjects)
}
