//! People search results: list pages, single profiles, and the people part
//! of the combined search.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::{Person, PersonType, PEOPLE_BASE, PORTAL_HOST, SEARCH_BASE};
use crate::html::{element_text, extract_param};
use crate::schema::{validate, Validated};
use crate::util::{clean_text, pin_language, sanitize, validate_url};

static LIST_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='clovek.pl?zpet=']").unwrap());
static GLOBAL_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="lide/clovek.pl"]"#).unwrap());
static PROFILE_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"td.odsazena b font[size="+1"]"#).unwrap());
static PROFILE_CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td.odsazena").unwrap());
static DEPARTMENT_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='pracoviste.pl']").unwrap());

static TRAILING_STATUS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]$").unwrap());
static PROFILE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Identification number|Identifikační číslo):\s*(\d+)").unwrap());

const MAX_NAME: usize = 200;
const MAX_FACULTY: usize = 100;
const MAX_PROGRAM: usize = 200;
const MAX_STATUS: usize = 100;
const MAX_DETAILS: usize = 500;

const ENROLLMENT_MARKERS: [&str; 5] = ["term", "year", "ročník", "roč", "sem"];
const STUDY_MODE_MARKERS: [&str; 13] = [
    " pres ",
    " prez ",
    " komb ",
    "Bachelor",
    "Master",
    "Bakalářský",
    "Magisterský",
    "Doktorský",
    "prezenční",
    "kombinovaná",
    "Univerzita třetího věku",
    "Celoživotní vzdělávání",
    "U3V",
];
/// `dr.` also covers RNDr., PhDr., JUDr. and friends.
const ACADEMIC_TITLES: [&str; 7] = ["ph.d.", "csc.", "drsc.", "dr.", "doc.", "prof.", "th.d."];
const PROFILE_STUDENT_MARKERS: [&str; 6] = [" pres ", " komb ", "[term", "[year", "Bachelor", "Master"];

/// True if the details carry an enrollment bracket or a study-mode token.
pub fn is_student_details(raw_details: &str) -> bool {
    let bracketed = raw_details.contains('[')
        && ENROLLMENT_MARKERS.iter().any(|m| raw_details.contains(m));
    bracketed || STUDY_MODE_MARKERS.iter().any(|m| raw_details.contains(m))
}

/// Student signals beat academic titles: an enrolled PhD candidate with
/// `Ing.` and `Ph.D.` in the name is still a student.
pub fn classify_person(name: &str, raw_details: &str) -> PersonType {
    if is_student_details(raw_details) {
        return PersonType::Student;
    }

    let lowered = name.to_lowercase();
    if ACADEMIC_TITLES.iter().any(|t| lowered.contains(t)) {
        PersonType::Teacher
    } else {
        PersonType::Staff
    }
}

/// Parses a people-only search page.
///
/// Tries the list shape first, then the single-profile shape; a page that is
/// neither yields no results.
pub fn parse_people(html: &str) -> Vec<Validated<Person>> {
    let doc = Html::parse_document(html);

    let links: Vec<ElementRef> = doc.select(&LIST_LINKS).collect();
    let people = if !links.is_empty() {
        debug!(count = links.len(), "People list page");
        links
            .into_iter()
            .filter_map(|link| person_from_link(link, PEOPLE_BASE))
            .collect()
    } else if let Some(name_el) = doc.select(&PROFILE_NAME).next() {
        debug!("Single profile page");
        person_from_profile(&doc, name_el).into_iter().collect()
    } else {
        debug!("No people results");
        Vec::new()
    };

    validate_all(people)
}

/// People part of the combined search. Links are deduplicated by person id.
pub fn parse_global_people(doc: &Html) -> Vec<Validated<Person>> {
    let mut seen = HashSet::new();
    let people = doc
        .select(&GLOBAL_LINKS)
        .filter_map(|link| {
            let id = extract_param(link.value().attr("href")?, "id")?;
            if !seen.insert(id) {
                return None;
            }
            person_from_link(link, SEARCH_BASE)
        })
        .collect();

    validate_all(people)
}

fn validate_all(people: Vec<Person>) -> Vec<Validated<Person>> {
    people.into_iter().filter_map(|p| validate(p).ok()).collect()
}

/// Builds a person from a result link and the `- FACULTY program [status]` text after it.
fn person_from_link(link: ElementRef, base: &str) -> Option<Person> {
    let href = link.value().attr("href").unwrap_or_default();
    let name = sanitize(&element_text(link), MAX_NAME);
    if name.is_empty() {
        return None;
    }

    let raw_details = link
        .next_sibling()
        .map(|node| match ElementRef::wrap(node) {
            Some(el) => el.text().collect::<String>(),
            None => node.value().as_text().map(|t| String::from(&**t)).unwrap_or_default(),
        })
        .map(|text| clean_text(text.trim().trim_start_matches('-')))
        .unwrap_or_default();

    let (status, primary) = match TRAILING_STATUS.captures(&raw_details) {
        Some(caps) => (
            caps[1].trim().to_string(),
            raw_details.replace(&caps[0], "").trim().to_string(),
        ),
        None => ("N/A".to_string(), raw_details.clone()),
    };
    let mut parts = primary.split_whitespace();
    let faculty = parts.next().unwrap_or("N/A").to_string();
    let program_and_mode = parts.collect::<Vec<_>>().join(" ");

    Some(Person {
        id: extract_param(href, "id"),
        person_type: classify_person(&name, &raw_details),
        link: trusted_link(href, base),
        faculty: sanitize(&faculty, MAX_FACULTY),
        program_and_mode: sanitize(&program_and_mode, MAX_PROGRAM),
        status: sanitize(&status, MAX_STATUS),
        raw_details: sanitize(&raw_details, MAX_DETAILS),
        name,
    })
}

fn person_from_profile(doc: &Html, name_el: ElementRef) -> Option<Person> {
    let name = sanitize(&element_text(name_el), MAX_NAME);
    if name.is_empty() {
        return None;
    }

    let cells: Vec<String> = doc
        .select(&PROFILE_CELLS)
        .map(|td| td.text().collect::<String>())
        .collect();

    let id = cells
        .iter()
        .find_map(|text| PROFILE_ID.captures(text).map(|caps| caps[1].to_string()));

    let mut info_lines: Vec<String> = doc
        .select(&DEPARTMENT_LINKS)
        .filter_map(|link| link.parent().and_then(ElementRef::wrap))
        .map(element_text)
        .collect();
    info_lines.extend(
        cells
            .iter()
            .filter(|text| PROFILE_STUDENT_MARKERS.iter().any(|m| text.contains(m)))
            .map(|text| clean_text(text)),
    );

    let raw_details = info_lines.join("\n");
    let is_student = is_student_details(&raw_details);
    let link = id
        .as_ref()
        .map(|id| trusted_link(&format!("clovek.pl?id={id}"), PEOPLE_BASE))
        .unwrap_or_default();

    Some(Person {
        id,
        person_type: classify_person(&name, &raw_details),
        link,
        faculty: sanitize(info_lines.first().map(String::as_str).unwrap_or("N/A"), MAX_FACULTY),
        program_and_mode: (if is_student { "Student Profile" } else { "Staff Profile" }).to_string(),
        status: (if is_student { "Student" } else { "Staff" }).to_string(),
        raw_details: sanitize(&raw_details, MAX_DETAILS),
        name,
    })
}

/// Absolute, language-pinned link on the portal host, or empty if it points elsewhere.
fn trusted_link(href: &str, base: &str) -> String {
    validate_url(&pin_language(href, base), PORTAL_HOST).unwrap_or_default()
}
