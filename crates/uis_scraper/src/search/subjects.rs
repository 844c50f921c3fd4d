//! Course hits of the combined search.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::{SearchSubject, DEFAULT_FACULTY_COLOR, PORTAL_HOST, SEARCH_BASE};
use crate::html::{element_text, extract_param};
use crate::schema::{validate, Validated};
use crate::util::{clean_text, pin_language, sanitize, validate_url};

static SYLLABUS_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="katalog/syllabus.pl"]"#).unwrap());

/// `EBC-TZI Teorie zpracování informací`, `D-BINFO ...`, `ASVP ...`
static CODE_AND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9-]*[A-Z0-9])\s+(.+)$").unwrap());
static SEMESTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(ZS|LS)\s+\d{4}/\d{4}").unwrap());
static FACULTY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"- ([A-Z]{2,5})$").unwrap());
static SWATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"background-color:\s*(#[a-fA-F0-9]{6})").unwrap());

/// Extracts subject hits. Links without a code prefix (sidebar navigation)
/// or without a `predmet` id are skipped; duplicates collapse by id.
pub fn parse_subjects(doc: &Html) -> Vec<Validated<SearchSubject>> {
    let mut seen = HashSet::new();
    let mut subjects = Vec::new();

    for link in doc.select(&SYLLABUS_LINKS) {
        let href = link.value().attr("href").unwrap_or_default();
        let text = element_text(link);

        let Some(id) = extract_param(href, "predmet") else {
            continue;
        };
        let Some(caps) = CODE_AND_NAME.captures(&text) else {
            debug!(text = %text, "Skipping syllabus link without code prefix");
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let trailing = following_text(link);
        let semester = SEMESTER
            .find(&trailing)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let faculty = FACULTY
            .captures(&trailing)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let subject = SearchSubject {
            id,
            code: sanitize(&caps[1], 50),
            name: sanitize(&caps[2], 200),
            link: validate_url(&pin_language(href, SEARCH_BASE), PORTAL_HOST).unwrap_or_default(),
            faculty: sanitize(&faculty, 20),
            faculty_color: swatch_color(link),
            semester,
        };

        if let Ok(valid) = validate(subject) {
            subjects.push(valid);
        }
    }

    subjects
}

/// Text node right after the link, e.g. ` ZS 2025/2026 - PEF`.
fn following_text(link: ElementRef) -> String {
    link.next_sibling()
        .map(|node| match ElementRef::wrap(node) {
            Some(el) => el.text().collect::<String>(),
            None => node.value().as_text().map(|t| String::from(&**t)).unwrap_or_default(),
        })
        .map(|t| clean_text(&t))
        .unwrap_or_default()
}

/// Faculty colour from the swatch element preceding the link.
fn swatch_color(link: ElementRef) -> String {
    link.prev_siblings()
        .find_map(ElementRef::wrap)
        .and_then(|el| el.value().attr("style"))
        .and_then(|style| SWATCH.captures(style))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| DEFAULT_FACULTY_COLOR.to_string())
}
