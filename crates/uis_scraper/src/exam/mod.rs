//! Exam registration page parser.
//!
//! The page has two independent tables: `#table_1` lists terms the student is
//! signed up for, `#table_2` lists terms that can be booked. Both are folded
//! into one `Subject -> Section -> Term` tree and validated before returning.

mod available;
mod registered;
mod store;
mod types;

pub use store::ExamStore;
pub use types::{
    AttemptType, ExamSection, ExamSubject, ExamTerm, RegisteredTerm, RegistrationWindow,
    SectionKind, SectionStatus, EXAM_SCHEMA_VERSION,
};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::html::{element_text, extract_param, first_href};
use crate::schema::{validate, Validated};
use crate::util::{capitalize_first, Lang};

static REGISTERED_TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#table_1").unwrap());
static AVAILABLE_TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#table_2").unwrap());
static BODY_ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody tr").unwrap());
static HEAD_CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("thead th").unwrap());
static TEACHER_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="clovek.pl"]"#).unwrap());

/// `ZS 2025/2026 - PEF - ` style prefix in front of subject names.
static SEMESTER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ZL]S\s*\d{4}/\d{4}\s*-\s*[A-Z]+\s*(-)?\s*").unwrap());

/// Headers `#table_2` must carry, as (Czech, English) pairs.
const AVAILABLE_HEADERS: [(&str, &str); 3] = [("Datum", "Date"), ("Místnost", "Where"), ("Zkouška", "Type")];

/// Parses one exam registration page.
///
/// # Arguments
/// * `html` - Raw page HTML
/// * `lang` - Language the page was requested in; decides date order and
///   which locale-tagged fields get filled
///
/// # Returns
/// Validated subjects. A subject that fails validation is logged and left
/// out, so an absent subject means "not scraped successfully", not "no exams".
pub fn parse_exam_page(html: &str, lang: Lang) -> Vec<Validated<ExamSubject>> {
    let doc = Html::parse_document(html);
    for warning in check_structure(&doc) {
        warn!(lang = ?lang, "Exam page structure: {}", warning);
    }

    let mut subjects: Vec<ExamSubject> = Vec::new();

    if let Some(table) = doc.select(&REGISTERED_TABLE).next() {
        for row in table.select(&BODY_ROWS) {
            registered::parse_row(row, lang, &mut subjects);
        }
    }
    if let Some(table) = doc.select(&AVAILABLE_TABLE).next() {
        for row in table.select(&BODY_ROWS) {
            available::parse_row(row, lang, &mut subjects);
        }
    }

    debug!(count = subjects.len(), "Parsed exam subjects");

    // Rejections are logged inside validate
    subjects.into_iter().filter_map(|s| validate(s).ok()).collect()
}

/// Structural sanity check of an exam page. Returns human-readable warnings.
pub fn check_structure(doc: &Html) -> Vec<String> {
    let mut warnings = Vec::new();
    let registered = doc.select(&REGISTERED_TABLE).next();
    let available = doc.select(&AVAILABLE_TABLE).next();

    if registered.is_none() && available.is_none() {
        warnings.push("neither #table_1 nor #table_2 found".to_string());
    }

    if let Some(table) = available {
        let headers: Vec<String> = table
            .select(&HEAD_CELLS)
            .map(|th| element_text(th).to_lowercase())
            .collect();
        let missing: Vec<String> = AVAILABLE_HEADERS
            .iter()
            .filter(|(cs, en)| {
                !headers
                    .iter()
                    .any(|h| h.contains(&cs.to_lowercase()) || h.contains(&en.to_lowercase()))
            })
            .map(|(cs, en)| format!("{cs}/{en}"))
            .collect();

        if !missing.is_empty() {
            warnings.push(format!(
                "#table_2 missing headers {} (found: [{}])",
                missing.join(", "),
                headers.join(", ")
            ));
        }
    }

    warnings
}

/// Cell text relative to the date pivot; empty when out of range.
fn cell_text(cells: &[ElementRef], index: Option<usize>) -> String {
    index
        .and_then(|i| cells.get(i))
        .map(|c| element_text(*c))
        .unwrap_or_default()
}

fn teacher_id(cells: &[ElementRef], index: usize) -> Option<String> {
    let href = first_href(*cells.get(index)?, &TEACHER_LINK)?;
    extract_param(&href, "id")
}

fn strip_semester_prefix(name: &str) -> String {
    SEMESTER_PREFIX.replace(name, "").trim().to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Returns the subject for `code`, creating it on first sight.
fn subject_entry<'a>(
    subjects: &'a mut Vec<ExamSubject>,
    code: &str,
    raw_name: &str,
    lang: Lang,
) -> &'a mut ExamSubject {
    let index = match subjects.iter().position(|s| s.code == code) {
        Some(i) => i,
        None => {
            let name = strip_semester_prefix(raw_name);
            subjects.push(ExamSubject {
                version: EXAM_SCHEMA_VERSION,
                id: code.to_string(),
                name_cs: (lang == Lang::Cs).then(|| name.clone()),
                name_en: (lang == Lang::En).then(|| name.clone()),
                name,
                code: code.to_string(),
                sections: Vec::new(),
            });
            subjects.len() - 1
        }
    };
    &mut subjects[index]
}

/// Returns the section named by `raw_section` (cut at the first `(`), creating it if needed.
fn section_entry<'a>(subject: &'a mut ExamSubject, raw_section: &str, lang: Lang) -> &'a mut ExamSection {
    let name = capitalize_first(raw_section.split('(').next().unwrap_or_default().trim());

    let index = match subject.sections.iter().position(|s| s.name == name) {
        Some(i) => i,
        None => {
            let lowered = name.to_lowercase();
            let kind = if lowered.contains("zkouška") || lowered.contains("exam") {
                SectionKind::Exam
            } else {
                SectionKind::Test
            };
            subject.sections.push(ExamSection {
                id: section_id(&subject.id, &name),
                name_cs: (lang == Lang::Cs).then(|| name.clone()),
                name_en: (lang == Lang::En).then(|| name.clone()),
                name,
                kind,
                status: SectionStatus::Open,
                registered_term: None,
                terms: Vec::new(),
            });
            subject.sections.len() - 1
        }
    };
    &mut subject.sections[index]
}

fn section_id(subject_id: &str, name: &str) -> String {
    let slug = name.split_whitespace().collect::<Vec<_>>().join("-").to_lowercase();
    format!("{subject_id}-{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One subject, one registered term, and the same term in the available table.
    const GOLD_STANDARD: &str = r#"
        <html><body>
        <table id="table_1">
          <tbody>
            <tr>
              <td></td><td>1.</td><td>EBC-ALG</td><td>ZS 2025/2026 - PEF - Algoritmizace</td><td></td>
              <td>16.02.2026 10:00 (po)</td><td>Q01</td><td>zkouška (písemná)</td>
              <td><a href="../lide/clovek.pl?id=1234;lang=cz">doc. Ing. Jan Novák, Ph.D.</a></td>
              <td>10/20</td><td>Regular</td>
              <td>--<br>01.01.2026 09:00<br>14.02.2026 12:00</td>
              <td>Info</td>
              <td><a href="terminy_prihlaseni.pl?termin=12345;odhlasit_ihned=1">Odhlásit</a></td>
            </tr>
          </tbody>
        </table>
        <table id="table_2">
          <thead><tr><th></th><th></th><th>Kód</th><th>Předmět</th><th></th><th>Datum</th><th>Místnost</th><th>Zkouška</th><th>Zkoušející</th><th>Obsazenost</th><th>Typ</th><th>Přihlašování</th><th></th></tr></thead>
          <tbody>
            <tr>
              <td></td><td>1.</td><td>EBC-ALG</td><td>ZS 2025/2026 - PEF - Algoritmizace</td><td></td>
              <td>16.02.2026 10:00 (po)</td><td>Q01</td><td>zkouška</td>
              <td><a href="../lide/clovek.pl?id=1234">doc. Ing. Jan Novák, Ph.D.</a></td>
              <td>10/20</td><td><img alt="řádný" src="x.gif"></td>
              <td>01.01.2026 09:00<br>15.02.2026 23:59</td>
              <td><a href="terminy_info.pl?termin=12345">Info</a></td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_gold_standard_fixture() {
        let subjects = parse_exam_page(GOLD_STANDARD, Lang::Cs);
        assert_eq!(subjects.len(), 1);

        let subject = &subjects[0];
        assert_eq!(subject.code, "EBC-ALG");
        assert_eq!(subject.name, "Algoritmizace");
        assert_eq!(subject.name_cs.as_deref(), Some("Algoritmizace"));
        assert_eq!(subject.sections.len(), 1);

        let section = &subject.sections[0];
        assert_eq!(section.name, "Zkouška");
        assert_eq!(section.id, "EBC-ALG-zkouška");
        assert_eq!(section.kind, SectionKind::Exam);
        assert_eq!(section.status, SectionStatus::Registered);

        let reg = section.registered_term.as_ref().unwrap();
        assert_eq!(reg.id.as_deref(), Some("12345"));
        assert_eq!(reg.date, "16.02.2026");
        assert_eq!(reg.time, "10:00");
        assert_eq!(reg.teacher_id.as_deref(), Some("1234"));
        assert_eq!(reg.deregistration_deadline.as_deref(), Some("14.02.2026 12:00"));

        assert_eq!(section.terms.len(), 1);
        let term = &section.terms[0];
        let cap = term.capacity.as_ref().unwrap();
        assert_eq!((cap.occupied, cap.total, cap.raw.as_str()), (10, 20, "10/20"));
        assert!(!term.full);
        assert_eq!(term.attempt_type, Some(AttemptType::Regular));
        // No immediate-registration link in the row
        assert!(!term.can_register_now);
        let window = term.registration_window.as_ref().unwrap();
        assert_eq!(window.start.as_deref(), Some("01.01.2026 09:00"));
        assert_eq!(window.end.as_deref(), Some("15.02.2026 23:59"));
    }

    #[test]
    fn test_empty_table_yields_nothing() {
        let html = r#"<table id="table_2"><thead><tr><th>Datum</th><th>Místnost</th><th>Zkouška</th></tr></thead><tbody></tbody></table>"#;
        assert!(parse_exam_page(html, Lang::Cs).is_empty());
    }

    #[test]
    fn test_structure_warnings() {
        let none = Html::parse_document("<html><body><p>nothing</p></body></html>");
        assert_eq!(check_structure(&none).len(), 1);

        let bad_headers = Html::parse_document(
            r#"<table id="table_2"><thead><tr><th>Datum</th><th>Kde</th></tr></thead></table>"#,
        );
        let warnings = check_structure(&bad_headers);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Místnost/Where"));
        assert!(warnings[0].contains("Zkouška/Type"));

        let english = Html::parse_document(
            r#"<table id="table_2"><thead><tr><th>Date</th><th>Where</th><th>Type</th></tr></thead></table>"#,
        );
        assert!(check_structure(&english).is_empty());
    }

    #[test]
    fn test_strip_semester_prefix() {
        assert_eq!(strip_semester_prefix("ZS 2025/2026 - PEF - Algoritmizace"), "Algoritmizace");
        assert_eq!(strip_semester_prefix("ls 2024/2025 - FRRMS Ekonomie"), "Ekonomie");
        assert_eq!(strip_semester_prefix("Algoritmizace"), "Algoritmizace");
    }

    #[test]
    fn test_section_ids() {
        assert_eq!(section_id("EBC-ALG", "Zápočtový test"), "EBC-ALG-zápočtový-test");
    }
}
