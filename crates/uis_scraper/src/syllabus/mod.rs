//! Syllabus page parser: completion requirements, their point breakdown and
//! the course metadata block.

mod metadata;
mod types;

pub use metadata::parse_course_info;
pub use types::{
    AssessmentCriterion, CourseInfo, SyllabusRequirements, Teacher, SECTION_NOT_FOUND,
    SYLLABUS_SCHEMA_VERSION,
};

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::html::{element_text, heading_content_row_any, row_cells, text_with_breaks};
use crate::schema::{validate, Validated, ValidationError};
use crate::util::{clean_multiline, clean_text, Lang};

static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static ROW_CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());

const REQUIREMENTS_TEXT: &[&str] = &["Požadavky na ukončení", "Requirements for course completion"];
const REQUIREMENTS_TABLE: &[&str] = &["Rozložení požadavků na ukončení", "Breakdown of requirements for course completion"];
const ASSESSMENT_METHODS: &[&str] = &["Způsob ověření studijních výsledků", "Assessment methods"];
const ASSESSMENT_CRITERIA: &[&str] = &["Podmínky ukončení", "Conditions for completion"];

/// Parses a syllabus page into one validated record.
///
/// A missing requirements heading is not an error: the text becomes
/// [`SECTION_NOT_FOUND`] and the table stays empty. Empty input yields the
/// same sentinel record.
///
/// # Arguments
/// * `html` - Raw syllabus page
/// * `lang` - Page language, decides which course-name slot is filled
/// * `course_id` - `predmet` id of the course, if known
pub fn parse_syllabus(
    html: &str,
    lang: Lang,
    course_id: Option<&str>,
) -> Result<Validated<SyllabusRequirements>, ValidationError> {
    let course_id = course_id.map(str::to_string);

    if html.trim().is_empty() {
        debug!("Empty syllabus input");
        return validate(SyllabusRequirements {
            version: SYLLABUS_SCHEMA_VERSION,
            course_id,
            requirements_text: SECTION_NOT_FOUND.to_string(),
            requirements_table: Vec::new(),
            course_info: None,
            assessment_methods: None,
            assessment_criteria: None,
        });
    }

    let doc = Html::parse_document(html);

    let requirements_text = requirements_text(&doc);
    let requirements_table = requirements_table(&doc);
    debug!(
        text_len = requirements_text.len(),
        table_rows = requirements_table.len(),
        "Parsed syllabus requirements"
    );

    validate(SyllabusRequirements {
        version: SYLLABUS_SCHEMA_VERSION,
        course_id,
        requirements_text,
        requirements_table,
        course_info: Some(parse_course_info(&doc, lang)),
        assessment_methods: assessment_methods(&doc),
        assessment_criteria: assessment_criteria(&doc),
    })
}

/// Text of the first cell of the row under the heading, `<br>` kept as line breaks.
fn headed_text(doc: &Html, labels: &[&str]) -> Option<String> {
    let row = heading_content_row_any(doc, labels)?;
    let cell = row.select(&CELL).next()?;
    Some(clean_multiline(&text_with_breaks(cell)))
}

fn requirements_text(doc: &Html) -> String {
    headed_text(doc, REQUIREMENTS_TEXT).unwrap_or_else(|| SECTION_NOT_FOUND.to_string())
}

fn assessment_methods(doc: &Html) -> Option<String> {
    headed_text(doc, ASSESSMENT_METHODS).filter(|t| !t.is_empty())
}

/// Rows of the table nested under `labels`, each cell whitespace-collapsed.
fn headed_table(doc: &Html, labels: &[&str]) -> Option<Vec<Vec<String>>> {
    let row = heading_content_row_any(doc, labels)?;
    let Some(table) = row.select(&TABLE).next() else {
        debug!(heading = labels[0], "Heading found but nested table is missing");
        return None;
    };

    let rows = table
        .select(&ROW)
        // `th` and `td` are treated the same; some pages mark headers as `td`
        .map(|tr| tr.select(&ROW_CELLS).map(element_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect();
    Some(rows)
}

fn requirements_table(doc: &Html) -> Vec<Vec<String>> {
    headed_table(doc, REQUIREMENTS_TABLE).unwrap_or_default()
}

/// Criteria table: requirement, full-time, combined. The header row is skipped.
fn assessment_criteria(doc: &Html) -> Option<Vec<AssessmentCriterion>> {
    let row = heading_content_row_any(doc, ASSESSMENT_CRITERIA)?;
    let table = row.select(&TABLE).next()?;

    let criteria: Vec<AssessmentCriterion> = table
        .select(&ROW)
        .skip(1)
        .filter_map(|tr| {
            let cells: Vec<String> = criterion_cells(tr);
            match cells.as_slice() {
                [kind, daily, combined, ..] if !kind.is_empty() => Some(AssessmentCriterion {
                    requirement_type: kind.clone(),
                    daily_attendance: daily.clone(),
                    combined_form: combined.clone(),
                }),
                _ => None,
            }
        })
        .collect();

    (!criteria.is_empty()).then_some(criteria)
}

fn criterion_cells(tr: ElementRef) -> Vec<String> {
    row_cells(tr)
        .into_iter()
        .map(|cell| clean_text(&cell.text().collect::<String>()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        <html><body>
        <table>
          <tr><td><b>Požadavky na ukončení</b></td></tr>
          <tr><td>Písemná   zkouška<br>Minimum 50 %<br>   <br>Ústní část</td></tr>
        </table>
        <table>
          <tr><td><strong>Rozložení požadavků na ukončení</strong></td></tr>
          <tr><td>
            <table>
              <tr><th>Aktivita</th><th>Max. body</th><th>Procento</th></tr>
              <tr><td>Aktivita na cvičeních</td><td>10</td><td>10   %</td></tr>
              <tr><td>Průběžné testy (3x)</td><td>30</td><td>30 %</td></tr>
              <tr><td>Projekt</td><td>20</td><td>20 %</td></tr>
              <tr><td>Zkouška</td><td>40</td><td>40 %</td></tr>
              <tr><td><b>Celkem</b></td><td><b>100</b></td><td><b>100 %</b></td></tr>
            </table>
          </td></tr>
        </table>
        <table>
          <tr><td><b>Podmínky ukončení</b></td></tr>
          <tr><td>
            <table>
              <tr><td>Požadavek</td><td>Prezenční</td><td>Kombinovaná</td></tr>
              <tr><td>Docházka</td><td>80 %</td><td>--</td></tr>
            </table>
          </td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_full_syllabus() {
        let s = parse_syllabus(FULL, Lang::Cs, Some("159842")).unwrap();
        assert_eq!(s.version, SYLLABUS_SCHEMA_VERSION);
        assert_eq!(s.course_id.as_deref(), Some("159842"));
        assert_eq!(s.requirements_text, "Písemná zkouška\nMinimum 50 %\nÚstní část");

        assert_eq!(s.requirements_table.len(), 6);
        assert_eq!(s.requirements_table[0], vec!["Aktivita", "Max. body", "Procento"]);
        assert_eq!(s.requirements_table[1], vec!["Aktivita na cvičeních", "10", "10 %"]);
        assert_eq!(s.requirements_table[3], vec!["Projekt", "20", "20 %"]);
        assert_eq!(s.requirements_table[5], vec!["Celkem", "100", "100 %"]);

        let criteria = s.assessment_criteria.as_ref().unwrap();
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].requirement_type, "Docházka");
        assert_eq!(criteria[0].daily_attendance, "80 %");
        assert_eq!(criteria[0].combined_form, "--");
    }

    #[test]
    fn test_text_only_syllabus() {
        let html = r#"<table><tr><td><span>Požadavky na ukončení</span></td></tr><tr><td>Zápočet</td></tr></table>"#;
        let s = parse_syllabus(html, Lang::Cs, None).unwrap();
        assert_eq!(s.requirements_text, "Zápočet");
        assert!(s.requirements_table.is_empty());
        assert!(!s.is_missing());
    }

    #[test]
    fn test_missing_section_returns_sentinel() {
        let html = r#"<table><tr><td><b>Anotace předmětu</b></td></tr><tr><td>Tento předmět se zabývá...</td></tr></table>"#;
        let s = parse_syllabus(html, Lang::Cs, None).unwrap();
        assert_eq!(s.requirements_text, "Error: Section not found");
        assert!(s.requirements_table.is_empty());
        assert!(s.is_missing());
    }

    #[test]
    fn test_empty_input_returns_sentinel() {
        let s = parse_syllabus("   ", Lang::Cs, None).unwrap();
        assert!(s.is_missing());
        assert!(s.course_info.is_none());
    }

    #[test]
    fn test_blank_requirements_cell_keeps_rest_of_record() {
        let html = r#"<table>
            <tr><td><b>Požadavky na ukončení</b></td></tr>
            <tr><td>   </td></tr>
        </table>
        <table>
            <tr><td><b>Rozložení požadavků na ukončení</b></td></tr>
            <tr><td><table>
                <tr><th>Aktivita</th><th>Max. body</th></tr>
                <tr><td>Zkouška</td><td>100</td></tr>
            </table></td></tr>
        </table>"#;
        let s = parse_syllabus(html, Lang::Cs, Some("159842")).unwrap();
        assert_eq!(s.requirements_text, "");
        assert!(!s.is_missing());
        assert_eq!(s.requirements_table, vec![vec!["Aktivita", "Max. body"], vec!["Zkouška", "100"]]);
    }

    #[test]
    fn test_heading_without_nested_table() {
        let html = r#"<table><tr><td><b>Rozložení požadavků na ukončení</b></td></tr><tr><td>nic</td></tr></table>"#;
        let s = parse_syllabus(html, Lang::Cs, None).unwrap();
        assert!(s.requirements_table.is_empty());
    }

    #[test]
    fn test_english_headings() {
        let html = r#"<table>
            <tr><td><b>Requirements for course completion</b></td></tr>
            <tr><td>Written exam</td></tr>
            <tr><td>Course title</td><td>Algorithms</td></tr>
        </table>"#;
        let s = parse_syllabus(html, Lang::En, None).unwrap();
        assert_eq!(s.requirements_text, "Written exam");
        assert_eq!(s.course_info.as_ref().unwrap().name_en.as_deref(), Some("Algorithms"));
    }
}
