//! Extractors for the three levels of the statistics walk (`hodnoceni.pl`).
//!
//! All three pages render their listing in `table#tmtab_1` with data rows
//! marked `uis-hl-table`. Each extractor first checks that the header carries
//! the column it relies on and reports a structural error otherwise.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::error::ScrapeError;
use crate::db::GradeCounts;
use crate::html::{element_text, extract_param, header_texts, matches_label, row_cells};
use crate::semester::year_from_name;

static LISTING_TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table#tmtab_1").unwrap());
static DATA_ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr.uis-hl-table").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static COURSE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="predmet="]"#).unwrap());

/// NVD3 bar chart of the final outcome over all terms.
static CHART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"d3\.select\('#graph_\d+ svg'\)\s*\.datum\(\[\s*\{\s*values:\s*\[\s*([\s\S]*?)\]\s*\}\s*,?\s*\]\)",
    )
    .unwrap()
});
static CHART_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{\s*x:\s*['"]([^'"]+)['"],\s*y:\s*(\d+)\s*\}"#).unwrap());

const SEMESTER_HEADER: &[&str] = &["Název období", "Period"];
const COURSE_HEADER: &[&str] = &["Kód", "Code"];
/// Term name used for the chart aggregate.
pub const ALL_TERMS: &str = "Všechny termíny";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterLink {
    /// `obdobi` id
    pub id: String,
    pub name: String,
    pub year: i32,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLink {
    pub code: String,
    pub name: String,
    /// `predmet` id
    pub external_id: String,
}

fn structure(url: &str, message: impl Into<String>) -> ScrapeError {
    ScrapeError::Structure {
        url: url.to_string(),
        message: message.into(),
    }
}

/// The listing table, provided its header contains one of `labels`.
fn listing_table<'a>(doc: &'a Html, url: &str, labels: &[&str]) -> Result<ElementRef<'a>, ScrapeError> {
    let table = doc
        .select(&LISTING_TABLE)
        .next()
        .ok_or_else(|| structure(url, "table#tmtab_1 missing"))?;

    if !matches_label(&header_texts(table), labels) {
        return Err(structure(url, format!("header lacks any of {labels:?}")));
    }
    Ok(table)
}

/// Semester list of one faculty. Rows without an `obdobi` link or without a
/// year in the name are skipped.
pub fn parse_semesters(html: &str, url: &str) -> Result<Vec<SemesterLink>, ScrapeError> {
    let doc = Html::parse_document(html);
    let table = listing_table(&doc, url, SEMESTER_HEADER)?;

    let semesters = table
        .select(&DATA_ROWS)
        .filter_map(|row| {
            let cells = row_cells(row);
            if cells.len() < 5 {
                return None;
            }
            let name = element_text(cells[1]);
            let href = cells[4].select(&LINK).next()?.value().attr("href")?.to_string();
            let id = extract_param(&href, "obdobi")?;
            let year = year_from_name(&name)?;
            Some(SemesterLink { id, name, year, href })
        })
        .collect();

    Ok(semesters)
}

/// Course list of one semester. Rows need a code and a `predmet` link.
pub fn parse_courses(html: &str, url: &str) -> Result<Vec<CourseLink>, ScrapeError> {
    let doc = Html::parse_document(html);
    let table = listing_table(&doc, url, COURSE_HEADER)?;

    let courses = table
        .select(&DATA_ROWS)
        .filter_map(|row| {
            let cells = row_cells(row);
            if cells.len() < 3 {
                return None;
            }
            let code = element_text(cells[1]);
            let href = row.select(&COURSE_LINK).next()?.value().attr("href")?;
            let external_id = extract_param(href, "predmet")?;
            if code.is_empty() {
                return None;
            }
            Some(CourseLink {
                code,
                name: element_text(cells[2]),
                external_id,
            })
        })
        .collect();

    Ok(courses)
}

/// Grade counts per term for one course in one semester.
///
/// The header must have both an `A` and an `F` column, otherwise nothing is
/// returned so no partial rows get written. The chart aggregate wins over the
/// per-term table when present. All-zero rows are dropped.
pub fn parse_stats(html: &str, url: &str) -> Result<Vec<(String, GradeCounts)>, ScrapeError> {
    let doc = Html::parse_document(html);
    let table = doc
        .select(&LISTING_TABLE)
        .next()
        .ok_or_else(|| structure(url, "statistics table missing"))?;

    let headers = header_texts(table);
    let has_column = |letter: &str| headers.iter().any(|h| h == letter);
    if !has_column("A") || !has_column("F") {
        return Err(structure(url, "grade columns A..F missing"));
    }

    if let Some(grades) = chart_grades(html) {
        let rows = if grades.is_empty() {
            Vec::new()
        } else {
            vec![(ALL_TERMS.to_string(), grades)]
        };
        return Ok(rows);
    }

    let rows = table
        .select(&DATA_ROWS)
        .filter_map(|row| {
            let cells = row_cells(row);
            if cells.len() < 9 {
                return None;
            }
            let count = |i: usize| element_text(cells[i]).parse::<u32>().unwrap_or(0);
            let grades = GradeCounts {
                a: count(2),
                b: count(3),
                c: count(4),
                d: count(5),
                e: count(6),
                f: count(7),
                fn_: count(8),
            };
            (!grades.is_empty()).then(|| (element_text(cells[1]), grades))
        })
        .collect();

    Ok(rows)
}

fn chart_grades(html: &str) -> Option<GradeCounts> {
    let values = CHART.captures(html)?;
    let mut grades = GradeCounts::default();

    for value in CHART_VALUE.captures_iter(&values[1]) {
        let count = value[2].parse().unwrap_or(0);
        match &value[1] {
            "A" => grades.a = count,
            "B" => grades.b = count,
            "C" => grades.c = count,
            "D" => grades.d = count,
            "E" => grades.e = count,
            "F" => grades.f = count,
            other if other == "FN" || other.to_lowercase().contains("nedost") => grades.fn_ = count,
            _ => {}
        }
    }
    Some(grades)
}
