//! Label-driven course metadata from the two-column rows of a syllabus page.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use super::{CourseInfo, Teacher};
use crate::html::{element_text, row_cells};
use crate::util::{clean_text, Lang};

static ROWS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static BOLD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").unwrap());
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^-.*-$|not defined|nebyla zadána|nebyl zadán").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Credits,
    Garant,
    Status,
    Teachers,
}

/// Row label (Czech or English) to the field it fills.
const LABELS: [(&str, Field); 10] = [
    ("Název předmětu", Field::Title),
    ("Course title", Field::Title),
    ("Způsob ukončení", Field::Credits),
    ("Mode of completion", Field::Credits),
    ("Garant předmětu", Field::Garant),
    ("Course supervisor", Field::Garant),
    ("Typ předmětu", Field::Status),
    ("Type of course", Field::Status),
    ("Vyučující", Field::Teachers),
    ("Teachers", Field::Teachers),
];

/// Scans every two-column row and fills whatever fields it recognizes.
///
/// The first matching row wins for single-valued fields. Placeholder values
/// (`--`, "nebyla zadána", "not defined") are treated as absent.
pub fn parse_course_info(doc: &Html, lang: Lang) -> CourseInfo {
    let mut info = CourseInfo::default();
    let mut title: Option<String> = None;

    for row in doc.select(&ROWS) {
        let cells = row_cells(row);
        if cells.len() < 2 {
            continue;
        }
        let label = element_text(cells[0]);
        let Some(field) = LABELS
            .iter()
            .find(|(text, _)| label.contains(text))
            .map(|(_, field)| *field)
        else {
            continue;
        };
        let value = cells[1];

        match field {
            Field::Title if title.is_none() => title = accepted(element_text(value)),
            Field::Credits if info.credits.is_none() => {
                info.credits = accepted(first_text(value, &BOLD).unwrap_or_else(|| element_text(value)));
            }
            Field::Garant if info.garant.is_none() => {
                info.garant = accepted(first_text(value, &LINK).unwrap_or_else(|| element_text(value)));
            }
            Field::Status if info.status.is_none() => info.status = accepted(element_text(value)),
            Field::Teachers if info.teachers.is_empty() => info.teachers = parse_teachers(value),
            _ => {}
        }
    }

    match lang {
        Lang::Cs => info.name_cs = title,
        Lang::En => info.name_en = title,
    }
    info
}

fn accepted(value: String) -> Option<String> {
    if value.is_empty() || PLACEHOLDER.is_match(&value) {
        None
    } else {
        Some(value)
    }
}

fn first_text(el: ElementRef, selector: &Selector) -> Option<String> {
    el.select(selector).map(element_text).find(|t| !t.is_empty())
}

/// One entry per link; roles come from the parenthetical between this link and the next.
fn parse_teachers(cell: ElementRef) -> Vec<Teacher> {
    cell.select(&LINK)
        .filter_map(|link| {
            let name = element_text(link);
            if name.is_empty() {
                return None;
            }
            Some(Teacher {
                roles: roles_after(link),
                name,
            })
        })
        .collect()
}

fn roles_after(link: ElementRef) -> String {
    let mut trailing = String::new();
    for sibling in link.next_siblings() {
        match sibling.value() {
            Node::Element(e) if e.name() == "a" => break,
            Node::Text(text) => trailing.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(sibling) {
                    trailing.push_str(&el.text().collect::<String>());
                }
            }
            _ => {}
        }
    }

    PARENTHETICAL
        .captures(&trailing)
        .map(|caps| clean_text(&caps[1]))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"
        <table>
          <tr><td>Název předmětu</td><td>Algoritmizace</td></tr>
          <tr><td>Způsob ukončení a počet kreditů</td><td>zkouška (<b>6 kreditů</b>)</td></tr>
          <tr><td>Garant předmětu</td><td><a href="clovek.pl?id=1">doc. Ing. Jan Novák, Ph.D.</a></td></tr>
          <tr><td>Typ předmětu</td><td>povinný</td></tr>
          <tr><td>Vyučující</td><td>
            <a href="clovek.pl?id=1">doc. Ing. Jan Novák, Ph.D.</a> (garant, přednášející)<br>
            <a href="clovek.pl?id=2">Ing. Petra Malá</a> (cvičící)<br>
            <a href="clovek.pl?id=3">Ing. Karel Bez</a>
          </td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_course_info() {
        let doc = Html::parse_document(METADATA);
        let info = parse_course_info(&doc, Lang::Cs);

        assert_eq!(info.name_cs.as_deref(), Some("Algoritmizace"));
        assert_eq!(info.name_en, None);
        assert_eq!(info.credits.as_deref(), Some("6 kreditů"));
        assert_eq!(info.garant.as_deref(), Some("doc. Ing. Jan Novák, Ph.D."));
        assert_eq!(info.status.as_deref(), Some("povinný"));

        assert_eq!(info.teachers.len(), 3);
        assert_eq!(info.teachers[0].roles, "garant, přednášející");
        assert_eq!(info.teachers[1].name, "Ing. Petra Malá");
        assert_eq!(info.teachers[1].roles, "cvičící");
        assert_eq!(info.teachers[2].roles, "");
    }

    #[test]
    fn test_placeholders_are_rejected() {
        let doc = Html::parse_document(
            r#"<table>
              <tr><td>Garant předmětu</td><td>-- nebyla zadána --</td></tr>
              <tr><td>Course type</td><td>x</td></tr>
              <tr><td>Type of course</td><td>Not defined</td></tr>
              <tr><td>Mode of completion</td><td>--</td></tr>
            </table>"#,
        );
        let info = parse_course_info(&doc, Lang::En);
        assert_eq!(info.garant, None);
        assert_eq!(info.status, None);
        assert_eq!(info.credits, None);
    }
}
