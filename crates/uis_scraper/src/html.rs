//! Extraction primitives over a parsed `scraper::Html` tree.
//!
//! The portal lays everything out in nested tables, so most lookups here are
//! about rows, cells and the row that follows a labeled heading.

use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use crate::util::{clean_text, looks_like_date};

static HEADING_CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b, span, strong, h1, h2, h3").unwrap());
static TABLE_HEADER_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, tr.zahlavi td").unwrap());

/// Direct `<td>` children of a row. Nested tables are not descended into.
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect()
}

/// Whitespace-normalized text content of an element.
pub fn element_text(el: ElementRef) -> String {
    clean_text(&el.text().collect::<String>())
}

/// Text content with every `<br>` turned into `\n`. Whitespace is left as is.
pub fn text_with_breaks(el: ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// Splits a cell on its `<br>` tags, normalizing each part.
///
/// Unlike [`text_with_breaks`], empty parts are kept so callers can index
/// positionally (`start<br>end<br>deadline`).
pub fn break_parts(el: ElementRef) -> Vec<String> {
    let mut parts = vec![String::new()];
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => {
                if let Some(last) = parts.last_mut() {
                    last.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => parts.push(String::new()),
            _ => {}
        }
    }
    parts.iter().map(|p| clean_text(p)).collect()
}

/// True if the cell contains at least one `<br>`.
pub fn has_break(el: ElementRef) -> bool {
    el.descendants()
        .any(|node| matches!(node.value(), Node::Element(e) if e.name() == "br"))
}

/// Index of the first cell whose text looks like a date.
pub fn find_date_column(cells: &[ElementRef]) -> Option<usize> {
    cells.iter().position(|cell| looks_like_date(&element_text(*cell)))
}

/// Reads a numeric query parameter (`name=<digits>`) from a portal link.
///
/// The portal mixes `;` and `&` as separators, so this does not go through
/// a URL parser.
pub fn extract_param(href: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=");
    let mut search_from = 0;

    while let Some(found) = href[search_from..].find(&needle) {
        let start = search_from + found;
        let boundary_ok = start == 0
            || matches!(href.as_bytes()[start - 1], b'?' | b';' | b'&');
        let value_start = start + needle.len();

        if boundary_ok {
            let digits: String = href[value_start..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
        search_from = value_start;
    }
    None
}

/// Returns the first `href` of the element's descendants matching `selector`.
pub fn first_href(el: ElementRef, selector: &Selector) -> Option<String> {
    el.select(selector)
        .find_map(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Finds the layout row that follows a labeled heading.
///
/// The heading is any bold/span/strong/h1-h3 whose text contains `label`;
/// the content lives in the *next* `<tr>` after the row holding the heading.
pub fn heading_content_row<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    let heading = doc
        .select(&HEADING_CANDIDATES)
        .find(|el| el.text().collect::<String>().contains(label))?;

    let heading_row = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")?;

    heading_row.next_siblings().find_map(ElementRef::wrap)
}

/// Tries each label in turn and returns the first content row found.
pub fn heading_content_row_any<'a>(doc: &'a Html, labels: &[&str]) -> Option<ElementRef<'a>> {
    labels.iter().find_map(|label| heading_content_row(doc, label))
}

/// Texts of a table's header cells: `<th>` anywhere, plus cells of `tr.zahlavi` rows.
pub fn header_texts(table: ElementRef) -> Vec<String> {
    table.select(&TABLE_HEADER_CELLS).map(element_text).collect()
}

/// True if any header contains one of the (bilingual) labels, case-insensitively.
pub fn matches_label(headers: &[String], labels: &[&str]) -> bool {
    headers.iter().any(|h| {
        let h = h.to_lowercase();
        labels.iter().any(|label| h.contains(&label.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn test_row_cells_skips_nested_tables() {
        let doc = Html::parse_document(
            "<table><tr id='r'><td>a</td><td><table><tr><td>x</td><td>y</td></tr></table></td><td>c</td></tr></table>",
        );
        let cells = row_cells(first(&doc, "tr#r"));
        assert_eq!(cells.len(), 3);
        assert_eq!(element_text(cells[2]), "c");
    }

    #[test]
    fn test_break_parts_keeps_positions() {
        let doc = Html::parse_document(
            "<table><tr><td id='c'>--<br>01.01.2026 09:00<br/> 31.12.2025   23:59 </td></tr></table>",
        );
        let parts = break_parts(first(&doc, "td#c"));
        assert_eq!(parts, vec!["--", "01.01.2026 09:00", "31.12.2025 23:59"]);
        assert!(has_break(first(&doc, "td#c")));
    }

    #[test]
    fn test_text_with_breaks() {
        let doc = Html::parse_document("<div id='d'>one<br>two <b>bold</b></div>");
        assert_eq!(text_with_breaks(first(&doc, "div#d")), "one\ntwo bold");
    }

    #[test]
    fn test_extract_param() {
        assert_eq!(
            extract_param("terminy_prihlaseni.pl?termin=123;prihlasit_ihned=1", "termin").as_deref(),
            Some("123")
        );
        assert_eq!(extract_param("clovek.pl?zpet=x;id=42;lang=cz", "id").as_deref(), Some("42"));
        // `obdobi` must not match inside another parameter name
        assert_eq!(extract_param("x.pl?podobdobi=1;obdobi=77", "obdobi").as_deref(), Some("77"));
        assert_eq!(extract_param("x.pl?termin=abc", "termin"), None);
    }

    #[test]
    fn test_heading_content_row() {
        let doc = Html::parse_document(
            "<table><tr><td><b>Požadavky na ukončení</b></td></tr><tr><td>Zkouška</td></tr></table>",
        );
        let row = heading_content_row(&doc, "Požadavky na ukončení").unwrap();
        assert_eq!(element_text(row), "Zkouška");
        assert!(heading_content_row(&doc, "Anotace").is_none());
    }

    #[test]
    fn test_header_matching() {
        let doc = Html::parse_document(
            "<table id='t'><tr class='zahlavi'><td>Kód</td><td>Název</td></tr></table>",
        );
        let headers = header_texts(first(&doc, "table#t"));
        assert!(matches_label(&headers, &["Kód", "Code"]));
        assert!(!matches_label(&headers, &["Název období", "Period"]));
    }

    #[test]
    fn test_find_date_column() {
        let doc = Html::parse_document(
            "<table><tr id='r'><td></td><td>1.</td><td>EBC</td><td>01.01.2026 10:00</td></tr></table>",
        );
        let cells = row_cells(first(&doc, "tr#r"));
        assert_eq!(find_date_column(&cells), Some(3));
    }
}
