//! Rows of `#table_2`: bookable terms.

use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

use super::{
    cell_text, non_empty, section_entry, subject_entry, teacher_id, AttemptType, ExamSubject,
    ExamTerm, RegistrationWindow,
};
use crate::html::{break_parts, extract_param, find_date_column, first_href, has_break, row_cells};
use crate::util::{looks_like_date, normalize_date, split_date_time, Capacity, Lang, NOT_APPLICABLE};

static REGISTER_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="prihlasit_ihned=1"]"#).unwrap());
static INFO_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="terminy_info.pl"]"#).unwrap());
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

const MIN_CELLS: usize = 8;

/// Attempt markers, most specific first. The order matters: "opravný 1"
/// would otherwise also match the bare "opravný" of a later retake.
const ATTEMPT_MARKERS: [(&str, AttemptType); 5] = [
    ("opravný 3", AttemptType::Retake3),
    ("opravný 2", AttemptType::Retake2),
    ("opravný 1", AttemptType::Retake1),
    ("opravný", AttemptType::Retake1),
    ("řádný", AttemptType::Regular),
];

pub(super) fn parse_row(row: ElementRef, lang: Lang, subjects: &mut Vec<ExamSubject>) {
    let cells = row_cells(row);
    if cells.len() < MIN_CELLS {
        return;
    }
    let Some(pivot) = find_date_column(&cells) else {
        return;
    };

    let code = cell_text(&cells, pivot.checked_sub(3));
    if code.is_empty() {
        return;
    }
    let name = cell_text(&cells, pivot.checked_sub(2));
    let (date, time) = split_date_time(&normalize_date(&cell_text(&cells, Some(pivot)), lang));
    let room = non_empty(cell_text(&cells, Some(pivot + 1)));
    let section_name = cell_text(&cells, Some(pivot + 2));
    let teacher = non_empty(cell_text(&cells, Some(pivot + 3)));

    let capacity = Capacity::parse(&cell_text(&cells, Some(pivot + 4)));
    let full = capacity.as_ref().is_some_and(Capacity::is_full);

    let register_href = first_href(row, &REGISTER_LINK);
    let term_id = register_href
        .as_deref()
        .and_then(|href| extract_param(href, "termin"))
        .or_else(|| first_href(row, &INFO_LINK).and_then(|href| extract_param(&href, "termin")))
        .unwrap_or_else(|| format!("{code}-{date}-{time}"));

    let window = registration_window(&cells, lang);

    let term = ExamTerm {
        id: term_id,
        date,
        time,
        room_cs: room.clone().filter(|_| lang == Lang::Cs),
        room_en: room.clone().filter(|_| lang == Lang::En),
        room,
        teacher,
        teacher_id: teacher_id(&cells, pivot + 3),
        capacity,
        full,
        registration_window: (!window.is_empty()).then_some(window),
        attempt_type: attempt_type(&cells),
        can_register_now: register_href.is_some() && !full,
    };

    let subject = subject_entry(subjects, &code, &name, lang);
    let section = section_entry(subject, &section_name, lang);
    if !section.terms.iter().any(|t| t.id == term.id) {
        section.terms.push(term);
    }
}

/// Start and end come from the first cell split by `<br>`; `--` leaves a side unset.
fn registration_window(cells: &[ElementRef], lang: Lang) -> RegistrationWindow {
    let Some(cell) = cells.iter().find(|c| has_break(**c)) else {
        return RegistrationWindow::default();
    };
    let parts = break_parts(*cell);
    let pick = |i: usize| {
        parts
            .get(i)
            .filter(|p| p.as_str() != NOT_APPLICABLE && looks_like_date(p))
            .map(|p| normalize_date(p, lang))
    };

    RegistrationWindow {
        start: pick(0),
        end: pick(1),
    }
}

/// Scans cells left to right; the first cell carrying any marker decides.
fn attempt_type(cells: &[ElementRef]) -> Option<AttemptType> {
    cells.iter().find_map(|cell| {
        let mut haystack = cell.inner_html();
        if let Some(img) = cell.select(&IMAGE).next() {
            haystack.push_str(img.value().attr("alt").unwrap_or_default());
            haystack.push_str(img.value().attr("title").unwrap_or_default());
        }
        let haystack = haystack.to_lowercase();

        ATTEMPT_MARKERS
            .iter()
            .find(|(marker, _)| haystack.contains(marker))
            .map(|(_, kind)| *kind)
    })
}

#[cfg(test)]
mod tests {
    use crate::exam::{parse_exam_page, AttemptType, SectionKind};
    use crate::util::Lang;

    fn row(date: &str, section: &str, capacity: &str, marker: &str, links: &str) -> String {
        format!(
            r#"<tr><td></td><td>1.</td><td>EBC-MAT</td><td>LS 2025/2026 - PEF - Matematika</td><td></td>
            <td>{date}</td><td>Q02</td><td>{section}</td><td>Teacher</td><td>{capacity}</td>
            <td>{marker}</td><td>01.01.2026 09:00<br>--</td><td>{links}</td></tr>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(r#"<html><body><table id="table_2"><tbody>{}</tbody></table></body></html>"#, rows.join(""))
    }

    #[test]
    fn test_full_term_cannot_be_registered() {
        let html = page(&[row(
            "20.02.2026 08:00",
            "zápočtový test",
            "20/20",
            "řádný",
            r#"<a href="x.pl?termin=77;prihlasit_ihned=1">Přihlásit</a>"#,
        )]);
        let subjects = parse_exam_page(&html, Lang::Cs);
        let term = &subjects[0].sections[0].terms[0];
        assert_eq!(term.id, "77");
        assert!(term.full);
        assert!(!term.can_register_now);
        assert_eq!(subjects[0].sections[0].kind, SectionKind::Test);
    }

    #[test]
    fn test_open_term_with_register_link() {
        let html = page(&[row(
            "20.02.2026 08:00",
            "zkouška",
            " 3 / 20 ",
            "řádný",
            r#"<a href="x.pl?termin=78;prihlasit_ihned=1">Přihlásit</a>"#,
        )]);
        let subjects = parse_exam_page(&html, Lang::Cs);
        let term = &subjects[0].sections[0].terms[0];
        assert!(term.can_register_now);
        assert_eq!(term.capacity.as_ref().unwrap().raw, "3/20");

        let window = term.registration_window.as_ref().unwrap();
        assert_eq!(window.start.as_deref(), Some("01.01.2026 09:00"));
        assert_eq!(window.end, None);
    }

    #[test]
    fn test_attempt_type_precedence() {
        let cases = [
            ("<img alt=\"Opravný 3\" src=\"a.gif\">", Some(AttemptType::Retake3)),
            ("opravný 2", Some(AttemptType::Retake2)),
            ("<img title=\"opravný termín\" src=\"a.gif\">", Some(AttemptType::Retake1)),
            ("řádný", Some(AttemptType::Regular)),
            ("", None),
        ];
        for (marker, expected) in cases {
            let html = page(&[row("20.02.2026 08:00", "zkouška", "1/20", marker, "")]);
            let subjects = parse_exam_page(&html, Lang::Cs);
            assert_eq!(subjects[0].sections[0].terms[0].attempt_type, expected, "marker {marker:?}");
        }
    }

    #[test]
    fn test_english_page_dates_and_rooms() {
        let html = page(&[row(
            "02/20/2026 08:00 (Fri)",
            "exam",
            "1/20",
            "",
            r#"<a href="terminy_info.pl?termin=99">Info</a>"#,
        )]);
        let subjects = parse_exam_page(&html, Lang::En);
        let term = &subjects[0].sections[0].terms[0];
        assert_eq!(term.id, "99");
        assert_eq!(term.date, "20.02.2026");
        assert_eq!(term.room_en.as_deref(), Some("Q02"));
        assert_eq!(term.room_cs, None);
        assert_eq!(subjects[0].name_en.as_deref(), Some("Matematika"));
    }

    #[test]
    fn test_missing_term_link_gets_stable_id() {
        let html = page(&[row("20.02.2026 08:00", "zkouška", "1/20", "", "")]);
        let first = parse_exam_page(&html, Lang::Cs);
        let second = parse_exam_page(&html, Lang::Cs);
        assert_eq!(first[0].sections[0].terms[0].id, "EBC-MAT-20.02.2026-08:00");
        assert_eq!(first, second);
    }

    #[test]
    fn test_terms_group_into_sections() {
        let html = page(&[
            row("20.02.2026 08:00", "zkouška (ústní)", "1/20", "", r#"<a href="terminy_info.pl?termin=1">i</a>"#),
            row("21.02.2026 08:00", "zkouška", "1/20", "", r#"<a href="terminy_info.pl?termin=2">i</a>"#),
            row("22.02.2026 08:00", "zápočet", "1/20", "", r#"<a href="terminy_info.pl?termin=3">i</a>"#),
        ]);
        let subjects = parse_exam_page(&html, Lang::Cs);
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].sections.len(), 2);
        assert_eq!(subjects[0].sections[0].terms.len(), 2);
    }
}
