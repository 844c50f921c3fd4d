//! Rows of `#table_1`: terms the student is already signed up for.

use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

use super::{cell_text, non_empty, section_entry, subject_entry, teacher_id, ExamSubject, RegisteredTerm, SectionStatus};
use crate::html::{break_parts, extract_param, find_date_column, first_href, row_cells};
use crate::util::{looks_like_date, normalize_date, split_date_time, Lang, NOT_APPLICABLE};

static DEREGISTER_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="odhlasit_ihned=1"]"#).unwrap());

/// Rows shorter than this are ads or separators.
const MIN_CELLS: usize = 6;

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

    let term_id = first_href(row, &DEREGISTER_LINK).and_then(|href| extract_param(&href, "termin"));

    let registered = RegisteredTerm {
        id: term_id,
        date,
        time,
        room_cs: room.clone().filter(|_| lang == Lang::Cs),
        room_en: room.clone().filter(|_| lang == Lang::En),
        room,
        teacher,
        teacher_id: teacher_id(&cells, pivot + 3),
        deregistration_deadline: deregistration_deadline(&cells, lang),
    };

    let subject = subject_entry(subjects, &code, &name, lang);
    let section = section_entry(subject, &section_name, lang);
    section.status = SectionStatus::Registered;
    section.registered_term = Some(registered);
}

/// Third `<br>`-separated line of the first cell that has one.
///
/// `--` is kept as is: it means deregistration does not apply, which is
/// different from not knowing the deadline.
fn deregistration_deadline(cells: &[ElementRef], lang: Lang) -> Option<String> {
    cells.iter().find_map(|cell| {
        let parts = break_parts(*cell);
        let raw = parts.get(2)?;
        if raw == NOT_APPLICABLE {
            Some(NOT_APPLICABLE.to_string())
        } else if looks_like_date(raw) {
            Some(normalize_date(raw, lang))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::exam::parse_exam_page;
    use crate::util::Lang;

    fn page(deadline_cell: &str) -> String {
        format!(
            r#"<html><body><table id="table_1"><tbody>
            <tr>
                <td></td><td>1.</td><td>CODE</td><td>Subject</td><td></td>
                <td>01.01.2026 10:00</td><td>Room</td><td>zkouška</td><td>Teacher</td>
                <td>10/10</td><td>Regular</td>
                <td>{deadline_cell}</td>
                <td>Info</td><td>Unregister</td>
            </tr>
            </tbody></table></body></html>"#
        )
    }

    #[test]
    fn test_deadline_with_any_break_style() {
        for cell in [
            "--<br>01.01.2026 09:00<br>31.12.2025 23:59",
            "--<br />01.01.2026 09:00<br />31.12.2025 23:59",
            "--<br>01.01.2026 09:00<br/>31.12.2025 23:59",
        ] {
            let subjects = parse_exam_page(&page(cell), Lang::Cs);
            let term = subjects[0].sections[0].registered_term.as_ref().unwrap();
            assert_eq!(term.deregistration_deadline.as_deref(), Some("31.12.2025 23:59"));
        }
    }

    #[test]
    fn test_placeholder_deadline_is_not_applicable() {
        let subjects = parse_exam_page(&page("01.01.2026 09:00<br>--<br>--"), Lang::Cs);
        let term = subjects[0].sections[0].registered_term.as_ref().unwrap();
        assert_eq!(term.deregistration_deadline.as_deref(), Some("--"));
    }

    #[test]
    fn test_registered_term_fields() {
        let subjects = parse_exam_page(&page("--"), Lang::Cs);
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].code, "CODE");

        let section = &subjects[0].sections[0];
        assert_eq!(section.name, "Zkouška");
        // Registered-only section: no bookable terms listed
        assert!(section.terms.is_empty());

        let term = section.registered_term.as_ref().unwrap();
        assert_eq!(term.date, "01.01.2026");
        assert_eq!(term.time, "10:00");
        assert_eq!(term.room.as_deref(), Some("Room"));
        assert_eq!(term.room_cs.as_deref(), Some("Room"));
        assert_eq!(term.room_en, None);
        assert_eq!(term.id, None);
        assert_eq!(term.deregistration_deadline, None);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let html = r#"<table id="table_1"><tbody><tr><td>CODE</td><td>01.01.2026</td></tr></tbody></table>"#;
        assert!(parse_exam_page(html, Lang::Cs).is_empty());
    }
}
