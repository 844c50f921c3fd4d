//! In-memory registry that folds Czech and English parses of the same subject
//! into one record.
//!
//! Merging happens under the map's per-key lock, so two concurrent parses of
//! one subject never interleave. Language-independent fields (capacity,
//! status, dates, registration state) take the latest parse. Locale-tagged
//! fields are only written by their own language, and the neutral display
//! fields (`name`, `room`) only by a Czech parse.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::{ExamSection, ExamSubject, ExamTerm, RegisteredTerm};
use crate::schema::{validate, Validated};
use crate::util::Lang;

#[derive(Debug, Default)]
pub struct ExamStore {
    subjects: DashMap<String, ExamSubject>,
}

impl ExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges freshly parsed subjects. Returns how many subjects changed.
    pub fn merge(&self, parsed: Vec<Validated<ExamSubject>>, lang: Lang) -> usize {
        let mut changed = 0;

        for incoming in parsed {
            let incoming = incoming.into_inner();
            let code = incoming.code.clone();

            match self.subjects.entry(code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                    changed += 1;
                }
                Entry::Occupied(mut slot) => {
                    let merged = merge_subject(slot.get().clone(), incoming, lang);
                    if &merged == slot.get() {
                        continue;
                    }

                    // Keep the previous record if the merge produced something invalid
                    match validate(merged) {
                        Ok(valid) => {
                            slot.insert(valid.into_inner());
                            changed += 1;
                        }
                        Err(err) => warn!(code = %code, error = %err, "Discarding merged exam record"),
                    }
                }
            }
        }

        debug!(changed, total = self.subjects.len(), "Merged exam subjects");
        changed
    }

    /// Returns the subject, re-validated on the way out.
    pub fn get(&self, code: &str) -> Option<Validated<ExamSubject>> {
        let subject = self.subjects.get(code)?.value().clone();
        validate(subject).ok()
    }

    /// All subjects that still pass validation, sorted by code.
    pub fn all(&self) -> Vec<Validated<ExamSubject>> {
        let mut subjects: Vec<_> = self
            .subjects
            .iter()
            .filter_map(|entry| validate(entry.value().clone()).ok())
            .collect();
        subjects.sort_by(|a, b| a.code.cmp(&b.code));
        subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

fn merge_subject(mut current: ExamSubject, incoming: ExamSubject, lang: Lang) -> ExamSubject {
    match lang {
        Lang::Cs => {
            current.name = incoming.name;
            current.name_cs = incoming.name_cs.or(current.name_cs);
        }
        Lang::En => current.name_en = incoming.name_en.or(current.name_en),
    }

    for section in incoming.sections {
        match current.sections.iter().position(|s| same_section(s, &section)) {
            Some(i) => merge_section(&mut current.sections[i], section, lang),
            None => current.sections.push(section),
        }
    }
    current
}

/// Sections match by id, by name, or by sharing a term.
fn same_section(a: &ExamSection, b: &ExamSection) -> bool {
    if a.id == b.id || a.name == b.name {
        return true;
    }
    if a.terms.iter().any(|t| b.terms.iter().any(|u| u.id == t.id)) {
        return true;
    }
    let registered_id = |s: &ExamSection| s.registered_term.as_ref().and_then(|r| r.id.clone());
    matches!((registered_id(a), registered_id(b)), (Some(x), Some(y)) if x == y)
}

fn merge_section(current: &mut ExamSection, incoming: ExamSection, lang: Lang) {
    match lang {
        Lang::Cs => {
            current.name = incoming.name;
            current.kind = incoming.kind;
            current.name_cs = incoming.name_cs.or(current.name_cs.take());
        }
        Lang::En => current.name_en = incoming.name_en.or(current.name_en.take()),
    }

    current.status = incoming.status;
    current.registered_term = match (current.registered_term.take(), incoming.registered_term) {
        (Some(old), Some(new)) => Some(merge_registered(old, new, lang)),
        (_, new) => new,
    };

    for term in incoming.terms {
        match current.terms.iter_mut().find(|t| t.id == term.id) {
            Some(existing) => merge_term(existing, term, lang),
            None => current.terms.push(term),
        }
    }
}

fn merge_registered(old: RegisteredTerm, new: RegisteredTerm, lang: Lang) -> RegisteredTerm {
    let (room, room_cs, room_en) = merge_rooms(
        (old.room, old.room_cs, old.room_en),
        (new.room, new.room_cs, new.room_en),
        lang,
    );
    RegisteredTerm {
        id: new.id.or(old.id),
        room,
        room_cs,
        room_en,
        ..new
    }
}

fn merge_term(current: &mut ExamTerm, incoming: ExamTerm, lang: Lang) {
    let (room, room_cs, room_en) = merge_rooms(
        (current.room.take(), current.room_cs.take(), current.room_en.take()),
        (incoming.room.clone(), incoming.room_cs.clone(), incoming.room_en.clone()),
        lang,
    );
    *current = ExamTerm {
        room,
        room_cs,
        room_en,
        ..incoming
    };
}

type Rooms = (Option<String>, Option<String>, Option<String>);

fn merge_rooms(old: Rooms, new: Rooms, lang: Lang) -> Rooms {
    match lang {
        Lang::Cs => (new.0.or(old.0), new.1.or(old.1), old.2),
        Lang::En => (old.0.or(new.0), old.1, new.2.or(old.2)),
    }
}
