/// Database module for success-rate statistics (faculties, semesters, courses, grade rows)

mod types;

pub use types::{
    CourseSuccessRate, DbCourse, DbFaculty, DbSemester, GradeCounts, SemesterStats, SuccessRateRow,
    TermStats,
};

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::schema::{validate, Validated};
use crate::semester::sort_semesters;

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_success_rates.sql");

/// Owned handle to the statistics store.
///
/// Open it once per run and pass it to whoever needs it; opening several
/// handles on the same file concurrently is not supported.
pub struct StatsDb {
    db: Mutex<Connection>,
    writes: AtomicU64,
}

impl StatsDb {
    /// Opens (or creates) the database file and initializes the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
            writes: AtomicU64::new(0),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(&self, changed: usize) -> bool {
        self.writes.fetch_add(changed as u64, Ordering::Relaxed);
        changed > 0
    }

    /// Number of rows changed through this handle so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Inserts or renames a faculty. Returns true if anything was written.
    pub fn upsert_faculty(&self, id: &str, name: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO faculties (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name
             WHERE faculties.name IS NOT excluded.name",
            params![id, name],
        )?;
        Ok(self.count(changed))
    }

    pub fn upsert_semester(&self, id: &str, faculty_id: &str, name: &str, year: Option<i32>) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO semesters (id, faculty_id, name, year) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                faculty_id = excluded.faculty_id, name = excluded.name, year = excluded.year
             WHERE semesters.faculty_id IS NOT excluded.faculty_id
                OR semesters.name IS NOT excluded.name
                OR semesters.year IS NOT excluded.year",
            params![id, faculty_id, name, year],
        )?;
        Ok(self.count(changed))
    }

    /// Inserts a course by its code and returns its row id.
    ///
    /// The same code is listed under a different `predmet` id in every
    /// semester, so an existing course keeps its name and external id. Only a
    /// missing external id is filled in.
    pub fn upsert_course(&self, code: &str, name: &str, external_id: Option<&str>) -> Result<i64> {
        let db = self.conn();
        let changed = db.execute(
            "INSERT INTO courses (code, name, external_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET external_id = excluded.external_id
             WHERE courses.external_id IS NULL AND excluded.external_id IS NOT NULL",
            params![code, name, external_id],
        )?;
        let id = db.query_row("SELECT id FROM courses WHERE code = ?1", [code], |row| row.get(0))?;
        drop(db);

        self.count(changed);
        Ok(id)
    }

    /// Replaces the row for `(course, semester, term)`.
    ///
    /// Delete-then-insert inside one transaction, so the key never holds two
    /// rows. An identical existing row is left alone and nothing is written.
    pub fn insert_success_rate(&self, course_id: i64, row: &Validated<SuccessRateRow>) -> Result<bool> {
        let mut db = self.conn();
        let g = &row.grades;

        let unchanged: bool = db
            .query_row(
                "SELECT 1 FROM success_rates
                 WHERE course_id = ?1 AND semester_id = ?2 AND term_name = ?3
                   AND grade_a = ?4 AND grade_b = ?5 AND grade_c = ?6 AND grade_d = ?7
                   AND grade_e = ?8 AND grade_f = ?9 AND grade_fn = ?10
                   AND source_url IS ?11",
                params![course_id, row.semester_id, row.term_name, g.a, g.b, g.c, g.d, g.e, g.f, g.fn_, row.source_url],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if unchanged {
            return Ok(false);
        }

        let tx = db.transaction()?;
        let mut changed = tx.execute(
            "DELETE FROM success_rates WHERE course_id = ?1 AND semester_id = ?2 AND term_name = ?3",
            params![course_id, row.semester_id, row.term_name],
        )?;
        changed += tx.execute(
            "INSERT INTO success_rates (
                course_id, semester_id, term_name,
                grade_a, grade_b, grade_c, grade_d, grade_e, grade_f, grade_fn,
                source_url, scraped_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
            params![course_id, row.semester_id, row.term_name, g.a, g.b, g.c, g.d, g.e, g.f, g.fn_, row.source_url],
        )?;
        tx.commit()?;
        drop(db);

        Ok(self.count(changed))
    }

    /// Checks if a course already has statistics for a semester
    pub fn has_success_rates(&self, course_id: i64, semester_id: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM success_rates WHERE course_id = ?1 AND semester_id = ?2",
            params![course_id, semester_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mark_course_scraped(&self, course_id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE courses SET last_scraped = datetime('now') WHERE id = ?1",
            [course_id],
        )?;
        self.count(changed);
        Ok(())
    }

    pub fn mark_semester_scraped(&self, semester_id: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE semesters SET last_scraped = datetime('now') WHERE id = ?1",
            [semester_id],
        )?;
        self.count(changed);
        Ok(())
    }

    pub fn faculties(&self) -> Result<Vec<DbFaculty>> {
        let db = self.conn();
        let mut stmt = db.prepare("SELECT id, name FROM faculties ORDER BY name")?;
        let faculties = stmt.query_map([], |row| {
            Ok(DbFaculty {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        faculties.collect()
    }

    pub fn semester(&self, id: &str) -> Result<Option<DbSemester>> {
        self.conn()
            .query_row(
                "SELECT id, faculty_id, name, year, last_scraped FROM semesters WHERE id = ?1",
                [id],
                |row| {
                    Ok(DbSemester {
                        id: row.get(0)?,
                        faculty_id: row.get(1)?,
                        name: row.get(2)?,
                        year: row.get(3)?,
                        last_scraped: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    pub fn course_by_code(&self, code: &str) -> Result<Option<DbCourse>> {
        self.conn()
            .query_row(
                "SELECT id, code, name, external_id, last_scraped FROM courses WHERE code = ?1",
                [code],
                |row| {
                    Ok(DbCourse {
                        id: row.get(0)?,
                        code: row.get(1)?,
                        name: row.get(2)?,
                        external_id: row.get(3)?,
                        last_scraped: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    /// Success rates grouped by semester for each requested course code.
    ///
    /// Codes without persisted rows are absent from the map. Every row and
    /// every assembled record is validated again on the way out; anything that
    /// fails is dropped and logged.
    pub fn success_rates_for(&self, codes: &[String]) -> Result<HashMap<String, Validated<CourseSuccessRate>>> {
        let mut result = HashMap::new();

        for code in codes {
            let Some(course) = self.course_by_code(code)? else {
                continue;
            };
            let rows = self.rows_for_course(&course)?;
            if rows.is_empty() {
                continue;
            }

            let mut stats: Vec<SemesterStats> = Vec::new();
            for (semester_name, year, row) in rows {
                let Ok(row) = validate(row) else {
                    continue;
                };
                let term = TermStats {
                    term: row.term_name.clone(),
                    grades: row.grades,
                    pass: row.grades.pass(),
                    fail: row.grades.fail(),
                };

                let index = match stats.iter().position(|s| s.semester_id == row.semester_id) {
                    Some(i) => i,
                    None => {
                        stats.push(SemesterStats {
                            semester_id: row.semester_id.clone(),
                            semester_name,
                            year,
                            total_pass: 0,
                            total_fail: 0,
                            terms: Vec::new(),
                        });
                        stats.len() - 1
                    }
                };
                let semester = &mut stats[index];
                semester.total_pass += term.pass;
                semester.total_fail += term.fail;
                semester.terms.push(term);
            }
            if stats.is_empty() {
                continue;
            }
            sort_semesters(&mut stats);

            let record = CourseSuccessRate {
                course_code: course.code.clone(),
                stats,
                last_updated: rfc3339(course.last_scraped.as_deref()),
            };
            if let Ok(valid) = validate(record) {
                result.insert(course.code, valid);
            }
        }

        debug!(requested = codes.len(), found = result.len(), "Loaded success rates");
        Ok(result)
    }

    fn rows_for_course(&self, course: &DbCourse) -> Result<Vec<(String, Option<i32>, SuccessRateRow)>> {
        let db = self.conn();
        let mut stmt = db.prepare(
            "SELECT s.id, s.name, s.year, r.term_name,
                    r.grade_a, r.grade_b, r.grade_c, r.grade_d, r.grade_e, r.grade_f, r.grade_fn,
                    r.source_url
             FROM success_rates r
             JOIN semesters s ON r.semester_id = s.id
             WHERE r.course_id = ?1
             ORDER BY r.id",
        )?;

        let rows = stmt.query_map([course.id], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, Option<i32>>(2)?,
                SuccessRateRow {
                    course_code: course.code.clone(),
                    semester_id: row.get(0)?,
                    term_name: row.get(3)?,
                    grades: GradeCounts {
                        a: row.get(4)?,
                        b: row.get(5)?,
                        c: row.get(6)?,
                        d: row.get(7)?,
                        e: row.get(8)?,
                        f: row.get(9)?,
                        fn_: row.get(10)?,
                    },
                    source_url: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
                },
            ))
        })?;

        rows.collect()
    }

    /// Closes the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> Result<()> {
        let conn = self.db.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.close().map_err(|(_, err)| err)
    }
}

/// SQLite `datetime('now')` text to RFC 3339; falls back to the current time.
fn rfc3339(sqlite_time: Option<&str>) -> String {
    sqlite_time
        .and_then(|t| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").ok())
        .map(|t| t.and_utc().to_rfc3339())
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(semester: &str, term: &str, a: u32, f: u32) -> Validated<SuccessRateRow> {
        validate(SuccessRateRow {
            course_code: "EBC-ALG".to_string(),
            semester_id: semester.to_string(),
            term_name: term.to_string(),
            grades: GradeCounts {
                a,
                f,
                ..Default::default()
            },
            source_url: "https://is.mendelu.cz/auth/student/hodnoceni.pl".to_string(),
        })
        .unwrap()
    }

    fn seeded() -> (StatsDb, i64) {
        let db = StatsDb::open_in_memory().unwrap();
        db.upsert_faculty("2", "PEF").unwrap();
        db.upsert_semester("801", "2", "ZS 2024/2025 - PEF", Some(2024)).unwrap();
        db.upsert_semester("802", "2", "LS 2024/2025 - PEF", Some(2024)).unwrap();
        let course = db.upsert_course("EBC-ALG", "Algoritmizace", Some("159842")).unwrap();
        (db, course)
    }

    #[test]
    fn test_reingest_keeps_one_row_with_latest_values() {
        let (db, course) = seeded();
        assert!(db.insert_success_rate(course, &row("801", "1. termín", 5, 1)).unwrap());
        assert!(db.insert_success_rate(course, &row("801", "1. termín", 7, 2)).unwrap());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM success_rates", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let rates = db.success_rates_for(&["EBC-ALG".to_string()]).unwrap();
        let term = &rates["EBC-ALG"].stats[0].terms[0];
        assert_eq!(term.grades.a, 7);
        assert_eq!(term.fail, 2);
    }

    #[test]
    fn test_unchanged_writes_are_skipped() {
        let (db, course) = seeded();
        db.insert_success_rate(course, &row("801", "1. termín", 5, 1)).unwrap();
        let before = db.write_count();

        assert!(!db.upsert_faculty("2", "PEF").unwrap());
        assert!(!db.upsert_semester("801", "2", "ZS 2024/2025 - PEF", Some(2024)).unwrap());
        assert_eq!(db.upsert_course("EBC-ALG", "Algoritmizace", Some("159842")).unwrap(), course);
        assert!(!db.insert_success_rate(course, &row("801", "1. termín", 5, 1)).unwrap());
        assert_eq!(db.write_count(), before);

        assert!(db.upsert_faculty("2", "Provozně ekonomická").unwrap());
        assert_eq!(db.write_count(), before + 1);
    }

    #[test]
    fn test_course_keeps_first_external_id() {
        let db = StatsDb::open_in_memory().unwrap();
        let course = db.upsert_course("EBC-ALG", "Algoritmizace", None).unwrap();
        let before = db.write_count();

        // Filled in once, then stable across semesters listing other ids
        assert_eq!(db.upsert_course("EBC-ALG", "Algoritmizace", Some("1001")).unwrap(), course);
        assert_eq!(db.write_count(), before + 1);
        assert_eq!(db.upsert_course("EBC-ALG", "Algoritmizace", Some("2001")).unwrap(), course);
        assert_eq!(db.upsert_course("EBC-ALG", "Algorithms", Some("1001")).unwrap(), course);
        assert_eq!(db.write_count(), before + 1);

        let stored = db.course_by_code("EBC-ALG").unwrap().unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("1001"));
        assert_eq!(stored.name, "Algoritmizace");
    }

    #[test]
    fn test_has_success_rates_and_stamps() {
        let (db, course) = seeded();
        assert!(!db.has_success_rates(course, "801").unwrap());
        db.insert_success_rate(course, &row("801", "1. termín", 1, 0)).unwrap();
        assert!(db.has_success_rates(course, "801").unwrap());
        assert!(!db.has_success_rates(course, "802").unwrap());

        assert!(db.course_by_code("EBC-ALG").unwrap().unwrap().last_scraped.is_none());
        db.mark_course_scraped(course).unwrap();
        db.mark_semester_scraped("801").unwrap();
        assert!(db.course_by_code("EBC-ALG").unwrap().unwrap().last_scraped.is_some());
        assert!(db.semester("801").unwrap().unwrap().last_scraped.is_some());
        assert!(db.semester("802").unwrap().unwrap().last_scraped.is_none());
    }

    #[test]
    fn test_read_contract_groups_and_orders_semesters() {
        let (db, course) = seeded();
        db.insert_success_rate(course, &row("801", "1. termín", 5, 1)).unwrap();
        db.insert_success_rate(course, &row("801", "2. termín", 2, 3)).unwrap();
        db.insert_success_rate(course, &row("802", "1. termín", 4, 0)).unwrap();
        db.mark_course_scraped(course).unwrap();

        let rates = db
            .success_rates_for(&["EBC-ALG".to_string(), "NOPE".to_string()])
            .unwrap();
        assert_eq!(rates.len(), 1);
        assert!(!rates.contains_key("NOPE"));

        let alg = &rates["EBC-ALG"];
        assert!(chrono::DateTime::parse_from_rfc3339(&alg.last_updated).is_ok());
        assert_eq!(alg.stats.len(), 2);
        // LS sorts before ZS of the same academic year
        assert_eq!(alg.stats[0].semester_name, "LS 2024/2025 - PEF");
        let zs = &alg.stats[1];
        assert_eq!(zs.terms.len(), 2);
        assert_eq!(zs.total_pass, 7);
        assert_eq!(zs.total_fail, 4);
    }

    #[test]
    fn test_corrupted_rows_are_dropped_on_read() {
        let (db, course) = seeded();
        db.insert_success_rate(course, &row("801", "1. termín", 5, 1)).unwrap();
        db.conn()
            .execute("UPDATE success_rates SET term_name = '' WHERE course_id = ?1", [course])
            .unwrap();

        let rates = db.success_rates_for(&["EBC-ALG".to_string()]).unwrap();
        assert!(rates.is_empty());
    }

    #[test]
    fn test_file_database_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");
        let db = StatsDb::open(&path).unwrap();
        db.upsert_faculty("2", "PEF").unwrap();
        db.close().unwrap();

        let reopened = StatsDb::open(&path).unwrap();
        assert_eq!(reopened.faculties().unwrap().len(), 1);
    }
}
