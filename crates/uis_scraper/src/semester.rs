//! Semester naming and ordering.
//!
//! Display names look like `ZS 2024/2025 - PEF`. The year is the first four
//! digit run, and within one academic year the summer term (`LS`) comes
//! after the winter term (`ZS`).

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Anything that has a semester display name and (maybe) a year.
pub trait SemesterLike {
    fn semester_name(&self) -> &str;

    fn semester_year(&self) -> Option<i32> {
        year_from_name(self.semester_name())
    }
}

/// First four-digit run of the name.
pub fn year_from_name(name: &str) -> Option<i32> {
    YEAR.find(name).and_then(|m| m.as_str().parse().ok())
}

fn is_winter(name: &str) -> bool {
    name.trim_start().starts_with("ZS")
}

/// Newest first: higher year first, then `LS` before `ZS`. Unknown years go last.
pub fn compare_semesters<A: SemesterLike + ?Sized, B: SemesterLike + ?Sized>(a: &A, b: &B) -> Ordering {
    match (a.semester_year(), b.semester_year()) {
        (Some(x), Some(y)) if x != y => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => is_winter(a.semester_name()).cmp(&is_winter(b.semester_name())),
    }
}

pub fn sort_semesters<T: SemesterLike>(semesters: &mut [T]) {
    semesters.sort_by(|a, b| compare_semesters(a, b));
}

impl SemesterLike for str {
    fn semester_name(&self) -> &str {
        self
    }
}

impl SemesterLike for String {
    fn semester_name(&self) -> &str {
        self
    }
}

impl SemesterLike for crate::db::SemesterStats {
    fn semester_name(&self) -> &str {
        &self.semester_name
    }

    fn semester_year(&self) -> Option<i32> {
        self.year.or_else(|| year_from_name(&self.semester_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_name() {
        assert_eq!(year_from_name("ZS 2024/2025 - PEF"), Some(2024));
        assert_eq!(year_from_name("LS 2019/2020"), Some(2019));
        assert_eq!(year_from_name("mimořádné období"), None);
    }

    #[test]
    fn test_same_year_summer_is_newer() {
        assert_eq!(compare_semesters("LS 2024/2025", "ZS 2024/2025"), Ordering::Less);
        assert_eq!(compare_semesters("ZS 2024/2025", "LS 2024/2025"), Ordering::Greater);
    }

    #[test]
    fn test_higher_year_always_first() {
        assert_eq!(compare_semesters("ZS 2025/2026", "LS 2024/2025"), Ordering::Less);
        assert_eq!(compare_semesters("LS 2023/2024", "ZS 2024/2025"), Ordering::Greater);
    }

    #[test]
    fn test_sort_semesters() {
        let mut names: Vec<String> = ["ZS 2023/2024", "LS 2024/2025", "bez roku", "ZS 2024/2025", "LS 2023/2024"]
            .into_iter()
            .map(String::from)
            .collect();
        sort_semesters(&mut names);
        assert_eq!(
            names,
            vec!["LS 2024/2025", "ZS 2024/2025", "LS 2023/2024", "ZS 2023/2024", "bez roku"]
        );
    }
}
