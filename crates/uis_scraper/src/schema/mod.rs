//! The validation boundary.
//!
//! Every record a parser produces, and every record read back from storage,
//! goes through [`validate`]. The only way to obtain a [`Validated<T>`] is to
//! pass it, so functions that take `Validated<T>` cannot be handed raw data.

mod error;
mod rules;

pub use error::ValidationError;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use tracing::warn;

use crate::db::{CourseSuccessRate, SuccessRateRow};
use crate::exam::ExamSubject;
use crate::search::{Person, SearchSubject};
use crate::syllabus::SyllabusRequirements;

/// Store/kind name each schema is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Exams,
    Syllabus,
    People,
    Subjects,
    SuccessRates,
    CourseStats,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Exams => "exams",
            RecordKind::Syllabus => "syllabus",
            RecordKind::People => "people",
            RecordKind::Subjects => "subjects",
            RecordKind::SuccessRates => "success_rates",
            RecordKind::CourseStats => "course_stats",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exams" => Ok(RecordKind::Exams),
            "syllabus" => Ok(RecordKind::Syllabus),
            "people" => Ok(RecordKind::People),
            "subjects" => Ok(RecordKind::Subjects),
            "success_rates" => Ok(RecordKind::SuccessRates),
            "course_stats" => Ok(RecordKind::CourseStats),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// Field-level rules for one record type.
pub trait Schema: Serialize + DeserializeOwned {
    const KIND: RecordKind;

    /// Accepted schema versions. Empty means the record is unversioned.
    const VERSIONS: &'static [u32] = &[];

    fn version(&self) -> Option<u32> {
        None
    }

    /// Natural key used in rejection logs.
    fn key(&self) -> String;

    /// Pushes one message per violated rule.
    fn check(&self, issues: &mut Vec<String>);

    /// Normalizes representation before checking. Never changes meaning.
    fn canonicalize(self) -> Self
    where
        Self: Sized,
    {
        self
    }
}

/// A record that passed its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T>(T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Validated<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Serialize> Serialize for Validated<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Validates a record, returning the canonicalized value or a rejection.
///
/// The version check runs first and is reported independently of the field
/// rules, so a wrong-version record with otherwise valid fields still fails.
/// Rejections are logged with kind and key.
pub fn validate<T: Schema>(value: T) -> Result<Validated<T>, ValidationError> {
    let value = value.canonicalize();
    let mut issues = Vec::new();

    if !T::VERSIONS.is_empty() {
        match value.version() {
            None => issues.push("missing version".to_string()),
            Some(v) if !T::VERSIONS.contains(&v) => {
                issues.push(format!("unsupported version {v} (accepted: {:?})", T::VERSIONS))
            }
            Some(_) => {}
        }
    }

    value.check(&mut issues);

    if issues.is_empty() {
        Ok(Validated(value))
    } else {
        let err = ValidationError::new(T::KIND, value.key(), issues);
        warn!(kind = %err.kind, key = %err.key, issues = ?err.issues, "Record rejected by schema");
        Err(err)
    }
}

/// Decodes and validates a record of a known type from JSON text.
pub fn validate_json<T: Schema>(json: &str) -> Result<Validated<T>, ValidationError> {
    let value: T = serde_json::from_str(json).map_err(|e| reject_malformed(T::KIND, e))?;
    validate(value)
}

/// Decodes and validates an untyped JSON value as the given kind.
///
/// This is the read path for state that came from outside the process.
pub fn validate_value(kind: RecordKind, value: serde_json::Value) -> Result<ValidRecord, ValidationError> {
    fn decode<T: Schema>(value: serde_json::Value) -> Result<T, ValidationError> {
        serde_json::from_value(value).map_err(|e| reject_malformed(T::KIND, e))
    }

    let raw = match kind {
        RecordKind::Exams => RawRecord::Exam(decode(value)?),
        RecordKind::Syllabus => RawRecord::Syllabus(decode(value)?),
        RecordKind::People => RawRecord::Person(decode(value)?),
        RecordKind::Subjects => RawRecord::Subject(decode(value)?),
        RecordKind::SuccessRates => RawRecord::SuccessRate(decode(value)?),
        RecordKind::CourseStats => RawRecord::CourseStats(decode(value)?),
    };
    raw.validate()
}

fn reject_malformed(kind: RecordKind, err: serde_json::Error) -> ValidationError {
    let err = ValidationError::malformed(kind, err);
    warn!(kind = %err.kind, issues = ?err.issues, "Malformed record rejected");
    err
}

/// An extracted record that has not been validated yet.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Exam(ExamSubject),
    Syllabus(SyllabusRequirements),
    Person(Person),
    Subject(SearchSubject),
    SuccessRate(SuccessRateRow),
    CourseStats(CourseSuccessRate),
}

/// The validated counterpart of [`RawRecord`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ValidRecord {
    Exam(Validated<ExamSubject>),
    Syllabus(Validated<SyllabusRequirements>),
    Person(Validated<Person>),
    Subject(Validated<SearchSubject>),
    SuccessRate(Validated<SuccessRateRow>),
    CourseStats(Validated<CourseSuccessRate>),
}

impl RawRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            RawRecord::Exam(_) => RecordKind::Exams,
            RawRecord::Syllabus(_) => RecordKind::Syllabus,
            RawRecord::Person(_) => RecordKind::People,
            RawRecord::Subject(_) => RecordKind::Subjects,
            RawRecord::SuccessRate(_) => RecordKind::SuccessRates,
            RawRecord::CourseStats(_) => RecordKind::CourseStats,
        }
    }

    pub fn validate(self) -> Result<ValidRecord, ValidationError> {
        Ok(match self {
            RawRecord::Exam(r) => ValidRecord::Exam(validate(r)?),
            RawRecord::Syllabus(r) => ValidRecord::Syllabus(validate(r)?),
            RawRecord::Person(r) => ValidRecord::Person(validate(r)?),
            RawRecord::Subject(r) => ValidRecord::Subject(validate(r)?),
            RawRecord::SuccessRate(r) => ValidRecord::SuccessRate(validate(r)?),
            RawRecord::CourseStats(r) => ValidRecord::CourseStats(validate(r)?),
        })
    }
}
