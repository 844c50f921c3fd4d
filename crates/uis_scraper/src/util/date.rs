//! Date and capacity tokens as the portal renders them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Placeholder the portal uses for "not applicable" (e.g. no deregistration deadline).
pub const NOT_APPLICABLE: &str = "--";

/// Loose date shape used to find the pivot column in exam rows.
static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}[./]\d{2}[./]\d{4}").unwrap());

static TIME_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

/// Language the page was requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Cs,
    En,
}

impl Lang {
    /// Parses a language tag. The portal uses `cz`, everything else in the
    /// codebase uses `cs`; both map to Czech. Unknown tags fall back to Czech.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Lang::En,
            _ => Lang::Cs,
        }
    }

    /// Value of the portal's `lang=` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            Lang::Cs => "cz",
            Lang::En => "en",
        }
    }
}

/// Returns true if the text contains something date-shaped (`DD.MM.YYYY` or `MM/DD/YYYY`).
pub fn looks_like_date(text: &str) -> bool {
    DATE_SHAPE.is_match(text)
}

/// Normalizes a portal date to the canonical `DD.MM.YYYY[ HH:MM]` form.
///
/// Czech pages render `16.02.2026 10:00 (po)`, English pages render
/// `02/16/2026 10:00 (Mon)`. Trailing day names are dropped. The `--`
/// placeholder and anything unrecognized are returned unchanged.
pub fn normalize_date(raw: &str, lang: Lang) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NOT_APPLICABLE {
        return trimmed.to_string();
    }

    let mut tokens = trimmed.split_whitespace();
    let main = tokens.next().unwrap_or_default();
    let time = tokens.next().unwrap_or_default();

    let parts: Vec<&str> = if lang == Lang::En && main.contains('/') {
        // MM/DD/YYYY
        let p: Vec<&str> = main.split('/').collect();
        if p.len() != 3 {
            return trimmed.to_string();
        }
        vec![p[1], p[0], p[2]]
    } else if main.contains('.') {
        main.split('.').collect()
    } else {
        return trimmed.to_string();
    };

    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return trimmed.to_string();
    }

    let date = format!("{:0>2}.{:0>2}.{}", parts[0], parts[1], parts[2]);
    match normalize_time(time) {
        Some(time) => format!("{date} {time}"),
        None => date,
    }
}

/// Pads `9:00` to `09:00`; returns None for anything that isn't a clock time.
fn normalize_time(raw: &str) -> Option<String> {
    let caps = TIME_SHAPE.captures(raw)?;
    Some(format!("{:0>2}:{}", &caps[1], &caps[2]))
}

/// Splits a normalized `DD.MM.YYYY HH:MM` string into its date and time parts.
pub fn split_date_time(normalized: &str) -> (String, String) {
    let mut parts = normalized.splitn(2, ' ');
    let date = parts.next().unwrap_or_default().to_string();
    let time = parts.next().unwrap_or_default().trim().to_string();
    (date, time)
}

/// Seat capacity of an exam term, e.g. `"10/20"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub occupied: u32,
    pub total: u32,
    /// Whitespace-free form of the source string.
    pub raw: String,
}

impl Capacity {
    /// Parses `"<occupied>/<total>"`, tolerating whitespace anywhere.
    ///
    /// Non-numeric halves read as 0, matching what the portal means by an
    /// empty cell. Returns None when there is no `/` at all.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let (occupied, total) = raw.split_once('/')?;

        Some(Self {
            occupied: occupied.parse().unwrap_or(0),
            total: total.parse().unwrap_or(0),
            raw: raw.clone(),
        })
    }

    pub fn is_full(&self) -> bool {
        self.occupied >= self.total
    }
}
