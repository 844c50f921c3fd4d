//! Small token helpers shared by every parser.

mod date;
mod text;

pub use date::{looks_like_date, normalize_date, split_date_time, Capacity, Lang, NOT_APPLICABLE};
pub use text::{capitalize_first, clean_multiline, clean_text, pin_language, sanitize, validate_url};
