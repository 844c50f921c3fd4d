//! Extraction layer for the MENDELU university information system (UIS).
//!
//! The portal has no API, so everything here works from rendered HTML:
//! - `exam`, `syllabus` and `search` turn single pages into records
//! - `schema` is the validation boundary every record passes through
//! - `crawler` walks the success-rate statistics and persists them via `db`
//! - `drift` snapshots form structure so markup changes are noticed early

pub mod config;
pub mod crawler;
pub mod db;
pub mod drift;
pub mod exam;
pub mod html;
pub mod schema;
pub mod search;
pub mod semester;
pub mod server;
pub mod syllabus;
pub mod util;
