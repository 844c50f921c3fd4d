//! Structural drift detector.
//!
//! Snapshots the shape of every `<form>` on a fixed list of portal pages and
//! diffs two snapshots into critical, warning and info changes. The parsers
//! fail quietly when the markup moves; this is where it shows up first.

mod baseline;
mod compare;
mod snapshot;

pub use baseline::{load_baseline, write_baseline, BaselineError, LATEST_BASELINE};
pub use compare::{compare_baselines, Change, DriftReport, Severity};
pub use snapshot::{
    extract_forms, fingerprint, take_baseline, Baseline, ButtonSnapshot, FormAttributes, FormSnapshot,
    InputSnapshot, PageSnapshot, SelectSnapshot, TextareaSnapshot,
};
