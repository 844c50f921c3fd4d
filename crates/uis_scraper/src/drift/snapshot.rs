//! Form structure snapshots.

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::crawler::Navigator;
use crate::html::element_text;

static FORMS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static INPUTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static SELECTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select").unwrap());
static OPTIONS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static TEXTAREAS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("textarea").unwrap());
static BUTTONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"button, input[type="submit"]"#).unwrap());

/// Snapshot of every monitored page, keyed by URL.
pub type Baseline = BTreeMap<String, PageSnapshot>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub scanned_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_count: Option<usize>,
    #[serde(default)]
    pub forms: Vec<FormSnapshot>,
    /// sha256 over the serialized forms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Set when the page could not be captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageSnapshot {
    pub fn captured(forms: Vec<FormSnapshot>) -> Self {
        Self {
            scanned_at: Utc::now().to_rfc3339(),
            form_count: Some(forms.len()),
            fingerprint: Some(fingerprint(&forms)),
            forms,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            scanned_at: Utc::now().to_rfc3339(),
            form_count: None,
            forms: Vec::new(),
            fingerprint: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub form_index: usize,
    pub attributes: FormAttributes,
    pub inputs: Vec<InputSnapshot>,
    pub selects: Vec<SelectSnapshot>,
    pub textareas: Vec<TextareaSnapshot>,
    pub buttons: Vec<ButtonSnapshot>,
    /// inputs + selects + textareas
    pub total_elements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAttributes {
    pub action: String,
    pub method: String,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub id: String,
    pub required: bool,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSnapshot {
    pub name: String,
    pub id: String,
    pub required: bool,
    pub option_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextareaSnapshot {
    pub name: String,
    pub id: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSnapshot {
    /// Tag name: `button` or `input`
    #[serde(rename = "type")]
    pub button_type: String,
    pub value: String,
    pub name: String,
}

fn attr(el: ElementRef, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_string()
}

fn has_attr(el: ElementRef, name: &str) -> bool {
    el.value().attr(name).is_some()
}

/// Structure of every `<form>` on the page, in document order.
pub fn extract_forms(html: &str) -> Vec<FormSnapshot> {
    let doc = Html::parse_document(html);

    doc.select(&FORMS)
        .enumerate()
        .map(|(index, form)| {
            let non_empty_or = |name: &str, default: String| {
                form.value()
                    .attr(name)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .unwrap_or(default)
            };

            let inputs: Vec<InputSnapshot> = form
                .select(&INPUTS)
                .map(|input| InputSnapshot {
                    name: attr(input, "name"),
                    input_type: input
                        .value()
                        .attr("type")
                        .filter(|t| !t.is_empty())
                        .unwrap_or("text")
                        .to_string(),
                    id: attr(input, "id"),
                    required: has_attr(input, "required"),
                    value: attr(input, "value"),
                })
                .collect();

            let selects: Vec<SelectSnapshot> = form
                .select(&SELECTS)
                .map(|select| SelectSnapshot {
                    name: attr(select, "name"),
                    id: attr(select, "id"),
                    required: has_attr(select, "required"),
                    option_count: select.select(&OPTIONS).count(),
                })
                .collect();

            let textareas: Vec<TextareaSnapshot> = form
                .select(&TEXTAREAS)
                .map(|textarea| TextareaSnapshot {
                    name: attr(textarea, "name"),
                    id: attr(textarea, "id"),
                    required: has_attr(textarea, "required"),
                })
                .collect();

            let buttons = form
                .select(&BUTTONS)
                .map(|button| ButtonSnapshot {
                    button_type: button.value().name().to_lowercase(),
                    value: button
                        .value()
                        .attr("value")
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| element_text(button)),
                    name: attr(button, "name"),
                })
                .collect();

            FormSnapshot {
                form_index: index,
                attributes: FormAttributes {
                    action: attr(form, "action"),
                    method: non_empty_or("method", "get".to_string()),
                    name: non_empty_or("name", format!("form-{index}")),
                    id: attr(form, "id"),
                },
                total_elements: inputs.len() + selects.len() + textareas.len(),
                inputs,
                selects,
                textareas,
                buttons,
            }
        })
        .collect()
}

/// Hex sha256 of the forms' JSON.
pub fn fingerprint(forms: &[FormSnapshot]) -> String {
    let json = serde_json::to_vec(forms).unwrap_or_default();
    Sha256::digest(&json).iter().map(|b| format!("{:02x}", b)).collect()
}

/// Captures every URL in turn. A page that fails to load, or that shows the
/// login form instead of content, is recorded with an error.
pub async fn take_baseline<N: Navigator + ?Sized>(navigator: &N, urls: &[String]) -> Baseline {
    let mut baseline = Baseline::new();

    for url in urls {
        let snapshot = match navigator.fetch(url).await {
            Ok(page) => {
                let forms = extract_forms(&page.html);
                info!(url = %url, forms = forms.len(), "Captured page");
                PageSnapshot::captured(forms)
            }
            Err(e) => {
                if e.needs_reauth() {
                    warn!(url = %url, "Captured login form instead of content - session lost");
                } else {
                    warn!(url = %url, error = %e, "Failed to capture page");
                }
                PageSnapshot::failed(e.to_string())
            }
        };
        baseline.insert(url.clone(), snapshot);
    }

    baseline
}
