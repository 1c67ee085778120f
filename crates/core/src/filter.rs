//! Prediction filter engine.
//!
//! Pure, synchronous filtering of the prediction table. The dashboard calls
//! [`filter_predictions`] whenever the source rows or the criteria change.
//! Criteria are ANDed, omitted criteria are bypassed, and the output keeps
//! the input order.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One row of the predictions table.
///
/// Field names follow the prediction documents served by the backend; the
/// snake_case aliases accept hand-written fixtures as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(default)]
    pub patient_name: Option<String>,

    #[serde(default, rename = "Patient ID", alias = "patient_id")]
    pub patient_id: Option<String>,

    #[serde(default, rename = "Image Index", alias = "image_index")]
    pub image_index: Option<String>,

    #[serde(default, rename = "_parsed_disease", alias = "disease")]
    pub disease: Option<String>,

    /// Severity level 0-4, when the prediction label could be parsed.
    #[serde(default, rename = "_parsed_severity", alias = "severity")]
    pub severity: Option<u8>,

    /// When the prediction was stored. Absent for legacy rows.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Selector value for the "any time" option.
pub const WINDOW_ALL: &str = "all";
pub const WINDOW_LAST_5_MINUTES: &str = "last-5-minutes";
pub const WINDOW_LAST_30_MINUTES: &str = "last-30-minutes";
pub const WINDOW_CUSTOM_MINUTES: &str = "custom-minutes";

/// Disease selector value meaning "no disease filter".
pub const DISEASE_ALL: &str = "all";

/// Recency window relative to the evaluation-time "now".
///
/// Serializes with the selector names, the custom window as
/// `{"custom-minutes": n}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "last-5-minutes")]
    Last5Minutes,
    #[serde(rename = "last-30-minutes")]
    Last30Minutes,
    #[serde(rename = "custom-minutes")]
    CustomMinutes(u32),
}

impl TimeWindow {
    /// Build a window from the UI selector value.
    ///
    /// `custom_minutes` is only consulted for `"custom-minutes"` and must be
    /// at least one minute.
    pub fn from_selector(selector: &str, custom_minutes: Option<u32>) -> Result<Self, CoreError> {
        match selector {
            WINDOW_ALL => Ok(Self::All),
            WINDOW_LAST_5_MINUTES => Ok(Self::Last5Minutes),
            WINDOW_LAST_30_MINUTES => Ok(Self::Last30Minutes),
            WINDOW_CUSTOM_MINUTES => match custom_minutes {
                Some(minutes) if minutes > 0 => Ok(Self::CustomMinutes(minutes)),
                Some(_) => Err(CoreError::Validation(
                    "custom window must be at least one minute".into(),
                )),
                None => Err(CoreError::Validation(
                    "custom window requires a minute count".into(),
                )),
            },
            other => Err(CoreError::Validation(format!(
                "unknown time window '{other}'"
            ))),
        }
    }

    /// Window length in minutes, `None` for [`TimeWindow::All`].
    pub fn minutes(self) -> Option<u32> {
        match self {
            Self::All => None,
            Self::Last5Minutes => Some(5),
            Self::Last30Minutes => Some(30),
            Self::CustomMinutes(minutes) => Some(minutes),
        }
    }

    /// Inclusive lower bound on record timestamps, `None` when bypassed.
    pub fn lower_bound(self, now: Timestamp) -> Option<Timestamp> {
        self.minutes()
            .map(|minutes| now - Duration::minutes(i64::from(minutes)))
    }
}

/// The set of active filters. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    search: Option<String>,
    disease: Option<String>,
    window: TimeWindow,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring over name and identifiers.
    /// Blank input clears the filter.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        let trimmed = search.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_lowercase());
        self
    }

    /// Exact disease match. Blank input or `"all"` clears the filter.
    pub fn with_disease(mut self, disease: impl Into<String>) -> Self {
        let disease = disease.into();
        let bypass = disease.trim().is_empty() || disease.eq_ignore_ascii_case(DISEASE_ALL);
        self.disease = (!bypass).then_some(disease);
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn disease(&self) -> Option<&str> {
        self.disease.as_deref()
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// True when no criterion is active.
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.disease.is_none() && self.window == TimeWindow::All
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Return the records matching every active criterion, in input order.
///
/// Records without a timestamp never pass an active recency window.
pub fn filter_predictions<'a>(
    records: &'a [PredictionRecord],
    criteria: &FilterCriteria,
    now: Timestamp,
) -> Vec<&'a PredictionRecord> {
    let since = criteria.window.lower_bound(now);

    records
        .iter()
        .filter(|record| matches_search(record, criteria.search()))
        .filter(|record| matches_disease(record, criteria.disease()))
        .filter(|record| matches_window(record, since))
        .collect()
}

/// Distinct disease labels present in `records`, sorted.
pub fn observed_diseases(records: &[PredictionRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.disease.as_deref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// `needle` is already lowercased by [`FilterCriteria::with_search`].
fn matches_search(record: &PredictionRecord, needle: Option<&str>) -> bool {
    let Some(needle) = needle else {
        return true;
    };
    [&record.patient_name, &record.patient_id, &record.image_index]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

fn matches_disease(record: &PredictionRecord, disease: Option<&str>) -> bool {
    match disease {
        None => true,
        Some(wanted) => record.disease.as_deref() == Some(wanted),
    }
}

fn matches_window(record: &PredictionRecord, since: Option<Timestamp>) -> bool {
    match (since, record.timestamp) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(since), Some(ts)) => ts >= since,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
