//! Wire and domain types for the ATF REST endpoints
//!
//! The platform serialises most scalars as strings and reference fields as
//! `{"link": ..., "value": ...}` objects, and any field may be absent. All
//! record fields are therefore optional and read through the lenient
//! deserializers in [`lenient`].

use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;

/// Placeholder rendered for any missing field
pub const UNKNOWN: &str = "Unknown";

/// Step or test status that counts as passed
pub const SUCCESS_STATUS: &str = "success";

/// Every table and CI/CD response wraps its payload in `result`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

/// A `{ "url": ..., "id": ... }` link object
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Link {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
}

// ============================================================================
// Start endpoint
// ============================================================================

/// `result` of the test suite run trigger
#[derive(Debug, Deserialize, Default)]
pub struct StartResult {
    #[serde(default)]
    pub links: StartLinks,
}

/// Links returned by the trigger
#[derive(Debug, Deserialize, Default)]
pub struct StartLinks {
    #[serde(default)]
    pub progress: Option<Link>,
}

impl StartResult {
    /// The progress-check URL, if the trigger returned one
    pub fn progress_url(&self) -> Option<&str> {
        self.links
            .progress
            .as_ref()
            .and_then(|link| link.url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// A started run: the suite and where to check its progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub suite_id: String,
    pub progress_url: String,
}

// ============================================================================
// Progress endpoint
// ============================================================================

/// `result` of the progress endpoint
#[derive(Debug, Deserialize, Default)]
pub struct ProgressResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status_label: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub links: ProgressLinks,
}

/// Links returned by the progress endpoint
#[derive(Debug, Deserialize, Default)]
pub struct ProgressLinks {
    #[serde(default)]
    pub results: Option<Link>,
}

/// Status label of a run
///
/// The set of labels is owned by the backend, so this is an open string
/// rather than an enum. Which labels end a run is decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabel(String);

impl StatusLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this label is one of `terminal`
    pub fn is_terminal(&self, terminal: &[String]) -> bool {
        terminal.iter().any(|t| t == &self.0)
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation of a run's progress
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: StatusLabel,
    /// Completion percentage as the instance reported it, so `42.5` stays
    /// `42.5`; a missing or non-finite value reads as 0
    pub percent_complete: f64,
    /// Suite result id, once the results collection exists
    pub results_id: Option<String>,
}

impl From<ProgressResult> for ProgressSnapshot {
    fn from(result: ProgressResult) -> Self {
        let percent_complete = result
            .percent_complete
            .filter(|p| p.is_finite())
            .unwrap_or(0.0);

        Self {
            status: StatusLabel::new(result.status_label.unwrap_or_else(|| UNKNOWN.to_string())),
            percent_complete,
            results_id: result
                .links
                .results
                .and_then(|link| link.id)
                .filter(|id| !id.is_empty()),
        }
    }
}

// ============================================================================
// Table records
// ============================================================================

/// A row of `sys_atf_test_result`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TestResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sys_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub test_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub order: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub test_suite_result: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub duration: Option<String>,
}

impl TestResult {
    pub fn id(&self) -> &str {
        self.sys_id.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn name(&self) -> &str {
        self.test_name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn passed(&self) -> bool {
        self.status.as_deref() == Some(SUCCESS_STATUS)
    }

    pub fn order_key(&self) -> Option<f64> {
        parse_order(self.order.as_deref())
    }
}

/// A row of `sys_atf_test_result_item`
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StepResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub step_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub step_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub summary: Option<String>,
}

impl StepResult {
    pub fn name(&self) -> &str {
        self.step_name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn passed(&self) -> bool {
        self.status.as_deref() == Some(SUCCESS_STATUS)
    }

    pub fn order_key(&self) -> Option<f64> {
        parse_order(self.step_number.as_deref())
    }
}

/// Decision record embedded in a step's output text
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct SelectedResult {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub sys_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub filter: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub expected: Option<String>,
}

fn parse_order(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

/// Stable sort by ordering key; records without a key keep their relative
/// order after all keyed records
pub fn sort_by_order<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> Option<f64>,
{
    items.sort_by(|a, b| match (key(a), key(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Deserializers tolerant of the platform's string/number/reference mix
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a string, number, bool, or `{"value": ...}` reference as a string
    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(value_to_string))
    }

    /// Accept a number or a numeric string as `f64`
    pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn value_to_string(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Object(mut map) => map
                .remove("value")
                .or_else(|| map.remove("display_value"))
                .and_then(value_to_string),
            Value::Array(_) => None,
        }
    }
}
