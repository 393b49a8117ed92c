//! Report rendering
//!
//! Everything here turns already-fetched records into text. Nothing performs
//! I/O; the run monitor decides what to print and when, and applies colour.

mod selected;

pub use selected::{extract_selected_result, SELECTED_RESULT_MARKER};

use std::collections::HashMap;

use crate::api::{ProgressSnapshot, SelectedResult, StepResult, TestResult, UNKNOWN};
use crate::common::config::{DEFAULT_FILTER_ID, DEFAULT_FILTER_NAME};

/// Separator printed after each test's detail block
pub const TEST_SEPARATOR_WIDTH: usize = 30;
/// Separator printed under the test count
pub const LIST_SEPARATOR_WIDTH: usize = 50;

/// Immutable filter id to human-readable name lookup
#[derive(Debug, Clone)]
pub struct FilterNames(HashMap<String, String>);

impl FilterNames {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self(names)
    }

    /// Name for `id`, or `id` itself when unknown
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        self.0.get(id).map(String::as_str).unwrap_or(id)
    }
}

impl Default for FilterNames {
    fn default() -> Self {
        let mut names = HashMap::new();
        names.insert(DEFAULT_FILTER_ID.to_string(), DEFAULT_FILTER_NAME.to_string());
        Self(names)
    }
}

/// Passed/failed counts over a set of tests or steps
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one outcome
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Tally the steps that were actually retrieved
    pub fn of_steps<'a>(steps: impl IntoIterator<Item = &'a StepResult>) -> Self {
        let mut tally = Self::new();
        for step in steps {
            tally.record(step.passed());
        }
        tally
    }

    pub fn of_tests<'a>(tests: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut tally = Self::new();
        for test in tests {
            tally.record(test.passed());
        }
        tally
    }

    /// Merge another tally into this one
    pub fn absorb(&mut self, other: Tally) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
    }

    /// Percentage of passed outcomes; `None` when nothing was counted
    pub fn success_rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.passed as f64 / self.total as f64 * 100.0)
        }
    }
}

/// A test together with the steps fetched for it
#[derive(Debug, Clone)]
pub struct TestReport {
    pub test: TestResult,
    pub steps: Vec<StepResult>,
    /// Selected-result records decoded from the step outputs, in step order
    pub selected: Vec<SelectedResult>,
}

impl TestReport {
    pub fn tally(&self) -> Tally {
        Tally::of_steps(&self.steps)
    }
}

/// `=== Title ===`
pub fn banner(title: &str) -> String {
    format!("=== {title} ===")
}

/// Live progress line
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "Status: {} ({}%)",
        snapshot.status, snapshot.percent_complete
    )
}

pub fn separator(width: usize) -> String {
    "-".repeat(width)
}

/// Count line printed before the per-test details
pub fn tests_found(count: usize) -> String {
    format!("Found {count} tests in suite:")
}

/// Per-test block: header fields, then any selected results, then a rule
pub fn render_test(report: &TestReport, filters: &FilterNames) -> String {
    let test = &report.test;
    let mut lines = vec![
        format!("Test: {}", test.name()),
        format!("Test ID: {}", test.id()),
        format!("Status: {}", test.status()),
    ];
    if let Some(message) = test.message.as_deref().filter(|m| !m.is_empty()) {
        lines.push(format!("Message: {message}"));
    }
    if let Some(output) = test.output.as_deref().filter(|o| !o.is_empty()) {
        lines.push(format!("Output: {output}"));
    }
    for selected in &report.selected {
        lines.push(String::new());
        lines.push(render_selected(selected, filters));
    }
    lines.push(separator(TEST_SEPARATOR_WIDTH));
    lines.join("\n")
}

/// Selected-result block with filter ids decoded through `filters`
pub fn render_selected(selected: &SelectedResult, filters: &FilterNames) -> String {
    let score = selected
        .score
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let filter_id = selected.filter.as_deref().unwrap_or(UNKNOWN);

    let mut lines = vec![
        banner("Selected Result"),
        format!("System ID: {}", selected.sys_id.as_deref().unwrap_or(UNKNOWN)),
        format!("Score: {score}"),
        format!("Filter: {} ({})", filters.resolve(filter_id), filter_id),
    ];
    if let Some(expected_id) = selected.expected.as_deref() {
        lines.push(format!(
            "Expected: {} ({})",
            filters.resolve(expected_id),
            expected_id
        ));
    }
    lines.join("\n")
}

/// `70.0%`
pub fn format_rate(rate: f64) -> String {
    format!("{rate:.1}%")
}

/// Step aggregate; `None` when no steps were retrieved
pub fn render_step_summary(tally: &Tally) -> Option<String> {
    let rate = tally.success_rate()?;
    Some(
        [
            format!("Total Steps: {}", tally.total),
            format!("Passed Steps: {}", tally.passed),
            format!("Failed Steps: {}", tally.failed),
            format!("Success Rate: {}", format_rate(rate)),
        ]
        .join("\n"),
    )
}

/// Test aggregate; the rate line is left out when there are no tests
pub fn render_test_summary(tally: &Tally) -> String {
    let mut lines = vec![
        format!("Total Tests: {}", tally.total),
        format!("Passed Tests: {}", tally.passed),
        format!("Failed Tests: {}", tally.failed),
    ];
    if let Some(rate) = tally.success_rate() {
        lines.push(format!("Success Rate: {}", format_rate(rate)));
    }
    lines.push(separator(TEST_SEPARATOR_WIDTH));
    lines.join("\n")
}
