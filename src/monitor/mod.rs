//! Run monitor
//!
//! Starts a suite run, polls its progress until a terminal status, then
//! fetches per-test and per-step results and prints the report.
//!
//! Only the start request is fatal on failure: retrying it could trigger a
//! second run. Progress checks are retried at a fixed interval, and result
//! fetches degrade to empty lists. Cancellation ends the run at the next
//! request or wait, including one already in flight.

mod cancel;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};

use std::future::Future;
use std::time::Duration;

use colored::Colorize;
use tokio::time::Instant;

use crate::api::{
    sort_by_order, AtfApi, Envelope, ProgressResult, ProgressSnapshot, RunHandle, StartResult,
    StatusLabel, StepResult, TestResult,
};
use crate::common::config::PollConfig;
use crate::common::{snippet, Error, Result};
use crate::report::{self, FilterNames, Tally, TestReport};

/// Polling behaviour
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Give up after this long; `None` polls until cancelled
    pub max_duration: Option<Duration>,
    /// Return as soon as a results link shows up, skipping the report
    pub early_exit_on_results_link: bool,
    pub terminal_statuses: Vec<String>,
}

impl From<&PollConfig> for PollSettings {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            max_duration: config.max_duration(),
            early_exit_on_results_link: config.early_exit_on_results_link,
            terminal_statuses: config.terminal_statuses.clone(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

/// Result of the trigger request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(RunHandle),
    /// The trigger succeeded but returned no progress link; carries the raw body
    MissingProgressLink(String),
}

/// How the poll loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A terminal status was observed
    Finished(ProgressSnapshot),
    /// A results link appeared before a terminal status and early exit is on
    ResultsAvailable {
        status: StatusLabel,
        percent_complete: f64,
        results_id: String,
    },
}

/// Counts from a fully reported run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub status: StatusLabel,
    pub tests: Tally,
    pub steps: Tally,
}

/// What a call to [`RunMonitor::run`] ended with
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    MissingProgressLink(String),
    EarlyResults {
        status: StatusLabel,
        percent_complete: f64,
        results_id: String,
    },
    /// Terminal status without a suite result id; nothing to report
    NoResultsLink(StatusLabel),
    Reported(RunSummary),
}

/// Drives one suite run against an [`AtfApi`]
pub struct RunMonitor<A> {
    api: A,
    settings: PollSettings,
    filters: FilterNames,
    cancel: CancelToken,
}

impl<A: AtfApi> RunMonitor<A> {
    pub fn new(api: A, settings: PollSettings, filters: FilterNames, cancel: CancelToken) -> Self {
        Self {
            api,
            settings,
            filters,
            cancel,
        }
    }

    /// Start, monitor, and report one run of `suite_id`
    pub async fn run(&self, suite_id: &str) -> Result<RunOutcome> {
        let outcome = self.start(suite_id).await?;
        println!("{}", "Test suite triggered successfully".green());

        let handle = match outcome {
            StartOutcome::Started(handle) => handle,
            StartOutcome::MissingProgressLink(body) => {
                println!("{}", "Progress URL not found in the response".yellow());
                println!("{body}");
                return Ok(RunOutcome::MissingProgressLink(body));
            }
        };

        println!("Monitoring test suite progress...");
        let snapshot = match self.poll(&handle).await? {
            PollOutcome::Finished(snapshot) => snapshot,
            PollOutcome::ResultsAvailable {
                status,
                percent_complete,
                results_id,
            } => {
                tracing::info!(%results_id, "results available, skipping detailed report");
                return Ok(RunOutcome::EarlyResults {
                    status,
                    percent_complete,
                    results_id,
                });
            }
        };

        println!("\n{}", report::banner("Test Suite Completed").bold());
        match snapshot.results_id.as_deref() {
            Some(results_id) => Ok(RunOutcome::Reported(
                self.report(snapshot.status.clone(), results_id).await?,
            )),
            None => {
                println!("{}", "Error: No suite result ID found in results link".red());
                Ok(RunOutcome::NoResultsLink(snapshot.status))
            }
        }
    }

    /// Trigger a run. Every failure here is fatal and never retried.
    pub async fn start(&self, suite_id: &str) -> Result<StartOutcome> {
        let suite_id = suite_id.trim();
        if suite_id.is_empty() {
            return Err(Error::Usage("Test suite sys_id must not be empty".to_string()));
        }

        let raw = self.call(self.api.start_suite(suite_id)).await.map_err(|e| match e {
            Error::Http(e) => Error::StartRequest(e),
            other => other,
        })?;

        if !raw.is_success() {
            return Err(Error::start_rejected(raw.status, &raw.body));
        }
        if raw.is_empty() {
            return Err(Error::EmptyStartResponse);
        }

        let envelope: Envelope<StartResult> =
            serde_json::from_str(&raw.body).map_err(Error::InvalidStartResponse)?;

        match envelope
            .result
            .as_ref()
            .and_then(StartResult::progress_url)
        {
            Some(url) => {
                tracing::debug!(progress_url = url, "run started");
                Ok(StartOutcome::Started(RunHandle {
                    suite_id: suite_id.to_string(),
                    progress_url: url.to_string(),
                }))
            }
            None => Ok(StartOutcome::MissingProgressLink(raw.body)),
        }
    }

    /// Poll the progress URL until a terminal status
    ///
    /// Failed or unreadable progress responses are logged and retried at the
    /// same interval. Ends early only on cancellation, an exhausted
    /// `max_duration`, or (when enabled) an early results link.
    pub async fn poll(&self, handle: &RunHandle) -> Result<PollOutcome> {
        let started = Instant::now();

        loop {
            let progress = match self.call(self.api.progress(&handle.progress_url)).await {
                Ok(raw) => raw.result::<ProgressResult>().map_err(|e| {
                    if let Error::Json(_) = e {
                        tracing::debug!(body = %snippet(&raw.body), "unparseable progress body");
                    }
                    e
                }),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => Err(e),
            };

            match progress {
                Ok(progress) => {
                    let snapshot = ProgressSnapshot::from(progress);
                    println!("{}", report::progress_line(&snapshot));

                    if snapshot.status.is_terminal(&self.settings.terminal_statuses) {
                        return Ok(PollOutcome::Finished(snapshot));
                    }

                    if let Some(results_id) = snapshot.results_id {
                        if self.settings.early_exit_on_results_link {
                            return Ok(PollOutcome::ResultsAvailable {
                                status: snapshot.status,
                                percent_complete: snapshot.percent_complete,
                                results_id,
                            });
                        }
                        tracing::debug!(%results_id, "results link present before terminal status");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "progress check failed, retrying");
                }
            }

            self.wait(started).await?;
        }
    }

    /// Sleep one interval, bounded by the remaining budget and cancellation
    async fn wait(&self, started: Instant) -> Result<()> {
        let mut interval = self.settings.interval;
        if let Some(max) = self.settings.max_duration {
            let elapsed = started.elapsed();
            if elapsed >= max {
                return Err(Error::PollTimeout(max.as_secs()));
            }
            interval = interval.min(max - elapsed);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => Ok(()),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Await one API request unless the run is cancelled first
    ///
    /// A cancelled run issues no further requests, and an in-flight request
    /// is dropped as soon as cancellation arrives.
    async fn call<T, F>(&self, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tokio::select! {
            result = request => result,
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Test results of a suite run, in `order`
    pub async fn collect_results(&self, results_id: &str) -> Result<Vec<TestResult>> {
        let raw = self.call(self.api.test_results(results_id)).await?;
        let mut tests: Vec<TestResult> = raw.result()?;
        sort_by_order(&mut tests, TestResult::order_key);
        Ok(tests)
    }

    /// Step results of one test, in `step_number` order
    pub async fn collect_steps(&self, test_id: &str) -> Result<Vec<StepResult>> {
        let raw = self.call(self.api.step_results(test_id)).await?;
        let mut steps: Vec<StepResult> = raw.result()?;
        sort_by_order(&mut steps, StepResult::order_key);
        Ok(steps)
    }

    /// Fetch a test's steps once and decode any selected results in them
    ///
    /// A failed step fetch leaves this test with no steps; only cancellation
    /// is returned as an error.
    async fn build_test_report(&self, test: TestResult) -> Result<TestReport> {
        let steps = match test.sys_id.as_deref() {
            Some(test_id) => match self.collect_steps(test_id).await {
                Ok(steps) => steps,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(test_id, error = %e, "failed to retrieve test steps");
                    Vec::new()
                }
            },
            None => {
                tracing::warn!(test = test.name(), "test result has no sys_id, skipping steps");
                Vec::new()
            }
        };

        let mut selected = Vec::new();
        for step in &steps {
            let Some(output) = step.output.as_deref() else {
                continue;
            };
            match report::extract_selected_result(output) {
                Ok(Some(result)) => selected.push(result),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        test = test.name(),
                        step = step.name(),
                        error = %e,
                        "could not parse selected result"
                    );
                }
            }
        }

        Ok(TestReport {
            test,
            steps,
            selected,
        })
    }

    /// Print per-test details and the step and test summaries
    ///
    /// If the results fetch fails, the failure is printed and a zero report
    /// follows on purpose, so the run still ends with both summary blocks.
    async fn report(&self, status: StatusLabel, results_id: &str) -> Result<RunSummary> {
        println!("\nRetrieving individual test results...");
        let tests = match self.collect_results(results_id).await {
            Ok(tests) => tests,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                println!("{}", format!("Failed to retrieve test results: {e}").red());
                Vec::new()
            }
        };

        println!("\n{}", report::tests_found(tests.len()));
        println!("{}", report::separator(report::LIST_SEPARATOR_WIDTH));

        let test_tally = Tally::of_tests(&tests);
        let mut step_tally = Tally::new();
        for test in tests {
            let test_report = self.build_test_report(test).await?;
            println!("\n{}", report::render_test(&test_report, &self.filters));
            step_tally.absorb(test_report.tally());
        }

        println!("\n{}", report::banner("Test Steps Summary").bold());
        if let Some(summary) = report::render_step_summary(&step_tally) {
            println!("{summary}\n");
        }

        println!("\n{}", report::banner("Final Test Summary").bold());
        println!("{}", report::render_test_summary(&test_tally));

        Ok(RunSummary {
            status,
            tests: test_tally,
            steps: step_tally,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RawResponse;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::io;
    use std::sync::Mutex;

    const PROGRESS_URL: &str = "https://dev.example.com/api/sn_cicd/progress/p1";

    fn ok(body: &str) -> RawResponse {
        RawResponse::new("https://dev.example.com", 200, body)
    }

    fn progress(status: &str, percent: u8, results_id: Option<&str>) -> Result<RawResponse> {
        let links = match results_id {
            Some(id) => format!(r#"{{"results":{{"id":"{id}"}}}}"#),
            None => "{}".to_string(),
        };
        Ok(ok(&format!(
            r#"{{"result":{{"status_label":"{status}","percent_complete":"{percent}","links":{links}}}}}"#
        )))
    }

    fn started() -> RawResponse {
        ok(&format!(
            r#"{{"result":{{"links":{{"progress":{{"id":"p1","url":"{PROGRESS_URL}"}}}}}}}}"#
        ))
    }

    fn transport_error() -> Error {
        Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
    }

    /// In-memory API answering from scripted responses
    #[derive(Default)]
    struct ScriptedApi {
        start: Mutex<Option<Result<RawResponse>>>,
        progress: Mutex<VecDeque<Result<RawResponse>>>,
        tests: Mutex<Option<RawResponse>>,
        steps: HashMap<String, RawResponse>,
        unreachable_steps: HashSet<String>,
        /// Never answers the trigger request
        stall_start: bool,
        /// Cancelled while the test results request is being served
        cancel_on_tests: Option<CancelHandle>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn with_start(self, response: Result<RawResponse>) -> Self {
            *self.start.lock().unwrap() = Some(response);
            self
        }

        fn with_progress(self, responses: Vec<Result<RawResponse>>) -> Self {
            self.progress.lock().unwrap().extend(responses);
            self
        }

        fn with_tests(self, response: RawResponse) -> Self {
            *self.tests.lock().unwrap() = Some(response);
            self
        }

        fn with_steps(mut self, test_id: &str, response: RawResponse) -> Self {
            self.steps.insert(test_id.to_string(), response);
            self
        }

        fn with_unreachable_steps(mut self, test_id: &str) -> Self {
            self.unreachable_steps.insert(test_id.to_string());
            self
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl AtfApi for ScriptedApi {
        async fn start_suite(&self, suite_id: &str) -> Result<RawResponse> {
            self.record(format!("start:{suite_id}"));
            if self.stall_start {
                std::future::pending::<()>().await;
            }
            self.start
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(started()))
        }

        async fn progress(&self, progress_url: &str) -> Result<RawResponse> {
            self.record(format!("progress:{progress_url}"));
            // An exhausted script keeps reporting a running suite
            self.progress
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| progress("Running", 50, None))
        }

        async fn test_results(&self, suite_result_id: &str) -> Result<RawResponse> {
            self.record(format!("tests:{suite_result_id}"));
            if let Some(cancel) = &self.cancel_on_tests {
                cancel.cancel();
            }
            Ok(self
                .tests
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| ok(r#"{"result":[]}"#)))
        }

        async fn step_results(&self, test_result_id: &str) -> Result<RawResponse> {
            self.record(format!("steps:{test_result_id}"));
            if self.unreachable_steps.contains(test_result_id) {
                return Err(transport_error());
            }
            Ok(self
                .steps
                .get(test_result_id)
                .cloned()
                .unwrap_or_else(|| ok(r#"{"result":[]}"#)))
        }
    }

    fn fast_settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            ..PollSettings::default()
        }
    }

    fn monitor(api: ScriptedApi) -> RunMonitor<ScriptedApi> {
        RunMonitor::new(api, fast_settings(), FilterNames::default(), CancelToken::never())
    }

    fn handle() -> RunHandle {
        RunHandle {
            suite_id: "suite1".to_string(),
            progress_url: PROGRESS_URL.to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_returns_handle() {
        let monitor = monitor(ScriptedApi::default());
        let outcome = monitor.start(" suite1 ").await.unwrap();
        assert_eq!(outcome, StartOutcome::Started(handle()));
        assert_eq!(monitor.api.count("start:suite1"), 1);
    }

    #[tokio::test]
    async fn test_start_empty_suite_id_makes_no_request() {
        let monitor = monitor(ScriptedApi::default());
        let err = monitor.start("   ").await.unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
        assert_eq!(monitor.api.count("start:"), 0);
    }

    #[tokio::test]
    async fn test_start_server_error_is_fatal_and_never_polls() {
        let api = ScriptedApi::default().with_start(Ok(RawResponse::new(
            "https://dev.example.com",
            500,
            "{\"error\":\"internal\"}",
        )));
        let monitor = monitor(api);

        let err = monitor.run("suite1").await.unwrap_err();
        match err {
            Error::StartRejected { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("internal"));
            }
            other => panic!("Expected StartRejected, got {other}"),
        }
        assert_eq!(monitor.api.count("start:"), 1);
        assert_eq!(monitor.api.count("progress:"), 0);
    }

    #[tokio::test]
    async fn test_start_transport_error_is_not_retried() {
        let monitor = monitor(ScriptedApi::default().with_start(Err(transport_error())));
        assert!(matches!(
            monitor.start("suite1").await.unwrap_err(),
            Error::Io(_)
        ));
        assert_eq!(monitor.api.count("start:"), 1);
    }

    #[tokio::test]
    async fn test_start_empty_and_invalid_bodies() {
        let monitor = monitor(ScriptedApi::default().with_start(Ok(ok("  "))));
        assert!(matches!(
            monitor.start("suite1").await.unwrap_err(),
            Error::EmptyStartResponse
        ));

        let monitor = self::monitor(ScriptedApi::default().with_start(Ok(ok("<html>"))));
        assert!(matches!(
            monitor.start("suite1").await.unwrap_err(),
            Error::InvalidStartResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_progress_link_surfaces_body() {
        let body = r#"{"result":{"status":"2","status_message":"no such suite"}}"#;
        let monitor = monitor(ScriptedApi::default().with_start(Ok(ok(body))));

        let outcome = monitor.run("suite1").await.unwrap();
        assert_eq!(outcome, RunOutcome::MissingProgressLink(body.to_string()));
        assert_eq!(monitor.api.count("progress:"), 0);
    }

    #[tokio::test]
    async fn test_poll_stops_at_first_terminal_status() {
        let api = ScriptedApi::default().with_progress(vec![
            progress("Pending", 0, None),
            progress("Running", 40, None),
            progress("Successful", 100, Some("sr1")),
            progress("Running", 100, None),
        ]);
        let monitor = monitor(api);

        let outcome = monitor.poll(&handle()).await.unwrap();
        match outcome {
            PollOutcome::Finished(snapshot) => {
                assert_eq!(snapshot.status.as_str(), "Successful");
                assert_eq!(snapshot.percent_complete, 100.0);
                assert_eq!(snapshot.results_id.as_deref(), Some("sr1"));
            }
            other => panic!("Expected Finished, got {other:?}"),
        }
        assert_eq!(monitor.api.count("progress:"), 3);
    }

    #[tokio::test]
    async fn test_poll_retries_transient_failures() {
        let api = ScriptedApi::default().with_progress(vec![
            Err(transport_error()),
            Ok(RawResponse::new(PROGRESS_URL, 502, "bad gateway")),
            Ok(ok("")),
            Ok(ok("not json")),
            Ok(ok(r#"{"error":{"message":"oops"}}"#)),
            progress("Error", 100, Some("sr1")),
        ]);
        let monitor = monitor(api);

        let outcome = monitor.poll(&handle()).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Finished(ref s) if s.status.as_str() == "Error"));
        assert_eq!(monitor.api.count("progress:"), 6);
    }

    #[tokio::test]
    async fn test_poll_custom_terminal_statuses() {
        let api = ScriptedApi::default().with_progress(vec![
            progress("Completed", 100, None),
            progress("Canceled", 100, None),
        ]);
        let settings = PollSettings {
            terminal_statuses: vec!["Canceled".to_string()],
            ..fast_settings()
        };
        let monitor = RunMonitor::new(api, settings, FilterNames::default(), CancelToken::never());

        let outcome = monitor.poll(&handle()).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Finished(ref s) if s.status.as_str() == "Canceled"));
        assert_eq!(monitor.api.count("progress:"), 2);
    }

    #[tokio::test]
    async fn test_early_results_link_ignored_by_default() {
        let api = ScriptedApi::default().with_progress(vec![
            progress("Running", 60, Some("sr1")),
            progress("Completed", 100, Some("sr1")),
        ]);
        let monitor = monitor(api);

        let outcome = monitor.poll(&handle()).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Finished(_)));
        assert_eq!(monitor.api.count("progress:"), 2);
    }

    #[tokio::test]
    async fn test_early_exit_on_results_link_when_enabled() {
        let api = ScriptedApi::default().with_progress(vec![
            progress("Running", 60, Some("sr1")),
            progress("Completed", 100, Some("sr1")),
        ]);
        let settings = PollSettings {
            early_exit_on_results_link: true,
            ..fast_settings()
        };
        let monitor = RunMonitor::new(api, settings, FilterNames::default(), CancelToken::never());

        let outcome = monitor.run("suite1").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::EarlyResults {
                status: StatusLabel::new("Running"),
                percent_complete: 60.0,
                results_id: "sr1".to_string(),
            }
        );
        assert_eq!(monitor.api.count("progress:"), 1);
        assert_eq!(monitor.api.count("tests:"), 0);
    }

    #[tokio::test]
    async fn test_poll_gives_up_after_max_duration() {
        let settings = PollSettings {
            max_duration: Some(Duration::from_millis(20)),
            ..fast_settings()
        };
        let monitor = RunMonitor::new(
            ScriptedApi::default(),
            settings,
            FilterNames::default(),
            CancelToken::never(),
        );

        let err = monitor.poll(&handle()).await.unwrap_err();
        assert!(matches!(err, Error::PollTimeout(_)));
        assert!(monitor.api.count("progress:") >= 1);
    }

    #[tokio::test]
    async fn test_poll_stops_when_cancelled() {
        let (cancel, token) = cancel_pair();
        let settings = PollSettings {
            interval: Duration::from_secs(3600),
            ..PollSettings::default()
        };
        let monitor = RunMonitor::new(ScriptedApi::default(), settings, FilterNames::default(), token);

        cancel.cancel();
        let err = monitor.poll(&handle()).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(monitor.api.count("progress:"), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let (cancel, token) = cancel_pair();
        let settings = PollSettings {
            interval: Duration::from_secs(3600),
            ..PollSettings::default()
        };
        let monitor = RunMonitor::new(ScriptedApi::default(), settings, FilterNames::default(), token);

        let handle = handle();
        let (result, _) = tokio::join!(monitor.poll(&handle), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        assert!(matches!(result.unwrap_err(), Error::Cancelled));
        assert_eq!(monitor.api.count("progress:"), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_start_request() {
        let (cancel, token) = cancel_pair();
        let api = ScriptedApi {
            stall_start: true,
            ..Default::default()
        };
        let monitor = RunMonitor::new(api, fast_settings(), FilterNames::default(), token);

        let (result, _) = tokio::join!(monitor.run("suite1"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        assert!(matches!(result.unwrap_err(), Error::Cancelled));
        assert_eq!(monitor.api.count("start:"), 1);
        assert_eq!(monitor.api.count("progress:"), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_report_skips_step_queries() {
        let (cancel, token) = cancel_pair();
        let api = ScriptedApi {
            cancel_on_tests: Some(cancel),
            ..Default::default()
        }
        .with_progress(vec![progress("Completed", 100, Some("sr1"))])
        .with_tests(ok(r#"{"result":[
            {"sys_id":"t1","test_name":"First","status":"success","order":"1"},
            {"sys_id":"t2","test_name":"Second","status":"success","order":"2"},
            {"sys_id":"t3","test_name":"Third","status":"failure","order":"3"}
        ]}"#));
        let monitor = RunMonitor::new(api, fast_settings(), FilterNames::default(), token);

        let err = monitor.run("suite1").await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(monitor.api.count("tests:sr1"), 1);
        assert_eq!(monitor.api.count("steps:"), 0);
    }

    #[tokio::test]
    async fn test_collect_steps_sorted_by_step_number() {
        let api = ScriptedApi::default().with_steps(
            "t1",
            ok(r#"{"result":[
                {"step_name":"c","step_number":"10","status":"success"},
                {"step_name":"a","step_number":"2","status":"success"},
                {"step_name":"b","step_number":"3","status":"failure"},
                {"step_name":"z","status":"success"},
                {"step_name":"first","step_number":1,"status":"success"}
            ]}"#),
        );
        let monitor = monitor(api);

        let steps = monitor.collect_steps("t1").await.unwrap();
        let names: Vec<&str> = steps.iter().map(StepResult::name).collect();
        assert_eq!(names, vec!["first", "a", "b", "c", "z"]);
    }

    #[tokio::test]
    async fn test_collect_results_error_status() {
        let api = ScriptedApi::default()
            .with_tests(RawResponse::new("https://dev.example.com", 403, "forbidden"));
        let monitor = monitor(api);
        assert!(matches!(
            monitor.collect_results("sr1").await.unwrap_err(),
            Error::HttpStatus { status: 403, .. }
        ));
    }

    #[tokio::test]
    async fn test_full_run_reports_and_fetches_steps_once_per_test() {
        let api = ScriptedApi::default()
            .with_progress(vec![
                progress("Running", 50, None),
                progress("Completed", 100, Some("sr1")),
            ])
            .with_tests(ok(r#"{"result":[
                {"sys_id":"t2","test_name":"Second","status":"failure","order":"2"},
                {"sys_id":"t1","test_name":"First","status":"success","order":"1"}
            ]}"#))
            .with_steps(
                "t1",
                ok(r#"{"result":[
                    {"step_name":"open","step_number":"1","status":"success"},
                    {"step_name":"score","step_number":"2","status":"success",
                     "output":"Assigned selected result: {\"sys_id\":\"abc\",\"score\":0.9,\"filter\":\"4d26770a93b91a100d4d317a7bba10d6\"}"}
                ]}"#),
            )
            .with_steps(
                "t2",
                ok(r#"{"result":[
                    {"step_name":"bad","step_number":"1","status":"failure",
                     "output":"Assigned selected result: {broken"},
                    {"step_name":"after","step_number":"2","status":"success"}
                ]}"#),
            );
        let monitor = monitor(api);

        let outcome = monitor.run("suite1").await.unwrap();
        match outcome {
            RunOutcome::Reported(summary) => {
                assert_eq!(summary.status.as_str(), "Completed");
                assert_eq!(
                    summary.tests,
                    Tally {
                        total: 2,
                        passed: 1,
                        failed: 1
                    }
                );
                assert_eq!(
                    summary.steps,
                    Tally {
                        total: 4,
                        passed: 3,
                        failed: 1
                    }
                );
            }
            other => panic!("Expected Reported, got {other:?}"),
        }
        assert_eq!(monitor.api.count("tests:sr1"), 1);
        assert_eq!(monitor.api.count("steps:t1"), 1);
        assert_eq!(monitor.api.count("steps:t2"), 1);
    }

    #[tokio::test]
    async fn test_step_fetch_failures_skip_only_that_test() {
        let api = ScriptedApi::default()
            .with_progress(vec![progress("Completed", 100, Some("sr1"))])
            .with_tests(ok(r#"{"result":[
                {"sys_id":"t1","test_name":"Rejected","status":"failure","order":"1"},
                {"sys_id":"t2","test_name":"Unreachable","status":"success","order":"2"},
                {"sys_id":"t3","test_name":"Fine","status":"success","order":"3"}
            ]}"#))
            .with_steps("t1", RawResponse::new("https://dev.example.com", 500, "{}"))
            .with_unreachable_steps("t2")
            .with_steps(
                "t3",
                ok(r#"{"result":[
                    {"step_name":"open","step_number":"1","status":"success"},
                    {"step_name":"check","step_number":"2","status":"failure"}
                ]}"#),
            );
        let monitor = monitor(api);

        let outcome = monitor.run("suite1").await.unwrap();
        match outcome {
            RunOutcome::Reported(summary) => {
                assert_eq!(
                    summary.tests,
                    Tally {
                        total: 3,
                        passed: 2,
                        failed: 1
                    }
                );
                assert_eq!(
                    summary.steps,
                    Tally {
                        total: 2,
                        passed: 1,
                        failed: 1
                    }
                );
            }
            other => panic!("Expected Reported, got {other:?}"),
        }
        assert_eq!(monitor.api.count("steps:t1"), 1);
        assert_eq!(monitor.api.count("steps:t2"), 1);
        assert_eq!(monitor.api.count("steps:t3"), 1);
    }

    #[tokio::test]
    async fn test_build_test_report_collects_selected_results_past_bad_json() {
        let api = ScriptedApi::default().with_steps(
            "t1",
            ok(r#"{"result":[
                {"step_name":"bad","step_number":"1","status":"success",
                 "output":"Assigned selected result: {broken"},
                {"step_name":"good","step_number":"2","status":"success",
                 "output":"Assigned selected result: {\"sys_id\":\"abc\",\"score\":0.9,\"filter\":\"f1\",\"expected\":\"f2\"}"}
            ]}"#),
        );
        let monitor = monitor(api);
        let test = TestResult {
            sys_id: Some("t1".to_string()),
            ..Default::default()
        };

        let report = monitor.build_test_report(test).await.unwrap();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.selected.len(), 1);
        assert_eq!(report.selected[0].expected.as_deref(), Some("f2"));
    }

    #[tokio::test]
    async fn test_results_failure_degrades_to_empty_report() {
        let api = ScriptedApi::default()
            .with_progress(vec![progress("Completed", 100, Some("sr1"))])
            .with_tests(RawResponse::new("https://dev.example.com", 500, ""));
        let monitor = monitor(api);

        let outcome = monitor.run("suite1").await.unwrap();
        match outcome {
            RunOutcome::Reported(summary) => {
                assert_eq!(summary.tests, Tally::new());
                assert_eq!(summary.steps, Tally::new());
            }
            other => panic!("Expected Reported, got {other:?}"),
        }
        assert_eq!(monitor.api.count("steps:"), 0);
    }

    #[tokio::test]
    async fn test_terminal_without_results_link() {
        let api = ScriptedApi::default().with_progress(vec![progress("Error", 100, None)]);
        let monitor = monitor(api);

        let outcome = monitor.run("suite1").await.unwrap();
        assert_eq!(outcome, RunOutcome::NoResultsLink(StatusLabel::new("Error")));
        assert_eq!(monitor.api.count("tests:"), 0);
    }
}
