//! REST client for the ATF endpoints
//!
//! [`AtfApi`] is the seam between the run monitor and the network: one
//! method per endpoint, each returning the raw status and body so the caller
//! decides which failures are fatal and which are retried.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::common::config::HttpConfig;
use crate::common::{Credentials, Error, Result};

use super::types::Envelope;

/// Path of the CI/CD test suite trigger
const RUN_SUITE_PATH: &str = "/api/sn_cicd/testsuite/run";
/// Table holding one row per test in a suite run
const TEST_RESULT_TABLE: &str = "sys_atf_test_result";
/// Table holding one row per step in a test run
const TEST_RESULT_ITEM_TABLE: &str = "sys_atf_test_result_item";

const TEST_RESULT_FIELDS: &str =
    "test_name,sys_id,status,start_time,end_time,duration,message,output,order,test_suite_result";
const TEST_RESULT_ITEM_FIELDS: &str =
    "step_name,status,message,step_number,error_message,output,summary";

/// Status line and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Decode the `result` payload of a successful, non-empty response
    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.is_success() {
            return Err(Error::http_status(&self.url, self.status));
        }
        if self.is_empty() {
            return Err(Error::EmptyResponse(self.url.clone()));
        }
        let envelope: Envelope<T> = serde_json::from_str(&self.body)?;
        envelope.result.ok_or_else(|| {
            Error::UnexpectedResponse(format!(
                "no 'result' in {}",
                crate::common::snippet(&self.body)
            ))
        })
    }
}

/// The four ATF endpoints the run monitor consumes
#[async_trait]
pub trait AtfApi: Send + Sync {
    /// Trigger a run of the given suite
    async fn start_suite(&self, suite_id: &str) -> Result<RawResponse>;

    /// Fetch the progress record at the URL returned by the trigger
    async fn progress(&self, progress_url: &str) -> Result<RawResponse>;

    /// Query the test results belonging to a suite result
    async fn test_results(&self, suite_result_id: &str) -> Result<RawResponse>;

    /// Query the step results belonging to a test result
    async fn step_results(&self, test_result_id: &str) -> Result<RawResponse>;
}

/// [`AtfApi`] over HTTP basic auth
pub struct HttpApi {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpApi {
    /// Build a client for the instance in `credentials`
    pub fn new(credentials: Credentials, config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("atf-runner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/api/now/table/{}", self.credentials.instance_url, table)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = request
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(%url, status, bytes = body.len(), "received response");

        Ok(RawResponse { url, status, body })
    }
}

#[async_trait]
impl AtfApi for HttpApi {
    async fn start_suite(&self, suite_id: &str) -> Result<RawResponse> {
        let url = format!("{}{}", self.credentials.instance_url, RUN_SUITE_PATH);
        tracing::debug!(%url, suite_id, "triggering test suite");
        self.send(
            self.client
                .post(&url)
                .query(&[("test_suite_sys_id", suite_id)]),
        )
        .await
    }

    async fn progress(&self, progress_url: &str) -> Result<RawResponse> {
        self.send(self.client.get(progress_url)).await
    }

    async fn test_results(&self, suite_result_id: &str) -> Result<RawResponse> {
        let query = format!("parent.sys_idSTARTSWITH{suite_result_id}^ORDERBYorder");
        self.send(self.client.get(self.table_url(TEST_RESULT_TABLE)).query(&[
            ("sysparm_query", query.as_str()),
            ("sysparm_fields", TEST_RESULT_FIELDS),
        ]))
        .await
    }

    async fn step_results(&self, test_result_id: &str) -> Result<RawResponse> {
        let query = format!("test_result={test_result_id}^ORDERBYstep_number");
        self.send(
            self.client
                .get(self.table_url(TEST_RESULT_ITEM_TABLE))
                .query(&[
                    ("sysparm_query", query.as_str()),
                    ("sysparm_fields", TEST_RESULT_ITEM_FIELDS),
                ]),
        )
        .await
    }
}
