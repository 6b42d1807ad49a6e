use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::{DayWindow, SolveCheck, SubmissionOracle};

/// How many recent accepted submissions to pull per lookup. One qualifying
/// entry inside the day window is enough, so a short page suffices.
const RECENT_SUBMISSION_LIMIT: u32 = 30;

/// Failures that can occur while querying the submission API.
///
/// These never escape [`SubmissionOracle::has_solved_on`]; they exist so the
/// fail-closed path can log a precise cause.
#[derive(Debug, Error)]
pub enum AlfaOracleError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build oracle HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request to the submissions endpoint could not be sent.
    #[error("failed to send oracle request for `{handle}`")]
    RequestSend {
        handle: String,
        #[source]
        source: reqwest::Error,
    },
    /// The API returned an unexpected status code.
    #[error("unexpected oracle response status {status} for `{handle}`")]
    RequestStatus { handle: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode oracle response for `{handle}`")]
    DecodeResponse {
        handle: String,
        #[source]
        source: reqwest::Error,
    },
}

/// [`SubmissionOracle`] backed by an alfa-leetcode-api style deployment,
/// querying `{base}/{handle}/acSubmission` and filtering the returned
/// timestamps against the day window.
#[derive(Clone)]
pub struct AlfaSubmissionOracle {
    client: Client,
    base_url: Arc<str>,
}

impl AlfaSubmissionOracle {
    /// Build the oracle client with a hard per-request timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AlfaOracleError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| AlfaOracleError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    async fn check_window(
        &self,
        handle: &str,
        window: DayWindow,
    ) -> Result<SolveCheck, AlfaOracleError> {
        let url = format!(
            "{}/{}/acSubmission?limit={}",
            self.base_url, handle, RECENT_SUBMISSION_LIMIT
        );

        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| AlfaOracleError::RequestSend {
                    handle: handle.to_owned(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlfaOracleError::RequestStatus {
                handle: handle.to_owned(),
                status,
            });
        }

        let payload: Value =
            response
                .json()
                .await
                .map_err(|source| AlfaOracleError::DecodeResponse {
                    handle: handle.to_owned(),
                    source,
                })?;

        let evidence = qualifying_titles(&payload, window);
        Ok(SolveCheck {
            solved: !evidence.is_empty(),
            evidence,
        })
    }
}

impl SubmissionOracle for AlfaSubmissionOracle {
    fn has_solved_on(&self, handle: &str, window: DayWindow) -> BoxFuture<'static, SolveCheck> {
        let oracle = self.clone();
        let handle = handle.to_owned();
        Box::pin(async move {
            match oracle.check_window(&handle, window).await {
                Ok(check) => check,
                Err(err) => {
                    warn!(handle = %handle, error = %err, "oracle lookup failed; treating as not solved");
                    SolveCheck::not_solved()
                }
            }
        })
    }
}

/// Titles of submissions that landed inside the window.
///
/// The API has shipped both a bare array and a `{"count", "submission"}`
/// wrapper over time; accept either shape. Entries missing a usable
/// timestamp are skipped rather than failing the whole lookup.
fn qualifying_titles(payload: &Value, window: DayWindow) -> Vec<String> {
    let entries = payload
        .as_array()
        .or_else(|| payload.get("submission").and_then(Value::as_array));

    let Some(entries) = entries else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| {
            submission_timestamp(entry).is_some_and(|ts| window.contains(ts))
        })
        .map(submission_title)
        .collect()
}

/// Unix timestamp of one submission entry; the API serializes it as either
/// a string or a number depending on version.
fn submission_timestamp(entry: &Value) -> Option<i64> {
    match entry.get("timestamp")? {
        Value::String(raw) => raw.parse().ok(),
        Value::Number(num) => num.as_i64(),
        _ => None,
    }
}

fn submission_title(entry: &Value) -> String {
    entry
        .get("title")
        .and_then(Value::as_str)
        .or_else(|| entry.get("titleSlug").and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_owned()
}
