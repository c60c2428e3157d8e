//! Result poller for asynchronous providers
//!
//! An explicit iterative loop (never recursion) probes the submission until
//! a terminal status appears or the probe budget runs out. The delay between
//! probes comes from the configured wait strategy, a pure function of the
//! attempt index, so the loop is deterministic under test. Each probe carries
//! the submission's region header: retries must land on the backend instance
//! that owns the submission, losing that binding is a correctness bug.

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::core_types::{SubmissionHandle, SubmissionResult};
use crate::errors::ClientError;

const REGION_HEADER: &str = "X-Judge0-Region";

pub struct ResultPoller {
    config: Arc<ClientConfig>,
    http: Client,
}

impl ResultPoller {
    pub fn new(config: Arc<ClientConfig>, http: Client) -> Self {
        Self { config, http }
    }

    /// Poll until a terminal status, the probe budget, or cancellation.
    ///
    /// "Still pending" is the only condition that is retried; a transport
    /// failure on any single probe surfaces immediately. Exhausting the
    /// budget yields [`ClientError::PollTimeout`], the client-side
    /// equivalent of a 504, after exactly `max_probe_requests` probes.
    pub async fn poll(
        &self,
        handle: &SubmissionHandle,
        cancel: &CancellationToken,
    ) -> Result<SubmissionResult, ClientError> {
        let polling = &self.config.polling;

        if polling.initial_wait_ms > 0 {
            self.wait(std::time::Duration::from_millis(polling.initial_wait_ms), cancel).await?;
        }

        for attempt in 0..polling.max_probe_requests {
            if cancel.is_cancelled() {
                return Err(ClientError::Superseded);
            }

            let result = self.probe(handle).await?;
            if result.status.is_terminal() {
                return Ok(result);
            }

            log::debug!(
                "submission {} still {} (attempt {}/{})",
                handle.token,
                result.status.description,
                attempt + 1,
                polling.max_probe_requests
            );
            // no point sleeping once the budget is spent
            if attempt + 1 < polling.max_probe_requests {
                self.wait(polling.wait.delay(attempt), cancel).await?;
            }
        }

        log::warn!(
            "submission {} did not reach a terminal status within {} probes",
            handle.token,
            polling.max_probe_requests
        );
        Err(ClientError::PollTimeout)
    }

    async fn probe(&self, handle: &SubmissionHandle) -> Result<SubmissionResult, ClientError> {
        let url = format!(
            "{}/submissions/{}?base64_encoded=true",
            self.config.flavor(handle.flavor).base_url,
            handle.token
        );

        let response = self.http.get(&url).header(REGION_HEADER, &handle.region).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "probe request failed with HTTP {} for {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parsing(format!("invalid submission status: {}", e)))
    }

    async fn wait(
        &self,
        delay: std::time::Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Superseded),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
