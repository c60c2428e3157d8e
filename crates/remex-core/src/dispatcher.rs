//! Submission dispatcher
//!
//! Builds the provider request from editor state, applies per-language
//! policy (transport encoding, bundled auxiliary assets), and issues the one
//! dispatch call. Whether execution is synchronous or asynchronous is decided
//! by the provider's answer, not by client guesswork: a body carrying a token
//! is a pending handle for the poller, a body carrying a status is the
//! terminal result itself.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::codec;
use crate::config::ClientConfig;
use crate::core_types::{RunOutcome, SubmissionHandle, SubmissionRequest, SubmissionResult};
use crate::errors::ClientError;
use crate::host::{EventSink, HostEvent};

pub struct Dispatcher {
    config: Arc<ClientConfig>,
    http: Client,
    sink: Arc<dyn EventSink>,
    /// Lazily fetched auxiliary archives, keyed by URL so languages with
    /// different archives never share one. The per-URL `OnceCell` makes
    /// concurrent first fetches single-flight.
    assets: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
    /// Credential supplied by the host at runtime; takes precedence over the
    /// per-flavor key from the startup config.
    api_key_override: tokio::sync::RwLock<Option<String>>,
}

#[derive(Serialize)]
struct CreateSubmissionBody<'a> {
    source_code: String,
    language_id: i64,
    stdin: &'a str,
    compiler_options: &'a str,
    command_line_arguments: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_files: Option<String>,
}

// Finished is tried first: some providers echo a token alongside the
// terminal result, and such a body must not be mistaken for a pending
// handle. A genuinely pending body has no status and falls through.
#[derive(Deserialize)]
#[serde(untagged)]
enum DispatchResponse {
    Finished(SubmissionResult),
    Pending {
        token: String,
        #[serde(default)]
        region: String,
    },
}

impl Dispatcher {
    pub fn new(config: Arc<ClientConfig>, http: Client, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            http,
            sink,
            assets: Mutex::new(HashMap::new()),
            api_key_override: tokio::sync::RwLock::new(None),
        }
    }

    /// Replace the credential for subsequent dispatches (host `set` message).
    pub async fn set_api_key(&self, api_key: Option<String>) {
        *self.api_key_override.write().await = api_key;
    }

    /// Dispatch one submission. Returns the terminal result directly when
    /// the provider executes synchronously, or a handle for the poller.
    pub async fn run(&self, request: &SubmissionRequest) -> Result<RunOutcome, ClientError> {
        if request.source_text.trim().is_empty() {
            return Err(ClientError::Validation("Source code can't be empty!".to_string()));
        }

        // Host observers see the full request before any network traffic.
        self.sink
            .emit(HostEvent::PreExecution {
                source_code: request.source_text.clone(),
                language_id: request.language_id,
                flavor: request.flavor,
                stdin: request.stdin.clone(),
                compiler_options: request.compiler_options.clone(),
                command_line_arguments: request.command_line_arguments.clone(),
            })
            .await;

        let source_code = if self.config.is_passthrough(request.language_id) {
            request.source_text.clone()
        } else {
            codec::encode(&request.source_text)
        };

        let additional_files = match &request.additional_files {
            Some(files) => Some(files.clone()),
            None => match self.config.asset_url(request.language_id) {
                Some(url) => Some(self.additional_files(url).await?),
                None => None,
            },
        };

        let body = CreateSubmissionBody {
            source_code,
            language_id: request.language_id,
            stdin: request.stdin.as_str(),
            compiler_options: request.compiler_options.as_str(),
            command_line_arguments: request.command_line_arguments.as_str(),
            additional_files,
        };

        let flavor_config = self.config.flavor(request.flavor);
        let url = format!("{}/submissions?base64_encoded=true", flavor_config.base_url);
        log::debug!("dispatching submission to {}", url);

        let api_key = match self.api_key_override.read().await.clone() {
            Some(key) => Some(key),
            None => flavor_config.api_key.clone(),
        };

        let mut http_request = self.http.post(&url).json(&body);
        if let Some(api_key) = api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = http_request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error while reading error response body".to_string());
            return Err(ClientError::Transport(format!(
                "submission request failed with HTTP {}: {}",
                status, text
            )));
        }

        let dispatched: DispatchResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parsing(format!("invalid dispatch response: {}", e)))?;

        Ok(match dispatched {
            DispatchResponse::Pending { token, region } => {
                log::info!("submission accepted, token {} (region '{}')", token, region);
                RunOutcome::Pending(SubmissionHandle { token, flavor: request.flavor, region })
            }
            DispatchResponse::Finished(result) => {
                log::info!("provider answered synchronously with status {}", result.status.id);
                RunOutcome::Finished(result)
            }
        })
    }

    /// The bundled archive for asset-requiring languages, fetched once per
    /// URL per process. A failed fetch aborts the dispatch and is not
    /// retried here; the next dispatch will try again.
    async fn additional_files(&self, url: &str) -> Result<String, ClientError> {
        let cell = {
            let mut assets = self.assets.lock().await;
            assets.entry(url.to_string()).or_default().clone()
        };
        cell.get_or_try_init(|| async {
            log::debug!("fetching additional files archive from {}", url);
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| ClientError::Asset(e.to_string()))?;
            if !response.status().is_success() {
                return Err(ClientError::Asset(format!(
                    "archive request failed with HTTP {} for {}",
                    response.status(),
                    url
                )));
            }
            response.text().await.map_err(|e| ClientError::Asset(e.to_string()))
        })
        .await
        .cloned()
    }
}
