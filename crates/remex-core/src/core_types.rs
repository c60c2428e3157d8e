//! Core type definitions for the submission protocol
//!
//! These types form the wire contract with Judge0-style providers and the
//! in-process contract between dispatcher, poller, and presenter. Submission
//! requests are built fresh per run and never mutated after dispatch; results
//! are immutable once produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ClientError;

/// Logical tag selecting which provider variant a request is routed to.
///
/// Every flavor maps to exactly one base URL and one authentication header
/// set at process start; the mapping is immutable after initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavor {
    #[serde(rename = "CE")]
    Ce,
    #[serde(rename = "EXTRA_CE")]
    ExtraCe,
}

impl Flavor {
    /// All flavors in registration order. Catalog merging gives the
    /// first-registered flavor priority on duplicate language names.
    pub const ALL: [Flavor; 2] = [Flavor::Ce, Flavor::ExtraCe];
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flavor::Ce => write!(f, "CE"),
            Flavor::ExtraCe => write!(f, "EXTRA_CE"),
        }
    }
}

impl FromStr for Flavor {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CE" => Ok(Flavor::Ce),
            "EXTRA_CE" => Ok(Flavor::ExtraCe),
            other => Err(ClientError::Parsing(format!("unknown flavor: {}", other))),
        }
    }
}

/// Submission status as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionStatus {
    pub id: i64,
    pub description: String,
}

pub const STATUS_IN_QUEUE: i64 = 1;
pub const STATUS_PROCESSING: i64 = 2;

impl SubmissionStatus {
    /// Anything past "In Queue" / "Processing" ends polling; the specific
    /// outcome (accepted, compile error, TLE, ...) is carried to the
    /// presenter unchanged.
    pub fn is_terminal(&self) -> bool {
        self.id > STATUS_PROCESSING
    }
}

/// Per-language metadata, fetched lazily per `(flavor, id)` pair and cached
/// for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageDescriptor {
    pub id: i64,
    pub name: String,
    #[serde(skip)]
    pub flavor: Option<Flavor>,
    /// Default file name for the language; absent in catalog listings.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Editor syntax mode, derived from the display name client-side.
    #[serde(skip)]
    pub editor_mode: Option<String>,
}

/// One user program execution request, constructed fresh per run.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRequest {
    pub source_text: String,
    pub language_id: i64,
    pub flavor: Flavor,
    pub stdin: String,
    pub compiler_options: String,
    pub command_line_arguments: String,
    /// Transport-encoded auxiliary archive for languages that need one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_files: Option<String>,
}

/// Identifies an in-flight asynchronous job. Created on dispatch, consumed by
/// the poller, discarded on terminal resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub token: String,
    pub flavor: Flavor,
    /// Backend instance that owns the submission. Every poll must carry it so
    /// retries land on the same instance.
    pub region: String,
}

/// Terminal (or still-pending) submission state as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// Execution time in seconds; providers send it as a string.
    #[serde(default, deserialize_with = "de_number_or_string")]
    pub time: Option<f64>,
    /// Peak memory in KB.
    #[serde(default, deserialize_with = "de_number_or_string")]
    pub memory: Option<f64>,
}

/// Outcome of a dispatch: synchronous providers answer with the terminal
/// result directly, asynchronous ones with a handle to poll.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Finished(SubmissionResult),
    Pending(SubmissionHandle),
}

/// A terminal result normalized for the host UI.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NormalizedOutput {
    pub status: SubmissionStatus,
    /// Compile diagnostics ahead of program output, trailing whitespace
    /// trimmed.
    pub output: String,
    pub time_display: String,
    pub memory_display: String,
    /// Wall-clock dispatch-to-result delta, for observability only.
    pub turnaround_ms: u64,
    pub status_line: String,
}

fn de_number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid numeric field '{}': {}", s, e))),
    }
}
