//! Client library for Judge0-style remote code execution services.
//!
//! This crate implements the orchestration path a code editor needs to run a
//! user's program remotely: packaging the source into a submission, routing
//! it to one of several provider flavors, polling asynchronous providers
//! until a terminal status, and normalizing the result for display.
//!
//! # Architecture Overview
//!
//! The library is organized around a handful of small subsystems:
//!
//! - **Payload codec**: transport-safe base64 encoding with lossy fallback
//! - **Provider registry**: flavor routing and a per-flavor language cache
//! - **Submission dispatcher**: request construction, validation, and dispatch
//! - **Result poller**: bounded, cancellable status polling with pluggable backoff
//! - **Presenter bridge**: terminal result normalization for the host UI
//! - **Host bridge**: cross-origin style message/event protocol with embedders
//! - **Virtual workspace**: the in-memory multi-file set behind the editor
//! - **Session**: end-to-end orchestration tying the above together

pub mod codec;
pub mod config;
pub mod core_types;
pub mod dispatcher;
pub mod errors;
pub mod host;
pub mod poller;
pub mod presenter;
pub mod registry;
pub mod session;
pub mod workspace;

pub use config::ClientConfig;
pub use core_types::{
    Flavor, LanguageDescriptor, NormalizedOutput, RunOutcome, SubmissionHandle, SubmissionRequest,
    SubmissionResult, SubmissionStatus,
};
pub use dispatcher::Dispatcher;
pub use errors::ClientError;
pub use host::{ChannelSink, EventSink, HostEvent, HostMessage, NullSink};
pub use poller::ResultPoller;
pub use registry::ProviderRegistry;
pub use session::IdeSession;
pub use workspace::VirtualFileSet;

#[cfg(test)]
pub mod test_utils;
