//! End-to-end session orchestration
//!
//! One `IdeSession` owns the editor-facing state, the in-memory file set,
//! and the dispatch/poll/present pipeline for a single editor instance.
//! Independent sessions may run concurrently; the only state they share is
//! the read-mostly provider registry cache.
//!
//! Overlapping runs inside one session are resolved with a generation
//! counter plus a cancellation token: a new `run()` cancels the previous
//! in-flight poll, and a result whose generation has been superseded is
//! dropped without being presented or announced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::core_types::{
    Flavor, LanguageDescriptor, NormalizedOutput, RunOutcome, SubmissionRequest,
};
use crate::dispatcher::Dispatcher;
use crate::errors::ClientError;
use crate::host::{EventSink, HostEvent, HostMessage};
use crate::poller::ResultPoller;
use crate::presenter;
use crate::registry::ProviderRegistry;
use crate::workspace::{language_for_extension, VirtualFileSet};

/// Mutable editor-facing state of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub source_code: String,
    pub language_id: i64,
    pub flavor: Flavor,
    pub stdin: String,
    pub stdout: String,
    pub compiler_options: String,
    pub command_line_arguments: String,
}

pub struct IdeSession {
    registry: Arc<ProviderRegistry>,
    dispatcher: Dispatcher,
    poller: ResultPoller,
    sink: Arc<dyn EventSink>,
    state: Mutex<SessionState>,
    files: Mutex<VirtualFileSet>,
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
}

impl IdeSession {
    pub fn new(config: Arc<ClientConfig>, sink: Arc<dyn EventSink>) -> Self {
        let http = Client::new();
        let defaults = &config.defaults;

        let state = SessionState {
            source_code: defaults.source.clone(),
            language_id: defaults.language_id,
            flavor: defaults.flavor,
            stdin: defaults.stdin.clone(),
            stdout: String::new(),
            compiler_options: defaults.compiler_options.clone(),
            command_line_arguments: defaults.command_line_arguments.clone(),
        };
        let files = VirtualFileSet::new(&defaults.file_name, &defaults.source);

        Self {
            registry: Arc::new(ProviderRegistry::new(config.clone(), http.clone())),
            dispatcher: Dispatcher::new(config.clone(), http.clone(), sink.clone()),
            poller: ResultPoller::new(config, http),
            sink,
            state: Mutex::new(state),
            files: Mutex::new(files),
            generation: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Announce the session to the host. Call once after construction.
    pub async fn start(&self) {
        self.sink.emit(HostEvent::Initialised).await;
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Metadata of the currently selected language.
    pub async fn selected_language(&self) -> Result<LanguageDescriptor, ClientError> {
        let (flavor, language_id) = {
            let state = self.state.lock().await;
            (state.flavor, state.language_id)
        };
        self.registry.get_language(flavor, language_id).await
    }

    /// Dispatch the current source and drive it to a terminal result.
    ///
    /// Returns `Ok(None)` when a newer run superseded this one before its
    /// result arrived; nothing is presented or announced in that case.
    pub async fn run(&self) -> Result<Option<NormalizedOutput>, ClientError> {
        let request = {
            let state = self.state.lock().await;
            SubmissionRequest {
                source_text: state.source_code.clone(),
                language_id: state.language_id,
                flavor: state.flavor,
                stdin: state.stdin.clone(),
                compiler_options: state.compiler_options.clone(),
                command_line_arguments: state.command_line_arguments.clone(),
                additional_files: None,
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = {
            let mut guard = self.cancel.lock().await;
            guard.cancel();
            *guard = CancellationToken::new();
            guard.clone()
        };

        let started = Instant::now();
        let result = match self.dispatcher.run(&request).await {
            Ok(RunOutcome::Finished(result)) => result,
            Ok(RunOutcome::Pending(handle)) => match self.poller.poll(&handle, &cancel).await {
                Ok(result) => result,
                Err(err) => return self.fail(err).await,
            },
            Err(err) => return self.fail(err).await,
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("dropping result of superseded submission");
            return Ok(None);
        }

        let presented = presenter::present(&result, started);
        {
            let mut state = self.state.lock().await;
            state.stdout = presented.output.clone();
        }
        self.sink
            .emit(HostEvent::PostExecution {
                status: result.status.clone(),
                time: result.time,
                memory: result.memory,
                output: presented.output.clone(),
            })
            .await;

        Ok(Some(presented))
    }

    async fn fail(&self, err: ClientError) -> Result<Option<NormalizedOutput>, ClientError> {
        match &err {
            // validation is reported locally, a superseded poll is silent
            ClientError::Validation(_) | ClientError::Superseded => {}
            other => {
                self.sink
                    .emit(HostEvent::RunError {
                        message: other.to_string(),
                        status: other.http_equivalent(),
                    })
                    .await;
            }
        }
        Err(err)
    }

    /// Apply one inbound host message.
    pub async fn handle_message(&self, message: HostMessage) -> Result<(), ClientError> {
        match message {
            HostMessage::Get => {
                let state = self.state.lock().await;
                self.sink
                    .emit(HostEvent::GetResponse {
                        source_code: state.source_code.clone(),
                        language_id: state.language_id,
                        flavor: state.flavor,
                        stdin: state.stdin.clone(),
                        stdout: state.stdout.clone(),
                        compiler_options: state.compiler_options.clone(),
                        command_line_arguments: state.command_line_arguments.clone(),
                    })
                    .await;
                Ok(())
            }
            HostMessage::Set {
                source_code,
                language_id,
                flavor,
                stdin,
                stdout,
                compiler_options,
                command_line_arguments,
                api_key,
            } => {
                {
                    let mut state = self.state.lock().await;
                    if let Some(source_code) = source_code {
                        state.source_code = source_code;
                    }
                    if let Some(language_id) = language_id {
                        state.language_id = language_id;
                    }
                    if let Some(flavor) = flavor {
                        state.flavor = flavor;
                    }
                    if let Some(stdin) = stdin {
                        state.stdin = stdin;
                    }
                    if let Some(stdout) = stdout {
                        state.stdout = stdout;
                    }
                    if let Some(compiler_options) = compiler_options {
                        state.compiler_options = compiler_options;
                    }
                    if let Some(command_line_arguments) = command_line_arguments {
                        state.command_line_arguments = command_line_arguments;
                    }
                }
                if let Some(api_key) = api_key {
                    self.dispatcher.set_api_key(Some(api_key)).await;
                }
                Ok(())
            }
            HostMessage::Run => self.run().await.map(|_| ()),
        }
    }

    /// Open externally supplied content as a new file, selecting the
    /// language from the extension.
    pub async fn open_file(&self, name: &str, content: &str) {
        let extension = name.rsplit('.').next().unwrap_or_default();
        let binding = language_for_extension(extension);

        let mut state = self.state.lock().await;
        let mut files = self.files.lock().await;
        files.create(name, content);

        state.source_code = content.to_string();
        state.language_id = binding.language_id;
        state.flavor = binding.flavor;
    }

    /// Create an empty file and make it current.
    pub async fn create_file(&self, name: &str) {
        self.open_file(name, "").await;
    }

    /// Switch the editor to another file, saving the live buffer first.
    pub async fn switch_file(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let mut files = self.files.lock().await;
        let content = files.switch_to(name, &state.source_code)?;

        let extension = name.rsplit('.').next().unwrap_or_default();
        let binding = language_for_extension(extension);
        state.source_code = content;
        state.language_id = binding.language_id;
        state.flavor = binding.flavor;
        Ok(())
    }

    /// Delete the current file; the editor falls back to another one.
    pub async fn delete_current_file(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        let mut files = self.files.lock().await;
        files.delete_current()?;
        state.source_code = files.current_content().to_string();
        Ok(())
    }

    pub async fn file_names(&self) -> Vec<String> {
        self.files.lock().await.file_names()
    }

    pub async fn current_file(&self) -> String {
        self.files.lock().await.current_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::config::{FlavorConfig, WaitStrategy};
    use crate::host::RecordingSink;
    use crate::test_utils::mock_provider::status_body;
    use crate::test_utils::{DispatchReply, MockProvider};
    use serde_json::json;

    fn session_for(provider: &MockProvider) -> (Arc<IdeSession>, Arc<RecordingSink>) {
        let mut config = ClientConfig::default();
        config.providers.ce = FlavorConfig {
            base_url: provider.base_url(),
            api_key: None,
            api_key_env: None,
        };
        config.polling.wait = WaitStrategy::Constant { ms: 1 };
        let sink = Arc::new(RecordingSink::new());
        (Arc::new(IdeSession::new(Arc::new(config), sink.clone())), sink)
    }

    fn accepted_body(stdout: &str) -> serde_json::Value {
        json!({
            "status": { "id": 3, "description": "Accepted" },
            "stdout": codec::encode(stdout),
            "time": "0.01",
            "memory": 2048
        })
    }

    #[tokio::test]
    async fn test_end_to_end_synchronous_run() {
        let provider = MockProvider::start().await;
        provider.enqueue_dispatch(DispatchReply::Finished(accepted_body("1\n")));
        let (session, sink) = session_for(&provider);

        session
            .handle_message(HostMessage::Set {
                source_code: Some("print(1)".to_string()),
                language_id: Some(71),
                flavor: Some(Flavor::Ce),
                stdin: None,
                stdout: None,
                compiler_options: None,
                command_line_arguments: None,
                api_key: None,
            })
            .await
            .unwrap();

        let output = session.run().await.unwrap().expect("run was not superseded");
        assert_eq!(output.output, "1");
        assert_eq!(output.status.id, 3);

        // session stdout reflects the presented output
        assert_eq!(session.state().await.stdout, "1");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], HostEvent::PreExecution { .. }));
        assert!(matches!(
            &events[1],
            HostEvent::PostExecution { output, .. } if output == "1"
        ));

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_end_to_end_asynchronous_run() {
        let provider = MockProvider::start().await;
        provider.enqueue_dispatch(DispatchReply::Pending {
            token: "tok-1".to_string(),
            region: "sgp".to_string(),
        });
        provider.script_probes(vec![
            status_body(1, "In Queue"),
            status_body(2, "Processing"),
            accepted_body("42\n"),
        ]);
        let (session, _sink) = session_for(&provider);

        let output = session.run().await.unwrap().expect("run was not superseded");
        assert_eq!(output.output, "42");
        assert_eq!(provider.probes().len(), 3);

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_run_supersedes_in_flight_poll() {
        let provider = MockProvider::start().await;
        // first run never terminates on its own
        provider.enqueue_dispatch(DispatchReply::Pending {
            token: "tok-stale".to_string(),
            region: "sgp".to_string(),
        });
        provider.set_probe_fallback(status_body(2, "Processing"));
        // second run completes synchronously
        provider.enqueue_dispatch(DispatchReply::Finished(accepted_body("fresh\n")));

        // slow enough that the stale poll is still waiting when superseded
        let mut config = ClientConfig::default();
        config.providers.ce = FlavorConfig {
            base_url: provider.base_url(),
            api_key: None,
            api_key_env: None,
        };
        config.polling.wait = WaitStrategy::Constant { ms: 200 };
        let sink = Arc::new(RecordingSink::new());
        let session = Arc::new(IdeSession::new(Arc::new(config), sink.clone()));

        let stale_session = session.clone();
        let stale = tokio::spawn(async move { stale_session.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let fresh = session.run().await.unwrap().expect("fresh run completed");
        assert_eq!(fresh.output, "fresh");

        let stale_result = stale.await.unwrap();
        assert!(matches!(stale_result, Err(ClientError::Superseded)));

        // only the fresh run was announced
        let post_events: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, HostEvent::PostExecution { .. }))
            .collect();
        assert_eq!(post_events.len(), 1);
        assert!(matches!(
            &post_events[0],
            HostEvent::PostExecution { output, .. } if output == "fresh"
        ));

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_validation_failure_emits_no_run_error_event() {
        let provider = MockProvider::start().await;
        let (session, sink) = session_for(&provider);

        session
            .handle_message(HostMessage::Set {
                source_code: Some("   ".to_string()),
                language_id: None,
                flavor: None,
                stdin: None,
                stdout: None,
                compiler_options: None,
                command_line_arguments: None,
                api_key: None,
            })
            .await
            .unwrap();

        let result = session.run().await;
        assert!(matches!(result, Err(ClientError::Validation(_))));
        assert!(sink.events().is_empty());
        assert!(provider.dispatch_bodies().is_empty());

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_poll_timeout_emits_run_error_event() {
        let provider = MockProvider::start().await;
        provider.enqueue_dispatch(DispatchReply::Pending {
            token: "tok-slow".to_string(),
            region: "sgp".to_string(),
        });
        provider.set_probe_fallback(status_body(2, "Processing"));

        let mut config = ClientConfig::default();
        config.providers.ce = FlavorConfig {
            base_url: provider.base_url(),
            api_key: None,
            api_key_env: None,
        };
        config.polling.wait = WaitStrategy::Constant { ms: 1 };
        config.polling.max_probe_requests = 3;
        let sink = Arc::new(RecordingSink::new());
        let session = IdeSession::new(Arc::new(config), sink.clone());

        let result = session.run().await;
        assert!(matches!(result, Err(ClientError::PollTimeout)));
        assert_eq!(provider.probes().len(), 3);

        let run_errors: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, HostEvent::RunError { .. }))
            .collect();
        assert_eq!(run_errors.len(), 1);
        assert!(matches!(&run_errors[0], HostEvent::RunError { status: 504, .. }));

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_message_emits_session_snapshot() {
        let provider = MockProvider::start().await;
        let (session, sink) = session_for(&provider);
        session.start().await;

        session.handle_message(HostMessage::Get).await.unwrap();

        let events = sink.events();
        assert_eq!(events[0], HostEvent::Initialised);
        match &events[1] {
            HostEvent::GetResponse { source_code, language_id, flavor, .. } => {
                assert_eq!(source_code, "print(\"hello, world\")\n");
                assert_eq!(*language_id, 71);
                assert_eq!(*flavor, Flavor::Ce);
            }
            other => panic!("expected getResponse, got {:?}", other),
        }

        provider.shutdown().await;
    }

    #[tokio::test]
    async fn test_file_operations_follow_extensions() {
        let provider = MockProvider::start().await;
        let (session, _sink) = session_for(&provider);

        session.open_file("tool.rs", "fn main() {}\n").await;
        let state = session.state().await;
        assert_eq!(state.language_id, 73);
        assert_eq!(state.source_code, "fn main() {}\n");
        assert_eq!(session.current_file().await, "tool.rs");

        session.switch_file("main.py").await.unwrap();
        assert_eq!(session.state().await.language_id, 71);
        assert_eq!(session.file_names().await, vec!["main.py", "tool.rs"]);

        session.delete_current_file().await.unwrap();
        assert_eq!(session.file_names().await, vec!["tool.rs"]);

        provider.shutdown().await;
    }
}
