//! Result presenter bridge
//!
//! Folds a terminal submission result into the shape the surrounding UI
//! consumes: transport-decoded output with compile diagnostics ahead of
//! program output, display strings for timing and memory with a placeholder
//! when the provider reported none, and the measured turnaround time.

use std::time::Instant;

use crate::codec;
use crate::core_types::{NormalizedOutput, SubmissionResult};

/// Normalize a terminal result for display. `started` is the dispatch start
/// instant; the turnaround delta is observability only and never feeds back
/// into control flow.
pub fn present(result: &SubmissionResult, started: Instant) -> NormalizedOutput {
    let turnaround_ms = started.elapsed().as_millis() as u64;
    log::info!("took {}ms to get submission result", turnaround_ms);

    let stdout = codec::decode_opt(result.stdout.as_deref());
    let compile_output = codec::decode_opt(result.compile_output.as_deref());

    let time_display = match result.time {
        Some(time) => format!("{}s", time),
        None => "-".to_string(),
    };
    let memory_display = match result.memory {
        Some(memory) => format!("{}KB", memory),
        None => "-".to_string(),
    };

    let output = [compile_output, stdout]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string();

    let status_line = format!(
        "{}, {}, {} (TAT: {}ms)",
        result.status.description, time_display, memory_display, turnaround_ms
    );

    NormalizedOutput {
        status: result.status.clone(),
        output,
        time_display,
        memory_display,
        turnaround_ms,
        status_line,
    }
}
