use llamatune_core::{BenchmarkResult, Phase};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub percent_complete: u8,
    pub phase_label: String,
    pub current_step: usize,
    pub total_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Success {
        generation_time_seconds: f64,
        output_tokens: u32,
    },
    Failure {
        error_message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepNotification {
    pub prompt_index: usize,
    pub repetition: u32,
    pub phase: Phase,
    pub outcome: StepOutcome,
}

/// Display-side notifications. Nothing sent here feeds back into the run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BenchmarkEvent {
    Started { total_steps: usize },
    Progress(ProgressEvent),
    Step(StepNotification),
    GenerationFailed { prompt_index: usize, phase: Phase, message: String },
    PhaseChanged { phase: Phase },
    Done { result: Box<BenchmarkResult> },
    Cancelled { result: Box<BenchmarkResult> },
}
