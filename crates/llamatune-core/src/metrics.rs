use serde::{Deserialize, Serialize};

/// Outcome of a single (prompt, repetition, phase) generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunResult {
    Success {
        generation_time_seconds: f64,
        input_tokens: u32,
        output_tokens: u32,
    },
    Failure {
        error_message: String,
    },
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success { .. })
    }
}

/// Successful runs for one prompt in one phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAccumulator {
    pub times: Vec<f64>,
    pub input_tokens: Vec<u32>,
    pub output_tokens: Vec<u32>,
    pub successful_runs: u32,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false for failed runs, which leave the accumulator untouched.
    pub fn record(&mut self, result: &RunResult) -> bool {
        let RunResult::Success {
            generation_time_seconds,
            input_tokens,
            output_tokens,
        } = result
        else {
            return false;
        };

        self.times.push(*generation_time_seconds);
        self.input_tokens.push(*input_tokens);
        self.output_tokens.push(*output_tokens);
        self.successful_runs += 1;
        true
    }

    pub fn average_time(&self) -> f64 {
        mean(self.times.iter().copied())
    }

    pub fn average_input_tokens(&self) -> f64 {
        mean(self.input_tokens.iter().map(|&t| t as f64))
    }

    pub fn average_output_tokens(&self) -> f64 {
        mean(self.output_tokens.iter().map(|&t| t as f64))
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}
