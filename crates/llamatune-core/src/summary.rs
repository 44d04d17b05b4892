use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{BenchmarkType, GenerationParameters, MetricsAccumulator, StressOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub prompt_index: usize,
    pub prompt: String,
    pub average_time_seconds: f64,
    pub average_input_tokens: f64,
    pub average_output_tokens: f64,
    pub tokens_per_second: f64,
    pub successful_runs: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub total_tests: u32,
    pub total_tokens: f64,
    pub total_output_tokens: f64,
    pub total_time_seconds: f64,
    pub average_tokens_per_second: f64,
    pub average_time_per_test: f64,
}

/// Reduce one phase's accumulators. Prompts that never succeeded are left
/// out entirely rather than counted as zeros.
pub fn summarize(
    prompts: &[String],
    accumulators: &BTreeMap<usize, MetricsAccumulator>,
) -> (Vec<PromptSummary>, BenchmarkSummary) {
    let mut tests = Vec::with_capacity(accumulators.len());
    let mut summary = BenchmarkSummary::default();

    for (&prompt_index, acc) in accumulators {
        if acc.successful_runs == 0 {
            continue;
        }

        let average_time_seconds = acc.average_time();
        let average_input_tokens = acc.average_input_tokens();
        let average_output_tokens = acc.average_output_tokens();

        summary.total_tests += 1;
        summary.total_tokens += average_input_tokens + average_output_tokens;
        summary.total_output_tokens += average_output_tokens;
        summary.total_time_seconds += average_time_seconds;

        tests.push(PromptSummary {
            prompt_index,
            prompt: prompts.get(prompt_index).cloned().unwrap_or_default(),
            average_time_seconds,
            average_input_tokens,
            average_output_tokens,
            tokens_per_second: ratio(average_output_tokens, average_time_seconds),
            successful_runs: acc.successful_runs,
        });
    }

    summary.average_tokens_per_second =
        ratio(summary.total_output_tokens, summary.total_time_seconds);
    summary.average_time_per_test =
        ratio(summary.total_time_seconds, summary.total_tests as f64);

    (tests, summary)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        }
    }
}

/// Everything measured under one parameter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub parameters: GenerationParameters,
    pub tests: Vec<PromptSummary>,
    pub summary: BenchmarkSummary,
    pub attempts: u32,
    pub failures: u32,
}

impl PhaseResult {
    pub fn from_accumulators(
        parameters: GenerationParameters,
        prompts: &[String],
        accumulators: &BTreeMap<usize, MetricsAccumulator>,
        attempts: u32,
        failures: u32,
    ) -> Self {
        let (tests, summary) = summarize(prompts, accumulators);
        Self {
            parameters,
            tests,
            summary,
            attempts,
            failures,
        }
    }

    pub fn test_for(&self, prompt_index: usize) -> Option<&PromptSummary> {
        self.tests.iter().find(|t| t.prompt_index == prompt_index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub id: String,
    pub timestamp: i64,
    pub status: RunStatus,
    pub benchmark_type: BenchmarkType,
    #[serde(default)]
    pub stress_options: Option<StressOptions>,
    pub repetitions: u32,
    pub prompts: Vec<String>,
    pub primary: PhaseResult,
    #[serde(default)]
    pub comparison: Option<PhaseResult>,
}

impl BenchmarkResult {
    /// Percent change in average tokens/sec of the comparison configuration
    /// relative to the primary one.
    pub fn comparison_delta(&self) -> Option<PerformanceDelta> {
        let comparison = self.comparison.as_ref()?;
        PerformanceDelta::between(
            self.primary.summary.average_tokens_per_second,
            comparison.summary.average_tokens_per_second,
        )
    }

    /// Per-prompt deltas for prompts that succeeded in both phases.
    pub fn prompt_deltas(&self) -> Vec<(usize, PerformanceDelta)> {
        let Some(comparison) = self.comparison.as_ref() else {
            return Vec::new();
        };

        comparison
            .tests
            .iter()
            .filter_map(|comp| {
                let base = self.primary.test_for(comp.prompt_index)?;
                let delta = PerformanceDelta::between(base.tokens_per_second, comp.tokens_per_second)?;
                Some((comp.prompt_index, delta))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceDelta {
    pub percent: f64,
}

impl PerformanceDelta {
    /// `None` unless the base throughput is positive.
    pub fn between(base: f64, comparison: f64) -> Option<Self> {
        if base <= 0.0 {
            return None;
        }
        Some(Self {
            percent: (comparison - base) / base * 100.0,
        })
    }

    pub fn verdict(&self) -> &'static str {
        if self.percent > 0.0 {
            "faster"
        } else if self.percent < 0.0 {
            "slower"
        } else {
            "the same"
        }
    }
}
