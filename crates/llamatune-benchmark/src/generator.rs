use async_trait::async_trait;
use llamatune_core::{GenerationParameters, Result, RunResult};

/// Metrics the model reported for one successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub response: String,
    pub generation_time_seconds: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl From<GenerationOutput> for RunResult {
    fn from(out: GenerationOutput) -> Self {
        RunResult::Success {
            generation_time_seconds: out.generation_time_seconds,
            input_tokens: out.input_tokens,
            output_tokens: out.output_tokens,
        }
    }
}

/// Produces one model completion for a prompt under the given options.
///
/// Implementations own their timeouts. Model-level failures come back as
/// `Err`; the runner records them as failed attempts and keeps going.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationOutput>;
}

/// Run the generator and fold the outcome into a fixed-shape result.
pub async fn attempt<G: Generator + ?Sized>(
    generator: &G,
    prompt: &str,
    parameters: &GenerationParameters,
) -> RunResult {
    match generator.generate(prompt, parameters).await {
        Ok(out) => out.into(),
        Err(e) => RunResult::Failure {
            error_message: e.to_string(),
        },
    }
}
