//! Benchmark plans and the stress-test prompt transformations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BenchmarkType, GenerationParameters, LlamaTuneError, Result, StressOptions, StressTestType};

const SUMMARIZE_SUFFIX: &str = "Summarize all of the text above in a few concise paragraphs.";

const REASONING_SCAFFOLD: &str = "Work through the following problem carefully, step by step.

Problem:
{prompt}

1. Break the problem down into its component parts.
2. Analyze each part in detail.
3. Consider multiple perspectives or alternative approaches.
4. Connect the parts and explain how they relate to each other.
5. Draw a well-reasoned conclusion and state it clearly.";

/// What the caller asked for. Validated into a [`BenchmarkPlan`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    pub prompts: Vec<String>,
    pub repetitions: u32,
    #[serde(default)]
    pub benchmark_type: BenchmarkType,
    #[serde(default)]
    pub primary_parameters: GenerationParameters,
    #[serde(default)]
    pub comparison_parameters: Option<GenerationParameters>,
    #[serde(default)]
    pub stress_options: Option<StressOptions>,
}

/// An immutable, validated benchmark description.
///
/// `prompts` holds the text actually sent to the model, after any
/// stress-test transformation. Deserializing goes through [`PlanRequest`]
/// and the same validation as [`BenchmarkPlan::new`].
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "PlanRequest")]
pub struct BenchmarkPlan {
    prompts: Vec<String>,
    repetitions: u32,
    benchmark_type: BenchmarkType,
    primary_parameters: GenerationParameters,
    comparison_parameters: Option<GenerationParameters>,
    stress_options: Option<StressOptions>,
}

impl BenchmarkPlan {
    pub fn new(request: PlanRequest) -> Result<Self> {
        let raw: Vec<String> = request
            .prompts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        if raw.is_empty() {
            return Err(LlamaTuneError::InvalidPlan("no prompts given".into()));
        }

        if request.repetitions == 0 {
            return Err(LlamaTuneError::InvalidPlan(
                "repetitions must be at least 1".into(),
            ));
        }

        if request.benchmark_type == BenchmarkType::Comparison
            && request.comparison_parameters.is_none()
        {
            return Err(LlamaTuneError::InvalidPlan(
                "comparison benchmark requires a comparison configuration".into(),
            ));
        }

        let stress_options = match request.benchmark_type {
            BenchmarkType::StressTest => Some(request.stress_options.unwrap_or_default()),
            _ => None,
        };

        let prompts = raw
            .iter()
            .map(|p| transform_prompt(p, stress_options.as_ref()))
            .collect();

        Ok(Self {
            prompts,
            repetitions: request.repetitions,
            benchmark_type: request.benchmark_type,
            primary_parameters: request.primary_parameters,
            comparison_parameters: request.comparison_parameters,
            stress_options,
        })
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn benchmark_type(&self) -> BenchmarkType {
        self.benchmark_type
    }

    pub fn primary_parameters(&self) -> &GenerationParameters {
        &self.primary_parameters
    }

    pub fn comparison_parameters(&self) -> Option<&GenerationParameters> {
        self.comparison_parameters.as_ref()
    }

    pub fn stress_options(&self) -> Option<StressOptions> {
        self.stress_options
    }

    pub fn has_comparison(&self) -> bool {
        self.comparison_parameters.is_some()
    }

    /// Steps in one phase: every prompt, every repetition.
    pub fn steps_per_phase(&self) -> usize {
        self.prompts.len() * self.repetitions as usize
    }

    pub fn total_steps(&self) -> usize {
        if self.has_comparison() {
            self.steps_per_phase() * 2
        } else {
            self.steps_per_phase()
        }
    }

    /// Pause the driver should leave between two steps. Rapid-request stress
    /// tests fire back to back.
    pub fn step_delay(&self, base: Duration) -> Duration {
        match self.stress_options {
            Some(StressOptions {
                test_type: StressTestType::RapidRequests,
                ..
            }) => Duration::ZERO,
            _ => base,
        }
    }
}

impl TryFrom<PlanRequest> for BenchmarkPlan {
    type Error = LlamaTuneError;

    fn try_from(request: PlanRequest) -> Result<Self> {
        Self::new(request)
    }
}

/// One prompt per non-blank line.
pub fn parse_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn transform_prompt(prompt: &str, stress: Option<&StressOptions>) -> String {
    let Some(stress) = stress else {
        return prompt.to_string();
    };

    match stress.test_type {
        StressTestType::LongContext => long_context(prompt, stress.target_token_count),
        StressTestType::ComplexReasoning => REASONING_SCAFFOLD.replace("{prompt}", prompt),
        StressTestType::RapidRequests => prompt.to_string(),
    }
}

/// Word count stands in for token count; roughly two tokens per word.
pub fn long_context_repeats(prompt: &str, target_token_count: u32) -> usize {
    let words = prompt.split_whitespace().count().max(1);
    (target_token_count as usize / (words * 2)).max(1)
}

fn long_context(prompt: &str, target_token_count: u32) -> String {
    let repeats = long_context_repeats(prompt, target_token_count);
    let mut body = vec![prompt; repeats].join("\n\n");
    body.push_str("\n\n");
    body.push_str(SUMMARIZE_SUFFIX);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompts: &[&str], repetitions: u32) -> PlanRequest {
        PlanRequest {
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
            repetitions,
            ..Default::default()
        }
    }

    #[test]
    fn test_standard_prompts_verbatim() {
        let plan = BenchmarkPlan::new(request(&["A", "  B  ", ""], 2)).unwrap();
        assert_eq!(plan.prompts(), &["A".to_string(), "B".to_string()]);
        assert_eq!(plan.total_steps(), 4);
        assert!(!plan.has_comparison());
    }

    #[test]
    fn test_empty_prompts_rejected() {
        let err = BenchmarkPlan::new(request(&["", "   "], 1)).unwrap_err();
        assert!(matches!(err, LlamaTuneError::InvalidPlan(_)));
    }

    #[test]
    fn test_zero_repetitions_rejected() {
        let err = BenchmarkPlan::new(request(&["A"], 0)).unwrap_err();
        assert!(matches!(err, LlamaTuneError::InvalidPlan(_)));
    }

    #[test]
    fn test_comparison_requires_configuration() {
        let mut req = request(&["A"], 1);
        req.benchmark_type = BenchmarkType::Comparison;
        assert!(BenchmarkPlan::new(req.clone()).is_err());

        req.comparison_parameters = Some(GenerationParameters::new().with("temperature", 1.0));
        let plan = BenchmarkPlan::new(req).unwrap();
        assert_eq!(plan.total_steps(), 2);
    }

    #[test]
    fn test_deserialize_validates() {
        let invalid = r#"{"prompts":[],"repetitions":0,"benchmark_type":"Comparison"}"#;
        assert!(serde_json::from_str::<BenchmarkPlan>(invalid).is_err());

        let no_comparison = r#"{"prompts":["A"],"repetitions":1,"benchmark_type":"Comparison"}"#;
        assert!(serde_json::from_str::<BenchmarkPlan>(no_comparison).is_err());

        let valid = r#"{
            "prompts": ["Why?"],
            "repetitions": 2,
            "benchmark_type": "StressTest",
            "stress_options": {"test_type": "ComplexReasoning", "target_token_count": 0}
        }"#;
        let plan: BenchmarkPlan = serde_json::from_str(valid).unwrap();
        assert_eq!(plan.total_steps(), 2);
        assert!(plan.prompts()[0].contains("Problem:\nWhy?"));
    }

    #[test]
    fn test_opt_in_comparison_on_standard() {
        let mut req = request(&["A", "B"], 3);
        req.comparison_parameters = Some(GenerationParameters::new());
        let plan = BenchmarkPlan::new(req).unwrap();
        assert_eq!(plan.steps_per_phase(), 6);
        assert_eq!(plan.total_steps(), 12);
    }

    #[test]
    fn test_long_context_repeats() {
        assert_eq!(long_context_repeats("hello world", 100), 25);
        assert_eq!(long_context_repeats("one two three four five", 4), 1);

        let stress = StressOptions {
            test_type: StressTestType::LongContext,
            target_token_count: 100,
        };
        let out = transform_prompt("hello world", Some(&stress));
        assert_eq!(out.matches("hello world").count(), 25);
        assert!(out.ends_with(SUMMARIZE_SUFFIX));
        assert!(out.starts_with("hello world\n\nhello world"));
    }

    #[test]
    fn test_complex_reasoning_wraps_prompt() {
        let stress = StressOptions {
            test_type: StressTestType::ComplexReasoning,
            target_token_count: 0,
        };
        let out = transform_prompt("Why is the sky blue?", Some(&stress));
        assert!(out.contains("Problem:\nWhy is the sky blue?"));
        assert!(out.contains("5. Draw a well-reasoned conclusion"));
    }

    #[test]
    fn test_rapid_requests_unchanged_and_undelayed() {
        let mut req = request(&["ping"], 10);
        req.benchmark_type = BenchmarkType::StressTest;
        req.stress_options = Some(StressOptions {
            test_type: StressTestType::RapidRequests,
            target_token_count: 0,
        });
        let plan = BenchmarkPlan::new(req).unwrap();
        assert_eq!(plan.prompts()[0], "ping");
        assert_eq!(plan.step_delay(Duration::from_millis(250)), Duration::ZERO);
    }

    #[test]
    fn test_standard_keeps_base_delay() {
        let plan = BenchmarkPlan::new(request(&["A"], 1)).unwrap();
        let base = Duration::from_millis(250);
        assert_eq!(plan.step_delay(base), base);
    }

    #[test]
    fn test_parse_prompts_skips_blank_lines() {
        let text = "first\n\n   \n  second  \nthird";
        assert_eq!(parse_prompts(text), vec!["first", "second", "third"]);
    }
}
