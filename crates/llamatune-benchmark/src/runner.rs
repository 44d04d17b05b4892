//! Step-wise benchmark execution.
//!
//! A [`BenchmarkRunner`] performs exactly one generation per call to
//! [`BenchmarkRunner::step`]; the caller decides when the next one happens.
//! Progress and stop requests are therefore observable between any two
//! runs, whether the driver is a timer, an event loop or [`run_streaming`].

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use llamatune_core::{
    BenchmarkPlan, BenchmarkResult, MetricsAccumulator, Phase, PhaseResult, RunResult, RunStatus,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{BenchmarkEvent, ProgressEvent, StepNotification, StepOutcome};
use crate::generator::{attempt, Generator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Completed | RunnerState::Stopped | RunnerState::Failed
        )
    }
}

#[derive(Debug, Default)]
struct PhaseState {
    accumulators: BTreeMap<usize, MetricsAccumulator>,
    attempts: u32,
    failures: u32,
}

pub struct BenchmarkRunner {
    plan: BenchmarkPlan,
    state: RunnerState,
    current_step: usize,
    primary: PhaseState,
    comparison: PhaseState,
    cancel_token: CancellationToken,
    events: Option<UnboundedSender<BenchmarkEvent>>,
    result: Option<BenchmarkResult>,
}

impl BenchmarkRunner {
    pub fn new(plan: BenchmarkPlan) -> Self {
        Self {
            plan,
            state: RunnerState::Idle,
            current_step: 0,
            primary: PhaseState::default(),
            comparison: PhaseState::default(),
            cancel_token: CancellationToken::new(),
            events: None,
            result: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<BenchmarkEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Share a token so another task can stop the run.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn plan(&self) -> &BenchmarkPlan {
        &self.plan
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn total_steps(&self) -> usize {
        self.plan.total_steps()
    }

    pub fn percent_complete(&self) -> u8 {
        let total = self.total_steps();
        if total == 0 {
            return 0;
        }
        (self.current_step.min(total) * 100 / total) as u8
    }

    /// Phase of the next step to run.
    pub fn current_phase(&self) -> Phase {
        if self.plan.has_comparison() && self.current_step >= self.plan.steps_per_phase() {
            Phase::Comparison
        } else {
            Phase::Primary
        }
    }

    pub fn result(&self) -> Option<&BenchmarkResult> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<BenchmarkResult> {
        self.result
    }

    pub fn start(&mut self) {
        if self.state != RunnerState::Idle {
            debug!("start ignored in state {:?}", self.state);
            return;
        }

        info!(
            prompts = self.plan.prompts().len(),
            repetitions = self.plan.repetitions(),
            comparison = self.plan.has_comparison(),
            "Starting benchmark"
        );
        self.state = RunnerState::Running;
        self.emit(BenchmarkEvent::Started {
            total_steps: self.total_steps(),
        });
        self.emit_progress();
    }

    /// Stop immediately. Only meaningful while running.
    pub fn stop(&mut self) {
        if self.state != RunnerState::Running {
            return;
        }
        info!(step = self.current_step, "Benchmark stopped");
        self.cancel_token.cancel();
        self.finish(RunnerState::Stopped);
    }

    /// Discard all progress and prepare for a new plan.
    pub fn reset(&mut self, plan: BenchmarkPlan) {
        self.plan = plan;
        self.state = RunnerState::Idle;
        self.current_step = 0;
        self.primary = PhaseState::default();
        self.comparison = PhaseState::default();
        self.cancel_token = CancellationToken::new();
        self.result = None;
    }

    /// Run one (prompt, repetition, phase) unit. A no-op unless running.
    pub async fn step<G: Generator + ?Sized>(&mut self, generator: &G) -> RunnerState {
        if self.state != RunnerState::Running {
            return self.state;
        }
        if self.cancel_token.is_cancelled() {
            self.stop_from_token();
            return self.state;
        }

        let per_phase = self.plan.steps_per_phase();
        let repetitions = self.plan.repetitions() as usize;
        let phase = self.current_phase();
        let within_phase = self.current_step % per_phase;
        let prompt_index = within_phase / repetitions;
        let repetition = (within_phase % repetitions) as u32;

        let result = {
            let parameters = match phase {
                Phase::Comparison => self
                    .plan
                    .comparison_parameters()
                    .unwrap_or(self.plan.primary_parameters()),
                Phase::Primary => self.plan.primary_parameters(),
            };
            let prompt = &self.plan.prompts()[prompt_index];
            debug!(step = self.current_step, prompt_index, repetition, ?phase, "Running step");
            attempt(generator, prompt, parameters).await
        };

        // Stopped while the call was in flight: the result is dropped.
        if self.cancel_token.is_cancelled() {
            self.stop_from_token();
            return self.state;
        }

        self.record(phase, prompt_index, repetition, result);
        self.current_step += 1;
        self.emit_progress();

        if self.plan.has_comparison() && self.current_step == per_phase {
            info!("Primary phase complete, switching to comparison configuration");
            self.emit(BenchmarkEvent::PhaseChanged {
                phase: Phase::Comparison,
            });
        }

        if self.current_step >= self.total_steps() {
            let any_success = self.primary.attempts > self.primary.failures
                || self.comparison.attempts > self.comparison.failures;
            let terminal = if any_success {
                RunnerState::Completed
            } else {
                RunnerState::Failed
            };
            self.finish(terminal);
        }

        self.state
    }

    fn record(&mut self, phase: Phase, prompt_index: usize, repetition: u32, result: RunResult) {
        let phase_state = match phase {
            Phase::Primary => &mut self.primary,
            Phase::Comparison => &mut self.comparison,
        };
        phase_state.attempts += 1;

        let outcome = match result {
            RunResult::Success {
                generation_time_seconds,
                output_tokens,
                ..
            } => {
                phase_state
                    .accumulators
                    .entry(prompt_index)
                    .or_default()
                    .record(&result);
                StepOutcome::Success {
                    generation_time_seconds,
                    output_tokens,
                }
            }
            RunResult::Failure { error_message } => {
                phase_state.failures += 1;
                warn!(prompt_index, repetition, ?phase, "Generation failed: {}", error_message);
                self.emit(BenchmarkEvent::GenerationFailed {
                    prompt_index,
                    phase,
                    message: error_message.clone(),
                });
                StepOutcome::Failure { error_message }
            }
        };

        self.emit(BenchmarkEvent::Step(StepNotification {
            prompt_index,
            repetition,
            phase,
            outcome,
        }));
    }

    fn stop_from_token(&mut self) {
        info!(step = self.current_step, "Benchmark cancelled");
        self.finish(RunnerState::Stopped);
    }

    fn finish(&mut self, state: RunnerState) {
        self.state = state;
        let status = match state {
            RunnerState::Stopped => RunStatus::Stopped,
            RunnerState::Failed => RunStatus::Failed,
            _ => RunStatus::Completed,
        };
        let result = self.build_result(status);

        info!(
            status = status.as_str(),
            steps = self.current_step,
            tests = result.primary.summary.total_tests,
            "Benchmark finished"
        );

        let event = match state {
            RunnerState::Stopped => BenchmarkEvent::Cancelled {
                result: Box::new(result.clone()),
            },
            _ => BenchmarkEvent::Done {
                result: Box::new(result.clone()),
            },
        };
        self.result = Some(result);
        self.emit(event);
    }

    fn build_result(&self, status: RunStatus) -> BenchmarkResult {
        let prompts = self.plan.prompts();
        let primary = PhaseResult::from_accumulators(
            self.plan.primary_parameters().clone(),
            prompts,
            &self.primary.accumulators,
            self.primary.attempts,
            self.primary.failures,
        );
        let comparison = self.plan.comparison_parameters().map(|params| {
            PhaseResult::from_accumulators(
                params.clone(),
                prompts,
                &self.comparison.accumulators,
                self.comparison.attempts,
                self.comparison.failures,
            )
        });

        BenchmarkResult {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            status,
            benchmark_type: self.plan.benchmark_type(),
            stress_options: self.plan.stress_options(),
            repetitions: self.plan.repetitions(),
            prompts: prompts.to_vec(),
            primary,
            comparison,
        }
    }

    fn emit_progress(&self) {
        self.emit(BenchmarkEvent::Progress(ProgressEvent {
            percent_complete: self.percent_complete(),
            phase_label: self.current_phase().label().to_string(),
            current_step: self.current_step,
            total_steps: self.total_steps(),
        }));
    }

    fn emit(&self, event: BenchmarkEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Drive a plan to the end, pausing `step_delay` between steps.
///
/// The pause is skipped for rapid-request stress tests and cut short by
/// cancellation.
pub async fn run_streaming<G: Generator + ?Sized>(
    plan: BenchmarkPlan,
    generator: &G,
    base_delay: Duration,
    cancel_token: CancellationToken,
    tx: UnboundedSender<BenchmarkEvent>,
) -> Option<BenchmarkResult> {
    let delay = plan.step_delay(base_delay);
    let mut runner = BenchmarkRunner::new(plan)
        .with_events(tx)
        .with_cancel_token(cancel_token.clone());

    runner.start();

    while runner.step(generator).await == RunnerState::Running {
        if delay.is_zero() {
            continue;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => {}
        }
    }

    runner.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationOutput;
    use async_trait::async_trait;
    use llamatune_core::{
        BenchmarkType, GenerationParameters, LlamaTuneError, PlanRequest, Result,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Returns a fixed output, failing on the listed call numbers.
    struct ScriptedGenerator {
        calls: AtomicUsize,
        fail_on: Vec<usize>,
        seen_temperatures: Mutex<Vec<Option<f64>>>,
        cancel_on: Option<(usize, CancellationToken)>,
    }

    impl ScriptedGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: Vec::new(),
                seen_temperatures: Mutex::new(Vec::new()),
                cancel_on: None,
            }
        }

        fn failing_on(calls: &[usize]) -> Self {
            Self {
                fail_on: calls.to_vec(),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            parameters: &GenerationParameters,
        ) -> Result<GenerationOutput> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_temperatures
                .lock()
                .unwrap()
                .push(parameters.get("temperature").and_then(|v| v.as_f64()));

            if let Some((at, token)) = &self.cancel_on {
                if *at == call {
                    token.cancel();
                }
            }

            if self.fail_on.contains(&call) {
                return Err(LlamaTuneError::OllamaError("model exploded".into()));
            }

            Ok(GenerationOutput {
                response: "ok".into(),
                generation_time_seconds: 1.0,
                input_tokens: 10,
                output_tokens: 20,
            })
        }
    }

    fn plan(prompts: &[&str], repetitions: u32, comparison: bool) -> BenchmarkPlan {
        BenchmarkPlan::new(PlanRequest {
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
            repetitions,
            benchmark_type: if comparison {
                BenchmarkType::Comparison
            } else {
                BenchmarkType::Standard
            },
            primary_parameters: GenerationParameters::new().with("temperature", 0.2),
            comparison_parameters: comparison
                .then(|| GenerationParameters::new().with("temperature", 0.9)),
            stress_options: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_two_prompts_two_reps_scenario() {
        let generator = ScriptedGenerator::new();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 2, false));
        runner.start();

        let mut steps = 0;
        while runner.step(&generator).await == RunnerState::Running {
            steps += 1;
        }
        steps += 1;

        assert_eq!(steps, 4);
        assert_eq!(generator.calls(), 4);
        assert_eq!(runner.state(), RunnerState::Completed);
        assert_eq!(runner.percent_complete(), 100);

        let result = runner.result().unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.comparison.is_none());

        let tests = &result.primary.tests;
        assert_eq!(tests.len(), 2);
        for t in tests {
            assert_eq!(t.average_time_seconds, 1.0);
            assert_eq!(t.average_output_tokens, 20.0);
            assert_eq!(t.tokens_per_second, 20.0);
            assert_eq!(t.successful_runs, 2);
        }

        let summary = &result.primary.summary;
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.total_tokens, 60.0);
        assert_eq!(summary.total_time_seconds, 2.0);
        assert_eq!(summary.average_tokens_per_second, 20.0);
        assert_eq!(summary.average_time_per_test, 1.0);
    }

    #[tokio::test]
    async fn test_comparison_phase_flips_once() {
        let generator = ScriptedGenerator::new();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 2, true));
        assert_eq!(runner.total_steps(), 8);
        runner.start();

        let mut flips = Vec::new();
        let mut last = runner.current_phase();
        while runner.state() == RunnerState::Running {
            let step_index = runner.current_step();
            let phase = runner.current_phase();
            if phase != last {
                flips.push(step_index);
                last = phase;
            }
            runner.step(&generator).await;
        }

        assert_eq!(flips, vec![4]);
        assert_eq!(generator.calls(), 8);

        let temps = generator.seen_temperatures.lock().unwrap().clone();
        assert!(temps[..4].iter().all(|t| *t == Some(0.2)));
        assert!(temps[4..].iter().all(|t| *t == Some(0.9)));

        let result = runner.result().unwrap();
        let comparison = result.comparison.as_ref().unwrap();
        assert_eq!(comparison.summary.total_tests, 2);
        assert_eq!(comparison.parameters.get("temperature").and_then(|v| v.as_f64()), Some(0.9));
    }

    #[tokio::test]
    async fn test_progress_reaches_exactly_100() {
        let generator = ScriptedGenerator::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B", "C"], 1, true)).with_events(tx);
        runner.start();
        while runner.step(&generator).await == RunnerState::Running {}

        let mut percents = Vec::new();
        let mut phase_changes = 0;
        let mut done = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                BenchmarkEvent::Progress(p) => percents.push(p.percent_complete),
                BenchmarkEvent::PhaseChanged { phase } => {
                    assert_eq!(phase, Phase::Comparison);
                    phase_changes += 1;
                }
                BenchmarkEvent::Done { .. } => done = true,
                _ => {}
            }
        }

        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert_eq!(percents.iter().filter(|&&p| p == 100).count(), 1);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(phase_changes, 1);
        assert!(done);
    }

    #[tokio::test]
    async fn test_failed_repetition_is_skipped_not_fatal() {
        // Call 1 is the second repetition of "A".
        let generator = ScriptedGenerator::failing_on(&[1]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 2, false)).with_events(tx);
        runner.start();
        while runner.step(&generator).await == RunnerState::Running {}

        assert_eq!(generator.calls(), 4);
        assert_eq!(runner.state(), RunnerState::Completed);

        let primary = &runner.result().unwrap().primary;
        assert_eq!(primary.attempts, 4);
        assert_eq!(primary.failures, 1);
        assert_eq!(primary.test_for(0).unwrap().successful_runs, 1);
        assert_eq!(primary.test_for(0).unwrap().average_time_seconds, 1.0);
        assert_eq!(primary.test_for(1).unwrap().successful_runs, 2);

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if let BenchmarkEvent::GenerationFailed { prompt_index, .. } = event {
                assert_eq!(prompt_index, 0);
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_all_failures_still_produce_result() {
        let generator = ScriptedGenerator::failing_on(&[0, 1, 2, 3]);
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 2, false));
        runner.start();
        while runner.step(&generator).await == RunnerState::Running {}

        assert_eq!(runner.state(), RunnerState::Failed);
        let result = runner.into_result().unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.primary.tests.is_empty());
        assert_eq!(result.primary.summary.total_tests, 0);
        assert_eq!(result.primary.summary.average_tokens_per_second, 0.0);
        assert_eq!(result.primary.summary.average_time_per_test, 0.0);
    }

    #[tokio::test]
    async fn test_stop_prevents_further_steps() {
        let generator = ScriptedGenerator::new();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 2, false));
        runner.start();
        for _ in 0..3 {
            runner.step(&generator).await;
        }

        runner.stop();
        assert_eq!(runner.state(), RunnerState::Stopped);
        assert_eq!(runner.step(&generator).await, RunnerState::Stopped);
        assert_eq!(generator.calls(), 3);

        let result = runner.result().unwrap();
        assert_eq!(result.status, RunStatus::Stopped);
        assert_eq!(result.primary.test_for(0).unwrap().successful_runs, 2);
        assert_eq!(result.primary.test_for(1).unwrap().successful_runs, 1);
    }

    #[tokio::test]
    async fn test_in_flight_result_discarded_on_cancel() {
        let token = CancellationToken::new();
        let generator = ScriptedGenerator {
            cancel_on: Some((1, token.clone())),
            ..ScriptedGenerator::new()
        };
        let mut runner = BenchmarkRunner::new(plan(&["A"], 3, false)).with_cancel_token(token);
        runner.start();

        assert_eq!(runner.step(&generator).await, RunnerState::Running);
        assert_eq!(runner.step(&generator).await, RunnerState::Stopped);
        assert_eq!(runner.step(&generator).await, RunnerState::Stopped);

        assert_eq!(generator.calls(), 2);
        assert_eq!(runner.current_step(), 1);
        let primary = &runner.result().unwrap().primary;
        assert_eq!(primary.attempts, 1);
        assert_eq!(primary.test_for(0).unwrap().successful_runs, 1);
    }

    #[tokio::test]
    async fn test_misuse_is_a_no_op() {
        let generator = ScriptedGenerator::new();
        let mut runner = BenchmarkRunner::new(plan(&["A"], 1, false));

        runner.stop();
        assert_eq!(runner.state(), RunnerState::Idle);
        assert_eq!(runner.step(&generator).await, RunnerState::Idle);
        assert_eq!(generator.calls(), 0);
        assert!(runner.result().is_none());
    }

    #[tokio::test]
    async fn test_reset_drops_previous_results() {
        let generator = ScriptedGenerator::new();
        let mut runner = BenchmarkRunner::new(plan(&["A", "B"], 1, false));
        runner.start();
        runner.step(&generator).await;
        runner.stop();

        runner.reset(plan(&["C"], 1, false));
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(runner.result().is_none());

        runner.start();
        assert_eq!(runner.step(&generator).await, RunnerState::Completed);
        let result = runner.result().unwrap();
        assert_eq!(result.prompts, vec!["C".to_string()]);
        assert_eq!(result.primary.tests.len(), 1);
        assert_eq!(result.primary.tests[0].successful_runs, 1);
    }

    #[tokio::test]
    async fn test_run_streaming_completes() {
        let generator = ScriptedGenerator::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = run_streaming(
            plan(&["A", "B"], 2, true),
            &generator,
            Duration::ZERO,
            CancellationToken::new(),
            tx,
        )
        .await
        .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(generator.calls(), 8);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(BenchmarkEvent::Done { .. })));
    }

    #[tokio::test]
    async fn test_run_streaming_cancelled_up_front() {
        let generator = ScriptedGenerator::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        token.cancel();

        let result = run_streaming(
            plan(&["A"], 5, false),
            &generator,
            Duration::from_secs(60),
            token,
            tx,
        )
        .await
        .unwrap();

        assert_eq!(result.status, RunStatus::Stopped);
        assert_eq!(generator.calls(), 0);
        assert!(result.primary.tests.is_empty());
    }
}
