use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use tokio::runtime::Runtime;
use tokio::sync::mpsc as tokio_mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use llamatune_benchmark::{run_streaming, BenchmarkEvent, Generator, OllamaClient, OllamaGenerator};
use llamatune_core::{BenchmarkPlan, LlamaTuneConfig, Result};

/// Runs plans off the caller's thread so a synchronous front end can poll.
pub struct BenchmarkService {
    config: LlamaTuneConfig,
}

impl BenchmarkService {
    pub fn new(config: LlamaTuneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LlamaTuneConfig {
        &self.config
    }

    pub fn ollama_client(&self) -> Result<OllamaClient> {
        OllamaClient::with_timeout(&self.config.ollama.host, self.config.ollama.request_timeout())
    }

    /// Benchmark `model` on the configured Ollama host.
    #[instrument(skip(self, plan), fields(prompts = plan.prompts().len(), repetitions = plan.repetitions()))]
    pub fn run_streaming(
        &self,
        plan: BenchmarkPlan,
        model: &str,
    ) -> Result<(Receiver<BenchmarkEvent>, Arc<CancellationToken>)> {
        let generator = OllamaGenerator::new(self.ollama_client()?, model);
        Ok(self.run_streaming_with(plan, Arc::new(generator)))
    }

    pub fn run_streaming_with<G: Generator + 'static>(
        &self,
        plan: BenchmarkPlan,
        generator: Arc<G>,
    ) -> (Receiver<BenchmarkEvent>, Arc<CancellationToken>) {
        info!("Starting streaming benchmark");

        let (std_tx, std_rx) = channel();
        let cancel_token = Arc::new(CancellationToken::new());
        let cancel_clone = cancel_token.clone();
        let base_delay = self.config.defaults.step_delay();

        thread::spawn(move || {
            let rt = match Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let (tokio_tx, mut tokio_rx) = tokio_mpsc::unbounded_channel();

                let runner_cancel = (*cancel_clone).clone();
                let task = tokio::spawn(async move {
                    run_streaming(plan, &*generator, base_delay, runner_cancel, tokio_tx)
                        .await
                });

                while let Some(event) = tokio_rx.recv().await {
                    debug!("Benchmark event: {:?}", std::mem::discriminant(&event));
                    if std_tx.send(event).is_err() {
                        debug!("Benchmark receiver dropped, cancelling");
                        cancel_clone.cancel();
                        break;
                    }
                }

                if let Err(e) = task.await {
                    error!("Benchmark task failed: {}", e);
                }
                info!("Benchmark streaming complete");
            });
        });

        (std_rx, cancel_token)
    }

    /// Cancel a running benchmark
    pub fn cancel(token: &CancellationToken) {
        info!("Cancelling benchmark");
        token.cancel();
    }

    /// Drain whatever events are ready. The receiver is dropped once the run
    /// has finished and the sender side is gone.
    pub fn poll(rx: &mut Option<Receiver<BenchmarkEvent>>) -> Vec<BenchmarkEvent> {
        let Some(receiver) = rx.take() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => {
                    *rx = Some(receiver);
                    break;
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

impl Default for BenchmarkService {
    fn default() -> Self {
        Self::new(LlamaTuneConfig::default())
    }
}
