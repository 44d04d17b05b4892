mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use llamatune_core::{
    parse_prompts, BenchmarkPlan, BenchmarkResult, BenchmarkType, GenerationParameters,
    LlamaTuneConfig, PlanRequest, Preset, StressOptions, StressTestType,
};
use llamatune_services::{
    default_config_path, export, local_time, BenchmarkEvent, BenchmarkService, ResultStore,
    StepOutcome,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "llamatune")]
#[command(about = "LlamaTune - compare Ollama generation parameters", long_about = None)]
struct Cli {
    /// Config file (JSON). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models
    Models,

    /// Show the built-in parameter presets
    Presets,

    /// Run a benchmark
    Benchmark(BenchmarkArgs),

    /// List or show saved results
    Results {
        /// Show one result by id (prefix is enough)
        id: Option<String>,
    },

    /// Show system status
    Status,

    /// Print the effective config, or write it out with --init
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[derive(clap::Args)]
struct BenchmarkArgs {
    /// Model to benchmark (falls back to the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Prompt to send; repeat for several prompts
    #[arg(short, long = "prompt")]
    prompts: Vec<String>,

    /// File with one prompt per line
    #[arg(long)]
    prompts_file: Option<PathBuf>,

    /// Built-in prompt set (default, coding, reasoning, factual, creative)
    #[arg(long)]
    prompt_set: Option<String>,

    /// Runs per prompt and configuration
    #[arg(short, long)]
    repetitions: Option<u32>,

    /// Benchmark type
    #[arg(short = 't', long = "type", value_enum, default_value_t = TypeArg::Standard)]
    benchmark_type: TypeArg,

    /// Preset for the primary configuration
    #[arg(long)]
    preset: Option<String>,

    /// Primary parameter override, e.g. temperature=0.2
    #[arg(long = "param")]
    params: Vec<String>,

    /// Preset for the comparison configuration
    #[arg(long)]
    compare_preset: Option<String>,

    /// Comparison parameter override; implies a comparison phase
    #[arg(long = "compare-param")]
    compare_params: Vec<String>,

    /// Stress test variant
    #[arg(long, value_enum, default_value_t = StressArg::RapidRequests)]
    stress_type: StressArg,

    /// Target context size for long-context stress tests
    #[arg(long, default_value = "2048")]
    target_tokens: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputArg::Table)]
    output: OutputArg,

    /// Save the result to the results directory
    #[arg(long)]
    save: bool,

    /// Also write the result JSON to this path
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    Standard,
    Comparison,
    Stress,
}

impl From<TypeArg> for BenchmarkType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Standard => BenchmarkType::Standard,
            TypeArg::Comparison => BenchmarkType::Comparison,
            TypeArg::Stress => BenchmarkType::StressTest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StressArg {
    LongContext,
    RapidRequests,
    ComplexReasoning,
}

impl From<StressArg> for StressTestType {
    fn from(arg: StressArg) -> Self {
        match arg {
            StressArg::LongContext => StressTestType::LongContext,
            StressArg::RapidRequests => StressTestType::RapidRequests,
            StressArg::ComplexReasoning => StressTestType::ComplexReasoning,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputArg {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(p) => Some(p.clone()),
        None => default_config_path(),
    };
    let config = load_config(config_path.as_deref())?;

    match cli.command {
        Some(Commands::Models) => cmd_models(&config).await?,
        Some(Commands::Presets) => cmd_presets(),
        Some(Commands::Benchmark(args)) => cmd_benchmark(config, args).await?,
        Some(Commands::Results { id }) => cmd_results(&config, id.as_deref())?,
        Some(Commands::Config { init }) => cmd_config(&config, config_path.as_deref(), init)?,
        Some(Commands::Status) | None => cmd_status(&config).await?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LlamaTuneConfig> {
    let config = match path {
        Some(p) => LlamaTuneConfig::load(p)?,
        None => LlamaTuneConfig::default(),
    };
    Ok(config.with_env_overrides())
}

fn cmd_config(config: &LlamaTuneConfig, path: Option<&Path>, init: bool) -> Result<()> {
    if !init {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let Some(path) = path else {
        bail!("No config directory available; pass --config");
    };
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    config.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn cmd_models(config: &LlamaTuneConfig) -> Result<()> {
    let client = BenchmarkService::new(config.clone()).ollama_client()?;
    let models = client.list_models().await?;

    println!();
    println!("Available Models:");
    println!("{:-<72}", "");
    println!("  {:<4} {:<40} {:<10} {}", "#", "Name", "Size", "Quantization");
    println!("{:-<72}", "");
    for (i, m) in models.iter().enumerate() {
        let size = m.parameter_size.as_deref().unwrap_or("-");
        let quant = m.quantization.as_deref().unwrap_or("-");
        println!("  {:<4} {:<40} {:<10} {}", i + 1, m.name, size, quant);
    }
    println!();

    Ok(())
}

fn cmd_presets() {
    println!();
    for preset in Preset::all() {
        let params: Vec<String> = preset
            .parameters()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!("  {:<14} {}", preset.label(), params.join(" "));
    }
    println!();
}

async fn cmd_status(config: &LlamaTuneConfig) -> Result<()> {
    println!("System Status:");
    println!("{:-<40}", "");
    println!("  Ollama Host: {}", config.ollama.host);
    if let Some(model) = &config.ollama.model {
        println!("  Default Model: {}", model);
    }

    let client = BenchmarkService::new(config.clone()).ollama_client()?;
    match client.list_models().await {
        Ok(models) => println!("  Ollama: connected ({} models available)", models.len()),
        Err(e) => println!("  Ollama: disconnected ({})", e),
    }

    Ok(())
}

fn cmd_results(config: &LlamaTuneConfig, id: Option<&str>) -> Result<()> {
    let store = ResultStore::new(config.results.directory.clone())?;

    if let Some(id) = id {
        let Some(stored) = store.get(id)? else {
            bail!("No saved result matching '{}'", id);
        };
        output::print_table(&stored.result);
        return Ok(());
    }

    let saved = store.list()?;
    println!();
    println!("Saved results in {}:", store.dir().display());
    println!("{:-<72}", "");
    for s in saved {
        let r = &s.result;
        println!(
            "  {:<10} {}  {:<11} {:<10} {:>8.2} tok/s",
            output::short_id(&r.id),
            local_time(r.timestamp).format("%Y-%m-%d %H:%M"),
            r.benchmark_type.label(),
            r.status.as_str(),
            r.primary.summary.average_tokens_per_second
        );
    }
    println!();
    Ok(())
}

fn build_plan(config: &LlamaTuneConfig, args: &BenchmarkArgs) -> Result<BenchmarkPlan> {
    let mut prompts = args.prompts.clone();
    if let Some(path) = &args.prompts_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading prompts from {}", path.display()))?;
        prompts.extend(parse_prompts(&text));
    }
    if let Some(set) = &args.prompt_set {
        prompts.extend(prompt_set(set));
    }
    if prompts.is_empty() {
        prompts = prompt_set("default");
    }

    let preset_name = args.preset.as_deref().unwrap_or(&config.defaults.preset);
    let mut primary = Preset::from_name(preset_name)?.parameters();
    apply_overrides(&mut primary, &args.params)?;

    let wants_comparison = matches!(args.benchmark_type, TypeArg::Comparison)
        || args.compare_preset.is_some()
        || !args.compare_params.is_empty();

    let comparison = if wants_comparison {
        let mut params = match &args.compare_preset {
            Some(name) => Preset::from_name(name)?.parameters(),
            None => primary.clone(),
        };
        apply_overrides(&mut params, &args.compare_params)?;
        Some(params)
    } else {
        None
    };

    let plan = BenchmarkPlan::new(PlanRequest {
        prompts,
        repetitions: args.repetitions.unwrap_or(config.defaults.repetitions),
        benchmark_type: args.benchmark_type.into(),
        primary_parameters: primary,
        comparison_parameters: comparison,
        stress_options: Some(StressOptions {
            test_type: args.stress_type.into(),
            target_token_count: args.target_tokens,
        }),
    })?;

    Ok(plan)
}

fn apply_overrides(params: &mut GenerationParameters, overrides: &[String]) -> Result<()> {
    for assignment in overrides {
        params.apply_override(assignment)?;
    }
    Ok(())
}

async fn cmd_benchmark(config: LlamaTuneConfig, args: BenchmarkArgs) -> Result<()> {
    let Some(model) = args.model.clone().or_else(|| config.ollama.model.clone()) else {
        bail!("No model given. Use --model or set ollama.model in the config file");
    };

    let plan = build_plan(&config, &args)?;
    tracing::debug!(
        model = %model,
        steps = plan.total_steps(),
        "Benchmark plan ready"
    );
    let quiet = args.output != OutputArg::Table;

    if !quiet {
        println!();
        println!("Running {} benchmark...", plan.benchmark_type().label());
        println!("  Model:       {}", model);
        println!("  Prompts:     {}", plan.prompts().len());
        println!("  Repetitions: {}", plan.repetitions());
        println!("  Steps:       {}", plan.total_steps());
        println!("  (Ctrl-C stops after the current run)");
        println!();
    }

    let service = BenchmarkService::new(config.clone());
    let (rx, cancel) = service.run_streaming(plan, &model)?;

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            BenchmarkService::cancel(&ctrl_c_cancel);
        }
    });

    let mut rx = Some(rx);
    let mut result: Option<BenchmarkResult> = None;
    while rx.is_some() {
        for event in BenchmarkService::poll(&mut rx) {
            if let Some(done) = show_event(event, quiet) {
                result = Some(done);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let Some(result) = result else {
        bail!("Benchmark ended without a result");
    };

    match args.output {
        OutputArg::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputArg::Csv => output::print_csv(&result),
        OutputArg::Table => output::print_table(&result),
    }

    if args.save {
        let store = ResultStore::new(config.results.directory.clone())?;
        let path = store.save(&result)?;
        eprintln!("Saved result to {}", path.display());
    }

    if let Some(path) = &args.export {
        export(&result, path)?;
        eprintln!("Exported result to {}", path.display());
    }

    Ok(())
}

/// Print live progress; hands back the final result when one arrives.
fn show_event(event: BenchmarkEvent, quiet: bool) -> Option<BenchmarkResult> {
    match event {
        BenchmarkEvent::Done { result } | BenchmarkEvent::Cancelled { result } => Some(*result),
        _ if quiet => None,
        BenchmarkEvent::Started { total_steps } => {
            println!("Started: {} steps", total_steps);
            None
        }
        BenchmarkEvent::Progress(p) => {
            println!(
                "[{:>3}%] {}/{} ({})",
                p.percent_complete, p.current_step, p.total_steps, p.phase_label
            );
            None
        }
        BenchmarkEvent::Step(step) => {
            if let StepOutcome::Success {
                generation_time_seconds,
                output_tokens,
            } = step.outcome
            {
                println!(
                    "  prompt {} run {}: {} tokens in {:.2}s",
                    step.prompt_index + 1,
                    step.repetition + 1,
                    output_tokens,
                    generation_time_seconds
                );
            }
            None
        }
        BenchmarkEvent::GenerationFailed {
            prompt_index,
            message,
            ..
        } => {
            println!("  prompt {} failed: {}", prompt_index + 1, message);
            None
        }
        BenchmarkEvent::PhaseChanged { phase } => {
            println!();
            println!("Switching to {} configuration", phase.label().to_lowercase());
            None
        }
    }
}

fn prompt_set(set: &str) -> Vec<String> {
    let prompts: &[&str] = match set {
        "coding" => &[
            "Write a Python function to calculate the factorial of a number.",
            "Implement a binary search algorithm.",
            "Create a simple HTTP server in Rust.",
        ],
        "reasoning" => &[
            "If all roses are flowers and some flowers fade quickly, can we conclude that some roses fade quickly?",
            "Sort the following list in descending order: 5, 2, 9, 1, 7, 3.",
            "A train leaves at 9am traveling at 60mph. Another leaves at 10am at 80mph. When do they meet?",
        ],
        "factual" => &[
            "Explain how a transformer neural network works.",
            "Who wrote Romeo and Juliet?",
            "What is the speed of light in vacuum?",
        ],
        "creative" => &[
            "Write a short poem about artificial intelligence.",
            "Describe a futuristic city in 3 sentences.",
            "Create a short story opening about a robot.",
        ],
        _ => &[
            "Hello, how are you today?",
            "Explain what machine learning is in simple terms.",
            "Summarize the key features of neural networks.",
            "Explain the difference between supervised and unsupervised learning.",
        ],
    };
    prompts.iter().map(|s| s.to_string()).collect()
}
