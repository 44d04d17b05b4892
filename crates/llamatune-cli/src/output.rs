use llamatune_core::{BenchmarkResult, PhaseResult};
use llamatune_services::local_time;

pub fn print_table(result: &BenchmarkResult) {
    println!();
    println!(
        "Results ({}, {}):",
        result.benchmark_type.label(),
        result.status.as_str()
    );
    if let Some(stress) = result.stress_options {
        println!(
            "  Stress: {} (target {} tokens)",
            stress.test_type.label(),
            stress.target_token_count
        );
    }
    println!("  Run:    {} at {}", result.id, local_time(result.timestamp).format("%Y-%m-%d %H:%M:%S"));

    print_phase("Primary configuration", &result.primary);

    let Some(comparison) = &result.comparison else {
        println!();
        return;
    };

    print_phase("Comparison configuration", comparison);

    let changes = result.primary.parameters.diff(&comparison.parameters);
    if !changes.is_empty() {
        println!();
        println!("  Changed parameters:");
        for change in changes {
            let before = change
                .primary
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("    {:<20} {} -> {}", change.name, before, change.comparison);
        }
    }

    println!();
    match result.comparison_delta() {
        Some(delta) if delta.percent == 0.0 => {
            println!("  Comparison configuration performs the same as the primary.")
        }
        Some(delta) => println!(
            "  Comparison configuration is {:.2}% {} than the primary.",
            delta.percent.abs(),
            delta.verdict()
        ),
        None => println!("  Not enough successful runs to compare throughput."),
    }

    for (prompt_index, delta) in result.prompt_deltas() {
        println!(
            "    Prompt {:<3} {:+.2}% ({})",
            prompt_index + 1,
            delta.percent,
            delta.verdict()
        );
    }
    println!();
}

fn print_phase(title: &str, phase: &PhaseResult) {
    println!();
    println!("{}", title);
    println!("{:-<72}", "");

    let params: Vec<String> = phase
        .parameters
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    if !params.is_empty() {
        println!("  Parameters: {}", params.join(" "));
    }

    println!(
        "  {:<4} {:>10} {:>10} {:>10} {:>10} {:>6}  {}",
        "#", "Time (s)", "In tok", "Out tok", "Tok/s", "Runs", "Prompt"
    );
    for test in &phase.tests {
        println!(
            "  {:<4} {:>10.2} {:>10.1} {:>10.1} {:>10.2} {:>6}  {}",
            test.prompt_index + 1,
            test.average_time_seconds,
            test.average_input_tokens,
            test.average_output_tokens,
            test.tokens_per_second,
            test.successful_runs,
            preview(&test.prompt, 40)
        );
    }

    let s = &phase.summary;
    println!("{:-<72}", "");
    println!("  Tests:          {}", s.total_tests);
    println!("  Total tokens:   {:.1}", s.total_tokens);
    println!("  Total time:     {:.2} s", s.total_time_seconds);
    println!("  Avg tokens/s:   {:.2}", s.average_tokens_per_second);
    println!("  Avg time/test:  {:.2} s", s.average_time_per_test);
    println!("  Attempts:       {} ({} failed)", phase.attempts, phase.failures);
}

pub fn print_csv(result: &BenchmarkResult) {
    println!("phase,prompt_index,average_time_seconds,average_input_tokens,average_output_tokens,tokens_per_second,successful_runs");
    let phases = std::iter::once(("primary", &result.primary))
        .chain(result.comparison.iter().map(|c| ("comparison", c)));

    for (name, phase) in phases {
        for t in &phase.tests {
            println!(
                "{},{},{:.4},{:.2},{:.2},{:.4},{}",
                name,
                t.prompt_index,
                t.average_time_seconds,
                t.average_input_tokens,
                t.average_output_tokens,
                t.tokens_per_second,
                t.successful_runs
            );
        }
    }
}

/// First line of a prompt, cut to `max` characters.
pub fn preview(prompt: &str, max: usize) -> String {
    let line = prompt.lines().next().unwrap_or_default();
    if line.chars().count() <= max && !prompt.contains('\n') {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Leading eight characters of a result id.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
