use crate::output::{fmt_score, print_json, print_table};
use anyhow::Context;
use autonomy_core::benchmark::{BenchmarkRunner, BenchmarkSuite, SuiteResult};
use autonomy_core::Services;
use clap::Subcommand;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum BenchSubcommand {
    /// Run a benchmark suite and persist the result
    Run {
        /// Suite definition (YAML)
        suite: PathBuf,
    },

    /// Show the most recent suite result
    Latest,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: BenchSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        BenchSubcommand::Run { suite } => run_suite(root, &suite, json),
        BenchSubcommand::Latest => latest(root, json),
    }
}

fn run_suite(root: &Path, suite_path: &Path, json: bool) -> anyhow::Result<()> {
    let suite = BenchmarkSuite::load(suite_path)
        .with_context(|| format!("failed to load suite {}", suite_path.display()))?;
    let services = Services::load(root).context("failed to load config")?;
    let runner = services.benchmark_runner();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(runner.run_suite(&suite));

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if !result.all_passed() {
        anyhow::bail!(
            "{} of {} benchmark(s) did not pass",
            result.summary.total - result.summary.passed,
            result.summary.total
        );
    }
    Ok(())
}

fn latest(root: &Path, json: bool) -> anyhow::Result<()> {
    let latest = BenchmarkRunner::latest(root).context("failed to read latest suite result")?;
    match (latest, json) {
        (Some(result), true) => print_json(&result)?,
        (Some(result), false) => print_result(&result),
        (None, true) => print_json(&serde_json::Value::Null)?,
        (None, false) => println!("No benchmark results yet."),
    }
    Ok(())
}

fn print_result(result: &SuiteResult) {
    println!(
        "Suite {} ({}): aggregate {}",
        result.suite_id,
        result.suite_name,
        fmt_score(result.aggregate_score)
    );
    println!();
    let rows = result
        .results
        .iter()
        .map(|r| {
            let status = if r.passed {
                "pass"
            } else if r.errors.is_empty() {
                "fail"
            } else {
                "error"
            };
            vec![
                r.spec_id.clone(),
                fmt_score(r.overall),
                fmt_score(r.threshold),
                status.to_string(),
                format!("{}ms", r.duration_ms),
            ]
        })
        .collect();
    print_table(&["SPEC", "OVERALL", "THRESHOLD", "STATUS", "DURATION"], rows);

    for r in result.results.iter().filter(|r| !r.errors.is_empty()) {
        for e in &r.errors {
            println!("  {}: {e}", r.spec_id);
        }
    }

    let s = &result.summary;
    println!();
    println!(
        "{} total, {} passed, {} failed, {} skipped",
        s.total, s.passed, s.failed, s.skipped
    );
    if !s.dimension_averages.is_empty() {
        let avgs: Vec<String> = s
            .dimension_averages
            .iter()
            .map(|(d, v)| format!("{d} {}", fmt_score(*v)))
            .collect();
        println!("Dimension averages: {}", avgs.join(", "));
    }
}
