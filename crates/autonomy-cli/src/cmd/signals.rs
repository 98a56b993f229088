use crate::output::{print_json, print_table};
use anyhow::Context;
use autonomy_core::signals::{PatternFiring, Signal, SignalMetrics, SignalProcessor};
use autonomy_core::{io, paths, Services};
use clap::Subcommand;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum SignalsSubcommand {
    /// Ingest a JSONL file of signals and report metrics and pattern firings
    Replay {
        /// JSONL file, one signal per line
        file: PathBuf,
    },

    /// List the registered patterns
    Patterns,

    /// Poll .autonomy/logs/signals.jsonl and react to patterns
    Watch {
        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: SignalsSubcommand, json: bool) -> anyhow::Result<()> {
    let services = Services::load(root).context("failed to load config")?;
    match subcmd {
        SignalsSubcommand::Replay { file } => replay(&services, &file, json),
        SignalsSubcommand::Patterns => patterns(&services, json),
        SignalsSubcommand::Watch { once } => watch(&services, once, json),
    }
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

fn replay(services: &Services, file: &Path, json: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut signals: Vec<Signal> = io::parse_jsonl(&content);
    signals.sort_by_key(|s| s.timestamp);

    let processor = services.signal_processor();
    let count = signals.len();
    let mut fired = Vec::new();
    for signal in signals {
        // Evaluate at the signal's own time so cooldowns replay faithfully.
        let at = signal.timestamp;
        fired.extend(processor.ingest_at(signal, at));
    }
    let metrics = processor.metrics();

    if json {
        return print_json(&serde_json::json!({
            "ingested": count,
            "metrics": metrics,
            "firings": fired,
        }));
    }
    println!("Ingested {count} signal(s).");
    print_metrics(&metrics);
    print_firings(&fired);
    Ok(())
}

fn print_metrics(metrics: &SignalMetrics) {
    println!();
    let mut rows = Vec::new();
    for (t, n) in &metrics.by_type {
        rows.push(vec!["type".to_string(), t.to_string(), n.to_string()]);
    }
    for (s, n) in &metrics.by_source {
        rows.push(vec!["source".to_string(), s.to_string(), n.to_string()]);
    }
    for (p, n) in &metrics.by_priority {
        rows.push(vec!["priority".to_string(), p.to_string(), n.to_string()]);
    }
    print_table(&["GROUP", "KEY", "COUNT"], rows);
}

fn print_firings(fired: &[PatternFiring]) {
    println!();
    if fired.is_empty() {
        println!("No patterns fired.");
        return;
    }
    let rows = fired
        .iter()
        .map(|f| {
            vec![
                f.pattern_id.clone(),
                f.action.to_string(),
                f.matched_signals.to_string(),
                f.fired_at.to_rfc3339(),
            ]
        })
        .collect();
    print_table(&["PATTERN", "ACTION", "MATCHED", "FIRED AT"], rows);
}

// ---------------------------------------------------------------------------
// patterns
// ---------------------------------------------------------------------------

fn patterns(services: &Services, json: bool) -> anyhow::Result<()> {
    let patterns = services.signal_processor().patterns();
    if json {
        return print_json(&patterns);
    }
    let rows = patterns
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.priority.to_string(),
                format!("{}s", p.cooldown_secs),
                if p.enabled { "yes" } else { "no" }.to_string(),
                p.condition.clone(),
                p.action.to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "PRIORITY", "COOLDOWN", "ENABLED", "CONDITION", "ACTION"],
        rows,
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------------

fn watch(services: &Services, once: bool, json: bool) -> anyhow::Result<()> {
    let processor = services.signal_processor();
    processor
        .register_local_adapter(services.root())
        .context("failed to register local adapter")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if once {
            let outcome = processor.poll_all_adapters().await;
            if json {
                return print_json(&outcome);
            }
            println!(
                "Polled {} signal(s), {} buffered.",
                outcome.received, outcome.buffered
            );
            print_firings(&outcome.fired);
            return Ok(());
        }

        println!(
            "Watching {} (Ctrl-C to stop)",
            paths::signals_log(services.root()).display()
        );
        processor.start().await;
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        processor.stop();
        report_health(&processor, json).await
    })
}

async fn report_health(processor: &SignalProcessor, json: bool) -> anyhow::Result<()> {
    let health = processor.adapter_health().await;
    if json {
        return print_json(&serde_json::json!({
            "metrics": processor.metrics(),
            "firings": processor.firings(),
            "adapters": health,
        }));
    }
    println!("\nStopped. {} signal(s) buffered.", processor.buffer_len());
    let rows = health
        .iter()
        .map(|h| {
            vec![
                h.source.to_string(),
                if h.healthy { "healthy" } else { "unhealthy" }.to_string(),
                h.error_count.to_string(),
                h.message.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["SOURCE", "STATUS", "ERRORS", "MESSAGE"], rows);
    Ok(())
}
