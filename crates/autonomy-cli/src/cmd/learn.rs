use crate::output::{fmt_score, print_json, print_table};
use anyhow::Context;
use autonomy_core::Services;
use chrono::{NaiveDate, TimeZone, Utc};
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum LearnSubcommand {
    /// Extract learnings from the execution log and persist a report
    Extract {
        /// Start of the window, YYYY-MM-DD (default: configured lookback)
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Propose configuration changes backed by execution history
    Propose,

    /// Recompute per-agent skill scores
    Skills,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: LearnSubcommand, json: bool) -> anyhow::Result<()> {
    let services = Services::load(root).context("failed to load config")?;
    let engine = services.learning_engine();

    match subcmd {
        LearnSubcommand::Extract { since } => {
            let since = since
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt));
            let report = engine.extract_learnings(since);
            if json {
                return print_json(&report);
            }
            println!(
                "Report {}: {} learning(s) from {} execution(s)",
                report.id,
                report.learnings.len(),
                report.total_executions
            );
            if report.learnings.is_empty() {
                return Ok(());
            }
            println!();
            let rows = report
                .learnings
                .iter()
                .map(|l| {
                    vec![
                        l.learning_type.to_string(),
                        l.confidence.to_string(),
                        l.sample_size.to_string(),
                        l.title.clone(),
                    ]
                })
                .collect();
            print_table(&["TYPE", "CONFIDENCE", "SAMPLES", "TITLE"], rows);
            if !report.summary.recommended_actions.is_empty() {
                println!("\nRecommended:");
                for action in &report.summary.recommended_actions {
                    println!("  - {action}");
                }
            }
        }
        LearnSubcommand::Propose => {
            let proposals =
                engine.propose_config_updates(&services.config().confidence.thresholds);
            if json {
                return print_json(&proposals);
            }
            if proposals.is_empty() {
                println!("No configuration changes proposed.");
                return Ok(());
            }
            for p in &proposals {
                println!("{} ({} risk)", p.target, p.risk);
                println!("  current:  {}", p.current_value);
                println!("  proposed: {}", p.proposed_value);
                println!("  {}", p.reasoning);
            }
            println!("\nProposals are advisory; edit .autonomy/config.yaml to apply.");
        }
        LearnSubcommand::Skills => {
            let scores = engine.update_skill_scores();
            if json {
                return print_json(&scores);
            }
            if scores.is_empty() {
                println!("No executions in the lookback window.");
                return Ok(());
            }
            let rows = scores
                .iter()
                .map(|s| {
                    vec![
                        s.agent_type.clone(),
                        fmt_score(s.score),
                        s.trend.to_string(),
                        s.sample_size.to_string(),
                    ]
                })
                .collect();
            print_table(&["AGENT", "SCORE", "TREND", "SAMPLES"], rows);
        }
    }
    Ok(())
}
