use crate::output::{fmt_score, print_json, print_table};
use anyhow::Context;
use autonomy_core::confidence::ConfidenceTask;
use autonomy_core::types::Priority;
use autonomy_core::{paths, Services};
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfidenceSubcommand {
    /// Score a candidate task from its metadata and the project logs
    Score {
        /// Task type (e.g. feature, bugfix, refactor)
        #[arg(long = "type", value_name = "TYPE")]
        task_type: String,
        /// Task title
        #[arg(long)]
        title: String,
        /// Task id (default: derived from the title)
        #[arg(long)]
        id: Option<String>,
        /// low, medium, high, or critical
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Estimated cost
        #[arg(long)]
        cost: Option<f64>,
        /// File touched by the task (repeatable)
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,
    },

    /// Map a score onto a decision tier using the configured thresholds
    Decide {
        /// Confidence score, 0-100
        score: f64,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfidenceSubcommand, json: bool) -> anyhow::Result<()> {
    let services = Services::load(root).context("failed to load config")?;
    let engine = services
        .confidence_engine()
        .context("invalid confidence configuration")?;

    match subcmd {
        ConfidenceSubcommand::Score {
            task_type,
            title,
            id,
            priority,
            cost,
            files,
        } => {
            let task = ConfidenceTask {
                id: id.unwrap_or_else(|| task_id(&title)),
                task_type,
                title,
                priority,
                estimated_cost: cost,
                files,
            };
            let result = engine.calculate_confidence(&task);

            if json {
                return print_json(&result);
            }
            println!("Score:    {}", fmt_score(result.score));
            println!("Decision: {}", result.decision);
            println!();
            let rows = result
                .signals
                .iter()
                .map(|s| {
                    vec![
                        s.source.as_str().to_string(),
                        fmt_score(s.value),
                        fmt_score(s.weight),
                    ]
                })
                .collect();
            print_table(&["SOURCE", "VALUE", "WEIGHT"], rows);
            println!();
            for line in &result.reasoning {
                println!("  - {line}");
            }
        }
        ConfidenceSubcommand::Decide { score } => {
            if !(0.0..=100.0).contains(&score) {
                anyhow::bail!("score must be between 0 and 100, got {score}");
            }
            let decision = engine.make_decision(score);
            if json {
                print_json(&serde_json::json!({ "score": score, "decision": decision }))?;
            } else {
                println!("{decision}");
            }
        }
    }
    Ok(())
}

fn task_id(title: &str) -> String {
    let slug = paths::slugify(title);
    if slug.is_empty() {
        "task".to_string()
    } else {
        slug
    }
}
