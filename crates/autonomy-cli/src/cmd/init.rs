use crate::output::print_json;
use anyhow::Context;
use autonomy_core::{config::Config, io, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let dirs = [
        paths::AUTONOMY_DIR,
        paths::LOGS_DIR,
        paths::BENCHMARKS_DIR,
        paths::LEARNINGS_DIR,
    ];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    let created = if config_path.exists() {
        false
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        true
    };

    if json {
        print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": created,
        }))?;
    } else {
        println!("Initialized autonomy in: {}", root.display());
        if created {
            println!("  created: {}", paths::CONFIG_FILE);
        } else {
            println!("  exists:  {}", paths::CONFIG_FILE);
        }
    }
    Ok(())
}
