use anyhow::Context;
use invoker::{InvokeOutcome, InvokeTask, InvokerConfig};
use log::{debug, info};
use std::path::{Path, PathBuf};

fn load_config() -> anyhow::Result<InvokerConfig> {
    let cfg_data = util::cfg::load_cfg_data()?;
    let path = cfg_data.config_path("invoker");
    if !path.exists() {
        info!("{} not found, using default config", path.display());
        return Ok(InvokerConfig::default());
    }
    InvokerConfig::load(&path)
}

fn load_task(path: &Path) -> anyhow::Result<InvokeTask> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read task from {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("failed to parse task {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    util::log::setup();
    let task_path = match std::env::args_os().nth(1) {
        Some(p) => PathBuf::from(p),
        None => anyhow::bail!("usage: invoker <task.json>"),
    };
    let cfg = load_config().context("failed to load invoker config")?;
    debug!("Config: {:?}", cfg);
    let task = load_task(&task_path)?;

    let (outcome, source_len) = invoker::invoke(&cfg, &task);
    let record = outcome.update_record(source_len);
    println!("{}", serde_json::to_string_pretty(&record)?);
    if let InvokeOutcome::Fault { message } = &outcome {
        let err = anyhow::anyhow!("{}", message);
        util::print_error(err.as_ref());
        std::process::exit(1);
    }
    Ok(())
}
