use crate::output::print_json;
use anyhow::Context;
use flowport_core::config::{Config, WarnLevel};
use flowport_core::io::save_result;
use flowport_core::{process_workflow, TranslationEngine};
use llm_backend::BackendConfig;
use std::path::{Path, PathBuf};

pub struct ConvertArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn run(config_path: &Path, args: ConvertArgs, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    if args.dry_run {
        config.backend = BackendConfig::dry_run();
    }

    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter_map(|w| match w.level {
            WarnLevel::Error => Some(w.message),
            WarnLevel::Warning => {
                tracing::warn!("{}", w.message);
                None
            }
        })
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }

    let input = args.input.unwrap_or_else(|| config.input.clone());
    let output = args.output.unwrap_or_else(|| config.output.clone());

    let backend = config
        .backend
        .build()
        .with_context(|| format!("failed to set up {} backend", config.backend.kind()))?;
    let engine = TranslationEngine::new(backend, &config.translation);

    let (result, stats) = process_workflow(&input, &config.schema, &engine)
        .with_context(|| format!("failed to convert {}", input.display()))?;
    let bytes = save_result(&output, &result)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if json {
        print_json(&serde_json::json!({
            "input": input.display().to_string(),
            "output": output.display().to_string(),
            "backend": engine.backend_name(),
            "actions": stats.actions,
            "recorded": stats.recorded,
            "skipped": stats.skipped_without_id,
            "degraded": stats.degraded,
            "failed": stats.failed,
            "bytes": bytes,
        }))?;
    } else {
        println!(
            "Converted {} action(s) from {} ({} failed) -> {}",
            stats.actions,
            input.display(),
            stats.failed,
            output.display()
        );
    }
    Ok(())
}
