mod atomic;
mod checkpoint;
mod cli;
mod config;
mod cost;
mod logging;
mod merge;
mod output;
mod pricing;
mod record;
mod savings;
mod scan;
mod types;

use std::fs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;

use cli::{Cli, Command, MergeArgs, OutputFormat};
use config::Paths;
use merge::ProviderPatch;
use types::SavingsReport;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn print_report(report: &SavingsReport, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => output::print_json(report),
        OutputFormat::Table => {
            output::print_table(report);
            Ok(())
        }
    }
}

/// Build the combined patch: file patch first, then the provider flags.
fn build_patch(args: &MergeArgs) -> Result<serde_json::Value> {
    let mut patch = serde_json::Value::Object(serde_json::Map::new());

    if let Some(path) = &args.patch {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read patch {}", path.display()))?;
        let file_patch: serde_json::Value = serde_json::from_str(&data)
            .with_context(|| format!("Invalid patch document {}", path.display()))?;
        if !file_patch.is_object() {
            bail!("patch {} must be a JSON object", path.display());
        }
        patch = merge::merge(&patch, &file_patch);
    }

    if let (Some(provider), Some(model)) = (&args.provider, &args.model) {
        let flags = ProviderPatch {
            provider: provider.clone(),
            model: model.clone(),
            base_url: args.base_url.clone(),
            api: args.api.clone(),
            api_key: args.api_key.clone(),
        };
        patch = merge::merge(&patch, &flags.to_document());
    }

    if patch.as_object().is_some_and(|m| m.is_empty()) {
        bail!("nothing to merge: pass --patch or --provider/--model");
    }
    Ok(patch)
}

fn run_merge(args: &MergeArgs, paths: &Paths) -> Result<()> {
    let target = args.config.as_ref().unwrap_or(&paths.openclaw_config);
    let patch = build_patch(args)?;

    if args.dry_run {
        let merged = merge::merge(&merge::load_document(target), &patch);
        println!("{}", serde_json::to_string_pretty(&merged)?);
        return Ok(());
    }

    let outcome = merge::apply(target, &patch, now_millis())?;
    if let Some(backup) = &outcome.backup {
        eprintln!("Backed up {} to {}", target.display(), backup.display());
    }
    eprintln!("Wrote {}", target.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_warning) = config::load_config();
    logging::init(cli.verbose, config.log_level.as_deref());
    if let Some(msg) = config_warning {
        warn!("{msg}");
    }

    let mut paths = config.resolve();
    if !cli.roots.is_empty() {
        paths.record_roots = cli.roots.clone();
    }
    if let Some(path) = &cli.checkpoint {
        paths.checkpoint = path.clone();
    }
    if let Some(path) = &cli.pricing {
        paths.pricing = path.clone();
    }

    match cli.effective_command() {
        Command::Report { peek } => {
            let mode = if peek {
                savings::RunMode::Peek
            } else {
                savings::RunMode::Commit
            };
            let report = savings::run(&paths, now_millis(), mode)?;
            print_report(&report, &cli.format)
        }
        Command::Lifetime => print_report(&savings::lifetime(&paths), &cli.format),
        Command::Merge(args) => run_merge(&args, &paths),
    }
}
