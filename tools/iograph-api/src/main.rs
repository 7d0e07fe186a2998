// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use anyhow::Context;
use clap::{Parser, Subcommand};
use iograph::api::{compare, ApiComparison, ApiSnapshot, Compatibility};
use iograph::id::archetypal_id;
use iograph::{ApiMode, IographConfig, StateDelta, StateDocument};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "iograph-api")]
#[command(about = "Inspect iograph API snapshots, state documents and configuration")]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the archetypal form of element ids
    Archetype {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },

    /// Compare two API snapshots; fails on breaking changes
    CompareApi {
        /// Reference snapshot (JSON)
        #[arg(value_name = "OLD")]
        old: PathBuf,

        /// Candidate snapshot (JSON)
        #[arg(value_name = "NEW")]
        new: PathBuf,

        /// List additions as well as breaking changes
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compute the delta between two state documents
    StateDelta {
        #[arg(value_name = "BASELINE")]
        baseline: PathBuf,

        #[arg(value_name = "CURRENT")]
        current: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rebuild a state document from a baseline and a delta
    ApplyDelta {
        #[arg(value_name = "BASELINE")]
        baseline: PathBuf,

        #[arg(value_name = "DELTA")]
        delta: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Load and validate a configuration file
    CheckConfig {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Write a sample configuration file
    GenConfig {
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "off")]
        mode: ModeArg,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Off,
    Generate,
    Validate,
}

impl From<ModeArg> for ApiMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Off => ApiMode::Off,
            ModeArg::Generate => ApiMode::Generate,
            ModeArg::Validate => ApiMode::Validate,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    match cli.command {
        Commands::Archetype { ids } => {
            for id in ids {
                println!("{}", archetypal_id(&id));
            }
        }
        Commands::CompareApi { old, new, verbose } => cmd_compare_api(&old, &new, verbose)?,
        Commands::StateDelta {
            baseline,
            current,
            output,
        } => cmd_state_delta(&baseline, &current, output.as_deref())?,
        Commands::ApplyDelta {
            baseline,
            delta,
            output,
        } => cmd_apply_delta(&baseline, &delta, output.as_deref())?,
        Commands::CheckConfig { input } => cmd_check_config(&input)?,
        Commands::GenConfig { output, mode } => cmd_gen_config(output.as_deref(), mode.into())?,
    }

    Ok(())
}

fn read_snapshot(path: &Path) -> anyhow::Result<ApiSnapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ApiSnapshot::from_json(&json).with_context(|| format!("Invalid API snapshot {}", path.display()))
}

fn read_document(path: &Path) -> anyhow::Result<StateDocument> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    StateDocument::from_json(&json)
        .with_context(|| format!("Invalid state document {}", path.display()))
}

fn write_output(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("[OK] Written: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn render_comparison(result: &ApiComparison, verbose: bool) -> String {
    let mut out = String::new();
    let verdict = match result.compatibility() {
        Compatibility::Full => "identical",
        Compatibility::Backward => "backward compatible",
        Compatibility::Breaking => "BREAKING",
    };
    out.push_str(&format!(
        "API {} ({} breaking, {} additions)\n",
        verdict,
        result.breaking.len(),
        result.additions.len()
    ));
    for (idx, change) in result.breaking.iter().enumerate() {
        out.push_str(&format!("  {}. [BREAKING] {}\n", idx + 1, change));
    }
    if verbose {
        for (idx, change) in result.additions.iter().enumerate() {
            out.push_str(&format!("  {}. [ADDED] {}\n", idx + 1, change));
        }
    }
    out
}

fn cmd_compare_api(old: &Path, new: &Path, verbose: bool) -> anyhow::Result<()> {
    let result = compare(&read_snapshot(old)?, &read_snapshot(new)?);
    print!("{}", render_comparison(&result, verbose));
    if !result.is_compatible() {
        anyhow::bail!("{} breaking API changes", result.breaking.len());
    }
    Ok(())
}

fn cmd_state_delta(baseline: &Path, current: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let delta = StateDelta::between(&read_document(baseline)?, &read_document(current)?);
    log::info!("{} changed entries", delta.len());
    write_output(output, &serde_json::to_string_pretty(&delta)?)
}

fn cmd_apply_delta(baseline: &Path, delta: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(delta)
        .with_context(|| format!("Failed to read {}", delta.display()))?;
    let delta: StateDelta = serde_json::from_str(&json).context("Invalid state delta")?;
    let document = delta.apply_to(&read_document(baseline)?);
    write_output(output, &document.to_json_pretty()?)
}

fn cmd_check_config(input: &Path) -> anyhow::Result<()> {
    let config = IographConfig::from_file(input)
        .with_context(|| format!("Invalid configuration {}", input.display()))?;
    println!("[OK] Configuration valid: {}", input.display());
    println!("  root: {}", config.root);
    println!("  log_level: {}", config.log_level);
    println!("  api.mode: {:?}", config.api.mode);
    if let Some(reference) = config.load_reference_api()? {
        println!(
            "  api.reference: {} elements, {} types",
            reference.elements.len(),
            reference.types.len()
        );
    }
    Ok(())
}

fn sample_config(mode: ApiMode) -> anyhow::Result<String> {
    let mut config = IographConfig::with_api_mode(mode);
    if mode == ApiMode::Validate {
        config.api.reference = Some(PathBuf::from("api/reference.json"));
    }
    Ok(toml::to_string_pretty(&config)?)
}

fn cmd_gen_config(output: Option<&Path>, mode: ApiMode) -> anyhow::Result<()> {
    write_output(output, &sample_config(mode)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parses_compare() {
        let cli = Cli::try_parse_from(["iograph-api", "compare-api", "old.json", "new.json", "-v"])
            .unwrap();
        assert!(matches!(cli.command, Commands::CompareApi { verbose: true, .. }));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_render_comparison() {
        let result = ApiComparison {
            breaking: vec!["element sim.a removed".into()],
            additions: vec!["element sim.b added".into()],
        };
        let short = render_comparison(&result, false);
        assert!(short.starts_with("API BREAKING (1 breaking, 1 additions)"));
        assert!(!short.contains("[ADDED]"));
        assert!(render_comparison(&result, true).contains("[ADDED] element sim.b added"));
        assert!(render_comparison(&ApiComparison::default(), false).starts_with("API identical"));
    }

    #[test]
    fn test_sample_config_round_trips() {
        let text = sample_config(ApiMode::Validate).unwrap();
        let config = IographConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.api.mode, ApiMode::Validate);
        assert!(config.api.reference.is_some());
    }

    #[test]
    fn test_delta_commands_agree() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("baseline.json");
        let current = dir.path().join("current.json");
        let delta = dir.path().join("delta.json");
        let rebuilt = dir.path().join("rebuilt.json");
        std::fs::File::create(&baseline)
            .unwrap()
            .write_all(br#"{ "sim.a": 1, "sim.b": 2 }"#)
            .unwrap();
        std::fs::File::create(&current)
            .unwrap()
            .write_all(br#"{ "sim.a": 1, "sim.c": 3 }"#)
            .unwrap();

        cmd_state_delta(&baseline, &current, Some(&delta)).unwrap();
        cmd_apply_delta(&baseline, &delta, Some(&rebuilt)).unwrap();
        assert_eq!(read_document(&rebuilt).unwrap(), read_document(&current).unwrap());
    }
}
