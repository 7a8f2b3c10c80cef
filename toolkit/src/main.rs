// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model card CLI
//!
//! Usage:
//!   model-card --output-dir ./assets --eval-result ./eval scaffold
//!   model-card --output-dir ./assets update --json card.json
//!   model-card --output-dir ./assets export --template ./assets/template/md/default_template.md.jinja \
//!       --output-name model_card.md --no-autoescape
//!   model-card --lineage-store store.json --model-uri /pipeline/model scaffold

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use model_card_toolkit::assets::DEFAULT_MODEL_CARD_FILE_NAME;
use model_card_toolkit::{CardInput, InMemoryLineageStore, LineageStore, ModelCard, ModelCardToolkit, ToolkitConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "model-card")]
#[command(about = "Scaffold, update and render model cards")]
#[command(version)]
struct Args {
    /// JSON toolkit configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Assets directory (default: a fresh temp directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Evaluation result file or directory (repeatable)
    #[arg(long = "eval-result")]
    eval_results: Vec<PathBuf>,

    /// Only read eval result files with this extension
    #[arg(long)]
    eval_format: Option<String>,

    /// Dataset statistics file or directory (repeatable)
    #[arg(long = "stats")]
    stats: Vec<PathBuf>,

    /// JSON snapshot of a lineage store
    #[arg(long)]
    lineage_store: Option<PathBuf>,

    /// URI of the model artifact in the lineage store
    #[arg(long)]
    model_uri: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a card from the configured sources and write the assets directory
    Scaffold,

    /// Replace the persisted card
    Update {
        /// Card as JSON
        #[arg(long, conflicts_with = "proto", required_unless_present = "proto")]
        json: Option<PathBuf>,

        /// Card in the binary record encoding
        #[arg(long)]
        proto: Option<PathBuf>,
    },

    /// Render the persisted card into model_cards/
    Export {
        /// Template file (default: the built-in HTML template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// File name under model_cards/
        #[arg(long)]
        output_name: Option<String>,

        /// Disable HTML escaping (for Markdown templates)
        #[arg(long, default_value_t = false)]
        no_autoescape: bool,

        /// Print the rendered document to stdout
        #[arg(long, default_value_t = false)]
        print: bool,
    },

    /// Print the persisted card as JSON
    Show,
}

fn load_config(args: &Args) -> Result<ToolkitConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&content).with_context(|| format!("Malformed config: {}", path.display()))?
        }
        None => ToolkitConfig::default(),
    };

    if args.output_dir.is_some() {
        config.output_dir = args.output_dir.clone();
    }
    if args.model_uri.is_some() {
        config.model_uri = args.model_uri.clone();
    }
    if !args.eval_results.is_empty() || !args.stats.is_empty() || args.eval_format.is_some() {
        let mut source = config.source.take().unwrap_or_default();
        if !args.eval_results.is_empty() {
            source.eval_result_paths = args.eval_results.clone();
        }
        if !args.stats.is_empty() {
            source.dataset_statistics_paths = args.stats.clone();
        }
        if args.eval_format.is_some() {
            source.eval_result_file_format = args.eval_format.clone();
        }
        config.source = Some(source);
    }
    if let Command::Export { no_autoescape: true, .. } = args.command {
        config.render.autoescape = false;
    }
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let lineage_store: Option<Box<dyn LineageStore>> = match &args.lineage_store {
        Some(path) => Some(Box::new(InMemoryLineageStore::from_json_file(path)?)),
        None => None,
    };

    let toolkit = ModelCardToolkit::new(config, lineage_store)?;

    match args.command {
        Command::Scaffold => {
            let card = toolkit.scaffold()?;
            let metrics = card.quantitative_analysis.performance_metrics.len();
            let datasets = card.model_parameters.data.len();
            println!("Scaffolded model card in {}", toolkit.output_dir().display());
            println!("  performance metrics: {}", metrics);
            println!("  datasets:            {}", datasets);
        }
        Command::Update { json, proto } => {
            let input = match (json, proto) {
                (Some(path), _) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read card: {}", path.display()))?;
                    CardInput::Structured(ModelCard::from_json(&content)?)
                }
                (None, Some(path)) => CardInput::Serialized(
                    std::fs::read(&path).with_context(|| format!("Failed to read card: {}", path.display()))?,
                ),
                (None, None) => anyhow::bail!("update needs --json or --proto"),
            };
            toolkit.update(input)?;
            println!("Model card updated: {}", toolkit.assets().record_path().display());
        }
        Command::Export {
            template,
            output_name,
            print,
            ..
        } => {
            let content = toolkit.export(None, template.as_deref(), output_name.as_deref())?;
            if print {
                println!("{}", content);
            } else {
                let name = output_name.as_deref().unwrap_or(DEFAULT_MODEL_CARD_FILE_NAME);
                println!("Model card saved to: {}", toolkit.assets().model_cards_dir().join(name).display());
            }
        }
        Command::Show => {
            let card = toolkit.load()?;
            println!("{}", card.to_json_pretty()?);
        }
    }

    Ok(())
}
