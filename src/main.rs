use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use survey_prep::config::PipelineConfig;
use survey_prep::logging;
use survey_prep::nlp::EnglishToolkit;
use survey_prep::observability;
use survey_prep::pipeline::{override_path, CleanResult, Pipeline, TokenizeResult};
use survey_prep::storage::CsvTableStore;

#[derive(Parser)]
#[command(name = "survey_prep")]
#[command(about = "Clean and tokenize survey exports for analysis")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raw export to read
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Where the cleaned table is written (and read by `tokenize`)
    #[arg(long, global = true)]
    cleaned: Option<PathBuf>,

    /// Where the column dictionary is written
    #[arg(long, global = true)]
    dictionary: Option<PathBuf>,

    /// Where the tokenized table is written
    #[arg(long, global = true)]
    tokenized: Option<PathBuf>,

    /// Write a Prometheus text snapshot of this run's metrics
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize column names, apply quality rules, write the cleaned table and dictionary
    Clean,
    /// Tokenize the free-text columns of a cleaned table
    Tokenize,
    /// Run clean then tokenize
    Run,
}

fn print_clean_summary(result: &CleanResult) {
    println!("\n📊 Cleaning Results:");
    println!("   Input file: {}", result.input_file.display());
    println!(
        "   Rows: {} -> {} ({} removed)",
        result.quality.rows_in,
        result.quality.rows_out,
        result.quality.rows_removed()
    );
    println!("   Columns: {} -> {}", result.columns_in, result.columns_out);
    for outcome in &result.quality.outcomes {
        if outcome.applied {
            println!("   {}: {}", outcome.rule, outcome.affected);
        } else {
            println!("   {}: skipped (column absent)", outcome.rule);
        }
    }
    println!("   Coerced to numeric: {}", result.quality.coerced_columns.len());
    println!("   Dictionary entries: {}", result.dictionary_entries);
    println!("   Cleaned file: {}", result.cleaned_file.display());
    println!("   Dictionary file: {}", result.dictionary_file.display());
}

fn print_tokenize_summary(result: &TokenizeResult) {
    println!("\n📊 Tokenizing Results:");
    println!("   Rows: {}", result.rows);
    println!("   Text columns: {}", result.report.columns.len());
    println!("   Cells tokenized: {}", result.report.cells_tokenized);
    println!("   Empty cells: {}", result.report.empty_cells);
    println!("   Tokens emitted: {}", result.report.tokens_emitted);
    println!("   Output file: {}", result.output_file.display());
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    override_path(&mut config.paths.input, cli.input.as_deref());
    override_path(&mut config.paths.cleaned, cli.cleaned.as_deref());
    override_path(&mut config.paths.dictionary, cli.dictionary.as_deref());
    override_path(&mut config.paths.tokenized, cli.tokenized.as_deref());

    logging::init_logging(&config.paths.log_dir);
    if let Err(e) = observability::init() {
        warn!("Metrics recorder not installed: {}", e);
    }

    let store = CsvTableStore::new();
    let toolkit = EnglishToolkit::from_config(&config.tokenize);

    match cli.command {
        Commands::Clean => {
            println!("🧹 Cleaning {}...", config.paths.input);
            let result = Pipeline::clean(&store, &config)
                .with_context(|| format!("cleaning {} failed", config.paths.input))?;
            print_clean_summary(&result);
        }
        Commands::Tokenize => {
            println!("✂️  Tokenizing {}...", config.paths.cleaned);
            let result = Pipeline::tokenize(&store, &toolkit, &config)
                .with_context(|| format!("tokenizing {} failed", config.paths.cleaned))?;
            print_tokenize_summary(&result);
        }
        Commands::Run => {
            println!("🔄 Running clean and tokenize...");
            let (cleaned, tokenized) = Pipeline::run_all(&store, &toolkit, &config)
                .context("pipeline run failed")?;
            print_clean_summary(&cleaned);
            print_tokenize_summary(&tokenized);
        }
    }

    if let Some(path) = cli.metrics_out {
        let snapshot = observability::render().unwrap_or_default();
        fs::write(&path, snapshot)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        info!("Metrics snapshot written to {}", path.display());
    }

    Ok(())
}
