use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::{init_structured_logging, LoggingConfig};
use console::style;
use labeler::{load_tasks, preview_prompt, LabelerConfig, Pipeline, RecordStore, RunReport};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "labeler")]
#[command(about = "Label stored tweets against phrase definitions with Gemini")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every pending record for every phrase in the task file
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// Records per model call
        #[arg(long)]
        batch_size: Option<usize>,
        /// Gemini model name
        #[arg(long)]
        model: Option<String>,
    },
    /// Show pending/labeled/accepted counts per phrase
    Status {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the prompt of the first pending batch for one phrase
    Prompt {
        #[command(flatten)]
        source: SourceArgs,
        /// Phrase from the task file
        #[arg(long)]
        phrase: String,
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// SQLite database holding the records
    #[arg(long)]
    db: PathBuf,
    /// CSV file of phrase,definition rows
    #[arg(long)]
    tasks: PathBuf,
    /// Record table (discovered from the label column when omitted)
    #[arg(long)]
    table: Option<String>,
    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.command {
        Commands::Prompt { .. } => Level::WARN,
        _ => Level::INFO,
    };
    init_structured_logging(LoggingConfig::from_env().with_level(log_level))?;

    match cli.command {
        Commands::Run {
            source,
            batch_size,
            model,
        } => {
            let mut config = load_config(&source)?;
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(model) = model {
                config.model = model;
            }
            handle_run(&source, &config).await?;
        }
        Commands::Status { source } => {
            let config = load_config(&source)?;
            handle_status(&source, &config).await?;
        }
        Commands::Prompt {
            source,
            phrase,
            batch_size,
        } => {
            let mut config = load_config(&source)?;
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            handle_prompt(&source, &config, &phrase).await?;
        }
    }

    Ok(())
}

/// Defaults, then `--config`, then environment, then `--table`.
fn load_config(source: &SourceArgs) -> Result<LabelerConfig> {
    let config = match &source.config {
        Some(path) => LabelerConfig::from_file(path)?,
        None => LabelerConfig::default(),
    };
    let mut config = config.with_env()?;
    if let Some(table) = &source.table {
        config.table = Some(table.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn open_store(source: &SourceArgs, config: &LabelerConfig) -> Result<RecordStore> {
    RecordStore::open(&source.db, config.table.as_deref())
        .await
        .with_context(|| format!("Failed to open record store {}", source.db.display()))
}

async fn handle_run(source: &SourceArgs, config: &LabelerConfig) -> Result<()> {
    let tasks = load_tasks(&source.tasks)?;
    let store = open_store(source, config).await?;

    let provider = match config.build_provider() {
        Ok(provider) => provider,
        Err(e) => {
            // The error itself is reported by main; only add the hint here
            println!(
                "{} set {} in the environment or in a .env file",
                style("[i] Fix:").yellow().bold(),
                style("GEMINI_API_KEY").cyan()
            );
            return Err(e.into());
        }
    };

    let report = Pipeline::new(&store, &provider, config.batch_size()?)
        .run(&tasks)
        .await?;

    print_report(&report);
    Ok(())
}

async fn handle_status(source: &SourceArgs, config: &LabelerConfig) -> Result<()> {
    let tasks = load_tasks(&source.tasks)?;
    let store = open_store(source, config).await?;

    println!(
        "{:<30} {:>10} {:>10} {:>10}",
        style("Phrase").bold(),
        style("Pending").bold(),
        style("Labeled").bold(),
        style("Accepted").bold()
    );
    for task in &tasks {
        let summary = store.phrase_summary(&task.phrase).await?;
        println!(
            "{:<30} {:>10} {:>10} {:>10}",
            task.phrase, summary.pending, summary.labeled, summary.accepted
        );
    }

    Ok(())
}

async fn handle_prompt(source: &SourceArgs, config: &LabelerConfig, phrase: &str) -> Result<()> {
    let tasks = load_tasks(&source.tasks)?;
    let task = tasks
        .iter()
        .find(|task| task.phrase.eq_ignore_ascii_case(phrase.trim()))
        .with_context(|| format!("Phrase '{phrase}' not found in {}", source.tasks.display()))?;

    let store = open_store(source, config).await?;

    match preview_prompt(&store, task, config.batch_size()?).await? {
        Some(prompt) => print!("{prompt}"),
        None => println!(
            "{} no pending records for '{}'",
            style("[i]").yellow().bold(),
            task.phrase
        ),
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let rule = "=".repeat(50);

    println!();
    println!("{}", style(&rule).dim());
    println!("{}", style("ANALYSIS COMPLETE").green().bold());
    println!("{}", style(&rule).dim());
    println!("Phrases processed: {}", report.tasks.len());
    println!("Records labeled:   {}", report.labeled());
    println!("Batches skipped:   {}", report.failed_batches());
    println!("Total API calls:   {}", report.statistics.total_calls);
    println!("Retries:           {}", report.statistics.retries);

    let failed: Vec<&str> = report
        .tasks
        .iter()
        .filter(|task| task.batches_failed > 0)
        .map(|task| task.phrase.as_str())
        .collect();
    if !failed.is_empty() {
        println!(
            "{} re-run to retry skipped batches for: {}",
            style("[!]").yellow().bold(),
            failed.join(", ")
        );
    }
}
