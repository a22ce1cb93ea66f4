//! Grump knowledge base CLI

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use grump_core::{Backend, KnowledgeConfig};
use grump_ingest::{FolderRef, KnowledgeService, ReloadSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grump")]
#[command(about = "Grump - knowledge base loader for the grumpy assistant")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still override it)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output from the pipeline
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the knowledge base and report what was learned
    Load {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the knowledge base and print its summary
    Summary {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the knowledge base and print a backend's system prompt
    Prompt {
        /// Backend whose prompt to print (anthropic or groq)
        #[arg(value_name = "BACKEND")]
        backend: Backend,
    },

    /// Show how a remote folder reference is resolved
    ParseFolder {
        /// Folder URL (tree, blob or raw form)
        #[arg(value_name = "URL")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays clean
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Load { json } => handle_load(cli.config, json).await,
        Commands::Summary { json } => handle_summary(cli.config, json).await,
        Commands::Prompt { backend } => handle_prompt(cli.config, backend).await,
        Commands::ParseFolder { url } => handle_parse_folder(cli.config, &url),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<KnowledgeConfig> {
    let config = match path {
        Some(path) => KnowledgeConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => KnowledgeConfig::from_env()?,
    };
    Ok(config)
}

async fn load_service(
    path: Option<PathBuf>,
    quiet: bool,
) -> anyhow::Result<(KnowledgeService, ReloadSummary)> {
    let config = load_config(path)?;
    debug!(
        markdown_dir = %config.markdown_dir.display(),
        pdf_dir = %config.pdf_dir.display(),
        max_total_chars = config.max_total_chars,
        "Configuration loaded"
    );
    let service = KnowledgeService::new(config)?;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Loading knowledge base...");

    let summary = service.load().await;
    pb.finish_and_clear();

    Ok((service, summary))
}

async fn handle_load(config: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let (_service, summary) = load_service(config, json).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", style("📚 Knowledge Base Loaded").bold().green());
    println!("  Snapshot version: {}", summary.snapshot_version);
    println!(
        "  Located: {} markdown, {} pdf, {} remote",
        summary.located.markdown, summary.located.pdf, summary.located.remote
    );
    println!(
        "  Learned: {} markdown, {} pdf, {} remote",
        summary.per_category.markdown, summary.per_category.pdf, summary.per_category.remote
    );
    println!("  Processed: {}", summary.processed_count);
    println!("  Skipped: {}", summary.skipped_count);
    println!("  Characters: {}", summary.total_chars);

    if summary.budget_exhausted {
        println!(
            "\n{}",
            style("⚠️  Size limit reached; later sources were not loaded").yellow()
        );
    }
    if let Some(err) = &summary.folder_error {
        println!("\n{}", style(format!("⚠️  Remote folder skipped: {err}")).yellow());
    }

    if !summary.integrations.is_empty() {
        println!("\n{}", style("🤖 Backends:").bold());
        for (backend, outcome) in &summary.integrations {
            println!("  {backend}: {outcome:?}");
        }
    }

    println!("\n{}", style("✅ Done!").green().bold());
    Ok(())
}

async fn handle_summary(config: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let (service, _) = load_service(config, json).await?;
    let summary = service.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", style("📊 Knowledge Summary").bold().green());
    println!(
        "  Has knowledge: {}",
        if summary.has_knowledge {
            style("yes").green()
        } else {
            style("no").yellow()
        }
    );
    println!("  Snapshot version: {}", summary.snapshot_version);
    println!("  Remote sources: {}", summary.remote_sources);
    println!(
        "  Processed: {} (skipped {})",
        summary.processed_count, summary.skipped_count
    );
    println!("  Characters: {}", summary.total_chars);

    println!(
        "\n{}",
        style(format!("📄 Local markdown ({}):", summary.local_markdown_files)).bold()
    );
    for name in &summary.local_markdown {
        println!("  {name}");
    }
    println!(
        "\n{}",
        style(format!("📄 Local PDFs ({}):", summary.local_pdf_files)).bold()
    );
    for name in &summary.local_pdfs {
        println!("  {name}");
    }
    Ok(())
}

async fn handle_prompt(config: Option<PathBuf>, backend: Backend) -> anyhow::Result<()> {
    let (service, _) = load_service(config, true).await?;
    let prompt = service
        .system_prompt(backend)
        .with_context(|| format!("backend {backend} is not registered"))?;
    println!("{prompt}");
    Ok(())
}

fn handle_parse_folder(config: Option<PathBuf>, url: &str) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let folder = FolderRef::parse(url)?;

    println!("{}", style("📁 Remote Folder").bold().cyan());
    println!("  User: {}", folder.user);
    println!("  Repository: {}", folder.repo);
    println!("  Branch: {}", folder.branch);
    println!("  Path: {}", folder.path);
    println!(
        "  Listing URL: {}",
        folder.listing_url(&config.listing_api_base)?
    );
    Ok(())
}
