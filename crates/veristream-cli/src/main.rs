mod display;
mod replay;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use veristream_client::http::{IngestSource, IngestedDocument};
use veristream_client::{ClientConfig, RunSummary, Scheduler, VeristreamClient};
use veristream_core::{Claim, ClaimBoard};

#[derive(Parser)]
#[command(name = "veristream")]
#[command(about = "Stream, reconcile and display claim verifications", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the verification service
    #[arg(long, global = true, env = "VERISTREAM_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Claims verified side by side
    #[arg(long, global = true, env = "VERISTREAM_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// Timeout for request/response calls, in seconds
    #[arg(long, global = true, env = "VERISTREAM_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    request_timeout: u64,

    /// Longest silence tolerated on a verification stream, in seconds
    #[arg(long, global = true, env = "VERISTREAM_IDLE_TIMEOUT_SECS", default_value_t = 120)]
    idle_timeout: u64,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a source, extract its claims and verify them all
    Analyze(AnalyzeArgs),
    /// Verify one claim text
    Verify {
        claim: String,
    },
    /// Decode a captured verification stream offline
    Replay {
        capture: PathBuf,
        /// Claim text to show on the card
        #[arg(long, default_value = "replayed claim")]
        claim: String,
        #[arg(long, default_value_t = replay::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false, id = "source")]
struct SourceArgs {
    /// Web page to fetch
    #[arg(long)]
    url: Option<String>,
    /// Text to analyze directly
    #[arg(long)]
    text: Option<String>,
    /// Document to upload
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Treat --file as an audio recording to transcribe
    #[arg(long, requires = "file")]
    audio: bool,
    /// Persist the finished report
    #[arg(long)]
    save_report: bool,
    /// Write the audit log export to this path
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ClientConfig::new(&cli.server)
        .with_max_concurrent_claims(cli.concurrency)
        .with_request_timeout(Duration::from_secs(cli.request_timeout))
        .with_stream_idle_timeout(Duration::from_secs(cli.idle_timeout));

    match cli.command {
        Command::Analyze(args) => analyze(config, args).await,
        Command::Verify { claim } => verify(config, claim).await,
        Command::Replay {
            capture,
            claim,
            chunk_size,
        } => {
            let (board, summary) = replay::replay_file(&capture, &claim, chunk_size)?;
            display::print_board(&board);
            println!(
                "{} frames decoded, {} dropped",
                summary.decoded, summary.dropped
            );
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn analyze(config: ClientConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    let client = VeristreamClient::new(config.clone()).context("failed to build HTTP client")?;

    let doc = ingest(&client, &args).await?;
    info!(chars = doc.text.len(), "source ingested");

    let claims = client
        .extract_claims(&doc.text)
        .await
        .context("claim extraction failed")?;
    if claims.is_empty() {
        println!("No verifiable claims found.");
        return Ok(());
    }

    let mut board = ClaimBoard::new();
    board.load_claims(claims);
    let scheduler = Scheduler::new(client, &config);
    let summary = scheduler.verify_pending(&mut board).await;
    display::print_board(&board);
    print_summary(&summary);

    let client = scheduler.transport();
    if args.save_report {
        let payload = board.report_payload(doc.title.clone(), doc.source_type.clone());
        let id = client
            .save_report(&payload)
            .await
            .context("failed to save report")?;
        println!("Report saved: {id}");
    }
    if let Some(path) = &args.audit_log {
        let export = client
            .export_audit_log(&board.audit_log_payload())
            .await
            .context("audit log export failed")?;
        let json = serde_json::to_string_pretty(&export)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Audit log written to {}", path.display());
    }
    Ok(())
}

async fn ingest(client: &VeristreamClient, args: &AnalyzeArgs) -> anyhow::Result<IngestedDocument> {
    let source = &args.source;
    let doc = if let Some(url) = &source.url {
        client.ingest(&IngestSource::Url(url.clone())).await
    } else if let Some(text) = &source.text {
        client.ingest(&IngestSource::Text(text.clone())).await
    } else if let Some(path) = &source.file {
        if args.audio {
            client.ingest_audio(path).await
        } else {
            client.ingest_file(path).await
        }
    } else {
        anyhow::bail!("one of --url, --text or --file is required");
    };
    doc.context("ingestion failed")
}

async fn verify(config: ClientConfig, text: String) -> anyhow::Result<()> {
    let client = VeristreamClient::new(config.clone()).context("failed to build HTTP client")?;
    let mut board = ClaimBoard::new();
    board.load_claims(vec![Claim::new("claim-1", text)]);

    let scheduler = Scheduler::new(client, &config);
    let summary = scheduler.verify_pending(&mut board).await;
    display::print_board(&board);
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} verified, {} failed ({} batches)",
        summary.done, summary.failed, summary.batches
    );
}
