//! gapwise: compliance gap analysis CLI
//!
//! Runs requirements through the review workflow against the reference
//! heuristic oracle and a keyword-indexed policy corpus, and emits the sealed
//! audit log. The human-readable report goes to stderr so stdout stays JSON.
//!
//! Usage:
//!   cargo run -p demo -- scenarios
//!   cargo run -p demo -- run --requirements reqs.txt --out audit.json
//!   cargo run -p demo -- run --candidates extracted.json > audit.json
//!   cargo run -p demo -- config --config gapwise.toml
//!   cargo run -p demo -- verify --log audit.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gapwise_audit::{AuditLog, InMemoryAuditWriter};
use gapwise_batch::{
    parse_candidates, parse_requirements, triage, BatchReport, BatchRunner, BatchSettings,
    CancelHandle, DeltaFilter, Requirement,
};
use gapwise_config::PipelineConfig;
use gapwise_contracts::{error::GapwiseError, record::AuditRecord};
use gapwise_core::{traits::EvidenceSource, GuardedOracle, Orchestrator, StageGraph};
use gapwise_ref::{scenarios, HeuristicOracle, KeywordIndex, SAMPLE_REQUIREMENTS};
use gapwise_stages::{canonical_stages, schemas::reply_verifier};

// ── CLI definition ────────────────────────────────────────────────────────────

/// gapwise: compliance gap analysis over a policy corpus.
#[derive(Parser)]
#[command(
    name = "gapwise",
    about = "Compliance gap analysis workflow",
    long_about = "Routes each regulatory requirement through inspection, gap finding,\n\
                  risk assessment and materiality, and records one audit row per\n\
                  requirement in a hash-chained log."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the four reference scenarios and print each record.
    Scenarios,
    /// Run a batch of requirements.
    Run(RunArgs),
    /// Print the effective configuration.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check the hash chain of an exported audit log.
    Verify {
        #[arg(long)]
        log: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Requirements listing, one per line, optionally "theme | text".
    /// Defaults to the bundled sample.
    #[arg(long)]
    requirements: Option<PathBuf>,
    /// Extracted candidates as JSON ({"requirement", "confidence"} objects).
    /// Only those at or above intake.auto_approve_threshold are run.
    #[arg(long, conflicts_with = "requirements")]
    candidates: Option<PathBuf>,
    /// Pipeline configuration TOML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Policy corpus in markdown ("## Source" headings, one passage per
    /// paragraph). Defaults to the bundled corpus.
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Drop requirements the policy corpus already covers before running.
    #[arg(long)]
    skip_covered: bool,
    /// Write the sealed audit log here instead of stdout; stdout then gets
    /// the batch summary.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Gapwise(#[from] GapwiseError),

    #[error("cannot access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed audit log: {0}")]
    Json(#[from] serde_json::Error),

    #[error("audit log '{0}' failed integrity verification")]
    Tampered(String),
}

type CliResult<T> = Result<T, CliError>;

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Scenarios => run_scenarios().await,
        Command::Run(args) => run_batch(&args).await,
        Command::Config { config } => show_config(config.as_deref()),
        Command::Verify { log } => verify_log(&log),
    };

    if let Err(e) = result {
        eprintln!("gapwise error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_scenarios() -> CliResult<()> {
    for run in scenarios::run_all().await? {
        println!("=== Scenario {}: {} ===", run.number, run.title);
        for outcome in &run.outcomes {
            let trace: Vec<&str> = outcome.trace.iter().map(|s| s.as_str()).collect();
            println!("  path: {}", trace.join(" -> "));
            print!("{}", format_record(&outcome.record));
        }
        println!(
            "  audit chain: {} ({} event(s))",
            if run.log.verify() { "VERIFIED" } else { "FAILED" },
            run.log.events.len()
        );
        println!();
    }
    Ok(())
}

async fn run_batch(args: &RunArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let mut requirements = intake(args, &config)?;

    let index = Arc::new(match &args.corpus {
        Some(path) => KeywordIndex::from_markdown(&read(path)?),
        None => KeywordIndex::bundled(),
    });
    let evidence: Arc<dyn EvidenceSource> = index;
    let oracle = GuardedOracle::new(Arc::new(HeuristicOracle::new()), config.retry_policy());
    let verifier = Arc::new(reply_verifier());

    if args.skip_covered {
        let filter = DeltaFilter::new(oracle.clone(), verifier.clone(), evidence.clone(), config.evidence.top_k);
        let delta = filter.filter(requirements).await?;
        for covered in &delta.covered {
            eprintln!("covered, skipped: {}", covered.text);
        }
        requirements = delta.proceed;
    }

    let run_id = Uuid::new_v4().to_string();
    let audit = Arc::new(InMemoryAuditWriter::new(run_id.as_str()));
    let materiality = config.pipeline.materiality_check;
    let orchestrator = Orchestrator::new(
        StageGraph::canonical(materiality)?,
        canonical_stages(oracle, verifier, materiality),
        audit.clone(),
    )?;
    let runner = BatchRunner::new(
        Arc::new(orchestrator),
        evidence,
        audit.clone(),
        BatchSettings::from(&config),
    );

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing admitted requirements");
            on_interrupt.cancel();
        }
    });

    let report = runner.run_until_cancelled(&run_id, requirements, &cancel).await?;
    eprint!("{}", format_report(&report));

    let log = audit.export_log();
    let json = log_json(&log)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json).map_err(|source| CliError::Io {
                path: path.display().to_string(),
                source,
            })?;
            info!(path = %path.display(), events = log.events.len(), "audit log written");
            eprintln!("audit log written to {}", path.display());
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// The requirements a run starts from: triaged candidates, a listing, or the
/// bundled sample.
fn intake(args: &RunArgs, config: &PipelineConfig) -> CliResult<Vec<Requirement>> {
    if let Some(path) = &args.candidates {
        let result = triage(parse_candidates(&read(path)?)?, config.intake.auto_approve_threshold);
        for candidate in &result.needs_review {
            eprintln!(
                "needs review ({:.2}): {}",
                candidate.confidence, candidate.requirement.text
            );
        }
        return Ok(result.approved);
    }
    Ok(match &args.requirements {
        Some(path) => parse_requirements(&read(path)?),
        None => parse_requirements(SAMPLE_REQUIREMENTS),
    })
}

fn show_config(path: Option<&Path>) -> CliResult<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn verify_log(path: &Path) -> CliResult<()> {
    let log: AuditLog = serde_json::from_str(&read(path)?)?;
    if !log.verify() {
        return Err(CliError::Tampered(path.display().to_string()));
    }
    println!(
        "audit log {} VERIFIED: run {}, {} event(s), terminal hash {}",
        path.display(),
        log.run_id,
        log.events.len(),
        log.terminal_hash
    );
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    })
}

fn read(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn log_json(log: &AuditLog) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(log)?)
}

fn format_record(record: &AuditRecord) -> String {
    format!(
        "  [{}] {}\n    status:      {}\n    gap:         {}\n    source:      {}\n    risk rating: {}\n    risk:        {}\n    materiality: {}\n    remarks:     {}\n",
        record.route,
        record.clause,
        record.status,
        record.gap_summary,
        record.source_ref,
        record.risk_rating,
        record.risk_statement,
        record.materiality,
        record.remarks,
    )
}

fn format_report(report: &BatchReport) -> String {
    let mut out = String::new();
    for completed in &report.completed {
        out.push_str(&format!("#{}\n", completed.index + 1));
        out.push_str(&format_record(&completed.outcome.record));
    }
    for failed in &report.failures {
        out.push_str(&format!(
            "FAILED #{}: {} ({})\n",
            failed.index.saturating_add(1),
            failed.requirement,
            failed.reason
        ));
        if let Some(record) = &failed.record {
            out.push_str(&format_record(record));
        }
    }
    for skipped in &report.skipped {
        out.push_str(&format!("SKIPPED #{}: {}\n", skipped.index + 1, skipped.requirement));
    }
    out.push('\n');
    out
}
