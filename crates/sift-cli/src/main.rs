use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sift_client::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, OpenAiOracle, ReqwestFetcher,
};
use sift_core::progress::{ProgressEvent, ProgressReporter, TracingProgressReporter};
use sift_core::traits::{Fetcher, Judge, NullOracle, SelectorOracle};
use sift_core::{
    ExtractionProgram, PaginationIntent, RuleSet, SelectorSession, SessionConfig, Validator,
    probe, records_to_csv,
};

#[derive(Parser)]
#[command(name = "sift", version, about = "Selector inference and extraction for listing pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the structural probe report of a page
    Probe {
        /// Listing page URL
        #[arg(short, long)]
        url: String,
    },

    /// Infer and refine rules for a page, streaming progress as JSON lines
    Analyze {
        /// Listing page URL
        #[arg(short, long)]
        url: String,

        /// JSON rule set to start from instead of asking the oracle
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Validation passes allowed per field
        #[arg(long, default_value_t = 3)]
        max_iterations: usize,

        /// Compile a program that follows pagination
        #[arg(long, default_value_t = false)]
        paginate: bool,

        /// Selector of the "next page" link (overrides the inferred one)
        #[arg(long)]
        next_rule: Option<String>,

        /// Page ceiling for the compiled program
        #[arg(long)]
        max_pages: Option<usize>,

        /// Judge fields heuristically even when an oracle is configured
        #[arg(long, default_value_t = false)]
        heuristic: bool,

        /// Write the compiled program to this file
        #[arg(long)]
        program_out: Option<PathBuf>,

        /// Oracle model (e.g., "gpt-4o", "gemini-2.5-flash")
        #[arg(short, long, env = "SIFT_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(short, long, env = "SIFT_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Oracle request timeout, in seconds
        #[arg(long, env = "SIFT_ORACLE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
        oracle_timeout: u64,

        /// API key; without one, only heuristic validation is available
        #[arg(short, long, env = "SIFT_API_KEY")]
        api_key: Option<String>,
    },

    /// Execute a compiled extraction program
    Run {
        /// Program file written by `analyze --program-out`
        #[arg(short, long)]
        program: PathBuf,

        /// Start URL
        #[arg(short, long)]
        url: String,

        /// Page ceiling; never exceeds the program's own bound
        #[arg(long)]
        max_pages: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Write records here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

/// Writes each event as one JSON line on stdout and logs it on stderr.
struct JsonLinesReporter;

impl ProgressReporter for JsonLinesReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
                    tracing::warn!(error = %e, "Failed to write progress event");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize progress event"),
        }
        TracingProgressReporter.report(event);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the feed and results
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sift=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fetcher = ReqwestFetcher::new()
        .context("Failed to create HTTP client")?
        .allow_private_urls();

    match cli.command {
        Commands::Probe { url } => cmd_probe(&fetcher, &url).await?,
        Commands::Analyze {
            url,
            rules,
            max_iterations,
            paginate,
            next_rule,
            max_pages,
            heuristic,
            program_out,
            model,
            base_url,
            oracle_timeout,
            api_key,
        } => {
            let supplied = rules.as_deref().map(load_rules).transpose()?;
            let config = SessionConfig::default()
                .with_max_iterations(max_iterations)
                .with_pagination(pagination_intent(paginate, next_rule, max_pages));
            let out = program_out.as_deref();

            match api_key.filter(|k| !k.trim().is_empty()) {
                Some(key) => {
                    let oracle = OpenAiOracle::with_base_url(&key, &model, &base_url)
                        .and_then(|o| o.with_timeout(Duration::from_secs(oracle_timeout)))
                        .map_err(|e| anyhow::anyhow!(e))?;
                    let validator = if heuristic {
                        Validator::heuristic()
                    } else {
                        Validator::with_judge(oracle.clone())
                    };
                    tracing::info!(model = oracle.model(), heuristic, "Oracle configured");
                    let session = SelectorSession::new(fetcher, oracle, validator, config);
                    cmd_analyze(&session, &url, supplied, out).await?;
                }
                None => {
                    if supplied.is_none() {
                        bail!(
                            "No SIFT_API_KEY configured: pass --rules to analyze without an oracle"
                        );
                    }
                    tracing::warn!("No oracle configured, validating heuristically");
                    let session = SelectorSession::new(
                        fetcher,
                        NullOracle,
                        Validator::<NullOracle>::heuristic(),
                        config,
                    );
                    cmd_analyze(&session, &url, supplied, out).await?;
                }
            }
        }
        Commands::Run {
            program,
            url,
            max_pages,
            format,
            output,
        } => {
            cmd_run(&fetcher, &program, &url, max_pages, format, output.as_deref()).await?;
        }
    }

    Ok(())
}

fn pagination_intent(
    paginate: bool,
    next_rule: Option<String>,
    max_pages: Option<usize>,
) -> PaginationIntent {
    if !paginate {
        return PaginationIntent::disabled();
    }
    let mut intent = PaginationIntent::enabled();
    if let Some(rule) = next_rule {
        intent = intent.with_next_rule(rule);
    }
    if let Some(max_pages) = max_pages {
        intent = intent.with_max_pages(max_pages);
    }
    intent
}

/// Read a JSON rule set; both short and `product_*` keys are accepted.
fn load_rules(path: &Path) -> Result<RuleSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
    let rules: RuleSet = serde_json::from_str(&raw).context("Invalid JSON in rules file")?;
    Ok(rules)
}

fn load_program(path: &Path) -> Result<ExtractionProgram> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program file: {}", path.display()))?;
    ExtractionProgram::from_json(&raw).map_err(|e| anyhow::anyhow!(e))
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}

async fn cmd_probe(fetcher: &ReqwestFetcher, url: &str) -> Result<()> {
    tracing::info!("Fetching {}", url);
    let html = fetcher.fetch(url).await.map_err(|e| anyhow::anyhow!(e))?;
    let report = probe(&html, url);
    tracing::info!(
        containers = report.containers.len(),
        pagination = report.pagination.len(),
        "Probe complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_analyze<F, O, J>(
    session: &SelectorSession<F, O, J>,
    url: &str,
    supplied: Option<RuleSet>,
    program_out: Option<&Path>,
) -> Result<()>
where
    F: Fetcher,
    O: SelectorOracle,
    J: Judge,
{
    let outcome = session
        .analyze(url, supplied, &JsonLinesReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if !outcome.report.container.valid {
        tracing::warn!(
            reason = %outcome.report.container.reason,
            "Container rule looks wrong; the program may yield nothing"
        );
    }
    for (field, hint) in outcome.report.suggestions() {
        tracing::warn!(%field, hint, "Rule needs attention");
    }

    if let Some(path) = program_out {
        let json = outcome.program.to_json().map_err(|e| anyhow::anyhow!(e))?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write program: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Program written");
    }
    Ok(())
}

async fn cmd_run(
    fetcher: &ReqwestFetcher,
    program_path: &Path,
    url: &str,
    max_pages: Option<usize>,
    format: Format,
    output: Option<&Path>,
) -> Result<()> {
    let program = load_program(program_path)?;
    let max_pages = max_pages.unwrap_or(program.bounds.max_pages);

    let outcome = program.run(fetcher, url, max_pages).await;
    tracing::info!(
        records = outcome.records.len(),
        pages = outcome.pages_fetched,
        stop = ?outcome.stop_reason,
        "Run complete"
    );

    let rendered = match format {
        Format::Json => format!("{}\n", serde_json::to_string_pretty(&outcome)?),
        Format::Csv => records_to_csv(&outcome.records).map_err(|e| anyhow::anyhow!(e))?,
    };
    write_output(output, &rendered)
}
