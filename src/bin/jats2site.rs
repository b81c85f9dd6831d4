//! CLI binary for jats2site.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` and the concrete collaborators, then either serves the
//! trigger endpoint or runs a single job in the foreground.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use jats2site::{
    poll_view, Collaborators, FsStore, JatsFetcher, JatsFetcherConfig, JobOutcome,
    JobProgressCallback, MystCli, MystCommands, Orchestrator, ProgressCallback, ServiceConfig,
    Stage, TriggerRequest, UploadError, DEFAULT_SITE_TEMPLATE,
};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar in percent, one log line per stage.
struct CliProgressCallback {
    bar: ProgressBar,
    upload_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Queued");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            upload_errors: AtomicUsize::new(0),
        })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, target: &str, id: &str) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(target),
            dim(&format!("id {id}"))
        ));
    }

    fn on_stage(&self, stage: Stage, progress: f64, message: &str) {
        if stage == Stage::Failed {
            return;
        }
        self.bar.set_prefix(stage.to_string());
        self.bar.set_position((progress * 100.0).round() as u64);
        self.bar.println(format!("  {} {}", green("✓"), message));
    }

    fn on_upload_error(&self, error: &UploadError) {
        self.upload_errors.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {}", red("✗"), red(&error.to_string())));
    }

    fn on_job_complete(&self, outcome: &JobOutcome) {
        self.bar.finish_and_clear();
        let failed_uploads = self.upload_errors.load(Ordering::SeqCst);
        match outcome {
            JobOutcome::Succeeded { id, .. } if failed_uploads == 0 => {
                eprintln!("{} {} published", green("✔"), bold(id));
            }
            JobOutcome::Succeeded { id, .. } => {
                eprintln!(
                    "{} {} published  ({} file(s) failed to upload)",
                    cyan("⚠"),
                    bold(id),
                    red(&failed_uploads.to_string())
                );
            }
            JobOutcome::AlreadyProcessed { .. } => {
                eprintln!("{} {}", cyan("⚠"), outcome.response_text());
            }
            JobOutcome::Rejected { kind, .. } => {
                eprintln!("{} {}  ({})", red("✘"), outcome.response_text(), red(&kind.to_string()));
            }
            JobOutcome::Failed { .. } | JobOutcome::BadRequest(_) => {
                eprintln!("{} {}", red("✘"), outcome.response_text());
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the Pub/Sub push endpoint on $PORT
  jats2site serve --bucket /mnt/bucket

  # Convert one article in the foreground
  jats2site run PMC10134778

  # A DOI, or a URL with an explicit storage id
  jats2site run 10.1371/journal.pone.0123456
  jats2site run https://example.org/article.xml --id example-article

  # Show the status record a front end would poll
  jats2site status PMC10134778

ENVIRONMENT VARIABLES:
  JATS2SITE_BUCKET        Directory used as the storage bucket
  JATS2SITE_FOLDER        Top-level folder for job prefixes
  JATS2SITE_SCRATCH_DIR   Where per-job workspaces are created
  JATS2SITE_TEMPLATE      Site template written into myst.yml
  JATS2SITE_LICENSES      Comma-separated allowed licenses
  JATS2SITE_PMC_ONLY      Reject anything but PMC ids
  PORT                    Listen port for `serve`
  RUST_LOG                Overrides the log filter
"#;

/// Turn PMC ids, DOIs and article URLs into published static sites.
#[derive(Parser, Debug)]
#[command(
    name = "jats2site",
    version,
    about = "Turn PMC ids, DOIs and article URLs into published static sites",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory used as the storage bucket.
    #[arg(long, global = true, env = "JATS2SITE_BUCKET", default_value = "bucket")]
    bucket: PathBuf,

    /// Top-level folder in the bucket for job prefixes.
    #[arg(long, global = true, env = "JATS2SITE_FOLDER", default_value = "convert-service")]
    folder: String,

    /// Where per-job workspaces are created. Default: OS temp dir.
    #[arg(long, global = true, env = "JATS2SITE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Site template written into the project manifest.
    #[arg(long, global = true, env = "JATS2SITE_TEMPLATE", default_value = DEFAULT_SITE_TEMPLATE)]
    template: String,

    /// Allowed licenses for PMC articles (comma-separated).
    #[arg(long, global = true, env = "JATS2SITE_LICENSES", value_delimiter = ',')]
    licenses: Vec<String>,

    /// Reject anything that is not a PMC id.
    #[arg(long, global = true, env = "JATS2SITE_PMC_ONLY")]
    pmc_only: bool,

    /// Fetch only the article XML, not the full data package.
    #[arg(long, global = true, env = "JATS2SITE_NO_DATA")]
    no_data: bool,

    /// Program used for `myst init` / `myst build`.
    #[arg(long, global = true, env = "JATS2SITE_MYST", default_value = "myst")]
    myst: String,

    /// Program used for `jats convert`.
    #[arg(long, global = true, env = "JATS2SITE_JATS", default_value = "jats")]
    jats: String,

    /// HTTP timeout for article and metadata requests, in seconds.
    #[arg(long, global = true, env = "JATS2SITE_HTTP_TIMEOUT", default_value_t = 120)]
    http_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "JATS2SITE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "JATS2SITE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the Pub/Sub push trigger and status endpoints.
    Serve {
        /// Listen port.
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,

        /// Listen address.
        #[arg(long, env = "JATS2SITE_HOST", default_value = "0.0.0.0")]
        host: IpAddr,
    },
    /// Run one job in the foreground.
    Run {
        /// PMC id, DOI or URL.
        target: String,

        /// Storage id override.
        #[arg(long)]
        id: Option<String>,

        /// Disable progress bar.
        #[arg(long, env = "JATS2SITE_NO_PROGRESS")]
        no_progress: bool,

        /// Print the log record as JSON on success.
        #[arg(long)]
        json: bool,
    },
    /// Print the status record for an id.
    Status {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs for foreground runs.
    let show_progress = match cli.command {
        Command::Run {
            no_progress, json, ..
        } => !cli.quiet && !no_progress && !json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build orchestrator ───────────────────────────────────────────────
    let config = build_config(&cli)?;
    let deps = build_collaborators(&cli)?;
    let mut orchestrator = Orchestrator::new(config, deps);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        orchestrator = orchestrator.with_progress_callback(cb);
    }

    match cli.command {
        Command::Serve { port, host } => {
            let addr = SocketAddr::new(host, port);
            jats2site::service::serve(addr, Arc::new(orchestrator))
                .await
                .context("Server failed")?;
        }
        Command::Run {
            ref target,
            ref id,
            json,
            ..
        } => {
            let mut request = TriggerRequest::new(target.clone());
            if let Some(id) = id {
                request = request.with_id(id.clone());
            }
            let outcome = orchestrator.handle(request).await;
            match outcome {
                JobOutcome::Succeeded { ref log, .. } => {
                    if json {
                        let out =
                            serde_json::to_string_pretty(log).context("Failed to serialise log")?;
                        println!("{out}");
                    } else if !cli.quiet && !show_progress {
                        eprintln!(
                            "Published in {:.1}s  ({} uploaded, {} failed)",
                            log.times.download + log.times.process + log.times.upload,
                            log.uploads.uploaded,
                            log.uploads.failed
                        );
                    }
                }
                JobOutcome::AlreadyProcessed { .. } => {
                    if !cli.quiet && !show_progress {
                        eprintln!("{}", outcome.response_text());
                    }
                }
                _ => anyhow::bail!("{}", outcome.response_text()),
            }
        }
        Command::Status { ref id } => {
            let record = orchestrator
                .status(id)
                .await
                .with_context(|| format!("Failed to read status for {id}"))?;
            let view = poll_view(record.as_ref());
            println!(
                "{}",
                serde_json::to_string_pretty(&view).context("Failed to serialise status")?
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut builder = ServiceConfig::builder()
        .storage_folder(cli.folder.clone())
        .site_template(cli.template.clone())
        .pmc_only(cli.pmc_only)
        .fetch_data(!cli.no_data);
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir.clone());
    }
    let licenses: Vec<String> = cli
        .licenses
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if !licenses.is_empty() {
        builder = builder.allowed_licenses(licenses);
    }
    builder.build().context("Invalid configuration")
}

/// Wire the bucket directory, HTTP fetcher and external tools.
fn build_collaborators(cli: &Cli) -> Result<Collaborators> {
    let fetcher = JatsFetcher::new(JatsFetcherConfig {
        timeout_secs: cli.http_timeout,
        ..JatsFetcherConfig::default()
    })
    .context("Failed to create HTTP client")?;

    let mut commands = MystCommands::default();
    commands.convert[0] = cli.jats.clone();
    commands.init[0] = cli.myst.clone();
    commands.build[0] = cli.myst.clone();

    Ok(Collaborators::new(
        Arc::new(FsStore::new(cli.bucket.clone())),
        Arc::new(fetcher),
        Arc::new(MystCli::new(commands)),
    ))
}
