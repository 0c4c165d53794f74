use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vitalwatch::{ConsolePresenter, Dashboard, Overrides, Settings};
use vitalwatch_adapters::fhir::FhirClient;
use vitalwatch_sdk::{JsonLinesPresenter, Presenter};

#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(about = "Keep a practitioner's patient biometrics up to date")]
struct Args {
    /// Practitioner identifier to log in with on start
    #[arg(short, long)]
    practitioner: Option<String>,

    /// Path to a TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the FHIR server
    #[arg(long)]
    base_url: Option<String>,

    /// Update frequency in seconds
    #[arg(short, long)]
    frequency: Option<u64>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit updates as JSON lines instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        base_url: args.base_url.clone(),
        frequency_secs: args.frequency,
        log_level: args.log_level.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)
        .context("failed to load settings")?;

    init_logging(&settings.log_level);

    let rt = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    rt.block_on(run(args, settings))
}

/// Log to stderr so updates on stdout stay readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let client = Arc::new(
        FhirClient::builder()
            .endpoint(settings.source.base_url.clone())
            .connect_timeout(settings.source.connect_timeout())
            .read_timeout(settings.source.read_timeout())
            .page_size(settings.roster.page_size)
            .build()
            .context("failed to create FHIR client")?,
    );
    info!(endpoint = client.endpoint(), "using health records service");

    let presenter: Arc<dyn Presenter> = if args.json {
        Arc::new(JsonLinesPresenter::new(io::stdout()))
    } else {
        Arc::new(ConsolePresenter::stdout())
    };

    let dashboard = Dashboard::new(settings, client.clone(), client, presenter)
        .context("failed to start dashboard")?;

    let mut out = io::stdout();
    if let Some(id) = args.practitioner {
        vitalwatch::shell::execute(&dashboard, vitalwatch::shell::Command::Login(id), &mut out)
            .await?;
    }

    vitalwatch::shell::run(&dashboard, BufReader::new(tokio::io::stdin()), &mut out).await?;
    info!("session ended");
    Ok(())
}
