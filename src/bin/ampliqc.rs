use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ampliqc::app::QcApp;
use ampliqc::config::{CliConnection, Config, ConfigLoader, connection_settings};
use ampliqc::domain::ReportId;
use ampliqc::error::QcError;
use ampliqc::table::render_run_summary;
use ampliqc::transport::HttpDataService;

#[derive(Parser)]
#[command(name = "ampliqc")]
#[command(about = "QC pass/fail report for an amplicon sequencing run on a Torrent data service")]
#[command(version, author)]
struct Cli {
    /// Report ID on the data service.
    report_id: ReportId,

    #[arg(long)]
    server: Option<String>,

    #[arg(long)]
    user: Option<String>,

    /// Password for the data service (or AMPLIQC_PASSWORD).
    #[arg(long)]
    password: Option<String>,

    /// Path to a config file (default: ampliqc.json when present).
    #[arg(long)]
    config: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long)]
    insecure: bool,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Emit the summary as JSON instead of text tables.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(qc) = report.downcast_ref::<QcError>() {
            return ExitCode::from(map_exit_code(qc));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &QcError) -> u8 {
    match error {
        QcError::Transport { .. } | QcError::Status { .. } => 3,
        QcError::ReportNotCompleted(_)
        | QcError::PluginNotReady { .. }
        | QcError::PluginsMissing(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config: Config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    let password = cli
        .password
        .or_else(|| std::env::var("AMPLIQC_PASSWORD").ok());

    let settings = connection_settings(
        CliConnection {
            server: cli.server,
            username: cli.user,
            password,
            accept_invalid_certs: cli.insecure,
            timeout_secs: cli.timeout_secs,
        },
        config,
    )
    .into_diagnostic()?;

    let service = HttpDataService::new(&settings).into_diagnostic()?;
    let app = QcApp::new(service);
    let summary = app.evaluate(cli.report_id).into_diagnostic()?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).into_diagnostic()?;
        println!("{json}");
    } else {
        print!("{}", render_run_summary(&summary));
    }
    Ok(())
}
