use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use gantt_core::Catalog;
use gantt_engine::{ConversationStore, Orchestrator};
use gantt_llm::OpenAiGateway;
use gantt_settings::LogFormat;
use gantt_telemetry::UsageLedger;

/// Relay between the Gantt chat panel and an LLM with tool calling.
#[derive(Debug, Parser)]
#[command(name = "gantt-relay", version)]
struct Cli {
    /// JSON settings file, merged over the defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port for the WebSocket endpoint and static assets.
    #[arg(long)]
    port: Option<u16>,

    /// Log output format.
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings =
        gantt_settings::load_settings(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format.into();
    }

    gantt_telemetry::init_telemetry(&settings.logging).context("failed to initialize logging")?;

    tracing::info!("starting gantt relay");

    let catalog = Arc::new(Catalog::builtin().context("capability catalog is invalid")?);
    tracing::info!(
        version = catalog.version(),
        capabilities = catalog.len(),
        "capability catalog loaded"
    );

    let api_key = gantt_settings::api_key_from_env()?;
    let gateway = OpenAiGateway::new(&settings.llm, api_key)?;
    tracing::info!(model = %settings.llm.model, endpoint = gateway.endpoint(), "llm gateway ready");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(gateway),
        catalog,
        Arc::new(ConversationStore::new()),
        Arc::new(UsageLedger::new()),
        settings.orchestrator.clone(),
        Duration::from_millis(settings.llm.timeout_ms),
    ));

    let handle = gantt_server::start(&settings.server, orchestrator)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "gantt relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown();
    Ok(())
}
