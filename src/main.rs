use clap::Parser;
use irrigation_agent::{
    config::Config,
    control::{AutoContinue, ControlLoop, Devices, OperatorPrompt, RunSummary, StdinPrompt},
    devices::{
        EnvironmentSensor, SimulatedController, SimulatedEnvironment, SimulatedForecast,
        WeatherForecaster,
    },
    llm::LLM,
    storage::{HistoryStore, JsonHistoryStore},
    utils::init_tracing,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// EC-driven irrigation timing controller
#[derive(Debug, Parser)]
#[command(name = "irrigation-agent", version, about)]
struct Cli {
    /// Operation cycles to run after calibration
    #[arg(long, conflicts_with = "unbounded")]
    max_cycles: Option<u32>,

    /// Run until interrupted
    #[arg(long)]
    unbounded: bool,

    /// Ask before each further cycle (Enter continues, 'q' stops)
    #[arg(long)]
    interactive: bool,

    /// Cycle history file
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,

    /// Real seconds per planned minute (60 = real time)
    #[arg(long, value_name = "SECONDS")]
    wait_unit_secs: Option<f64>,

    /// Also write daily rolling logs to this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(max) = self.max_cycles {
            config.control.max_cycles = Some(max);
        }
        if self.unbounded {
            config.control.max_cycles = None;
        }
        if let Some(path) = &self.history {
            config.storage.history_path = path.clone();
        }
        if let Some(secs) = self.wait_unit_secs {
            config.control.wait_unit = Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow::anyhow!("--wait-unit-secs {}: {}", secs, e))?;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = Some(dir.clone());
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    cli.apply(&mut config)?;

    let _log_guard = init_tracing(config.logging.log_dir.as_deref());
    config.validate()?;

    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        target_ec = config.control.target_ec,
        history = %config.storage.history_path.display(),
        "Irrigation agent starting"
    );

    let store = Arc::new(JsonHistoryStore::open(&config.storage.history_path).await?);
    if store.is_empty().await {
        info!(path = %store.path().display(), "No cycle history yet, calibration will run first");
    }

    let llm = LLM::from_config(&config.llm)?.map(Arc::new);
    match &llm {
        Some(llm) => info!(
            provider = llm.provider_name(),
            model = %config.llm.model,
            "Decision model configured"
        ),
        None => warn!("No LLM API key configured, using fallback rules for every decision"),
    }

    let environment = Arc::new(SimulatedEnvironment);
    let forecast = Arc::new(SimulatedForecast::default());
    if !environment.health_check().await {
        warn!("Environment sensor failed its health check");
    }
    if !forecast.health_check().await {
        warn!("Weather forecaster failed its health check");
    }

    let devices = Devices {
        environment,
        forecast,
        actuator: Arc::new(SimulatedController::default()),
    };

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current step");
            shutdown.cancel();
        }
    });

    let operator: Box<dyn OperatorPrompt> = if cli.interactive {
        Box::new(StdinPrompt)
    } else {
        Box::new(AutoContinue)
    };

    let control = ControlLoop::new(&config, llm, store.clone(), devices)
        .with_operator(operator)
        .with_cancellation(cancel);
    let report = control.run().await?;

    info!(
        %run_id,
        calibrated = report.calibrated,
        completed = report.completed,
        aborted = report.aborted,
        stop_reason = ?report.stop_reason,
        "Run finished"
    );

    let recent = store.get_recent(config.control.history_window).await;
    let summary = RunSummary::from_history(&recent, &config.control);
    println!("{}", RunSummary::describe(summary.as_ref()));

    Ok(())
}
