//! Control Loop
//!
//! Drives the irrigation schedule: one calibration cycle when the history is
//! empty, then operation cycles of plan → wait → irrigate → reflect → store.
//! Cycles run strictly one after another, so there is never more than one
//! actuator call in flight.
//!
//! The wait is the only long suspension point and it honours the
//! cancellation token; a cancelled wait leaves the store untouched.

pub mod operator;
pub mod summary;

pub use operator::{AutoContinue, OperatorPrompt, StdinPrompt};
pub use summary::RunSummary;

use crate::agents::{PlanContext, PlanningAgent, ReflectionAgent};
use crate::config::{Config, ControlConfig, CycleErrorPolicy};
use crate::devices::{Actuator, EnvironmentSensor, WeatherForecaster};
use crate::llm::provider::LLM;
use crate::models::{CycleDraft, CycleInput, CycleOutput, CyclePhase, EcStatus, EnvironmentReading, Forecast};
use crate::storage::HistoryStore;
use crate::types::{AppError, AppResult};
use crate::utils::with_retry;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

const CALIBRATION_NOTE: &str = "initial calibration cycle";
const ENV_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// The field devices one site exposes
#[derive(Clone)]
pub struct Devices {
    pub environment: Arc<dyn EnvironmentSensor>,
    pub forecast: Arc<dyn WeatherForecaster>,
    pub actuator: Arc<dyn Actuator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxCycles,
    Cancelled,
    OperatorStopped,
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// A calibration record was stored during this run
    pub calibrated: bool,
    /// Operation cycles that stored a record
    pub completed: u32,
    /// Operation cycles abandoned after an error
    pub aborted: u32,
    pub stop_reason: StopReason,
}

pub struct ControlLoop {
    control: ControlConfig,
    store: Arc<dyn HistoryStore>,
    devices: Devices,
    planner: PlanningAgent,
    reflector: ReflectionAgent,
    operator: Box<dyn OperatorPrompt>,
    cancel: CancellationToken,
}

impl ControlLoop {
    pub fn new(
        config: &Config,
        llm: Option<Arc<LLM>>,
        store: Arc<dyn HistoryStore>,
        devices: Devices,
    ) -> Self {
        Self {
            control: config.control.clone(),
            store,
            devices,
            planner: PlanningAgent::new(llm.clone(), &config.llm, config.control.clone()),
            reflector: ReflectionAgent::new(llm, &config.llm, config.control.clone()),
            operator: Box::new(AutoContinue),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_operator(mut self, operator: Box<dyn OperatorPrompt>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Calibrate if needed, then run operation cycles until the cycle limit,
    /// cancellation or the operator says stop.
    pub async fn run(&self) -> AppResult<RunReport> {
        info!(
            target_ec = self.control.target_ec,
            max_cycles = ?self.control.max_cycles,
            "Starting irrigation control loop"
        );

        let mut report = RunReport {
            calibrated: false,
            completed: 0,
            aborted: 0,
            stop_reason: StopReason::MaxCycles,
        };

        if self.store.is_empty().await {
            let cycle = self.store.next_id().await;
            let span = info_span!("cycle", cycle, phase = %CyclePhase::Calibration);
            match self.calibrate().instrument(span).await {
                Ok(id) => {
                    info!(id, "Calibration complete");
                    report.calibrated = true;
                }
                Err(AppError::Cancelled) => {
                    info!("Cancelled during calibration");
                    report.stop_reason = StopReason::Cancelled;
                    return Ok(report);
                }
                Err(e) => {
                    error!(
                        cycle,
                        phase = %CyclePhase::Calibration,
                        error = %e,
                        "Calibration failed, continuing without a baseline"
                    );
                }
            }
        } else {
            info!("History present, skipping calibration");
        }

        let mut iteration: u32 = 0;
        loop {
            if self.control.max_cycles.is_some_and(|max| iteration >= max) {
                report.stop_reason = StopReason::MaxCycles;
                break;
            }
            if self.cancel.is_cancelled() {
                report.stop_reason = StopReason::Cancelled;
                break;
            }

            iteration += 1;
            let cycle = self.store.next_id().await;
            let span = info_span!("cycle", cycle, phase = %CyclePhase::Operation, iteration);

            match self.operate().instrument(span).await {
                Ok(_) => report.completed += 1,
                Err(AppError::Cancelled) => {
                    info!(cycle, "Cancelled, no record written for this cycle");
                    report.stop_reason = StopReason::Cancelled;
                    break;
                }
                Err(e) => {
                    report.aborted += 1;
                    if e.is_transient() {
                        warn!(cycle, phase = %CyclePhase::Operation, error = %e, "Cycle aborted");
                    } else {
                        error!(cycle, phase = %CyclePhase::Operation, error = %e, "Cycle aborted");
                    }
                    if self.control.on_cycle_error == CycleErrorPolicy::Stop {
                        return Err(e);
                    }
                }
            }

            let more_remaining = self.control.max_cycles.map_or(true, |max| iteration < max);
            if more_remaining
                && !self.cancel.is_cancelled()
                && !self.operator.should_continue(iteration).await
            {
                info!("Operator stopped the run");
                report.stop_reason = StopReason::OperatorStopped;
                break;
            }
        }

        info!(
            completed = report.completed,
            aborted = report.aborted,
            stop_reason = ?report.stop_reason,
            "Control loop finished"
        );
        Ok(report)
    }

    async fn calibrate(&self) -> AppResult<u64> {
        let wait_minutes = self.control.calibration_wait_minutes;
        let environment = self.read_environment().await?;
        self.wait(wait_minutes).await?;
        let output = self.irrigate().await?;

        self.log_status(&output);
        let input = CycleInput {
            wait_minutes,
            environment,
        };
        self.persist(CycleDraft::new(CyclePhase::Calibration, input, output, CALIBRATION_NOTE))
            .await
    }

    async fn operate(&self) -> AppResult<u64> {
        let history = self.store.get_recent(self.control.history_window).await;
        let last_reflection = history
            .last()
            .map(|r| r.reflection_text.as_str())
            .unwrap_or_default();

        let environment = self.read_environment().await?;
        let forecast = self.read_forecast().await;

        let decision = self
            .planner
            .plan(&PlanContext {
                last_reflection,
                history: &history,
                environment: &environment,
                forecast: &forecast,
            })
            .await;
        info!(
            wait_minutes = decision.proposed_wait_minutes,
            source = ?decision.source,
            rationale = %decision.rationale,
            "Planned next irrigation"
        );

        let wait_minutes = decision.proposed_wait_minutes;
        self.wait(wait_minutes).await?;
        let output = self.irrigate().await?;

        let input = CycleInput {
            wait_minutes,
            environment,
        };
        let reflection = self.reflector.reflect(&input, &output).await;
        self.log_status(&output);

        self.persist(CycleDraft::new(CyclePhase::Operation, input, output, reflection))
            .await
    }

    async fn read_environment(&self) -> AppResult<EnvironmentReading> {
        let sensor = &self.devices.environment;
        with_retry(
            || sensor.read_environment().boxed(),
            self.control.env_read_attempts,
            ENV_RETRY_BASE_DELAY,
        )
        .await
        .map_err(|e| {
            warn!(step = "read_environment", error = %e, "Environment read failed");
            e
        })
    }

    async fn read_forecast(&self) -> Forecast {
        match self.devices.forecast.read_forecast().await {
            Ok(forecast) => forecast,
            Err(e) => {
                warn!(step = "read_forecast", error = %e, "Forecast unavailable, planning without it");
                Forecast::unavailable()
            }
        }
    }

    /// Sleep for `minutes` planned minutes unless cancelled first
    async fn wait(&self, minutes: u32) -> AppResult<()> {
        let duration = self.control.wait_unit.saturating_mul(minutes);
        info!(wait_minutes = minutes, "Waiting before irrigation");

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    async fn irrigate(&self) -> AppResult<CycleOutput> {
        let timeout = self.control.actuator_timeout;
        let output = match tokio::time::timeout(timeout, self.devices.actuator.irrigate()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "actuator did not finish within {}s",
                timeout.as_secs_f64()
            ))),
        }
        .map_err(|e| {
            warn!(step = "irrigate", error = %e, "Irrigation failed");
            e
        })?;

        info!(
            fill_seconds = output.fill_seconds,
            measured_ec = output.measured_ec,
            "Irrigation complete"
        );
        Ok(output)
    }

    async fn persist(&self, draft: CycleDraft) -> AppResult<u64> {
        match self.store.append(draft.clone()).await {
            Ok(id) => {
                info!(id, phase = %draft.phase, "Stored cycle record");
                Ok(id)
            }
            Err(e) => {
                let lost = draft.into_record(self.store.next_id().await);
                error!(
                    step = "append",
                    error = %e,
                    record = %serde_json::to_string(&lost).unwrap_or_default(),
                    "Failed to store cycle record; irrigation happened but is not in history"
                );
                Err(e)
            }
        }
    }

    fn log_status(&self, output: &CycleOutput) {
        let status = EcStatus::classify(
            output.measured_ec,
            self.control.target_ec,
            self.control.ec_tolerance,
        );
        info!(
            measured_ec = output.measured_ec,
            target_ec = self.control.target_ec,
            status = %status,
            "EC {}: {}",
            status,
            status.advice()
        );
    }
}
