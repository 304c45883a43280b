// Test doubles shared by unit tests

use crate::devices::{Actuator, EnvironmentSensor, WeatherForecaster};
use crate::llm::{LLMAdapter, LLM};
use crate::models::{
    CycleDraft, CycleInput, CycleOutput, CyclePhase, CycleRecord, EnvironmentReading, Forecast,
};
use crate::storage::HistoryStore;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn environment() -> EnvironmentReading {
    EnvironmentReading {
        temperature: 31.5,
        humidity: 68.2,
        et0: 0.25,
    }
}

pub fn draft(phase: CyclePhase, wait_minutes: u32, measured_ec: f64, reflection: &str) -> CycleDraft {
    CycleDraft::new(
        phase,
        CycleInput {
            wait_minutes,
            environment: environment(),
        },
        CycleOutput {
            fill_seconds: 45,
            measured_ec,
        },
        reflection,
    )
}

pub fn operation_draft(wait_minutes: u32, measured_ec: f64) -> CycleDraft {
    draft(CyclePhase::Operation, wait_minutes, measured_ec, "steady")
}

pub fn record(id: u64, wait_minutes: u32, measured_ec: f64) -> CycleRecord {
    operation_draft(wait_minutes, measured_ec).into_record(id)
}

/// LLM adapter that replays canned responses and records every request
#[derive(Clone, Default)]
pub struct ScriptedAdapter {
    responses: Arc<Mutex<VecDeque<AppResult<String>>>>,
    requests: Arc<Mutex<Vec<LLMRequest>>>,
}

impl ScriptedAdapter {
    pub fn new(responses: Vec<AppResult<String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::default(),
        }
    }

    pub fn push(&self, response: AppResult<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn into_llm(self) -> Arc<LLM> {
        Arc::new(LLM::from_adapter("scripted", Box::new(self)))
    }
}

#[async_trait]
impl LLMAdapter for ScriptedAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::LLMApi("no scripted response left".to_string())));

        next.map(|content| LLMResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }
}

pub struct FixedEnvironment;

#[async_trait]
impl EnvironmentSensor for FixedEnvironment {
    async fn read_environment(&self) -> AppResult<EnvironmentReading> {
        Ok(environment())
    }
}

/// Fails the first `failures` reads
pub struct FlakyEnvironment {
    failures: AtomicU32,
}

impl FlakyEnvironment {
    pub fn new(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl EnvironmentSensor for FlakyEnvironment {
    async fn read_environment(&self) -> AppResult<EnvironmentReading> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Sensor("sensor offline".to_string()));
        }
        Ok(environment())
    }
}

pub struct FixedForecast;

#[async_trait]
impl WeatherForecaster for FixedForecast {
    async fn read_forecast(&self) -> AppResult<Forecast> {
        Ok(Forecast::Text("Stable weather, moderate humidity.".to_string()))
    }
}

pub struct FailingForecast;

#[async_trait]
impl WeatherForecaster for FailingForecast {
    async fn read_forecast(&self) -> AppResult<Forecast> {
        Err(AppError::Sensor("weather service unreachable".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// Actuator that replays scripted outcomes, then repeats the last one
pub struct ScriptedActuator {
    outcomes: Mutex<VecDeque<AppResult<CycleOutput>>>,
    last_ec: Mutex<f64>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedActuator {
    pub fn new(outcomes: Vec<AppResult<CycleOutput>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            last_ec: Mutex::new(4.0),
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    /// Always reports the same EC
    pub fn constant(measured_ec: f64) -> Self {
        let actuator = Self::new(Vec::new());
        *actuator.last_ec.lock().unwrap() = measured_ec;
        actuator
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn output(measured_ec: f64) -> CycleOutput {
    CycleOutput {
        fill_seconds: 45,
        measured_ec,
    }
}

#[async_trait]
impl Actuator for ScriptedActuator {
    async fn irrigate(&self) -> AppResult<CycleOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Ok(out)) => {
                *self.last_ec.lock().unwrap() = out.measured_ec;
                Ok(out)
            }
            Some(Err(e)) => Err(e),
            None => Ok(output(*self.last_ec.lock().unwrap())),
        }
    }
}

/// Store whose appends always fail
#[derive(Default)]
pub struct FailingStore;

#[async_trait]
impl HistoryStore for FailingStore {
    async fn append(&self, _draft: CycleDraft) -> AppResult<u64> {
        Err(AppError::Storage(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn get_last(&self) -> Option<CycleRecord> {
        None
    }

    async fn get_recent(&self, _window: usize) -> Vec<CycleRecord> {
        Vec::new()
    }

    async fn next_id(&self) -> u64 {
        1
    }
}
