// Simulated devices for demos and dry runs

use super::{Actuator, EnvironmentSensor, WeatherForecaster};
use crate::models::{CycleOutput, EnvironmentReading, Forecast};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

const FORECASTS: &[&str] = &[
    "Sunny, temperature trending slightly upward.",
    "Stable weather, moderate humidity.",
    "Light rain possible in the afternoon.",
    "Overcast, high humidity.",
];

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Greenhouse-like readings: 28–35 °C, 60–80 % humidity, ET0 0.20–0.30
#[derive(Debug, Default)]
pub struct SimulatedEnvironment;

#[async_trait]
impl EnvironmentSensor for SimulatedEnvironment {
    async fn read_environment(&self) -> AppResult<EnvironmentReading> {
        let mut rng = rand::thread_rng();
        Ok(EnvironmentReading {
            temperature: round_to(rng.gen_range(28.0..=35.0), 1),
            humidity: round_to(rng.gen_range(60.0..=80.0), 1),
            et0: round_to(rng.gen_range(0.2..=0.3), 2),
        })
    }
}

/// Cycles through a fixed set of textual forecasts
#[derive(Debug, Default)]
pub struct SimulatedForecast {
    next: AtomicUsize,
}

#[async_trait]
impl WeatherForecaster for SimulatedForecast {
    async fn read_forecast(&self) -> AppResult<Forecast> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % FORECASTS.len();
        Ok(Forecast::Text(FORECASTS[index].to_string()))
    }
}

/// Fake irrigation controller: fills in 30–60 s and measures EC 3.5–5.5
pub struct SimulatedController {
    busy: Mutex<()>,
    fill_delay: Duration,
}

impl SimulatedController {
    /// `fill_delay` is how long a simulated fill actually blocks
    pub fn new(fill_delay: Duration) -> Self {
        Self {
            busy: Mutex::new(()),
            fill_delay,
        }
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl Actuator for SimulatedController {
    async fn irrigate(&self) -> AppResult<CycleOutput> {
        let _guard = self
            .busy
            .try_lock()
            .map_err(|_| AppError::Actuator("controller busy: irrigation already in progress".to_string()))?;

        info!("Irrigation started");
        tokio::time::sleep(self.fill_delay).await;

        let output = {
            let mut rng = rand::thread_rng();
            CycleOutput {
                fill_seconds: rng.gen_range(30..=60),
                measured_ec: round_to(rng.gen_range(3.5..=5.5), 1),
            }
        };

        info!(
            fill_seconds = output.fill_seconds,
            measured_ec = output.measured_ec,
            "Irrigation complete"
        );
        Ok(output)
    }
}
