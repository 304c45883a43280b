//! Field Devices
//!
//! The control loop only sees these three traits: an environment sensor, a
//! weather forecaster and the irrigation actuator. Real deployments back them
//! with the irrigation-control service; `simulated` provides stand-ins with
//! realistic value ranges.

pub mod simulated;

pub use simulated::{SimulatedController, SimulatedEnvironment, SimulatedForecast};

use crate::models::{CycleOutput, EnvironmentReading, Forecast};
use crate::types::AppResult;
use async_trait::async_trait;

#[async_trait]
pub trait EnvironmentSensor: Send + Sync {
    /// Current ambient reading. Errors when no reading can be produced.
    async fn read_environment(&self) -> AppResult<EnvironmentReading>;

    async fn health_check(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait WeatherForecaster: Send + Sync {
    async fn read_forecast(&self) -> AppResult<Forecast>;

    async fn health_check(&self) -> bool {
        true
    }
}

/// The irrigation hardware. There is exactly one per site, so at most one
/// `irrigate` call may be in flight at any time.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Irrigate until the tank is full, then report fill time and measured EC
    async fn irrigate(&self) -> AppResult<CycleOutput>;
}
