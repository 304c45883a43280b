// Core irrigation-cycle models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ambient conditions captured at the start of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentReading {
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Reference evapotranspiration index
    pub et0: f64,
}

/// The decision taken for a cycle and the conditions it was taken under
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleInput {
    pub wait_minutes: u32,
    pub environment: EnvironmentReading,
}

/// What the actuator observed once the tank was full
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleOutput {
    pub fill_seconds: u32,
    pub measured_ec: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CyclePhase {
    Calibration,
    Operation,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Calibration => write!(f, "calibration"),
            CyclePhase::Operation => write!(f, "operation"),
        }
    }
}

/// A persisted irrigation cycle. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub phase: CyclePhase,
    pub input: CycleInput,
    pub output: CycleOutput,
    #[serde(default)]
    pub reflection_text: String,
}

/// A completed cycle that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDraft {
    pub timestamp: DateTime<Utc>,
    pub phase: CyclePhase,
    pub input: CycleInput,
    pub output: CycleOutput,
    pub reflection_text: String,
}

impl CycleDraft {
    pub fn new(
        phase: CyclePhase,
        input: CycleInput,
        output: CycleOutput,
        reflection_text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            phase,
            input,
            output,
            reflection_text: reflection_text.into(),
        }
    }

    pub fn into_record(self, id: u64) -> CycleRecord {
        CycleRecord {
            id,
            timestamp: self.timestamp,
            phase: self.phase,
            input: self.input,
            output: self.output,
            reflection_text: self.reflection_text,
        }
    }
}

/// Where a plan decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Model,
    Fallback,
}

/// Proposed wait for the next cycle. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDecision {
    pub proposed_wait_minutes: u32,
    pub rationale: String,
    pub source: DecisionSource,
}

/// Structured weather outlook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherOutlook {
    pub temperature: f64,
    pub humidity: f64,
    pub description: String,
}

/// Forecast handed to the planner as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Forecast {
    Text(String),
    Structured(WeatherOutlook),
}

impl Forecast {
    pub fn unavailable() -> Self {
        Forecast::Text("Forecast unavailable.".to_string())
    }
}

impl fmt::Display for Forecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forecast::Text(text) => write!(f, "{}", text),
            Forecast::Structured(outlook) => write!(
                f,
                "{} ({:.1}°C, {:.0}% humidity)",
                outlook.description, outlook.temperature, outlook.humidity
            ),
        }
    }
}

// Absorbs float error at the band edge (|4.2 - 4.0| > 0.2 in f64)
const EC_BAND_EPSILON: f64 = 1e-9;

/// Measured EC relative to the target band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcStatus {
    OnTarget,
    AboveTarget,
    BelowTarget,
}

impl EcStatus {
    pub fn classify(measured_ec: f64, target_ec: f64, tolerance: f64) -> Self {
        if (measured_ec - target_ec).abs() <= tolerance + EC_BAND_EPSILON {
            EcStatus::OnTarget
        } else if measured_ec > target_ec {
            EcStatus::AboveTarget
        } else {
            EcStatus::BelowTarget
        }
    }

    /// What the next cycle should do about it
    pub fn advice(&self) -> &'static str {
        match self {
            EcStatus::OnTarget => "keep the current wait time",
            EcStatus::AboveTarget => "irrigate sooner",
            EcStatus::BelowTarget => "wait longer",
        }
    }
}

impl fmt::Display for EcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcStatus::OnTarget => write!(f, "on target"),
            EcStatus::AboveTarget => write!(f, "above target"),
            EcStatus::BelowTarget => write!(f, "below target"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(id: u64, ec: f64, wait: u32, reflection: &str) -> CycleRecord {
        CycleDraft::new(
            CyclePhase::Operation,
            CycleInput {
                wait_minutes: wait,
                environment: EnvironmentReading {
                    temperature: 31.7,
                    humidity: 64.3,
                    et0: 0.23,
                },
            },
            CycleOutput {
                fill_seconds: 42,
                measured_ec: ec,
            },
            reflection,
        )
        .into_record(id)
    }

    #[test]
    fn test_record_roundtrip_edge_values() {
        let record = sample_record(7, 0.0, 300, "");
        let json = serde_json::to_string(&record).unwrap();
        let back: CycleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_record_roundtrip_keeps_float_precision() {
        let mut record = sample_record(1, 4.123456789012345, 150, "EC slightly high");
        record.input.environment.temperature = 0.1 + 0.2;
        record.input.environment.et0 = 1.0 / 3.0;
        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: CycleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.output.measured_ec.to_bits(), record.output.measured_ec.to_bits());
        assert_eq!(
            back.input.environment.temperature.to_bits(),
            record.input.environment.temperature.to_bits()
        );
        assert_eq!(back, record);
    }

    #[test]
    fn test_phase_wire_format() {
        let json = serde_json::to_string(&CyclePhase::Calibration).unwrap();
        assert_eq!(json, "\"CALIBRATION\"");
        let phase: CyclePhase = serde_json::from_str("\"OPERATION\"").unwrap();
        assert_eq!(phase, CyclePhase::Operation);
    }

    #[test]
    fn test_ec_status_bands() {
        assert_eq!(EcStatus::classify(4.2, 4.0, 0.2), EcStatus::OnTarget);
        assert_eq!(EcStatus::classify(3.8, 4.0, 0.2), EcStatus::OnTarget);
        assert_eq!(EcStatus::classify(4.3, 4.0, 0.2), EcStatus::AboveTarget);
        assert_eq!(EcStatus::classify(3.6, 4.0, 0.2), EcStatus::BelowTarget);
        assert_eq!(EcStatus::classify(4.21, 4.0, 0.2), EcStatus::AboveTarget);
        assert_eq!(EcStatus::classify(3.79, 4.0, 0.2), EcStatus::BelowTarget);
        assert_eq!(EcStatus::classify(5.5, 5.0, 0.5), EcStatus::OnTarget);
        assert_eq!(EcStatus::AboveTarget.advice(), "irrigate sooner");
    }

    #[test]
    fn test_forecast_display() {
        let text = Forecast::Text("Light rain in the afternoon.".into());
        assert_eq!(text.to_string(), "Light rain in the afternoon.");

        let structured = Forecast::Structured(WeatherOutlook {
            temperature: 29.04,
            humidity: 71.6,
            description: "Cloudy".into(),
        });
        assert_eq!(structured.to_string(), "Cloudy (29.0°C, 72% humidity)");
    }
}
