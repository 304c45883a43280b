// End-of-run summary over recent history

use crate::config::ControlConfig;
use crate::models::{CycleRecord, EcStatus};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: usize,
    pub mean_ec: f64,
    /// Floor of the mean wait
    pub mean_wait_minutes: u32,
    pub last_ec: f64,
    pub target_ec: f64,
    pub last_status: EcStatus,
}

impl RunSummary {
    /// `None` when there is nothing to summarise
    pub fn from_history(records: &[CycleRecord], control: &ControlConfig) -> Option<Self> {
        let last = records.last()?;
        let cycles = records.len();

        let total_ec: f64 = records.iter().map(|r| r.output.measured_ec).sum();
        let total_wait: u64 = records.iter().map(|r| u64::from(r.input.wait_minutes)).sum();
        let mean_wait = total_wait / cycles as u64;

        Some(Self {
            cycles,
            mean_ec: total_ec / cycles as f64,
            mean_wait_minutes: u32::try_from(mean_wait).unwrap_or(u32::MAX),
            last_ec: last.output.measured_ec,
            target_ec: control.target_ec,
            last_status: EcStatus::classify(
                last.output.measured_ec,
                control.target_ec,
                control.ec_tolerance,
            ),
        })
    }

    /// Render an optional summary, "no data" when there is none
    pub fn describe(summary: Option<&Self>) -> String {
        summary.map_or_else(|| "Run summary: no data".to_string(), ToString::to_string)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary")?;
        writeln!(f, "  cycles:     {}", self.cycles)?;
        writeln!(f, "  mean EC:    {:.1}", self.mean_ec)?;
        writeln!(f, "  mean wait:  {} min", self.mean_wait_minutes)?;
        write!(
            f,
            "  last EC:    {} (target {}, {})",
            self.last_ec, self.target_ec, self.last_status
        )
    }
}
