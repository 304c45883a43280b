//! Planning Agent
//!
//! Chooses the wait before the next irrigation. The model proposes a value;
//! whatever it returns is clamped to the configured range. When the model is
//! missing, fails, or answers in the wrong shape, a step rule driven by the
//! last cycle takes over.

use crate::config::{ControlConfig, LLMConfig};
use crate::llm::provider::LLM;
use crate::models::{CycleRecord, DecisionSource, EnvironmentReading, Forecast, PlanDecision};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const REFLECTION_EXCERPT_CHARS: usize = 50;

/// Inputs to one planning decision
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub last_reflection: &'a str,
    /// Recent records, oldest first
    pub history: &'a [CycleRecord],
    pub environment: &'a EnvironmentReading,
    pub forecast: &'a Forecast,
}

/// Compact history line shown to the model
#[derive(Debug, Serialize)]
struct HistoryEntry {
    wait_minutes: u32,
    measured_ec: f64,
    reflection: String,
}

/// Raw JSON answer expected from the model
#[derive(Debug, Deserialize)]
struct PlanLLMResponse {
    #[serde(default)]
    proposed_wait_minutes: Option<serde_json::Value>,
    #[serde(default)]
    rationale: Option<String>,
}

pub struct PlanningAgent {
    llm: Option<Arc<LLM>>,
    model: String,
    temperature: f32,
    control: ControlConfig,
}

impl PlanningAgent {
    pub fn new(llm: Option<Arc<LLM>>, llm_config: &LLMConfig, control: ControlConfig) -> Self {
        Self {
            llm,
            model: llm_config.model.clone(),
            temperature: llm_config.temperature,
            control,
        }
    }

    /// Always produces a decision within `[min_wait, max_wait]`
    pub async fn plan(&self, context: &PlanContext<'_>) -> PlanDecision {
        if self.llm.is_none() {
            debug!("No decision model configured, planning with the fallback rule");
            return fallback_plan(context.history, &self.control);
        }

        match self.request_plan(context).await {
            Ok(decision) => {
                info!(
                    wait_minutes = decision.proposed_wait_minutes,
                    "Planning agent proposed next wait"
                );
                decision
            }
            Err(e) => {
                warn!(step = "plan", error = %e, "Plan decision failed, using fallback rule");
                fallback_plan(context.history, &self.control)
            }
        }
    }

    /// Ask the model for a decision without any fallback
    pub async fn request_plan(&self, context: &PlanContext<'_>) -> AppResult<PlanDecision> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| AppError::LLMApi("no decision model configured".to_string()))?;

        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(self.create_plan_prompt(context)?)],
            max_tokens: Some(512),
            temperature: Some(self.temperature),
            system_instruction: Some(
                "You are an irrigation control specialist. You combine quantitative cycle data with qualitative notes to choose irrigation timing. Reply with JSON only.".to_string(),
            ),
        };

        let response = llm.create_chat_completion(&request).await?;
        parse_plan_response(&response.content, &self.control)
    }

    fn create_plan_prompt(&self, context: &PlanContext<'_>) -> AppResult<String> {
        let history = summarize_history(context.history, self.control.plan_history_len);
        let history_json = serde_json::to_string_pretty(&history)?;
        let environment_json = serde_json::to_string_pretty(context.environment)?;
        let last_reflection = if context.last_reflection.is_empty() {
            "(none yet)"
        } else {
            context.last_reflection
        };

        Ok(format!(
            r#"Adjust the waiting time before the next irrigation so that the measured EC moves toward the target of {target:.2}.

## Note from the most recent cycle
{last_reflection}

## Recent cycles (oldest first)
{history_json}

## Current environment
{environment_json}

## Weather forecast
{forecast}

## Rules
- EC above {target:.2}: shorten the wait so irrigation happens sooner.
- EC below {target:.2}: lengthen the wait so more water evaporates.
- The wait must stay between {min} and {max} minutes.
- Change the wait in small steps; never jump straight to a boundary.

Respond with a single JSON object and nothing else:
{{
  "proposed_wait_minutes": <number of minutes>,
  "rationale": "<one or two sentences explaining the decision>"
}}"#,
            target = self.control.target_ec,
            last_reflection = last_reflection,
            history_json = history_json,
            environment_json = environment_json,
            forecast = context.forecast,
            min = self.control.min_wait_minutes,
            max = self.control.max_wait_minutes,
        ))
    }
}

fn summarize_history(history: &[CycleRecord], len: usize) -> Vec<HistoryEntry> {
    let start = history.len().saturating_sub(len);
    history[start..]
        .iter()
        .map(|record| HistoryEntry {
            wait_minutes: record.input.wait_minutes,
            measured_ec: record.output.measured_ec,
            reflection: excerpt(&record.reflection_text, REFLECTION_EXCERPT_CHARS),
        })
        .collect()
}

/// First `max_chars` characters followed by "...", or "" for an empty note
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut short: String = text.chars().take(max_chars).collect();
    short.push_str("...");
    short
}

/// Validate the model's answer and clamp the proposed wait into range
fn parse_plan_response(content: &str, control: &ControlConfig) -> AppResult<PlanDecision> {
    let json_str = super::extract_json(content);
    let parsed: PlanLLMResponse = serde_json::from_str(json_str)
        .map_err(|e| AppError::InvalidResponse(format!("plan is not valid JSON: {}", e)))?;

    let proposed = parsed
        .proposed_wait_minutes
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            AppError::InvalidResponse(format!(
                "proposed_wait_minutes missing or not a number: {:?}",
                parsed.proposed_wait_minutes
            ))
        })?;

    let wait = clamp_wait(proposed, control.min_wait_minutes, control.max_wait_minutes);
    if f64::from(wait) != proposed.trunc() {
        debug!(proposed, clamped = wait, "Clamped proposed wait into range");
    }

    Ok(PlanDecision {
        proposed_wait_minutes: wait,
        rationale: parsed.rationale.unwrap_or_default(),
        source: DecisionSource::Model,
    })
}

/// Truncate toward zero, then clamp to `[min, max]`
pub fn clamp_wait(proposed: f64, min: u32, max: u32) -> u32 {
    if proposed.is_nan() {
        return min;
    }
    proposed.trunc().clamp(f64::from(min), f64::from(max)) as u32
}

/// Step the last cycle's wait toward the target: shorter when EC ran high,
/// longer otherwise. With no history, start from the calibration wait.
pub fn fallback_plan(history: &[CycleRecord], control: &ControlConfig) -> PlanDecision {
    let min = control.min_wait_minutes;
    let max = control.max_wait_minutes;
    let step = control.fallback_step_minutes;

    let (wait, rationale) = match history.last() {
        Some(last) => {
            let last_wait = last.input.wait_minutes;
            let ec = last.output.measured_ec;
            if ec > control.target_ec {
                (
                    last_wait.saturating_sub(step).clamp(min, max),
                    format!(
                        "Fallback rule: EC {:.2} above target {:.2}, shortening wait from {} min",
                        ec, control.target_ec, last_wait
                    ),
                )
            } else {
                (
                    last_wait.saturating_add(step).clamp(min, max),
                    format!(
                        "Fallback rule: EC {:.2} at or below target {:.2}, lengthening wait from {} min",
                        ec, control.target_ec, last_wait
                    ),
                )
            }
        }
        None => (
            control.calibration_wait_minutes,
            "Fallback rule: no history, using the default wait".to_string(),
        ),
    };

    PlanDecision {
        proposed_wait_minutes: wait,
        rationale,
        source: DecisionSource::Fallback,
    }
}
