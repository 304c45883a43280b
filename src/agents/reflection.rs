// Reflection agent
// Reviews a finished cycle and leaves a short note for the next planning step

use crate::config::{ControlConfig, LLMConfig};
use crate::llm::provider::LLM;
use crate::models::{CycleInput, CycleOutput, EcStatus};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ReflectionAgent {
    llm: Option<Arc<LLM>>,
    model: String,
    temperature: f32,
    control: ControlConfig,
}

impl ReflectionAgent {
    pub fn new(llm: Option<Arc<LLM>>, llm_config: &LLMConfig, control: ControlConfig) -> Self {
        Self {
            llm,
            model: llm_config.model.clone(),
            temperature: llm_config.temperature,
            control,
        }
    }

    /// Comment on a completed cycle. Never fails; the numeric fallback covers
    /// any problem with the model.
    pub async fn reflect(&self, input: &CycleInput, output: &CycleOutput) -> String {
        if self.llm.is_none() {
            return fallback_reflection(input, output, &self.control);
        }

        match self.create_reflection(input, output).await {
            Ok(comment) => comment,
            Err(e) => {
                warn!(step = "reflect", error = %e, "Reflection failed, using fallback comment");
                fallback_reflection(input, output, &self.control)
            }
        }
    }

    pub async fn create_reflection(
        &self,
        input: &CycleInput,
        output: &CycleOutput,
    ) -> AppResult<String> {
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| AppError::LLMApi("no decision model configured".to_string()))?;

        let prompt = format!(
            r#"Review this irrigation cycle.

Target EC: {target:.2}
Wait before irrigation: {wait} minutes
Temperature: {temperature:.1} °C
Humidity: {humidity:.1} %
ET0: {et0:.2}
Fill time: {fill} seconds
Measured EC: {ec:.2}

In at most {words} words, say whether the measured EC overshot or undershot the target and whether the wait time was appropriate. Plain text only."#,
            target = self.control.target_ec,
            wait = input.wait_minutes,
            temperature = input.environment.temperature,
            humidity = input.environment.humidity,
            et0 = input.environment.et0,
            fill = output.fill_seconds,
            ec = output.measured_ec,
            words = self.control.max_reflection_words,
        );

        let request = LLMRequest {
            model: self.model.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(300),
            temperature: Some(self.temperature),
            system_instruction: Some(
                "You assess irrigation cycles against an EC target. Be brief and concrete.".to_string(),
            ),
        };

        let response = llm.create_chat_completion(&request).await?;
        let comment = response.content.trim();
        if comment.is_empty() {
            return Err(AppError::InvalidResponse("empty reflection".to_string()));
        }

        let bounded = bound_words(comment, self.control.max_reflection_words);
        debug!(words = bounded.split_whitespace().count(), "Reflection received");
        Ok(bounded)
    }
}

/// Comment built only from the EC comparison
pub fn fallback_reflection(input: &CycleInput, output: &CycleOutput, control: &ControlConfig) -> String {
    let status = EcStatus::classify(output.measured_ec, control.target_ec, control.ec_tolerance);
    format!(
        "Measured EC {:.2} is {} ({:.2}) after waiting {} minutes; {}.",
        output.measured_ec,
        status,
        control.target_ec,
        input.wait_minutes,
        status.advice()
    )
}

/// Keep at most `max_words` words, collapsing whitespace
pub fn bound_words(text: &str, max_words: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(max_words).collect();
    let mut bounded = kept.join(" ");
    if words.next().is_some() {
        bounded.push_str("...");
    }
    bounded
}
