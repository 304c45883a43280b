//! Agent System
//!
//! The two decision functions the control loop consults on every cycle:
//!
//! - **Reflection Agent**: reviews the cycle that just finished and writes a
//!   short comment on EC versus target and on the wait time used
//! - **Planning Agent**: reads that comment plus recent history, current
//!   conditions and the forecast, and proposes the next wait time
//!
//! ## Cycle Overview
//!
//! ```text
//!  history + environment + forecast
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Planning   │  → wait time, clamped to [min, max]
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//!    wait → irrigate
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Reflection  │  → comment stored with the cycle record
//! │   Agent     │
//! └─────────────┘
//! ```
//!
//! Both agents call an LLM when one is configured. Any failure, including an
//! answer in the wrong shape, falls back to a deterministic rule so a cycle is
//! never blocked on the model.

pub mod planning;
pub mod reflection;

pub use planning::{clamp_wait, fallback_plan, PlanContext, PlanningAgent};
pub use reflection::{bound_words, fallback_reflection, ReflectionAgent};

/// Pull the JSON payload out of a model reply that may wrap it in a code fence
pub(crate) fn extract_json(response: &str) -> &str {
    let fenced = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if response.contains("```") {
        response.split("```").nth(1)
    } else {
        None
    };

    let candidate = fenced.unwrap_or(response).trim();

    // Tolerate chatter around a bare object
    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        let bare = r#"{"proposed_wait_minutes": 90}"#;
        assert_eq!(extract_json(bare), bare);

        let fenced = "```json\n{\"proposed_wait_minutes\": 90}\n```";
        assert_eq!(extract_json(fenced), r#"{"proposed_wait_minutes": 90}"#);

        let plain_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(plain_fence), r#"{"a": 1}"#);

        let chatty = "Sure! Here is the plan: {\"a\": 1} Hope that helps.";
        assert_eq!(extract_json(chatty), r#"{"a": 1}"#);

        assert_eq!(extract_json("  no json here "), "no json here");
    }
}
