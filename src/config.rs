use crate::types::{AppError, AppResult};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const HISTORY_FILE_NAME: &str = "irrigation_history.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub control: ControlConfig,
    pub llm: LLMConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// What to do with the run when an operation cycle is aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleErrorPolicy {
    /// Log, skip the cycle and move on to the next one
    Continue,
    /// Log and end the run with the cycle's error
    Stop,
}

impl FromStr for CycleErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(CycleErrorPolicy::Continue),
            "stop" => Ok(CycleErrorPolicy::Stop),
            other => Err(format!("expected 'continue' or 'stop', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub target_ec: f64,
    pub min_wait_minutes: u32,
    pub max_wait_minutes: u32,
    /// Wait used for the calibration cycle and when there is no history to plan from
    pub calibration_wait_minutes: u32,
    pub fallback_step_minutes: u32,
    /// `None` runs until cancelled
    pub max_cycles: Option<u32>,
    pub history_window: usize,
    pub plan_history_len: usize,
    pub ec_tolerance: f64,
    pub max_reflection_words: usize,
    /// Real time per planned minute
    pub wait_unit: Duration,
    pub actuator_timeout: Duration,
    pub env_read_attempts: u32,
    pub on_cycle_error: CycleErrorPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            target_ec: 4.0,
            min_wait_minutes: 60,
            max_wait_minutes: 300,
            calibration_wait_minutes: 120,
            fallback_step_minutes: 30,
            max_cycles: Some(5),
            history_window: 24,
            plan_history_len: 5,
            ec_tolerance: 0.2,
            max_reflection_words: 100,
            wait_unit: Duration::from_secs(60),
            actuator_timeout: Duration::from_secs(900),
            env_read_attempts: 3,
            on_cycle_error: CycleErrorPolicy::Continue,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl LLMConfig {
    /// API key if one is configured and non-empty
    pub fn active_api_key(&self) -> Option<String> {
        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub history_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ControlConfig::default();

        let max_cycles = match lookup("MAX_CYCLES") {
            Some(v) if v.trim().eq_ignore_ascii_case("unbounded") => None,
            Some(v) => Some(parse_value("MAX_CYCLES", &v)?),
            None => defaults.max_cycles,
        };

        let control = ControlConfig {
            target_ec: parse_or(&lookup, "TARGET_EC", defaults.target_ec)?,
            min_wait_minutes: parse_or(&lookup, "MIN_WAIT_MINUTES", defaults.min_wait_minutes)?,
            max_wait_minutes: parse_or(&lookup, "MAX_WAIT_MINUTES", defaults.max_wait_minutes)?,
            calibration_wait_minutes: parse_or(
                &lookup,
                "CALIBRATION_WAIT_MINUTES",
                defaults.calibration_wait_minutes,
            )?,
            fallback_step_minutes: parse_or(
                &lookup,
                "FALLBACK_STEP_MINUTES",
                defaults.fallback_step_minutes,
            )?,
            max_cycles,
            history_window: parse_or(&lookup, "HISTORY_WINDOW", defaults.history_window)?,
            plan_history_len: parse_or(&lookup, "PLAN_HISTORY_LEN", defaults.plan_history_len)?,
            ec_tolerance: parse_or(&lookup, "EC_TOLERANCE", defaults.ec_tolerance)?,
            max_reflection_words: parse_or(
                &lookup,
                "MAX_REFLECTION_WORDS",
                defaults.max_reflection_words,
            )?,
            wait_unit: secs_or(&lookup, "WAIT_UNIT_SECS", defaults.wait_unit)?,
            actuator_timeout: secs_or(&lookup, "ACTUATOR_TIMEOUT_SECS", defaults.actuator_timeout)?,
            env_read_attempts: parse_or(&lookup, "ENV_READ_ATTEMPTS", defaults.env_read_attempts)?,
            on_cycle_error: parse_or(&lookup, "ON_CYCLE_ERROR", defaults.on_cycle_error)?,
        };

        let llm = LLMConfig {
            provider: lookup("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string()),
            api_key: lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
            base_url: lookup("LLM_BASE_URL").or_else(|| lookup("OPENAI_BASE_URL")),
            model: lookup("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            temperature: parse_or(&lookup, "LLM_TEMPERATURE", 0.3)?,
            request_timeout: secs_or(&lookup, "LLM_TIMEOUT_SECS", Duration::from_secs(60))?,
        };

        let storage = StorageConfig {
            history_path: lookup("HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_history_path),
        };

        let logging = LoggingConfig {
            log_dir: lookup("LOG_DIR").map(PathBuf::from),
        };

        Ok(Self {
            control,
            llm,
            storage,
            logging,
        })
    }

    /// Reject settings the control loop cannot run with
    pub fn validate(&self) -> AppResult<()> {
        self.control.validate()
    }
}

impl ControlConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !self.target_ec.is_finite() || self.target_ec <= 0.0 {
            return Err(invalid(format!(
                "target EC must be a positive number, got {}",
                self.target_ec
            )));
        }
        if self.min_wait_minutes == 0 {
            return Err(invalid("minimum wait must be at least one minute"));
        }
        if self.min_wait_minutes >= self.max_wait_minutes {
            return Err(invalid(format!(
                "wait range is empty: min {} >= max {}",
                self.min_wait_minutes, self.max_wait_minutes
            )));
        }
        if !(self.min_wait_minutes..=self.max_wait_minutes).contains(&self.calibration_wait_minutes) {
            return Err(invalid(format!(
                "calibration wait {} is outside [{}, {}]",
                self.calibration_wait_minutes, self.min_wait_minutes, self.max_wait_minutes
            )));
        }
        if !self.ec_tolerance.is_finite() || self.ec_tolerance < 0.0 {
            return Err(invalid("EC tolerance must be a non-negative number"));
        }
        if self.history_window == 0 || self.plan_history_len == 0 {
            return Err(invalid("history window and plan history length must be non-zero"));
        }
        if self.max_reflection_words == 0 {
            return Err(invalid("reflection word bound must be non-zero"));
        }
        if self.actuator_timeout.is_zero() {
            return Err(invalid("actuator timeout must be non-zero"));
        }
        if self.env_read_attempts == 0 {
            return Err(invalid("environment read attempts must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidConfig(message.into())
}

fn parse_value<T>(key: &str, raw: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| invalid(format!("{}={:?}: {}", key, raw, e)))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> AppResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let secs: f64 = parse_value(key, &raw)?;
            Duration::try_from_secs_f64(secs)
                .map_err(|e| invalid(format!("{}={:?}: {}", key, raw, e)))
        }
        None => Ok(default),
    }
}

fn default_history_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("irrigation-agent").join(HISTORY_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(HISTORY_FILE_NAME))
}
