//! Engine configuration

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Engine configuration loaded from environment
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard cap on the number of rounds before the game is called
    pub max_game_rounds: u32,
    /// Werewolf discussion passes per wolf before the vote is forced
    pub max_discussion_rounds: u32,
    /// Upper bound of the randomized delay before each fan-out oracle call
    pub stagger_ms: u64,

    /// Ring buffer capacity of the event bus
    pub event_buffer: usize,
    /// Per-subscriber channel capacity
    pub subscriber_capacity: usize,

    /// Directory for game transcript files
    pub log_dir: PathBuf,
    /// Directory for knowledge archive files
    pub experience_dir: PathBuf,
    /// Base filename for knowledge archives
    pub experience_id: String,

    /// Decision oracle connection settings
    pub oracle: OracleConfig,
}

/// Decision oracle (OpenAI-compatible endpoint) settings
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_game_rounds: 30,
            max_discussion_rounds: 3,
            stagger_ms: 400,
            event_buffer: 500,
            subscriber_capacity: 1000,
            log_dir: PathBuf::from("./data/game_logs"),
            experience_dir: PathBuf::from("./data/experiences"),
            experience_id: "experience".to_string(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:32b".to_string(),
            timeout_secs: 120,
            temperature: 0.7,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_game_rounds: env_parse("MAX_GAME_ROUNDS", defaults.max_game_rounds)?,
            max_discussion_rounds: env_parse(
                "MAX_DISCUSSION_ROUNDS",
                defaults.max_discussion_rounds,
            )?,
            stagger_ms: env_parse("ORACLE_STAGGER_MS", defaults.stagger_ms)?,
            event_buffer: env_parse("EVENT_BUFFER_SIZE", defaults.event_buffer)?,
            subscriber_capacity: env_parse("SUBSCRIBER_CAPACITY", defaults.subscriber_capacity)?,
            log_dir: env::var("GAME_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            experience_dir: env::var("EXPERIENCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.experience_dir),
            experience_id: env::var("EXPERIENCE_ID").unwrap_or(defaults.experience_id),
            oracle: OracleConfig {
                base_url: env::var("ORACLE_BASE_URL").unwrap_or(defaults.oracle.base_url),
                model: env::var("ORACLE_MODEL").unwrap_or(defaults.oracle.model),
                timeout_secs: env_parse("ORACLE_TIMEOUT_SECS", defaults.oracle.timeout_secs)?,
                temperature: env_parse("ORACLE_TEMPERATURE", defaults.oracle.temperature)?,
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid value, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_game_rules() {
        let config = EngineConfig::default();
        assert_eq!(config.max_game_rounds, 30);
        assert_eq!(config.max_discussion_rounds, 3);
        assert_eq!(config.event_buffer, 500);
        assert_eq!(config.subscriber_capacity, 1000);
    }
}
