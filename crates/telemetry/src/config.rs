//! Match configuration consumed by the generator, driver and publisher.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::models::{PositionGroup, Role};

/// Upper bound of the uniform velocity draw for each position group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityBands {
    /// Props and hookers.
    pub front_row: f64,
    /// Locks, flankers and number eight.
    pub back_five: f64,
    /// Scrum half, fly half and centres.
    pub inside_backs: f64,
    /// Wings and fullback.
    pub outside_backs: f64,
}

impl Default for VelocityBands {
    fn default() -> Self {
        Self {
            front_row: 10.0,
            back_five: 20.0,
            inside_backs: 30.0,
            outside_backs: 40.0,
        }
    }
}

impl VelocityBands {
    pub fn max_velocity(&self, role: Role) -> f64 {
        match role.group() {
            PositionGroup::FrontRow => self.front_row,
            PositionGroup::BackFive => self.back_five,
            PositionGroup::InsideBacks => self.inside_backs,
            PositionGroup::OutsideBacks => self.outside_backs,
        }
    }
}

/// Configuration for one simulated match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Number of ticks in a match; ticks run `0..match_ticks`.
    pub match_ticks: u32,

    /// Probability (0.0-1.0) that a player takes an impact on a given tick.
    pub impact_probability: f64,

    /// Impacts strictly above this force are published on the alert feed.
    pub impact_alert_threshold: f64,

    /// Role-banded velocity ranges.
    pub velocity_bands: VelocityBands,

    /// First segment of every transport topic.
    pub topic_prefix: String,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_ticks: 81,
            impact_probability: 0.4,
            impact_alert_threshold: 5.5,
            velocity_bands: VelocityBands::default(),
            topic_prefix: "rugby".to_string(),
        }
    }
}

impl MatchConfig {
    /// Defaults overlaid with `MATCH_TICKS`, `IMPACT_PROBABILITY`,
    /// `IMPACT_ALERT_THRESHOLD` and `TOPIC_PREFIX` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ticks) = env_parse::<u32>("MATCH_TICKS")? {
            config.match_ticks = ticks;
        }
        if let Some(p) = env_parse::<f64>("IMPACT_PROBABILITY")? {
            config.impact_probability = p;
        }
        if let Some(threshold) = env_parse::<f64>("IMPACT_ALERT_THRESHOLD")? {
            config.impact_alert_threshold = threshold;
        }
        if let Ok(prefix) = env::var("TOPIC_PREFIX") {
            config.topic_prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_ticks == 0 {
            return Err(ConfigError::Invalid {
                key: "MATCH_TICKS",
                value: self.match_ticks.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.impact_probability) {
            return Err(ConfigError::Invalid {
                key: "IMPACT_PROBABILITY",
                value: self.impact_probability.to_string(),
            });
        }
        if self.topic_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                key: "TOPIC_PREFIX",
                value: String::new(),
            });
        }
        Ok(())
    }
}

/// Reads and parses an environment variable. Unset is `Ok(None)`.
pub fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::Invalid {
            key,
            value: "<non-unicode>".to_string(),
        }),
    }
}
