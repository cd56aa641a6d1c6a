//! Habit settings
//!
//! Frequency and numeric target are external configuration: the engine treats
//! them as immutable for the lifetime of a [`crate::Habit`].

use crate::error::HabitError;
use crate::types::{Frequency, HabitKind};
use serde::{Deserialize, Serialize};

/// Direction of a numeric target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Reach at least `target_value` per window (e.g. 8 glasses of water)
    #[default]
    AtLeast,
    /// Stay at or below `target_value` per window (e.g. 2 coffees)
    AtMost,
}

/// Settings that shape how raw entries turn into completions and scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitConfig {
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: HabitKind,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    /// Target per window in natural units (numeric habits only)
    #[serde(default)]
    pub target_value: f64,
    #[serde(default)]
    pub target_type: TargetType,
}

fn default_frequency() -> Frequency {
    Frequency::DAILY
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self::boolean(Frequency::DAILY)
    }
}

impl HabitConfig {
    /// Yes/no habit with the given target frequency
    pub fn boolean(frequency: Frequency) -> Self {
        Self {
            name: String::new(),
            kind: HabitKind::Boolean,
            frequency,
            target_value: 0.0,
            target_type: TargetType::AtLeast,
        }
    }

    /// Measured habit with a target per `frequency.denominator()` days
    pub fn numeric(frequency: Frequency, target_value: f64, target_type: TargetType) -> Self {
        Self {
            name: String::new(),
            kind: HabitKind::Numeric,
            frequency,
            target_value,
            target_type,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<(), HabitError> {
        if !self.target_value.is_finite() || self.target_value < 0.0 {
            return Err(HabitError::Config(format!(
                "target_value must be a non-negative number, got {}",
                self.target_value
            )));
        }
        Ok(())
    }

    /// Load a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, HabitError> {
        let config: HabitConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, HabitError> {
        Ok(serde_json::to_string(self)?)
    }
}
