use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Timing of the control loop, in simulation ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// How long the caution signal is shown before a new phase is committed.
    pub caution_duration: usize,
    /// The total length of a control cycle, including the caution interval.
    pub cycle_duration: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            caution_duration: 5,
            cycle_duration: 10,
        }
    }
}

impl EnvConfig {
    /// Loads a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| Error::Config(format!("invalid environment config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that a cycle leaves room for recording after the caution interval.
    pub fn validate(&self) -> Result<()> {
        if self.cycle_duration <= self.caution_duration {
            return Err(Error::Config(format!(
                "cycle_duration must exceed caution_duration, got {} <= {}",
                self.cycle_duration, self.caution_duration
            )));
        }
        Ok(())
    }

    /// The number of ticks recorded per cycle outside the caution interval.
    pub fn recording_ticks(&self) -> usize {
        self.cycle_duration - self.caution_duration
    }
}
