//! Processor start-up configuration.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::registers::Registers;

/// Register contents at power on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOn {
    /// The non-zero pattern real firmware is known to tolerate.
    #[default]
    Garbage,
    /// Every register cleared.
    Zeroed,
}

impl PowerOn {
    /// The register file this fill produces.
    pub fn registers(self) -> Registers {
        match self {
            PowerOn::Garbage => Registers::power_on(),
            PowerOn::Zeroed => Registers::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("reset_pulses must be at least 1, got {0}")]
    NoReset(u32),
}

/// How the processor comes out of reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub power_on: PowerOn,
    /// Digit times spent in reset. All but the last drive PREG to load
    /// address 0; the last latches the first instruction.
    pub reset_pulses: u32,
    /// Start with COND set, as the hardware logs show.
    pub cond_at_boot: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            power_on: PowerOn::Garbage,
            reset_pulses: 5,
            cond_at_boot: true,
        }
    }
}

impl CpuConfig {
    /// Parse a JSON configuration. Missing keys take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: CpuConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the core cannot boot with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reset_pulses == 0 {
            return Err(ConfigError::NoReset(self.reset_pulses));
        }
        Ok(())
    }

    /// A configuration with cleared registers.
    pub fn zeroed() -> Self {
        Self {
            power_on: PowerOn::Zeroed,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CpuConfig::default();
        assert_eq!(config.power_on, PowerOn::Garbage);
        assert_eq!(config.reset_pulses, 5);
        assert!(config.cond_at_boot);
    }

    #[test]
    fn test_from_json_partial() {
        let config = CpuConfig::from_json(r#"{"power_on": "zeroed"}"#).unwrap();
        assert_eq!(config, CpuConfig::zeroed());

        let config = CpuConfig::from_json(r#"{"reset_pulses": 2, "cond_at_boot": false}"#).unwrap();
        assert_eq!(config.reset_pulses, 2);
        assert!(!config.cond_at_boot);
        assert_eq!(config.power_on, PowerOn::Garbage);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            CpuConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CpuConfig::from_json(r#"{"power_on": "random"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CpuConfig::from_json(r#"{"reset_pulses": 0}"#),
            Err(ConfigError::NoReset(0))
        ));
    }

    #[test]
    fn test_power_on_registers() {
        assert_eq!(PowerOn::Zeroed.registers(), Registers::new());
        assert_eq!(PowerOn::Garbage.registers().fa, 0xDEAD);
    }
}
