//! core::config::schema
//!
//! Configuration file schema.
//!
//! The global file and the project file share one schema. Every field is
//! optional so a file only needs to name what it overrides.
//!
//! # Validation
//!
//! Values are validated after parsing: contrast ratios must lie in the
//! WCAG range `[1, 21]` and limits must be non-zero. Cross-field ordering
//! (`aa_large <= aa <= aaa`) is checked on the merged configuration.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Lowest contrast ratio two colors can have.
pub const MIN_CONTRAST_RATIO: f64 = 1.0;

/// Highest contrast ratio two colors can have (black on white).
pub const MAX_CONTRAST_RATIO: f64 = 21.0;

/// A configuration file.
///
/// # Example
///
/// ```toml
/// [contrast]
/// aa = 4.5
/// aaa = 7.0
/// aa_large = 3.0
///
/// [limits]
/// max_tokens = 10000
/// max_rule_length = 1024
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Minimum contrast ratios per accessibility standard
    pub contrast: Option<ContrastConfig>,

    /// Size limits
    pub limits: Option<LimitsConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(contrast) = &self.contrast {
            contrast.validate()?;
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
        }
        Ok(())
    }
}

/// Minimum contrast ratios used by `contrast(...)` rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContrastConfig {
    /// WCAG AA, normal text
    pub aa: Option<f64>,

    /// WCAG AAA, normal text
    pub aaa: Option<f64>,

    /// WCAG AA, large text
    pub aa_large: Option<f64>,
}

impl ContrastConfig {
    /// Validate that each configured ratio is a real contrast ratio.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("aa", self.aa), ("aaa", self.aaa), ("aa_large", self.aa_large)] {
            if let Some(ratio) = value {
                if !(MIN_CONTRAST_RATIO..=MAX_CONTRAST_RATIO).contains(&ratio) {
                    return Err(ConfigError::InvalidValue(format!(
                        "contrast.{key} = {ratio} is outside [{MIN_CONTRAST_RATIO}, {MAX_CONTRAST_RATIO}]"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Size limits for a registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum number of tokens a registry holds
    pub max_tokens: Option<usize>,

    /// Maximum length of a rule expression, in bytes
    pub max_rule_length: Option<usize>,
}

impl LimitsConfig {
    /// Validate that limits are non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == Some(0) {
            return Err(ConfigError::InvalidValue(
                "limits.max_tokens cannot be 0".to_string(),
            ));
        }
        if self.max_rule_length == Some(0) {
            return Err(ConfigError::InvalidValue(
                "limits.max_rule_length cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty() {
        let config = ConfigFile::default();
        assert!(config.contrast.is_none());
        assert!(config.limits.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ratio_out_of_range_rejected() {
        let config = ConfigFile {
            contrast: Some(ContrastConfig {
                aaa: Some(22.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("contrast.aaa"));

        let config = ConfigFile {
            contrast: Some(ContrastConfig {
                aa: Some(0.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let config = ConfigFile {
            limits: Some(LimitsConfig {
                max_tokens: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn roundtrip() {
        let config = ConfigFile {
            contrast: Some(ContrastConfig {
                aa: Some(4.5),
                aaa: Some(7.0),
                aa_large: Some(3.0),
            }),
            limits: Some(LimitsConfig {
                max_tokens: Some(500),
                max_rule_length: Some(256),
            }),
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn reject_unknown_fields() {
        let toml = r#"
            [contrast]
            aa = 4.5
            aaaa = 9.0
        "#;

        let result: Result<ConfigFile, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
