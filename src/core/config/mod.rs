//! core::config
//!
//! Engine configuration schema and loading.
//!
//! # Overview
//!
//! The engine has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Design-system-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$RAFTERS_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rafters/config.toml`
//! 3. `~/.rafters/config.toml`
//!
//! # Project Config Locations
//!
//! Searched in order:
//! 1. `.rafters/config.toml` (canonical)
//! 2. `rafters.toml` (compatibility, warns)
//!
//! # Example
//!
//! ```no_run
//! use rafters_tokens::core::config::EngineConfig;
//! use rafters_tokens::rules::ContrastStandard;
//! use std::path::Path;
//!
//! let result = EngineConfig::load(Some(Path::new("/path/to/design-system"))).unwrap();
//! let config = result.config;
//!
//! println!("AAA ratio: {}", config.min_ratio(ContrastStandard::Aaa));
//! println!("Token limit: {}", config.max_tokens());
//! ```

pub mod schema;

pub use schema::{ConfigFile, ContrastConfig, LimitsConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::rules::ContrastStandard;

/// Default WCAG AA ratio for normal text.
pub const DEFAULT_AA: f64 = 4.5;
/// Default WCAG AAA ratio for normal text.
pub const DEFAULT_AAA: f64 = 7.0;
/// Default WCAG AA ratio for large text.
pub const DEFAULT_AA_LARGE: f64 = 3.0;
/// Default maximum number of tokens in one registry.
pub const DEFAULT_MAX_TOKENS: usize = 10_000;
/// Default maximum rule expression length, in bytes.
pub const DEFAULT_MAX_RULE_LENGTH: usize = 1024;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: EngineConfig,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically: project config
/// overrides global config, which overrides the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// Global configuration
    pub global: ConfigFile,
    /// Project configuration (if found)
    pub project: Option<ConfigFile>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Build a configuration from a single TOML document, treated as the
    /// project scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation.
    ///
    /// # Example
    ///
    /// ```
    /// use rafters_tokens::core::config::EngineConfig;
    /// use rafters_tokens::rules::ContrastStandard;
    ///
    /// let config = EngineConfig::from_toml_str("[contrast]\naaa = 8.0").unwrap();
    /// assert_eq!(config.min_ratio(ContrastStandard::Aaa), 8.0);
    /// assert_eq!(config.min_ratio(ContrastStandard::Aa), 4.5);
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        file.validate()?;

        let config = Self {
            project: Some(file),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations.
    ///
    /// If `project_root` is provided, also loads project-specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed, or if
    /// the merged values are invalid. Missing config files are not an error
    /// (defaults are used).
    pub fn load(project_root: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = Self::load_global()?;

        let (project, project_path) = match project_root {
            Some(root) => Self::load_project(root, &mut warnings)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        let config = EngineConfig {
            global,
            project,
            global_path,
            project_path,
        };
        config.validate()?;

        tracing::debug!(
            global = ?config.global_path,
            project = ?config.project_path,
            "loaded engine config"
        );

        Ok(ConfigLoadResult { config, warnings })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(ConfigFile, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var("RAFTERS_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("rafters/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".rafters/config.toml");
            if path.exists() {
                let config = Self::read_config(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((ConfigFile::default(), None))
    }

    /// Load project configuration from standard locations.
    fn load_project(
        root: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<ConfigFile>, Option<PathBuf>), ConfigError> {
        let canonical = Self::project_config_path(root);
        if canonical.exists() {
            let config = Self::read_config(&canonical)?;
            return Ok((Some(config), Some(canonical)));
        }

        let compat = root.join("rafters.toml");
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please move to '{}'",
                    canonical.display()
                ),
                path: compat.clone(),
            });
            tracing::warn!(path = %compat.display(), "deprecated config location");
            let config = Self::read_config(&compat)?;
            return Ok((Some(config), Some(compat)));
        }

        Ok((None, None))
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for project config.
    ///
    /// Returns `.rafters/config.toml` relative to the given root.
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(".rafters/config.toml")
    }

    /// Validate cross-field constraints on the merged values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` unless `aa_large <= aa <= aaa`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let aa_large = self.min_ratio(ContrastStandard::AaLarge);
        let aa = self.min_ratio(ContrastStandard::Aa);
        let aaa = self.min_ratio(ContrastStandard::Aaa);

        if !(aa_large <= aa && aa <= aaa) {
            return Err(ConfigError::InvalidValue(format!(
                "contrast ratios must satisfy aa_large <= aa <= aaa (got {aa_large}, {aa}, {aaa})"
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Pick the first value set by the project file, then the global file.
    fn resolve<T>(&self, pick: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.project.as_ref().and_then(&pick).or_else(|| pick(&self.global))
    }

    /// Minimum contrast ratio for an accessibility standard.
    ///
    /// Defaults to 4.5 (AA), 7.0 (AAA) and 3.0 (AA large text).
    pub fn min_ratio(&self, standard: ContrastStandard) -> f64 {
        match standard {
            ContrastStandard::Aa => self
                .resolve(|f| f.contrast.as_ref().and_then(|c| c.aa))
                .unwrap_or(DEFAULT_AA),
            ContrastStandard::Aaa => self
                .resolve(|f| f.contrast.as_ref().and_then(|c| c.aaa))
                .unwrap_or(DEFAULT_AAA),
            ContrastStandard::AaLarge => self
                .resolve(|f| f.contrast.as_ref().and_then(|c| c.aa_large))
                .unwrap_or(DEFAULT_AA_LARGE),
        }
    }

    /// Maximum number of tokens a registry holds.
    ///
    /// Defaults to 10 000.
    pub fn max_tokens(&self) -> usize {
        self.resolve(|f| f.limits.as_ref().and_then(|l| l.max_tokens))
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// Maximum rule expression length in bytes.
    ///
    /// Defaults to 1024.
    pub fn max_rule_length(&self) -> usize {
        self.resolve(|f| f.limits.as_ref().and_then(|l| l.max_rule_length))
            .unwrap_or(DEFAULT_MAX_RULE_LENGTH)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_ratio(ContrastStandard::Aa), DEFAULT_AA);
        assert_eq!(config.min_ratio(ContrastStandard::Aaa), DEFAULT_AAA);
        assert_eq!(config.min_ratio(ContrastStandard::AaLarge), DEFAULT_AA_LARGE);
        assert_eq!(config.max_tokens(), DEFAULT_MAX_TOKENS);
        assert_eq!(config.max_rule_length(), DEFAULT_MAX_RULE_LENGTH);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_project_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".rafters");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
            [limits]
            max_tokens = 50
            "#,
        )
        .unwrap();

        let result = EngineConfig::load(Some(temp.path())).unwrap();
        assert_eq!(result.config.max_tokens(), 50);
        assert!(result.warnings.is_empty());
        assert_eq!(
            result.config.project_config_loaded_from(),
            Some(dir.join("config.toml").as_path())
        );
    }

    #[test]
    fn load_project_compat_warns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("rafters.toml"), "[limits]\nmax_rule_length = 64").unwrap();

        let result = EngineConfig::load(Some(temp.path())).unwrap();

        assert_eq!(result.config.max_rule_length(), 64);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("deprecated"));
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let result = EngineConfig::load(Some(temp.path())).unwrap();
        assert!(result.config.project.is_none());
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".rafters");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "unknown_field = true").unwrap();

        let result = EngineConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn precedence_project_overrides_global() {
        let config = EngineConfig {
            global: ConfigFile {
                contrast: Some(ContrastConfig {
                    aa: Some(5.0),
                    aaa: Some(8.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
            project: Some(ConfigFile {
                contrast: Some(ContrastConfig {
                    aaa: Some(9.0),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            global_path: None,
            project_path: None,
        };

        assert_eq!(config.min_ratio(ContrastStandard::Aa), 5.0);
        assert_eq!(config.min_ratio(ContrastStandard::Aaa), 9.0);
    }

    #[test]
    fn misordered_ratios_rejected() {
        let result = EngineConfig::from_toml_str("[contrast]\naa = 8.0\naaa = 7.5");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
