//! # Service Configuration
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`EXPO_*`)
//! 2. Config file (`expo.toml`)
//! 3. Defaults (this file)
//!
//! ## Config File Location
//! - Explicit path passed to [`ServiceConfig::load`]
//! - Otherwise the platform config dir, e.g. `~/.config/expo-pos/expo.toml`
//!
//! ## Example `expo.toml`
//! ```toml
//! [pos]
//! currency = "AED"
//! tax_rate = 5.0        # percent
//! cogs_ratio = 55.0     # percent of gross revenue, an estimate
//! utc_offset_minutes = 240
//!
//! [terminal]
//! exhibition_id = "dubai-perfume-week-2024"
//! cashier_id = "cashier-01"
//! ```
//!
//! ## Environment Variables
//! | Variable                  | Overrides                 |
//! |---------------------------|---------------------------|
//! | `EXPO_TAX_RATE`           | `pos.tax_rate` (percent)  |
//! | `EXPO_COGS_RATIO`         | `pos.cogs_ratio` (percent)|
//! | `EXPO_CURRENCY`           | `pos.currency`            |
//! | `EXPO_UTC_OFFSET_MINUTES` | `pos.utc_offset_minutes`  |
//! | `EXPO_EXHIBITION_ID`      | `terminal.exhibition_id`  |
//! | `EXPO_CASHIER_ID`         | `terminal.cashier_id`     |

use expo_core::money::Money;
use expo_core::types::{CogsRatio, Currency, PosConfig, TaxRate};
use expo_core::validation::{validate_id, validate_rate_bps};
use expo_core::{DEFAULT_COGS_RATIO_BPS, DEFAULT_TAX_RATE_BPS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "expo.toml";

/// Largest real-world UTC offset is +14:00 (Kiribati), smallest -12:00.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

// =============================================================================
// Config Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Settings Sections
// =============================================================================

/// Money and calendar settings handed to the checkout and closure engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosSettings {
    /// Display currency code (AED or QAR).
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Sales tax in percent (5.0 = 5%).
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// Estimated cost of goods sold in percent of gross revenue.
    #[serde(default = "default_cogs_ratio")]
    pub cogs_ratio: f64,

    /// Exhibition local time offset from UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_currency() -> String {
    Currency::default().code
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE_BPS as f64 / 100.0
}

fn default_cogs_ratio() -> f64 {
    DEFAULT_COGS_RATIO_BPS as f64 / 100.0
}

impl Default for PosSettings {
    fn default() -> Self {
        PosSettings {
            currency: default_currency(),
            tax_rate: default_tax_rate(),
            cogs_ratio: default_cogs_ratio(),
            utc_offset_minutes: 0,
        }
    }
}

/// Which exhibition and cashier this terminal serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    #[serde(default)]
    pub exhibition_id: Option<String>,

    #[serde(default)]
    pub cashier_id: Option<String>,
}

// =============================================================================
// Service Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub pos: PosSettings,

    #[serde(default)]
    pub terminal: TerminalSettings,
}

impl ServiceConfig {
    /// Loads configuration: defaults, then the config file if it exists,
    /// then `EXPO_*` environment overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if Currency::from_code(&self.pos.currency).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Unknown currency '{}'. Valid options: AED, QAR",
                self.pos.currency
            )));
        }

        check_percent("tax_rate", self.pos.tax_rate)?;
        check_percent("cogs_ratio", self.pos.cogs_ratio)?;

        if self.pos.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes must be within ±{}, got {}",
                MAX_UTC_OFFSET_MINUTES, self.pos.utc_offset_minutes
            )));
        }

        for (field, value) in [
            ("exhibition_id", &self.terminal.exhibition_id),
            ("cashier_id", &self.terminal.cashier_id),
        ] {
            if let Some(id) = value {
                validate_id(field, id)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable numbers are
    /// ignored with a warning.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate) = lookup("EXPO_TAX_RATE") {
            match rate.trim().parse::<f64>() {
                Ok(r) => {
                    debug!(tax_rate = r, "Overriding tax rate from environment");
                    self.pos.tax_rate = r;
                }
                Err(_) => warn!(value = %rate, "Ignoring unparseable EXPO_TAX_RATE"),
            }
        }

        if let Some(ratio) = lookup("EXPO_COGS_RATIO") {
            match ratio.trim().parse::<f64>() {
                Ok(r) => {
                    debug!(cogs_ratio = r, "Overriding COGS ratio from environment");
                    self.pos.cogs_ratio = r;
                }
                Err(_) => warn!(value = %ratio, "Ignoring unparseable EXPO_COGS_RATIO"),
            }
        }

        if let Some(code) = lookup("EXPO_CURRENCY") {
            debug!(currency = %code, "Overriding currency from environment");
            self.pos.currency = code.trim().to_ascii_uppercase();
        }

        if let Some(offset) = lookup("EXPO_UTC_OFFSET_MINUTES") {
            match offset.trim().parse::<i32>() {
                Ok(o) => self.pos.utc_offset_minutes = o,
                Err(_) => warn!(value = %offset, "Ignoring unparseable EXPO_UTC_OFFSET_MINUTES"),
            }
        }

        if let Some(id) = lookup("EXPO_EXHIBITION_ID") {
            self.terminal.exhibition_id = Some(id);
        }

        if let Some(id) = lookup("EXPO_CASHIER_ID") {
            self.terminal.cashier_id = Some(id);
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "expo", "expo-pos")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The explicit context object for expo-core.
    pub fn pos_config(&self) -> PosConfig {
        PosConfig {
            currency: Currency::from_code(&self.pos.currency).unwrap_or_default(),
            tax_rate: TaxRate::from_percentage(self.pos.tax_rate),
            cogs_ratio: CogsRatio::from_percentage(self.pos.cogs_ratio),
            utc_offset_minutes: self.pos.utc_offset_minutes,
        }
    }

    pub fn into_pos_config(self) -> PosConfig {
        self.pos_config()
    }

    /// Formats a minor-unit amount for receipts: `AED 262.50`.
    pub fn format_currency(&self, cents: i64) -> String {
        Money::from_cents(cents).format(&self.pos_config().currency)
    }
}

/// A percent from the config file, checked as the basis points it becomes.
fn check_percent(field: &str, value: f64) -> ConfigResult<()> {
    let invalid = |reason: String| ConfigError::Invalid(format!("{}: {}", field, reason));

    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("must be between 0 and 100 percent, got {}", value)));
    }

    let bps = (value * 100.0).round() as u32;
    validate_rate_bps(field, bps).map_err(|e| invalid(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
