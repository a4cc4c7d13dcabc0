// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! Settings are layered, later sources overriding earlier ones:
//! - Built-in defaults
//! - TOML configuration file
//! - Environment variables prefixed with `LIBRARY_`
//!
//! # Environment Variables
//!
//! - `LIBRARY_DEFAULT_LOAN_DAYS=21` sets `default_loan_days`
//! - `LIBRARY_MAX_LOAN_DAYS=90` caps loan periods at 90 days (uncapped by default)
//! - `LIBRARY_LOG_LEVEL=debug` sets `log_level`

use crate::error::LoanError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Loan period used when a checkout does not name one.
pub const DEFAULT_LOAN_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Loan period applied when a checkout omits `days`
    #[serde(default = "default_loan_days")]
    pub default_loan_days: u32,

    /// Optional cap on the loan period a checkout may request
    #[serde(default)]
    pub max_loan_days: Option<u32>,

    /// Fallback log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_loan_days() -> u32 {
    DEFAULT_LOAN_DAYS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_loan_days: default_loan_days(),
            max_loan_days: None,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from defaults, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed("LIBRARY_"))
            .extract()
            .map_err(Box::new)
    }

    /// Checks that the loan periods are usable.
    pub fn validate(&self) -> Result<(), LoanError> {
        if self.default_loan_days == 0 {
            return Err(LoanError::invalid("default_loan_days must be positive"));
        }
        match self.max_loan_days {
            Some(0) => Err(LoanError::invalid("max_loan_days must be positive")),
            Some(max) if self.default_loan_days > max => Err(LoanError::invalid(
                "default_loan_days must not exceed max_loan_days",
            )),
            _ => Ok(()),
        }
    }

    /// Resolves the requested loan period.
    ///
    /// Any positive period is accepted unless `max_loan_days` is set.
    ///
    /// # Errors
    ///
    /// Returns [`LoanError::InvalidInput`] if `days <= 0` or above a configured cap.
    pub fn loan_days(&self, requested: Option<i64>) -> Result<u64, LoanError> {
        let Some(days) = requested else {
            return Ok(u64::from(self.default_loan_days));
        };
        let days = u64::try_from(days)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| LoanError::invalid("days must be positive integer"))?;
        match self.max_loan_days {
            Some(max) if days > u64::from(max) => {
                Err(LoanError::invalid(format!("days must not exceed {max}")))
            }
            _ => Ok(days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_loan_days, 14);
        assert_eq!(config.max_loan_days, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loan_days_uncapped_by_default() {
        let config = EngineConfig::default();
        assert_eq!(config.loan_days(None), Ok(14));
        assert_eq!(config.loan_days(Some(1)), Ok(1));
        assert_eq!(config.loan_days(Some(366)), Ok(366));
        assert_eq!(config.loan_days(Some(10_000)), Ok(10_000));
        assert!(matches!(config.loan_days(Some(0)), Err(LoanError::InvalidInput(_))));
        assert!(matches!(config.loan_days(Some(-3)), Err(LoanError::InvalidInput(_))));
        assert!(matches!(config.loan_days(Some(i64::MIN)), Err(LoanError::InvalidInput(_))));
    }

    #[test]
    fn loan_days_respects_configured_cap() {
        let config = EngineConfig {
            max_loan_days: Some(30),
            ..EngineConfig::default()
        };
        assert_eq!(config.loan_days(Some(30)), Ok(30));
        assert_eq!(
            config.loan_days(Some(31)),
            Err(LoanError::InvalidInput("days must not exceed 30".into()))
        );
    }

    #[test]
    fn rejects_default_above_max() {
        let config = EngineConfig {
            default_loan_days: 30,
            max_loan_days: Some(7),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            max_loan_days: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "library.toml",
                r#"
default_loan_days = 21
max_loan_days = 60
"#,
            )?;
            jail.set_env("LIBRARY_MAX_LOAN_DAYS", "90");

            let config = EngineConfig::load(Some(Path::new("library.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.default_loan_days, 21);
            assert_eq!(config.max_loan_days, Some(90));
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = EngineConfig::load(Some(Path::new("absent.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config, EngineConfig::default());
            Ok(())
        });
    }
}
