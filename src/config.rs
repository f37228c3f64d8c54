use crate::error::{ReconciliationError, Result};
use crate::schema::QuoteStatus;
use chrono::Duration;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables shared by every component of the engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    #[serde(default = "default_money_tolerance")]
    #[schemars(
        description = "Largest absolute difference at which two amounts are considered equal (partial payments vs. payable)."
    )]
    pub money_tolerance: Decimal,

    #[serde(default = "default_approved_statuses")]
    #[schemars(description = "Quote statuses that make a quote a receivable.")]
    pub approved_statuses: Vec<QuoteStatus>,

    #[serde(default = "default_legacy_timestamp_matching")]
    #[schemars(
        description = "Drop legacy payroll rows (no payment type, no link) when a consolidated row for the same payee was settled within the match window."
    )]
    pub legacy_timestamp_matching: bool,

    #[serde(default = "default_legacy_match_window_ms")]
    pub legacy_match_window_ms: i64,
}

fn default_money_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_approved_statuses() -> Vec<QuoteStatus> {
    vec![
        QuoteStatus::Approved,
        QuoteStatus::Authorized,
        QuoteStatus::Contracted,
    ]
}

fn default_legacy_timestamp_matching() -> bool {
    true
}

fn default_legacy_match_window_ms() -> i64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            money_tolerance: default_money_tolerance(),
            approved_statuses: default_approved_statuses(),
            legacy_timestamp_matching: default_legacy_timestamp_matching(),
            legacy_match_window_ms: default_legacy_match_window_ms(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.money_tolerance < Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "money_tolerance must not be negative, got {}",
                self.money_tolerance
            )));
        }
        if self.approved_statuses.is_empty() {
            return Err(ReconciliationError::ValidationFailed(
                "approved_statuses must name at least one status".to_string(),
            ));
        }
        if self.legacy_match_window_ms < 0 {
            return Err(ReconciliationError::ValidationFailed(format!(
                "legacy_match_window_ms must not be negative, got {}",
                self.legacy_match_window_ms
            )));
        }
        Ok(())
    }

    pub fn is_approved(&self, status: QuoteStatus) -> bool {
        self.approved_statuses.contains(&status)
    }

    pub fn legacy_match_window(&self) -> Duration {
        Duration::milliseconds(self.legacy_match_window_ms)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(EngineConfig);
        serde_json::to_string_pretty(&schema)
    }
}
