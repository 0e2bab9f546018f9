//! Health evaluation for borrower accounts.
//!
//! Pure functions over indexer data: no I/O, no state between scans.

use liqbot_api::Account;
use thiserror::Error;

/// An account whose metrics cannot be trusted. The account is skipped,
/// never treated as healthy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("account {account}: {field} is missing")]
    Missing {
        account: String,
        field: &'static str,
    },

    #[error("account {account}: {field} is not a finite number ({raw:?})")]
    Malformed {
        account: String,
        field: &'static str,
        raw: String,
    },
}

/// Parsed risk metrics of one account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountMetrics {
    pub total_borrow_value_in_eth: f64,
    pub health: f64,
}

impl AccountMetrics {
    pub fn parse(account: &Account) -> Result<Self, EvaluationError> {
        Ok(Self {
            total_borrow_value_in_eth: parse_metric(
                &account.id,
                "totalBorrowValueInEth",
                account.total_borrow_value_in_eth.as_deref(),
            )?,
            health: parse_metric(&account.id, "health", account.health.as_deref())?,
        })
    }
}

fn parse_metric(account: &str, field: &'static str, raw: Option<&str>) -> Result<f64, EvaluationError> {
    let raw = raw.ok_or_else(|| EvaluationError::Missing {
        account: account.to_string(),
        field,
    })?;

    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EvaluationError::Malformed {
            account: account.to_string(),
            field,
            raw: raw.to_string(),
        })
}

/// Eligibility rule applied to parsed metrics.
///
/// An account is eligible when it has outstanding borrows, a positive health
/// value, and (when `max_health` is set) health strictly below that bound.
/// `max_health = Some(1.0)` is the conventional undercollateralized rule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HealthPolicy {
    pub max_health: Option<f64>,
}

impl HealthPolicy {
    /// No upper bound on health.
    pub fn reference() -> Self {
        Self { max_health: None }
    }

    pub fn undercollateralized() -> Self {
        Self {
            max_health: Some(1.0),
        }
    }

    pub fn is_eligible(&self, metrics: &AccountMetrics) -> bool {
        metrics.total_borrow_value_in_eth > 0.0
            && metrics.health > 0.0
            && self.max_health.map_or(true, |max| metrics.health < max)
    }
}

/// Verdict for one account in one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub account_id: String,
    pub eligible: bool,
}

pub fn evaluate(account: &Account, policy: &HealthPolicy) -> Result<Decision, EvaluationError> {
    let metrics = AccountMetrics::parse(account)?;
    Ok(Decision {
        account_id: account.id.clone(),
        eligible: policy.is_eligible(&metrics),
    })
}
