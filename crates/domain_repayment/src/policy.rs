//! Reversal policy
//!
//! Product decisions the reversal engine needs are passed in explicitly
//! rather than looked up from global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{Money, Timezone};

/// What to do when a reversal is larger than everything paid on its bills
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverReversalPolicy {
    /// Abort the reversal
    #[default]
    Reject,
    /// Write the void anyway and report the unallocated remainder
    LogAndContinue,
}

impl fmt::Display for OverReversalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverReversalPolicy::Reject => write!(f, "reject"),
            OverReversalPolicy::LogAndContinue => write!(f, "log_and_continue"),
        }
    }
}

impl FromStr for OverReversalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(OverReversalPolicy::Reject),
            "log_and_continue" | "log-and-continue" => Ok(OverReversalPolicy::LogAndContinue),
            other => Err(format!("unknown over-reversal policy: {}", other)),
        }
    }
}

/// Settings the reversal service runs with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalPolicy {
    pub over_reversal: OverReversalPolicy,
    /// Paid-off loans must be strictly larger than this to make an account proven
    pub proven_threshold: Money,
    /// Timezone used to derive business dates
    pub timezone: Timezone,
    /// Forwarded to the repayment processor when funds are transferred
    pub cashback_experiment: bool,
}

impl Default for ReversalPolicy {
    fn default() -> Self {
        Self {
            over_reversal: OverReversalPolicy::Reject,
            proven_threshold: Money::idr(1_000_000),
            timezone: Timezone::jakarta(),
            cashback_experiment: false,
        }
    }
}

impl ReversalPolicy {
    pub fn with_over_reversal(mut self, policy: OverReversalPolicy) -> Self {
        self.over_reversal = policy;
        self
    }

    pub fn with_proven_threshold(mut self, threshold: Money) -> Self {
        self.proven_threshold = threshold;
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_cashback_experiment(mut self, enabled: bool) -> Self {
        self.cashback_experiment = enabled;
        self
    }
}
