//! Execution gating policy.
//!
//! [`decide`] is a pure function from task parameters and observed chain
//! conditions to a [`Decision`]. The engine owns all side effects; keeping
//! the gates here makes every combination testable without a scheduler.

use chrono::{DateTime, Duration, Utc};

use wl_chain::pools::PoolInfo;
use wl_core::types::{ActionKind, StrategyParams};

/// How long a task skipped on gas price waits before the next attempt.
pub fn gas_retry_delay() -> Duration {
    Duration::minutes(10)
}

/// How long a yield task with no qualifying pool waits before the next
/// attempt. Longer than the gas delay since pool rates move slowly.
pub fn yield_retry_delay() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// All gates passed; hand the task to its executor.
    Execute,
    /// Gas above ceiling; retry at `until`.
    RescheduleGas { until: DateTime<Utc> },
    /// No pool met the yield floor; retry at `until`.
    RescheduleYield { until: DateTime<Utc> },
}

/// Decide what happens to a due task under the current conditions.
///
/// The gas gate applies to every action and is strict: a price exactly at
/// the ceiling still executes. The yield gate applies only to yield
/// deposits; swaps and DCA buys run regardless of pool rates.
pub fn decide(
    params: &StrategyParams,
    gas_price_gwei: f64,
    best_pool: Option<&PoolInfo>,
    now: DateTime<Utc>,
) -> Decision {
    if gas_price_gwei > f64::from(params.gas_ceiling_gwei) {
        return Decision::RescheduleGas {
            until: now + gas_retry_delay(),
        };
    }

    if params.action == ActionKind::Yield && best_pool.is_none() {
        return Decision::RescheduleYield {
            until: now + yield_retry_delay(),
        };
    }

    Decision::Execute
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
