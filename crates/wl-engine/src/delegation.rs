//! Sub-agent delegation.
//!
//! A task can delegate a slice of its budget to a specialized sub-agent.
//! The sub-agent inherits the parent's strategy with the allocated amount
//! and a parameter bias that matches its specialization.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use wl_core::types::{ParamsError, StrategyParams, TaskId};

/// Smallest budget share a sub-agent may be given.
pub const MIN_ALLOCATION_PERCENT: u8 = 5;
/// Largest budget share a sub-agent may be given.
pub const MAX_ALLOCATION_PERCENT: u8 = 50;

// ---------------------------------------------------------------------------
// Specialization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialization {
    /// Runs with a 20% lower gas ceiling than its parent.
    GasOptimizer,
    /// Demands one percentage point more yield than its parent.
    YieldHunter,
    /// Caps its per-execution amount at a fixed exposure limit.
    RiskManager,
}

impl Specialization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::GasOptimizer => "gas-optimizer",
            Specialization::YieldHunter => "yield-hunter",
            Specialization::RiskManager => "risk-manager",
        }
    }
}

impl std::fmt::Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SubAgentSpec
// ---------------------------------------------------------------------------

/// Request to spawn a sub-agent under an existing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentSpec {
    pub name: String,
    /// Share of the parent's amount, in whole percent.
    pub allocation_percent: u8,
    pub specialization: Specialization,
}

impl SubAgentSpec {
    pub fn new(
        name: impl Into<String>,
        allocation_percent: u8,
        specialization: Specialization,
    ) -> Self {
        Self {
            name: name.into(),
            allocation_percent,
            specialization,
        }
    }
}

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("parent task not found: {0}")]
    ParentNotFound(TaskId),
    #[error(
        "allocation must be {MIN_ALLOCATION_PERCENT}-{MAX_ALLOCATION_PERCENT} percent, got {0}"
    )]
    InvalidAllocation(u8),
    #[error("parent amount {0} overflows when scaled to {1} percent")]
    AmountOverflow(Decimal, u8),
    #[error(transparent)]
    Params(#[from] ParamsError),
}

// ---------------------------------------------------------------------------
// Parameter derivation
// ---------------------------------------------------------------------------

/// Derive a sub-agent's strategy from its parent's.
///
/// The amount is scaled to the allocated share, then the specialization
/// bias is applied. The result goes through the same validation as any
/// other strategy, so a bias that degenerates the parameters (for example
/// an 80% cut of a 1 gwei ceiling) is rejected here rather than at
/// execution time.
pub fn derive_params(
    parent: &StrategyParams,
    spec: &SubAgentSpec,
) -> Result<StrategyParams, DelegationError> {
    if spec.allocation_percent < MIN_ALLOCATION_PERCENT
        || spec.allocation_percent > MAX_ALLOCATION_PERCENT
    {
        return Err(DelegationError::InvalidAllocation(spec.allocation_percent));
    }

    let mut params = parent.clone();
    params.amount = parent
        .amount
        .checked_mul(Decimal::from(spec.allocation_percent))
        .and_then(|scaled| scaled.checked_div(dec!(100)))
        .ok_or(DelegationError::AmountOverflow(
            parent.amount,
            spec.allocation_percent,
        ))?;

    match spec.specialization {
        Specialization::GasOptimizer => {
            // 80% of the parent ceiling, rounded down.
            params.gas_ceiling_gwei = (u64::from(parent.gas_ceiling_gwei) * 4 / 5) as u32;
        }
        Specialization::YieldHunter => {
            params.min_yield_percent = parent.min_yield_percent.saturating_add(dec!(1));
        }
        Specialization::RiskManager => {
            params.amount = params.amount.min(dec!(50));
        }
    }

    params.validate()?;
    Ok(params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wl_core::types::{
        ActionKind, Advisory, Asset, Complexity, Frequency, MarketContext, Protocol, RiskLevel,
        Sentiment, Volatility,
    };

    fn parent_params() -> StrategyParams {
        StrategyParams {
            amount: dec!(1000),
            asset: Asset::Usdc,
            protocol: Protocol::Aave,
            frequency: Frequency::Weekly,
            gas_ceiling_gwei: 25,
            min_yield_percent: dec!(4.0),
            action: ActionKind::Yield,
            advisory: Advisory {
                confidence: 80,
                risk_level: RiskLevel::Medium,
                complexity: Complexity::Simple,
                optimizations: vec![],
                market_context: MarketContext {
                    sentiment: Sentiment::Neutral,
                    volatility: Volatility::Medium,
                    recommendation: "hold".to_string(),
                },
            },
        }
    }

    #[test]
    fn allocation_out_of_bounds_is_rejected() {
        for percent in [0, 4, 51, 100] {
            let spec = SubAgentSpec::new("helper", percent, Specialization::YieldHunter);
            let err = derive_params(&parent_params(), &spec).unwrap_err();
            assert!(matches!(err, DelegationError::InvalidAllocation(p) if p == percent));
        }
    }

    #[test]
    fn allocation_bounds_are_inclusive() {
        for percent in [MIN_ALLOCATION_PERCENT, MAX_ALLOCATION_PERCENT] {
            let spec = SubAgentSpec::new("helper", percent, Specialization::YieldHunter);
            assert!(derive_params(&parent_params(), &spec).is_ok());
        }
    }

    #[test]
    fn amount_scales_to_allocated_share() {
        let spec = SubAgentSpec::new("helper", 25, Specialization::YieldHunter);
        let params = derive_params(&parent_params(), &spec).unwrap();
        assert_eq!(params.amount, dec!(250));
    }

    #[test]
    fn gas_optimizer_cuts_ceiling_by_a_fifth() {
        let spec = SubAgentSpec::new("gas", 10, Specialization::GasOptimizer);
        let params = derive_params(&parent_params(), &spec).unwrap();
        assert_eq!(params.gas_ceiling_gwei, 20);
    }

    #[test]
    fn gas_optimizer_rounds_down() {
        let mut parent = parent_params();
        parent.gas_ceiling_gwei = 7;
        let spec = SubAgentSpec::new("gas", 10, Specialization::GasOptimizer);
        let params = derive_params(&parent, &spec).unwrap();
        assert_eq!(params.gas_ceiling_gwei, 5);
    }

    #[test]
    fn yield_hunter_raises_the_floor() {
        let spec = SubAgentSpec::new("hunter", 10, Specialization::YieldHunter);
        let params = derive_params(&parent_params(), &spec).unwrap();
        assert_eq!(params.min_yield_percent, dec!(5.0));
        assert_eq!(params.amount, dec!(100));
    }

    #[test]
    fn oversized_parent_amount_is_rejected() {
        let mut parent = parent_params();
        parent.amount = Decimal::MAX;
        let spec = SubAgentSpec::new("helper", 50, Specialization::YieldHunter);
        let err = derive_params(&parent, &spec).unwrap_err();
        assert!(matches!(err, DelegationError::AmountOverflow(..)));
    }

    #[test]
    fn yield_floor_clamps_at_the_ceiling() {
        let mut parent = parent_params();
        parent.min_yield_percent = Decimal::MAX;
        let spec = SubAgentSpec::new("hunter", 10, Specialization::YieldHunter);
        let params = derive_params(&parent, &spec).unwrap();
        assert_eq!(params.min_yield_percent, Decimal::MAX);
    }

    #[test]
    fn risk_manager_caps_exposure() {
        let spec = SubAgentSpec::new("risk", 25, Specialization::RiskManager);
        let params = derive_params(&parent_params(), &spec).unwrap();
        // 25% of 1000 is 250, capped at 50.
        assert_eq!(params.amount, dec!(50));
    }

    #[test]
    fn risk_manager_leaves_small_amounts_alone() {
        let mut parent = parent_params();
        parent.amount = dec!(100);
        let spec = SubAgentSpec::new("risk", 10, Specialization::RiskManager);
        let params = derive_params(&parent, &spec).unwrap();
        assert_eq!(params.amount, dec!(10));
    }

    #[test]
    fn unbiased_fields_are_inherited() {
        let spec = SubAgentSpec::new("helper", 20, Specialization::YieldHunter);
        let params = derive_params(&parent_params(), &spec).unwrap();
        assert_eq!(params.asset, Asset::Usdc);
        assert_eq!(params.protocol, Protocol::Aave);
        assert_eq!(params.frequency, Frequency::Weekly);
        assert_eq!(params.action, ActionKind::Yield);
        assert_eq!(params.gas_ceiling_gwei, 25);
    }

    #[test]
    fn degenerate_derived_params_are_rejected() {
        let mut parent = parent_params();
        parent.gas_ceiling_gwei = 1;
        let spec = SubAgentSpec::new("gas", 10, Specialization::GasOptimizer);
        let err = derive_params(&parent, &spec).unwrap_err();
        assert!(matches!(err, DelegationError::Params(_)));
    }

    #[test]
    fn specialization_serializes_kebab_case() {
        let json = serde_json::to_string(&Specialization::GasOptimizer).unwrap();
        assert_eq!(json, "\"gas-optimizer\"");
        assert_eq!(Specialization::YieldHunter.to_string(), "yield-hunter");
    }
}
