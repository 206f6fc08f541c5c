//! Human-readable strategy summary, rendered as the markdown block shown
//! to the user for confirmation before a task is created.

use wl_core::types::{ActionKind, StrategyParams};

/// Render a parameter set as a short markdown summary.
pub fn summarize(params: &StrategyParams) -> String {
    let strategy = match params.action {
        ActionKind::Yield => "Auto-invest",
        ActionKind::Swap => "swap",
        ActionKind::Dca => "dca",
    };

    format!(
        "**Strategy**: {strategy} in {protocol}\n\
         **Amount**: {amount} {asset}\n\
         **Frequency**: {frequency}\n\
         **Gas Limit**: Under {gas} gwei\n\
         **Min Yield**: {min_yield}% APY",
        protocol = params.protocol.as_str().to_uppercase(),
        amount = params.amount.normalize(),
        asset = params.asset,
        frequency = params.frequency,
        gas = params.gas_ceiling_gwei,
        min_yield = params.min_yield_percent.normalize(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules;

    #[test]
    fn yield_strategy_summary() {
        let params = rules::parse("keep $100 usdc safe, invest weekly when gas is under 25 gwei");
        let summary = summarize(&params);

        assert_eq!(
            summary,
            "**Strategy**: Auto-invest in AAVE\n\
             **Amount**: 100 USDC\n\
             **Frequency**: weekly\n\
             **Gas Limit**: Under 25 gwei\n\
             **Min Yield**: 2.5% APY"
        );
    }

    #[test]
    fn swap_strategy_summary() {
        let params = rules::parse("swap 250 usdc on uniswap daily");
        let summary = summarize(&params);

        assert!(summary.starts_with("**Strategy**: swap in UNISWAP\n"));
        assert!(summary.contains("**Amount**: 250 USDC\n"));
        assert!(summary.contains("**Frequency**: daily\n"));
    }

    #[test]
    fn trailing_zeros_are_trimmed() {
        let params = rules::parse("invest 100 usdc");
        // Medium risk yields the 4.0 floor; the summary renders it bare.
        let summary = summarize(&params);
        assert!(summary.ends_with("**Min Yield**: 4% APY"));
    }
}
