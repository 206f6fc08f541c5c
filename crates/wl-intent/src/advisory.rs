//! Advisory scoring attached to every classification: confidence,
//! complexity, optimization hints, and a market snapshot.
//!
//! These outputs are informational. Scheduling and execution never read
//! them, so the heuristics here are deliberately simple and deterministic.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wl_core::types::{
    ActionKind, Complexity, MarketContext, RiskLevel, Sentiment, Volatility,
};

static PROTOCOL_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(aave|compound|uniswap|curve)").unwrap());

static ASSET_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(usdc|eth|dai|usdt|wbtc)").unwrap());

/// Additive confidence heuristic over which parse components matched.
///
/// Starts at 60 and rewards an explicit amount, protocol, and action;
/// very short inputs are penalized for lacking context and very long ones
/// for ambiguity. Clamped to 0-100.
pub fn confidence_score(
    input: &str,
    amount_matched: bool,
    protocol_matched: bool,
    action_matched: bool,
) -> u8 {
    let mut confidence: i32 = 60;

    if amount_matched {
        confidence += 15;
    }
    if protocol_matched {
        confidence += 15;
    }
    if action_matched {
        confidence += 10;
    }

    if input.len() < 20 {
        confidence -= 10;
    }
    if input.len() > 200 {
        confidence -= 5;
    }

    confidence.clamp(0, 100) as u8
}

/// Score strategy complexity from the (lowercased) text and parsed fields.
///
/// Large amounts, swap/dca mechanics, conditional wording, and mentions of
/// multiple protocols or assets each add a point; 0-1 is simple, 2-3
/// moderate, anything above complex.
pub fn assess_complexity(text: &str, amount: Decimal, action: ActionKind) -> Complexity {
    let mut score: u32 = 0;

    if amount > dec!(10_000) {
        score += 1;
    }
    if amount > dec!(100_000) {
        score += 2;
    }

    if matches!(action, ActionKind::Swap | ActionKind::Dca) {
        score += 1;
    }

    if text.contains("when") || text.contains("if") {
        score += 1;
    }
    if text.contains("and") || text.contains("also") {
        score += 1;
    }

    let protocols = PROTOCOL_MENTION_RE.find_iter(text).count();
    let assets = ASSET_MENTION_RE.find_iter(text).count();
    score += (protocols.saturating_sub(1) + assets.saturating_sub(1)) as u32;

    match score {
        0..=1 => Complexity::Simple,
        2..=3 => Complexity::Moderate,
        _ => Complexity::Complex,
    }
}

/// Optimization hints for the parsed strategy. The last two apply to every
/// strategy; the rest are conditional on size, action, and risk.
pub fn suggested_optimizations(
    amount: Decimal,
    action: ActionKind,
    risk: RiskLevel,
) -> Vec<String> {
    let mut optimizations = Vec::new();

    if amount > dec!(50_000) {
        optimizations.push("Consider splitting into smaller batches to reduce slippage".to_string());
    }

    if action == ActionKind::Yield && risk == RiskLevel::Low {
        optimizations.push(
            "Diversify across multiple stable protocols for better risk distribution".to_string(),
        );
    }

    if action == ActionKind::Swap {
        optimizations.push("Use limit orders during high volatility periods".to_string());
    }

    optimizations.push("Enable gas optimization for 30-50% savings".to_string());
    optimizations.push("Set up yield compounding for maximum returns".to_string());

    optimizations
}

/// Placeholder market snapshot. Sentiment is pinned neutral and volatility
/// scales with position size until a live market feed replaces this.
pub fn market_context(action: ActionKind, amount: Decimal) -> MarketContext {
    let volatility = if amount > dec!(100_000) {
        Volatility::High
    } else {
        Volatility::Medium
    };

    let approach = if action == ActionKind::Yield {
        "stablecoin strategies"
    } else {
        "DCA approach"
    };

    MarketContext {
        sentiment: Sentiment::Neutral,
        volatility,
        recommendation: format!("Consider {approach} in current market conditions"),
    }
}
