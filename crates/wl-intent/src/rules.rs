//! Rule-based intent parsing, the deterministic fallback stage of the
//! classifier.
//!
//! Pattern matching runs over the lowercased input. Any field the patterns
//! miss falls back to a documented default, so this stage always produces a
//! [`StrategyParams`]; numeric validation happens at task creation, not here.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wl_core::types::{
    ActionKind, Advisory, Asset, Frequency, Protocol, RiskLevel, StrategyParams,
};

use crate::advisory;

// ---------------------------------------------------------------------------
// Pattern table
// ---------------------------------------------------------------------------

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?(\d+(?:,\d{3})*(?:\.\d+)?)\s*(k|thousand|m|million)?\s*(usdc|eth|dai|usdt|wbtc)")
        .unwrap()
});

static PROTOCOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(aave|compound|uniswap|curve|uni|comp)").unwrap());

// Adjective forms first so "hourly" is not cut short at "hour".
static FREQUENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(every\s+)?(hourly|daily|weekly|monthly|hour|day|week|month)").unwrap()
});

static GAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gas.*?(?:under|below|<|less\s+than)\s*(\d+)\s*gwei").unwrap()
});

static YIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:yield|apy|return).*?(?:above|over|>|more\s+than)\s*(\d+(?:\.\d+)?)%").unwrap()
});

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(invest|deposit|lend|swap|trade|exchange|dca|dollar.cost|liquidity|lp)").unwrap()
});

static RISK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(safe|conservative|aggressive|risky|high.risk|low.risk)").unwrap()
});

const DEFAULT_AMOUNT: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an intent sentence into strategy parameters.
///
/// Never fails; fields with no pattern match take defaults (100 USDC on
/// aave, weekly, action-specific gas ceiling, risk-specific yield floor).
/// Amounts that overflow the numeric range also take the default.
pub fn parse(input: &str) -> StrategyParams {
    let text = input.to_lowercase();

    let amount_caps = AMOUNT_RE.captures(&text);
    let protocol_caps = PROTOCOL_RE.captures(&text);
    let frequency_caps = FREQUENCY_RE.captures(&text);
    let gas_caps = GAS_RE.captures(&text);
    let yield_caps = YIELD_RE.captures(&text);
    let action_caps = ACTION_RE.captures(&text);

    let (amount, asset) = match &amount_caps {
        Some(caps) => {
            let base: Decimal = caps[1].replace(',', "").parse().unwrap_or(DEFAULT_AMOUNT);
            let amount = match caps.get(2).map(|m| m.as_str()) {
                Some("k") | Some("thousand") => base.checked_mul(dec!(1000)),
                Some("m") | Some("million") => base.checked_mul(dec!(1_000_000)),
                _ => Some(base),
            }
            .unwrap_or(DEFAULT_AMOUNT);
            let asset = Asset::from_symbol(&caps[3]).unwrap_or(Asset::Usdc);
            (amount, asset)
        }
        None => (DEFAULT_AMOUNT, Asset::Usdc),
    };

    // Swap-family and dca keywords map to their actions; everything else the
    // pattern recognizes (invest, deposit, lend, liquidity provision) is a
    // deposit into a lending protocol, as is no keyword at all.
    let action = match action_caps.as_ref().map(|caps| &caps[1]) {
        Some("swap") | Some("trade") | Some("exchange") => ActionKind::Swap,
        Some("dca") => ActionKind::Dca,
        _ => ActionKind::Yield,
    };

    let risk_level = detect_risk_level(&text);

    let protocol = protocol_caps
        .as_ref()
        .and_then(|caps| Protocol::from_name(&caps[1]))
        .unwrap_or(Protocol::Aave);

    let frequency = frequency_caps
        .as_ref()
        .and_then(|caps| caps.get(2))
        .and_then(|m| Frequency::from_name(m.as_str()))
        .unwrap_or(Frequency::Weekly);

    let gas_ceiling_gwei = gas_caps
        .as_ref()
        .and_then(|caps| caps[1].parse::<u32>().ok())
        // A stated ceiling of 0 gwei can never clear; fall back instead.
        .filter(|gwei| *gwei > 0)
        .unwrap_or_else(|| default_gas_ceiling(action));

    let min_yield_percent = yield_caps
        .as_ref()
        .and_then(|caps| caps[1].parse::<Decimal>().ok())
        .unwrap_or_else(|| default_min_yield(risk_level));

    let advisory = Advisory {
        confidence: advisory::confidence_score(
            input,
            amount_caps.is_some(),
            protocol_caps.is_some(),
            action_caps.is_some(),
        ),
        risk_level,
        complexity: advisory::assess_complexity(&text, amount, action),
        optimizations: advisory::suggested_optimizations(amount, action, risk_level),
        market_context: advisory::market_context(action, amount),
    };

    StrategyParams {
        amount,
        asset,
        protocol,
        frequency,
        gas_ceiling_gwei,
        min_yield_percent,
        action,
        advisory,
    }
}

/// Detect the risk appetite named in (lowercased) text; medium when silent.
pub(crate) fn detect_risk_level(text: &str) -> RiskLevel {
    match RISK_RE.captures(text).map(|caps| caps[1].to_string()) {
        Some(word)
            if word.contains("safe") || word.contains("conservative") || word.contains("low") =>
        {
            RiskLevel::Low
        }
        Some(word)
            if word.contains("aggressive") || word.contains("risky") || word.contains("high") =>
        {
            RiskLevel::High
        }
        _ => RiskLevel::Medium,
    }
}

/// Gas ceiling applied when the intent names none, tuned per action.
fn default_gas_ceiling(action: ActionKind) -> u32 {
    match action {
        ActionKind::Yield => 25,
        ActionKind::Swap => 30,
        ActionKind::Dca => 20,
    }
}

/// Yield floor applied when the intent names none, derived from risk
/// appetite.
fn default_min_yield(risk: RiskLevel) -> Decimal {
    match risk {
        RiskLevel::Low => dec!(2.5),
        RiskLevel::Medium => dec!(4.0),
        RiskLevel::High => dec!(6.0),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
