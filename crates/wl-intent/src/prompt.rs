//! Prompt assembly for the model-backed classification stage.

/// System instruction sent with every classification request.
pub const SYSTEM_PROMPT: &str = "\
You are Windlass, an expert DeFi strategy analyzer. Parse user intents into structured parameters and provide intelligent recommendations.

PROTOCOLS SUPPORTED:
- Aave (lending/borrowing)
- Compound (lending)
- Uniswap (swapping/LP)
- Curve (stable swaps)

ASSETS SUPPORTED:
- USDC, USDT, DAI (stablecoins)
- ETH, WETH (ethereum)
- WBTC (bitcoin)

ACTIONS:
- invest/yield: Deposit into lending protocols
- swap: Exchange tokens
- lp: Provide liquidity
- dca: Dollar cost averaging

Respond with JSON only, no explanations.";

const USER_PROMPT_TEMPLATE: &str = r#"Parse this DeFi intent: "{intent}"

Return JSON with this exact structure:
{
  "amount": number,
  "asset": "USDC|USDT|DAI|ETH|WETH|WBTC",
  "protocol": "aave|compound|uniswap|curve",
  "frequency": "hourly|daily|weekly|monthly",
  "gasLimit": number,
  "minYield": number,
  "action": "invest|swap|dca|yield",
  "confidence": number (0-100),
  "riskLevel": "low|medium|high",
  "complexity": "simple|moderate|complex",
  "suggestedOptimizations": ["optimization1", "optimization2"],
  "marketContext": {
    "sentiment": "bullish|bearish|neutral",
    "volatility": "low|medium|high",
    "recommendation": "brief recommendation"
  }
}

Consider:
- Gas efficiency (lower gas limits for frequent operations)
- Market conditions (adjust timing based on volatility)
- Risk management (suggest diversification for large amounts)
- Yield optimization (recommend highest APY protocols)"#;

/// Render the user prompt for one intent sentence.
pub fn user_prompt(intent: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{intent}", intent)
}

/// Extract the JSON object embedded in model output.
///
/// Models frequently wrap the requested JSON in prose or markdown fences.
/// The widest brace span (first `{` through last `}`) is taken so nested
/// objects survive intact.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_inlines_intent() {
        let prompt = user_prompt("invest 500 usdc weekly");
        assert!(prompt.contains("Parse this DeFi intent: \"invest 500 usdc weekly\""));
        assert!(prompt.contains("\"gasLimit\": number"));
        assert!(!prompt.contains("{intent}"));
    }

    #[test]
    fn system_prompt_lists_the_action_vocabulary() {
        for line in [
            "- invest/yield: Deposit into lending protocols",
            "- swap: Exchange tokens",
            "- lp: Provide liquidity",
            "- dca: Dollar cost averaging",
        ] {
            assert!(SYSTEM_PROMPT.contains(line), "missing action line: {line}");
        }
    }

    #[test]
    fn extracts_bare_object() {
        let text = r#"{"amount": 100}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"amount": 100}"#));
    }

    #[test]
    fn extracts_object_from_markdown_fence() {
        let text = "Here you go:\n```json\n{\"amount\": 100}\n```\nDone.";
        assert_eq!(extract_json_object(text), Some("{\"amount\": 100}"));
    }

    #[test]
    fn extraction_spans_nested_objects() {
        let text = r#"prefix {"a": {"b": 1}, "c": 2} suffix"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 1}, "c": 2}"#));
    }

    #[test]
    fn extraction_fails_without_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
        assert_eq!(extract_json_object(""), None);
    }
}
