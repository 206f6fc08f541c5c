//! Two-stage intent classification.
//!
//! The first stage asks the configured model to extract parameters; its JSON
//! reply is validated field by field. Any failure there, from transport
//! errors to an unsupported asset, drops to the rule-based stage, which
//! always succeeds. The result carries a [`ClassificationSource`] tag so
//! callers can tell which stage produced it.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wl_core::types::{
    ActionKind, Advisory, Asset, Complexity, Frequency, MarketContext, ParamsError, Protocol,
    RiskLevel, StrategyParams,
};

use crate::advisory;
use crate::llm::{LlmConfig, LlmError, LlmMessage, LlmProvider};
use crate::prompt;
use crate::rules;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Which stage produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Model,
    Rules,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClassificationSource::Model => "model",
            ClassificationSource::Rules => "rules",
        };
        write!(f, "{s}")
    }
}

/// Classification output: the parameters plus their provenance.
#[derive(Debug, Clone)]
pub struct ClassifiedIntent {
    pub params: StrategyParams,
    pub source: ClassificationSource,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("intent text is empty")]
    EmptyInput,
}

// ---------------------------------------------------------------------------
// Model reply shape
// ---------------------------------------------------------------------------

/// Wire shape of the model's JSON reply, per the prompt contract. The seven
/// strategy fields are required; advisory fields the model omits are filled
/// deterministically.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentDraft {
    amount: Decimal,
    asset: String,
    protocol: String,
    frequency: String,
    gas_limit: Decimal,
    min_yield: Decimal,
    action: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    risk_level: Option<RiskLevel>,
    #[serde(default)]
    complexity: Option<Complexity>,
    #[serde(default)]
    suggested_optimizations: Option<Vec<String>>,
    #[serde(default)]
    market_context: Option<MarketContext>,
}

/// Why the model stage was abandoned for this input. Never surfaces to
/// callers; logged at warn before the fallback runs.
#[derive(Debug, thiserror::Error)]
enum ModelStageError {
    #[error(transparent)]
    Provider(#[from] LlmError),

    #[error("no JSON object in model output")]
    MissingJson,

    #[error("malformed intent JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported {field} {value:?}")]
    Unsupported { field: &'static str, value: String },

    #[error(transparent)]
    Invalid(#[from] ParamsError),
}

fn params_from_draft(input: &str, draft: IntentDraft) -> Result<StrategyParams, ModelStageError> {
    let asset = Asset::from_symbol(&draft.asset).ok_or_else(|| ModelStageError::Unsupported {
        field: "asset",
        value: draft.asset.clone(),
    })?;
    let protocol =
        Protocol::from_name(&draft.protocol).ok_or_else(|| ModelStageError::Unsupported {
            field: "protocol",
            value: draft.protocol.clone(),
        })?;
    let frequency =
        Frequency::from_name(&draft.frequency).ok_or_else(|| ModelStageError::Unsupported {
            field: "frequency",
            value: draft.frequency.clone(),
        })?;
    let action = ActionKind::from_name(&draft.action).ok_or_else(|| ModelStageError::Unsupported {
        field: "action",
        value: draft.action.clone(),
    })?;
    let gas_ceiling_gwei =
        draft
            .gas_limit
            .to_u32()
            .ok_or_else(|| ModelStageError::Unsupported {
                field: "gasLimit",
                value: draft.gas_limit.to_string(),
            })?;

    let lowered = input.to_lowercase();
    let risk_level = draft
        .risk_level
        .unwrap_or_else(|| rules::detect_risk_level(&lowered));
    let confidence = match draft.confidence {
        Some(c) => c.clamp(0.0, 100.0).round() as u8,
        // A valid draft has the amount, protocol, and action extracted, so
        // the derived score treats all three as matched.
        None => advisory::confidence_score(input, true, true, true),
    };
    let complexity = draft
        .complexity
        .unwrap_or_else(|| advisory::assess_complexity(&lowered, draft.amount, action));
    let optimizations = draft
        .suggested_optimizations
        .unwrap_or_else(|| advisory::suggested_optimizations(draft.amount, action, risk_level));
    let market_context = draft
        .market_context
        .unwrap_or_else(|| advisory::market_context(action, draft.amount));

    let params = StrategyParams {
        amount: draft.amount,
        asset,
        protocol,
        frequency,
        gas_ceiling_gwei,
        min_yield_percent: draft.min_yield,
        action,
        advisory: Advisory {
            confidence,
            risk_level,
            complexity,
            optimizations,
            market_context,
        },
    };
    params.validate()?;
    Ok(params)
}

// ---------------------------------------------------------------------------
// IntentClassifier
// ---------------------------------------------------------------------------

/// Classifies free-text intents into [`StrategyParams`].
///
/// Construct with [`IntentClassifier::with_provider`] for model-first
/// operation or [`IntentClassifier::rules_only`] when no model is
/// configured.
pub struct IntentClassifier {
    provider: Option<Arc<dyn LlmProvider>>,
    llm_config: LlmConfig,
}

impl IntentClassifier {
    /// Classifier without a model; every result comes from the rule stage.
    pub fn rules_only() -> Self {
        Self {
            provider: None,
            llm_config: LlmConfig::default(),
        }
    }

    /// Model-first classifier speaking to `model` through `provider`.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            llm_config: LlmConfig {
                model: model.into(),
                system_prompt: Some(prompt::SYSTEM_PROMPT.to_string()),
                ..LlmConfig::default()
            },
        }
    }

    /// Classify one intent sentence.
    ///
    /// Fails only on blank input. Model-stage failures are logged and
    /// absorbed by the rule stage.
    pub async fn classify(&self, input: &str) -> Result<ClassifiedIntent, ClassifyError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        if let Some(provider) = &self.provider {
            match self.classify_with_model(provider.as_ref(), input).await {
                Ok(params) => {
                    debug!(
                        confidence = params.advisory.confidence,
                        action = %params.action,
                        "model classification succeeded"
                    );
                    return Ok(ClassifiedIntent {
                        params,
                        source: ClassificationSource::Model,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "model classification failed, falling back to rules");
                }
            }
        }

        Ok(ClassifiedIntent {
            params: rules::parse(input),
            source: ClassificationSource::Rules,
        })
    }

    async fn classify_with_model(
        &self,
        provider: &dyn LlmProvider,
        input: &str,
    ) -> Result<StrategyParams, ModelStageError> {
        let messages = [LlmMessage::user(prompt::user_prompt(input))];
        let response = provider.complete(&messages, &self.llm_config).await?;

        let json =
            prompt::extract_json_object(&response.content).ok_or(ModelStageError::MissingJson)?;
        let draft: IntentDraft = serde_json::from_str(json)?;
        params_from_draft(input, draft)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockProvider;
    use rust_decimal_macros::dec;
    use wl_core::types::Sentiment;

    const FULL_DRAFT: &str = r#"{
        "amount": 250,
        "asset": "DAI",
        "protocol": "compound",
        "frequency": "daily",
        "gasLimit": 18,
        "minYield": 3.5,
        "action": "invest",
        "confidence": 88,
        "riskLevel": "low",
        "complexity": "moderate",
        "suggestedOptimizations": ["Batch deposits"],
        "marketContext": {
            "sentiment": "bullish",
            "volatility": "low",
            "recommendation": "Go steady"
        }
    }"#;

    fn model_classifier(provider: MockProvider) -> (Arc<MockProvider>, IntentClassifier) {
        let provider = Arc::new(provider);
        let classifier = IntentClassifier::with_provider(provider.clone(), "gemini-1.5-flash");
        (provider, classifier)
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let classifier = IntentClassifier::rules_only();
        assert!(matches!(
            classifier.classify("").await,
            Err(ClassifyError::EmptyInput)
        ));
        assert!(matches!(
            classifier.classify("   \n\t ").await,
            Err(ClassifyError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn rules_only_mode_tags_source() {
        let classifier = IntentClassifier::rules_only();
        let intent = classifier.classify("swap 100 usdc daily").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
        assert_eq!(intent.params.action, ActionKind::Swap);
        assert_eq!(intent.params.amount, dec!(100));
    }

    #[tokio::test]
    async fn model_reply_is_used_and_tagged() {
        let (_, classifier) = model_classifier(MockProvider::new().with_text(FULL_DRAFT));
        let intent = classifier
            .classify("invest 250 dai in compound daily")
            .await
            .unwrap();

        assert_eq!(intent.source, ClassificationSource::Model);
        assert_eq!(intent.params.amount, dec!(250));
        assert_eq!(intent.params.asset, Asset::Dai);
        assert_eq!(intent.params.protocol, Protocol::Compound);
        assert_eq!(intent.params.frequency, Frequency::Daily);
        assert_eq!(intent.params.gas_ceiling_gwei, 18);
        assert_eq!(intent.params.min_yield_percent, dec!(3.5));
        // "invest" is the yield action on the wire.
        assert_eq!(intent.params.action, ActionKind::Yield);
        assert_eq!(intent.params.advisory.confidence, 88);
        assert_eq!(intent.params.advisory.risk_level, RiskLevel::Low);
        assert_eq!(intent.params.advisory.optimizations, vec!["Batch deposits"]);
        assert_eq!(
            intent.params.advisory.market_context.sentiment,
            Sentiment::Bullish
        );
    }

    #[tokio::test]
    async fn model_reply_in_markdown_fence_is_extracted() {
        let fenced = format!("Sure, here is the JSON:\n```json\n{FULL_DRAFT}\n```");
        let (_, classifier) = model_classifier(MockProvider::new().with_text(fenced));

        let intent = classifier.classify("invest 250 dai").await.unwrap();
        assert_eq!(intent.source, ClassificationSource::Model);
        assert_eq!(intent.params.amount, dec!(250));
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_rules() {
        let (_, classifier) = model_classifier(MockProvider::new().with_error(LlmError::Timeout));
        let intent = classifier.classify("swap 100 usdc").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
        assert_eq!(intent.params.action, ActionKind::Swap);
    }

    #[tokio::test]
    async fn non_json_reply_falls_back_to_rules() {
        let (_, classifier) =
            model_classifier(MockProvider::new().with_text("I cannot help with that."));
        let intent = classifier.classify("swap 100 usdc").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
    }

    #[tokio::test]
    async fn missing_required_field_falls_back_to_rules() {
        // No "action" field.
        let draft = r#"{
            "amount": 250, "asset": "DAI", "protocol": "compound",
            "frequency": "daily", "gasLimit": 18, "minYield": 3.5
        }"#;
        let (_, classifier) = model_classifier(MockProvider::new().with_text(draft));
        let intent = classifier.classify("invest 250 dai").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
    }

    #[tokio::test]
    async fn unsupported_asset_falls_back_to_rules() {
        let draft = r#"{
            "amount": 250, "asset": "DOGE", "protocol": "compound",
            "frequency": "daily", "gasLimit": 18, "minYield": 3.5, "action": "invest"
        }"#;
        let (_, classifier) = model_classifier(MockProvider::new().with_text(draft));
        let intent = classifier.classify("invest 250 doge").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
    }

    #[tokio::test]
    async fn invalid_amount_falls_back_to_rules() {
        let draft = r#"{
            "amount": 0, "asset": "USDC", "protocol": "aave",
            "frequency": "weekly", "gasLimit": 25, "minYield": 4, "action": "yield"
        }"#;
        let (_, classifier) = model_classifier(MockProvider::new().with_text(draft));
        let intent = classifier.classify("invest 100 usdc").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Rules);
        assert_eq!(intent.params.amount, dec!(100));
    }

    #[tokio::test]
    async fn advisory_gaps_are_filled_deterministically() {
        let draft = r#"{
            "amount": 9000, "asset": "USDC", "protocol": "aave",
            "frequency": "monthly", "gasLimit": 22, "minYield": 4, "action": "yield"
        }"#;
        let (_, classifier) = model_classifier(MockProvider::new().with_text(draft));
        let intent = classifier
            .classify("invest 9000 usdc in aave monthly")
            .await
            .unwrap();

        assert_eq!(intent.source, ClassificationSource::Model);
        let advisory = &intent.params.advisory;
        assert_eq!(advisory.risk_level, RiskLevel::Medium);
        assert_eq!(advisory.confidence, 100);
        assert_eq!(advisory.complexity, Complexity::Simple);
        assert_eq!(advisory.optimizations.len(), 2);
        assert_eq!(advisory.market_context.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn model_request_carries_prompt_contract() {
        let (provider, classifier) = model_classifier(MockProvider::new().with_text(FULL_DRAFT));
        classifier.classify("invest 250 dai").await.unwrap();

        let captured = provider.captured_requests();
        assert_eq!(captured.len(), 1);

        let (messages, config) = &captured[0];
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.system_prompt.as_deref(), Some(prompt::SYSTEM_PROMPT));
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .content
            .contains("Parse this DeFi intent: \"invest 250 dai\""));
    }

    #[tokio::test]
    async fn fractional_gas_limit_truncates() {
        let draft = r#"{
            "amount": 100, "asset": "USDC", "protocol": "aave",
            "frequency": "weekly", "gasLimit": 25.9, "minYield": 4, "action": "yield"
        }"#;
        let (_, classifier) = model_classifier(MockProvider::new().with_text(draft));
        let intent = classifier.classify("invest 100 usdc").await.unwrap();

        assert_eq!(intent.source, ClassificationSource::Model);
        assert_eq!(intent.params.gas_ceiling_gwei, 25);
    }
}
