pub mod advisory;
pub mod classifier;
pub mod llm;
pub mod prompt;
pub mod rules;
pub mod summary;

// Re-export the classification surface for convenience.
pub use classifier::{ClassificationSource, ClassifiedIntent, ClassifyError, IntentClassifier};
pub use llm::{
    GeminiProvider, LlmConfig, LlmError, LlmMessage, LlmProvider, LlmResponse, LlmRole,
    MockProvider as LlmMockProvider,
};
pub use summary::summarize;
