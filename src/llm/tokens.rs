//! Token counting and cost estimation.

use std::sync::Arc;

use thiserror::Error;
use tiktoken_rs::CoreBPE;

#[derive(Debug, Error)]
#[error("tokenizer for model '{model}' unavailable: {reason}")]
pub struct TokenizationError {
    pub model: String,
    pub reason: String,
}

/// Counts tokens with the encoding registered for a reference model.
///
/// Resolving the encoding is the only fallible step, so it happens once at
/// construction and the counter is cheap to clone afterwards.
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    pub fn for_model(model: &str) -> Result<Self, TokenizationError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            tracing::error!("Failed to resolve tokenizer for {}: {}", model, e);
            TokenizationError {
                model: model.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { bpe: Arc::new(bpe) })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Per-token prices of the completion model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitPricing {
    pub input: f64,
    pub output: f64,
}

impl UnitPricing {
    /// Unknown token counts mean unknown cost, reported as zero.
    pub fn estimate_cost(&self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) -> f64 {
        match (prompt_tokens, completion_tokens) {
            (Some(prompt), Some(completion)) => {
                prompt as f64 * self.input + completion as f64 * self.output
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICING: UnitPricing = UnitPricing {
        input: 0.00001,
        output: 0.00003,
    };

    #[test]
    fn cost_of_zero_or_unknown_usage_is_zero() {
        assert_eq!(PRICING.estimate_cost(Some(0), Some(0)), 0.0);
        assert_eq!(PRICING.estimate_cost(None, None), 0.0);
        assert_eq!(PRICING.estimate_cost(Some(10), None), 0.0);
    }

    #[test]
    fn cost_is_linear_in_token_counts() {
        let cost = PRICING.estimate_cost(Some(1000), Some(500));
        let expected = 1000.0 * PRICING.input + 500.0 * PRICING.output;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn counts_tokens_with_reference_encoding() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").unwrap();
        assert_eq!(counter.count_tokens(""), 0);
        assert_eq!(counter.count_tokens("hello world"), 2);
        assert!(counter.count_tokens(&"refund ".repeat(100)) >= 100);
    }

    #[test]
    fn unknown_model_is_a_tokenization_error() {
        let err = TokenCounter::for_model("definitely-not-a-model").err().unwrap();
        assert_eq!(err.model, "definitely-not-a-model");
    }
}
