//! Model fallback on submission rejection.
//!
//! Some provider models are rejected outright (HTTP 400) for certain
//! accounts or regions. For those specific `(provider, model)` pairs the
//! client retries the submission exactly once against a known-compatible
//! model. This is an explicit allow-list, not a general retry loop.

use genjob_core::Provider;

use crate::error::GenerationError;

/// Status code that triggers a fallback.
const REJECTION_STATUS: u16 = 400;

/// One allowed substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackRule {
    pub provider: Provider,
    pub rejected_model: String,
    pub fallback_model: String,
}

/// Set of allowed model substitutions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    rules: Vec<FallbackRule>,
}

impl FallbackPolicy {
    /// A policy that never falls back.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(
        mut self,
        provider: Provider,
        rejected_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        self.rules.push(FallbackRule {
            provider,
            rejected_model: rejected_model.into(),
            fallback_model: fallback_model.into(),
        });
        self
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// The model to retry with after `error`, if the policy allows one.
    pub fn fallback_for(
        &self,
        provider: Provider,
        model: &str,
        error: &GenerationError,
    ) -> Option<&str> {
        if error.api_status() != Some(REJECTION_STATUS) {
            return None;
        }
        self.rules
            .iter()
            .find(|r| r.provider == provider && r.rejected_model == model)
            .map(|r| r.fallback_model.as_str())
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::none().with_rule(
            Provider::Gemini,
            "gemini-3-pro-image-preview",
            "gemini-2.5-flash-image",
        )
    }
}
