//! Generated continuation types

use serde::{Deserialize, Serialize};

/// One generated step of a branching narrative: the prose that follows a
/// choice, and the options offered next.
///
/// This is the success half of a provider call. Providers decode their
/// wire format into this type exactly once; failures are
/// [`HuginnError`](crate::HuginnError) values, never half-filled structs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Continuation {
    /// Narrative text following the chosen option.
    pub text: String,
    /// Candidate choices for the next step.
    pub next_choices: Vec<String>,
    /// Token accounting reported by the provider, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Continuation {
    pub fn new(text: impl Into<String>, next_choices: Vec<String>) -> Self {
        Self {
            text: text.into(),
            next_choices,
            usage: None,
        }
    }

    /// Attach token usage.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Total tokens spent generating this continuation, if known.
    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().map(|u| u64::from(u.total_tokens))
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}
