//! Input and output validation.

use std::sync::LazyLock;

use regex::RegexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Patterns that suggest prompt injection attempts.
const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+(instructions|prompts|rules)",
    r"(?i)you\s+are\s+now\s+(a|an|in)\s+",
    r"(?i)system\s*prompt",
    r"(?i)reveal\s+(your|the)\s+(instructions|prompt|rules)",
    r"(?i)pretend\s+(you|to\s+be)",
    r"(?i)act\s+as\s+(if|a)",
    r"(?i)forget\s+(everything|all|your)",
    r"(?i)override\s+(your|the|all)",
    r"(?i)jailbreak",
    r"(?i)DAN\s+mode",
];

/// Signatures of the grounding instructions leaking into a response.
const LEAK_PATTERNS: &[&str] = &[
    r"(?i)CRITICAL RULES:",
    r"(?i)ONLY answer based on",
    r"(?i)you are a helpful assistant that",
];

static INJECTION_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(INJECTION_PATTERNS).expect("injection patterns are valid regexes")
});

static LEAK_SET: LazyLock<RegexSet> =
    LazyLock::new(|| RegexSet::new(LEAK_PATTERNS).expect("leak patterns are valid regexes"));

/// Generic deflection shown for injection attempts. Deliberately does not
/// echo the matched pattern, to avoid aiding adversarial refinement.
const INJECTION_REASON: &str =
    "I can only help with questions related to your knowledge base. Could you rephrase your question?";

const EMPTY_REASON: &str = "Please enter a message.";

/// Replacement served when a response trips a leak signature.
const LEAK_REPLACEMENT: &str =
    "I'm here to help with questions about your knowledge base. What would you like to know?";

const LEAK_REASON: &str = "Response filtered for safety.";

/// Default maximum accepted input length, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 10_000;

/// Outcome of validating user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputVerdict {
    safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl InputVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
        }
    }

    /// Returns `true` when the input may be processed.
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        self.safe
    }

    /// Returns the user-facing rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Outcome of validating generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVerdict {
    safe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replacement: Option<String>,
}

impl OutputVerdict {
    fn safe() -> Self {
        Self {
            safe: true,
            reason: None,
            replacement: None,
        }
    }

    fn filtered(reason: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: Some(reason.into()),
            replacement: Some(replacement.into()),
        }
    }

    /// Returns `true` when the output may be served as-is.
    #[must_use]
    pub const fn is_safe(&self) -> bool {
        self.safe
    }

    /// Returns the filtering reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the safe replacement response when the output was filtered.
    #[must_use]
    pub fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }
}

/// Rule-based guardrail validator.
///
/// Input checks run in a fixed order and short-circuit on the first failure:
/// injection patterns, then length, then emptiness.
#[derive(Debug, Clone)]
pub struct GuardrailValidator {
    max_input_chars: usize,
}

impl GuardrailValidator {
    /// Creates a validator with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    /// Overrides the maximum accepted input length.
    #[must_use]
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Validates user input before any conversation state is touched.
    #[must_use]
    pub fn validate_input(&self, message: &str) -> InputVerdict {
        if INJECTION_SET.is_match(message) {
            debug!("input rejected by injection pattern");
            return InputVerdict::rejected(INJECTION_REASON);
        }

        if message.chars().count() > self.max_input_chars {
            return InputVerdict::rejected(format!(
                "Your message is too long. Please keep it under {} characters.",
                self.max_input_chars
            ));
        }

        if message.trim().is_empty() {
            return InputVerdict::rejected(EMPTY_REASON);
        }

        InputVerdict::safe()
    }

    /// Scans generated output for system-prompt leak signatures.
    ///
    /// This check is advisory: it is only meaningfully actionable on a fully
    /// buffered response. Tokens already streamed to a consumer cannot be
    /// recalled, so callers on a streaming path can at most substitute the
    /// persisted copy and log the incident.
    #[must_use]
    pub fn validate_output(&self, response: &str) -> OutputVerdict {
        if LEAK_SET.is_match(response) {
            debug!("output tripped a leak signature");
            return OutputVerdict::filtered(LEAK_REASON, LEAK_REPLACEMENT);
        }

        OutputVerdict::safe()
    }
}

impl Default for GuardrailValidator {
    fn default() -> Self {
        Self::new()
    }
}
