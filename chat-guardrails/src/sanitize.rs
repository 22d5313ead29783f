//! Sanitization of untrusted document text before chunking.
//!
//! Uploaded documents later become retrieval context, so instructions hidden
//! inside them would reach the model as trusted prompt material. Stripping the
//! known carriers here reduces that indirect-injection surface.

use std::sync::LazyLock;

use regex::Regex;

static SYSTEM_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[SYSTEM\].*?\[/SYSTEM\]").expect("system block pattern is valid")
});

static HIDDEN_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!-- ?(ignore|forget|override|system).*?-->")
        .expect("hidden comment pattern is valid")
});

/// Strips bracketed pseudo-instruction blocks, HTML-comment-style hidden
/// directives, and zero-width characters from document text.
#[must_use]
pub fn sanitize_document_text(text: &str) -> String {
    let sanitized = SYSTEM_BLOCKS.replace_all(text, "");
    let sanitized = HIDDEN_COMMENTS.replace_all(&sanitized, "");

    sanitized
        .chars()
        .filter(|ch| !matches!(ch, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .collect()
}
