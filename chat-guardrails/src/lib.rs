//! Guardrails applied around model input and output.
//!
//! Three surfaces are covered: user input (prompt injection, size, emptiness),
//! generated output (system-prompt leak signatures), and ingested document
//! text (hidden-directive stripping before chunking).

#![warn(missing_docs, clippy::pedantic)]

mod sanitize;
mod validator;

pub use sanitize::sanitize_document_text;
pub use validator::{GuardrailValidator, InputVerdict, OutputVerdict};
