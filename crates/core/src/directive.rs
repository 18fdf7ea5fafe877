//! Directive extraction — model/provider overrides embedded in user text.
//!
//! Callers may prefix a user payload with inline directives selecting a model
//! or provider for the rest of the conversation. The engine strips them before
//! the text reaches the backend; the trait lives here so alternative syntaxes
//! can be plugged in.

/// What one scan of a user payload produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Model override, if the payload carried one.
    pub model: Option<String>,

    /// Provider override, if the payload carried one.
    pub provider: Option<String>,

    /// The payload with directive text removed. Unrelated text is preserved
    /// byte for byte.
    pub cleaned: String,
}

impl Directive {
    /// A scan that found nothing: no overrides, text untouched.
    pub fn untouched(text: impl Into<String>) -> Self {
        Self {
            model: None,
            provider: None,
            cleaned: text.into(),
        }
    }
}

/// Extracts directives from a single user payload.
pub trait DirectiveParser: Send + Sync {
    fn parse(&self, text: &str) -> Directive;
}
