//! Directive extraction and conversation normalization.
//!
//! User payloads may open with inline directives that steer the run:
//!
//! ```text
//! [Model: claude-3-5-sonnet-latest]
//!
//! [Provider: anthropic]
//!
//! the actual request text
//! ```
//!
//! The model directive is only honored anchored at the start of the payload;
//! the provider directive may appear anywhere. Both are stripped before the
//! text reaches the backend.

use std::collections::HashMap;

use regex_lite::Regex;
use tracing::debug;

use segue_core::directive::{Directive, DirectiveParser};
use segue_core::turn::{Role, Turn};

const MODEL_PATTERN: &str = r"^\[Model: (.*?)\]\n\n";
const PROVIDER_PATTERN: &str = r"\[Provider: (.*?)\]\n\n";

/// The default directive syntax: bracketed markers matched by regex.
#[derive(Debug, Default)]
pub struct RegexDirectiveParser;

impl RegexDirectiveParser {
    pub fn new() -> Self {
        Self
    }
}

impl DirectiveParser for RegexDirectiveParser {
    fn parse(&self, text: &str) -> Directive {
        let (model, text) = extract(MODEL_PATTERN, text);
        let (provider, cleaned) = extract(PROVIDER_PATTERN, &text);
        Directive {
            model,
            provider,
            cleaned,
        }
    }
}

/// Match `pattern` against `text`; return the first capture and the text with
/// the whole match removed. An unmatched pattern leaves the text as-is.
fn extract(pattern: &str, text: &str) -> (Option<String>, String) {
    let Ok(re) = Regex::new(pattern) else {
        return (None, text.to_string());
    };
    let Some(caps) = re.captures(text) else {
        return (None, text.to_string());
    };
    let value = caps.get(1).map(|m| m.as_str().to_string());
    let cleaned = match caps.get(0) {
        Some(whole) => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..whole.start()]);
            out.push_str(&text[whole.end()..]);
            out
        }
        None => text.to_string(),
    };
    (value, cleaned)
}

/// The model/provider a run will actually use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedTarget {
    pub model: String,
    pub provider: String,
}

/// Strip directives from every user turn and resolve the effective target.
///
/// The most recent directive wins across turns. A model directive is applied
/// only when the model is known (listed in the budget table); unknown models
/// are stripped but ignored. Provider directives apply unconditionally.
pub(crate) fn normalize(
    mut turns: Vec<Turn>,
    parser: &dyn DirectiveParser,
    default_model: &str,
    default_provider: &str,
    known_models: &HashMap<String, Option<u32>>,
) -> (Vec<Turn>, ResolvedTarget) {
    let mut model = default_model.to_string();
    let mut provider = default_provider.to_string();

    for turn in &mut turns {
        if turn.role != Role::User {
            continue;
        }
        let directive = parser.parse(&turn.text);
        if let Some(candidate) = directive.model {
            if known_models.contains_key(&candidate) {
                model = candidate;
            } else {
                debug!(model = %candidate, "Ignoring directive for unknown model");
            }
        }
        if let Some(candidate) = directive.provider {
            provider = candidate;
        }
        turn.text = directive.cleaned;
    }

    (turns, ResolvedTarget { model, provider })
}
