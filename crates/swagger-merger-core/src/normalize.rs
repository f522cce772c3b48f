//! Textual cleanup of encoded output.
//!
//! A brace-wrapped bracket run `{[ ... ]}` in the compact encoding is the
//! trace of array content that landed in an object-shaped placeholder; it is
//! rewritten to the bare `[ ... ]`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static WRAPPED_SEQUENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\[(.+?)\]\}").expect("static regex is valid"));

/// Rewrite every non-overlapping `{[...]}` to `[...]`.
pub fn normalize(text: &str) -> Cow<'_, str> {
    WRAPPED_SEQUENCE.replace_all(text, "[$1]")
}
