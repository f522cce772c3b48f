//! Merge configuration.
//!
//! [`MergeOptions`] can be built in code or deserialized from a config file
//! (all fields optional, kebab-case keys):
//!
//! ```toml
//! mode = "deep"
//! max-depth = 64
//! ref-prefix = "$ref"
//! same-document = "preserve"
//! ```

use serde::Deserialize;

/// How a resolved reference target is combined with its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Top-level keys of the target overwrite the container's.
    #[default]
    Shallow,

    /// Nested mappings merge key by key at every depth.
    Deep,
}

/// What to do with `#/...` references into the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameDocumentPolicy {
    /// Splice the referenced fragment in place.
    #[default]
    Inline,

    /// Keep the reference string untouched.
    Preserve,
}

/// Options for a merge run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MergeOptions {
    pub mode: MergeMode,

    /// Maximum length of a reference chain (default: 256).
    ///
    /// Resolution fails with `MergeError::NestingTooDeep` beyond it.
    pub max_depth: usize,

    /// Keys starting with this prefix are reference markers (default: `$ref`).
    pub ref_prefix: String,

    pub same_document: SameDocumentPolicy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            mode: MergeMode::Shallow,
            max_depth: 256,
            ref_prefix: "$ref".to_string(),
            same_document: SameDocumentPolicy::Inline,
        }
    }
}

impl MergeOptions {
    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_same_document(mut self, policy: SameDocumentPolicy) -> Self {
        self.same_document = policy;
        self
    }

    /// Check if a mapping key introduces a reference.
    pub fn is_marker(&self, key: &str) -> bool {
        key.starts_with(&self.ref_prefix)
    }
}
