//! Error taxonomy for reference resolution.
//!
//! Errors fall into two groups. Recoverable errors (a missing, empty or
//! unsupported reference target, or a target whose shape cannot be spliced
//! into its container) are turned into diagnostics and the offending key is
//! left out of the result. Every other error aborts the merge.

use crate::codec::{DecodeError, EncodeError};
use crate::diagnostics::{DiagnosticMessage, DiagnosticMessageBuilder, codes};
use crate::fetch::FetchError;
use crate::fragment::FragmentNotFound;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while merging a document.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The target file could not be read.
    #[error("\"{reference}\" does not exist ({source})")]
    MissingReference {
        reference: String,
        within: String,
        path: PathBuf,
        #[source]
        source: FetchError,
    },

    /// The target file has no content.
    #[error("\"{reference}\" should not be empty")]
    EmptyReference {
        reference: String,
        within: String,
        path: PathBuf,
    },

    /// The target file's extension is not a recognized format.
    #[error("\"{reference}\" has unsupported format \".{extension}\"")]
    UnsupportedFormat {
        reference: String,
        within: String,
        extension: String,
    },

    /// The resolved value cannot be combined with its container.
    #[error("cannot merge {found} into {container} at \"{key}\"")]
    ShapeMismatch {
        key: String,
        within: String,
        container: &'static str,
        found: &'static str,
    },

    /// The fragment does not exist in the target document.
    #[error("\"{reference}\" in {within}: {source}")]
    FragmentNotFound {
        reference: String,
        within: String,
        #[source]
        source: FragmentNotFound,
    },

    /// The target file is malformed.
    #[error("cannot decode {} (\"{reference}\" in {within}): {source}", path.display())]
    Decode {
        reference: String,
        within: String,
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// A reference leads back to a target that is still being resolved.
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    /// The reference chain exceeds the configured maximum depth.
    #[error("reference chain deeper than {max_depth}: {}", chain.join(" -> "))]
    NestingTooDeep { max_depth: usize, chain: Vec<String> },

    /// A remote download (or the entry document read) failed.
    #[error("cannot fetch \"{reference}\": {source}")]
    Fetch {
        reference: String,
        #[source]
        source: FetchError,
    },

    /// The merged tree could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl MergeError {
    /// Check if the merge continues past this error with the key dropped.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MergeError::MissingReference { .. }
                | MergeError::EmptyReference { .. }
                | MergeError::UnsupportedFormat { .. }
                | MergeError::ShapeMismatch { .. }
        )
    }

    /// Diagnostic for a recoverable error, `None` for fatal ones.
    pub fn to_diagnostic(&self) -> Option<DiagnosticMessage> {
        let message = match self {
            MergeError::MissingReference {
                reference,
                within,
                path,
                source,
            } => DiagnosticMessageBuilder::warning("Missing reference")
                .with_code(codes::MISSING_REFERENCE)
                .problem(format!("`{}` does not exist", reference))
                .add_detail(format!("{}", source))
                .add_info(format!("Resolved to `{}`", path.display()))
                .add_info(format!("Referenced from {}", within))
                .add_hint("Check the path relative to the referencing file?")
                .build(),
            MergeError::EmptyReference {
                reference,
                within,
                path,
            } => DiagnosticMessageBuilder::warning("Empty reference")
                .with_code(codes::EMPTY_REFERENCE)
                .problem(format!("`{}` should not be empty", reference))
                .add_info(format!("Resolved to `{}`", path.display()))
                .add_info(format!("Referenced from {}", within))
                .build(),
            MergeError::UnsupportedFormat {
                reference,
                within,
                extension,
            } => DiagnosticMessageBuilder::warning("Unsupported reference format")
                .with_code(codes::UNSUPPORTED_FORMAT)
                .problem(format!("`{}` is not a YAML or JSON document", reference))
                .add_detail(format!("Extension `.{}` is not recognized", extension))
                .add_info(format!("Referenced from {}", within))
                .add_hint("Use a `.yaml`, `.yml` or `.json` file?")
                .build(),
            MergeError::ShapeMismatch {
                key,
                within,
                container,
                found,
            } => DiagnosticMessageBuilder::warning("Incompatible reference shape")
                .with_code(codes::SHAPE_MISMATCH)
                .problem(format!("Cannot merge a {} into a {}", found, container))
                .add_detail(format!("Key `{}` was dropped", key))
                .add_info(format!("In {}", within))
                .build(),
            _ => return None,
        };
        Some(message)
    }

    /// Diagnostic for any error: a warning for recoverable errors, an error
    /// message for fatal ones.
    pub fn report(&self) -> DiagnosticMessage {
        if let Some(message) = self.to_diagnostic() {
            return message;
        }

        let builder = match self {
            MergeError::CyclicReference { chain } => chain.iter().fold(
                DiagnosticMessageBuilder::error("Cyclic reference")
                    .problem("A reference leads back to a target that is still being resolved"),
                |builder, key| builder.add_note(key.as_str()),
            ),
            MergeError::NestingTooDeep { max_depth, chain } => chain.iter().fold(
                DiagnosticMessageBuilder::error("Reference chain too deep")
                    .problem(format!("More than {} nested references", max_depth))
                    .add_hint("Raise `max-depth` if the nesting is intended?"),
                |builder, key| builder.add_note(key.as_str()),
            ),
            MergeError::FragmentNotFound {
                reference, within, ..
            } => DiagnosticMessageBuilder::error("Unknown fragment")
                .problem(self.to_string())
                .add_info(format!("`{}` referenced from {}", reference, within)),
            MergeError::Decode { path, .. } => DiagnosticMessageBuilder::error("Malformed document")
                .problem(self.to_string())
                .add_info(format!("In `{}`", path.display())),
            _ => DiagnosticMessageBuilder::error("Merge failed").problem(self.to_string()),
        };
        builder.build()
    }
}
