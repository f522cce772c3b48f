//! Diagnostic messages for merge problems.
//!
//! References that cannot be resolved but do not abort the merge (a missing
//! file, an empty file, an unsupported extension, a shape mismatch) are
//! collected as warning [`DiagnosticMessage`] values instead of being
//! printed. A fatal error can be turned into an error message as well. Callers
//! decide how to present them; the CLI renders them with
//! [`DiagnosticMessage::to_text`] or [`DiagnosticMessage::to_json`].
//!
//! Messages follow a tidyverse-like structure: a short title, a problem
//! statement, bulleted details and optional hints. Each recovered error kind
//! has a stable code (see [`codes`]).

use serde::Serialize;
use std::fmt::Write;

/// Stable diagnostic codes.
pub mod codes {
    /// Reference target file is unreadable.
    pub const MISSING_REFERENCE: &str = "SM-1-1";
    /// Reference target decodes to nothing.
    pub const EMPTY_REFERENCE: &str = "SM-1-2";
    /// Reference target has an unrecognized extension.
    pub const UNSUPPORTED_FORMAT: &str = "SM-1-3";
    /// Reference target cannot be spliced into its container.
    pub const SHAPE_MISMATCH: &str = "SM-1-4";
}

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
}

/// How a detail bullet is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// ✖ bullet
    Error,
    /// ℹ bullet
    Info,
    /// • bullet
    Note,
}

/// A single detail bullet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub content: String,
}

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticMessage {
    /// Stable code such as `SM-1-1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Brief title.
    pub title: String,

    pub kind: DiagnosticKind,

    /// What went wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,

    /// Specifics: which reference, which file, which key.
    pub details: Vec<DetailItem>,

    /// Suggestions for fixing the problem.
    pub hints: Vec<String>,
}

impl DiagnosticMessage {
    /// Render as plain text.
    ///
    /// ```text
    /// Warning [SM-1-1]: Missing reference
    /// Reference target could not be read
    /// ✖ `./missing.yaml` does not exist
    /// ? Check the path relative to the referencing file?
    /// ```
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        let kind = match self.kind {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
        };
        match &self.code {
            Some(code) => {
                let _ = writeln!(out, "{} [{}]: {}", kind, code, self.title);
            }
            None => {
                let _ = writeln!(out, "{}: {}", kind, self.title);
            }
        }

        if let Some(problem) = &self.problem {
            let _ = writeln!(out, "{}", problem);
        }

        for detail in &self.details {
            let bullet = match detail.kind {
                DetailKind::Error => "✖",
                DetailKind::Info => "ℹ",
                DetailKind::Note => "•",
            };
            let _ = writeln!(out, "{} {}", bullet, detail.content);
        }

        for hint in &self.hints {
            let _ = writeln!(out, "? {}", hint);
        }

        out
    }

    /// Render as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Builder for [`DiagnosticMessage`].
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage {
                code: None,
                title: title.into(),
                kind,
                problem: None,
                details: Vec::new(),
                hints: Vec::new(),
            },
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    /// Add an error detail (✖).
    pub fn add_detail(mut self, content: impl Into<String>) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Error,
            content: content.into(),
        });
        self
    }

    /// Add an info detail (ℹ).
    pub fn add_info(mut self, content: impl Into<String>) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Info,
            content: content.into(),
        });
        self
    }

    /// Add a note (•).
    pub fn add_note(mut self, content: impl Into<String>) -> Self {
        self.message.details.push(DetailItem {
            kind: DetailKind::Note,
            content: content.into(),
        });
        self
    }

    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    pub fn build(self) -> DiagnosticMessage {
        self.message
    }
}
