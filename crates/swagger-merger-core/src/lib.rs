//! Reference resolution and merging for Swagger/OpenAPI documents.
//!
//! Documents are trees of mappings, sequences and scalars, decoded from YAML
//! or JSON. Mapping keys starting with `$ref` point at another document, a
//! fragment of the current document, or a remote resource; the target is
//! spliced into the mapping that holds the reference, recursively, until a
//! single self-contained document remains.
//!
//! ```no_run
//! use std::path::Path;
//! use swagger_merger_core::{MergeOptions, NativeFetcher, merge_file};
//!
//! let fetcher = NativeFetcher::new();
//! let report = merge_file(&fetcher, Path::new("api/index.yaml"), "run-1", MergeOptions::default())?;
//! for diagnostic in &report.diagnostics {
//!     eprintln!("{}", diagnostic.to_text());
//! }
//! println!("{}", report.text);
//! # Ok::<(), swagger_merger_core::MergeError>(())
//! ```
//!
//! Missing, empty or unsupported targets and shape mismatches are recovered:
//! the offending key is dropped and a [`DiagnosticMessage`] is collected.
//! Everything else (malformed targets, unknown fragments, cycles, failed
//! downloads) aborts the merge with a [`MergeError`].

pub mod codec;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod fetch;
pub mod fragment;
pub mod locator;
pub mod merge;
pub mod normalize;
pub mod options;
pub mod resolver;
pub mod tree;

pub use codec::{DecodeError, EncodeError, Encoding, Format, decode, encode};
pub use diagnostics::{DiagnosticKind, DiagnosticMessage, DiagnosticMessageBuilder};
pub use document::{MergeReport, load_document, merge_document, merge_file};
pub use error::MergeError;
pub use fetch::{FetchError, FetchResult, NativeFetcher, ResourceFetcher};
pub use fragment::{FragmentNotFound, navigate};
pub use locator::{Locator, Origin};
pub use merge::Merger;
pub use normalize::normalize;
pub use options::{MergeMode, MergeOptions, SameDocumentPolicy};
pub use tree::{Scalar, Tree};
