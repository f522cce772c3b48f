//! Whole-document entry points.
//!
//! These wrap the [`Merger`] with loading of the entry document and encoding
//! of the merged result. The canonical output is compact JSON passed through
//! [`normalize`](crate::normalize::normalize).

use crate::codec::{self, Encoding, Format};
use crate::diagnostics::DiagnosticMessage;
use crate::error::MergeError;
use crate::fetch::{NativeFetcher, ResourceFetcher};
use crate::merge::Merger;
use crate::normalize::normalize;
use crate::options::{MergeMode, MergeOptions};
use crate::resolver::clean_path;
use crate::tree::Tree;
use std::path::Path;

/// Result of a merge run: the normalized compact JSON text and the
/// diagnostics for the references that were dropped.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub text: String,
    pub diagnostics: Vec<DiagnosticMessage>,
}

impl MergeReport {
    fn from_tree(tree: &Tree, diagnostics: Vec<DiagnosticMessage>) -> Result<Self, MergeError> {
        let encoded = codec::encode(tree, Encoding::Json)?;
        Ok(Self {
            text: normalize(&encoded).into_owned(),
            diagnostics,
        })
    }

    /// Check if any reference was dropped.
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Re-encode the normalized text.
    ///
    /// [`Encoding::Json`] returns the text as is.
    pub fn render(&self, encoding: Encoding) -> Result<String, MergeError> {
        if encoding == Encoding::Json {
            return Ok(self.text.clone());
        }
        let tree = codec::decode(&self.text, Format::Json).map_err(|source| MergeError::Decode {
            reference: "<merged>".to_string(),
            within: "merged output".to_string(),
            path: Default::default(),
            source,
        })?;
        Ok(codec::encode(&tree, encoding)?)
    }
}

impl<F: ResourceFetcher + ?Sized> Merger<'_, F> {
    /// Merge `root` and encode the result.
    ///
    /// Diagnostics of this run are moved into the report.
    pub fn merge_document(
        &mut self,
        tag: &str,
        base_dir: &Path,
        root: &Tree,
    ) -> Result<MergeReport, MergeError> {
        let merged = self.merge_tree(tag, base_dir, root)?;
        MergeReport::from_tree(&merged, self.take_diagnostics())
    }
}

/// Read and decode an entry document, choosing the format from its
/// extension.
pub fn load_document<F: ResourceFetcher + ?Sized>(fetcher: &F, path: &Path) -> Result<Tree, MergeError> {
    let reference = path.display().to_string();

    let Some(format) = Format::from_path(path) else {
        return Err(MergeError::UnsupportedFormat {
            reference,
            within: "the command line".to_string(),
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    };

    let bytes = fetcher.read_file(path).map_err(|source| MergeError::Fetch {
        reference: reference.clone(),
        source,
    })?;

    codec::decode_bytes(bytes, format).map_err(|source| MergeError::Decode {
        reference,
        within: "the command line".to_string(),
        path: path.to_path_buf(),
        source,
    })
}

/// Load the document at `path` and merge it with its own directory as base.
pub fn merge_file<F: ResourceFetcher + ?Sized>(
    fetcher: &F,
    path: &Path,
    tag: &str,
    options: MergeOptions,
) -> Result<MergeReport, MergeError> {
    let root = load_document(fetcher, path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let document_id = clean_path(path).to_string_lossy().into_owned();

    tracing::info!(input = %path.display(), tag, "Merging document");

    let mut merger = Merger::new(fetcher, options);
    let merged = merger.merge_root(tag, base_dir, &root, &document_id)?;
    MergeReport::from_tree(&merged, merger.take_diagnostics())
}

/// Merge `root` with the native fetcher and default options.
///
/// Dropped references are logged; use [`Merger`] to collect them.
pub fn merge_document(
    tag: &str,
    base_dir: &Path,
    root: &Tree,
    mode: MergeMode,
) -> Result<String, MergeError> {
    let fetcher = NativeFetcher::new();
    let mut merger = Merger::new(&fetcher, MergeOptions::default().with_mode(mode));
    let report = merger.merge_document(tag, base_dir, root)?;
    Ok(report.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_merge_document_with_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.yaml"), "x: 2\n").unwrap();

        let root = Tree::from(json!({"x": 1, "$ref": "x.yaml"}));
        let text = merge_document("t", dir.path(), &root, MergeMode::Shallow).unwrap();
        assert_eq!(text, r#"{"x":2}"#);
    }

    #[test]
    fn test_free_merge_document_drops_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = Tree::from(json!({"a": {"$ref": "gone.yaml"}, "b": true}));
        let text = merge_document("t", dir.path(), &root, MergeMode::Deep).unwrap();
        assert_eq!(text, r#"{"a":{},"b":true}"#);
    }

    #[test]
    fn test_report_render() {
        let report = MergeReport::from_tree(&Tree::from(json!({"a": [1, "b"]})), Vec::new()).unwrap();
        assert!(!report.has_diagnostics());
        insta::assert_snapshot!(report.render(Encoding::Json).unwrap(), @r#"{"a":[1,"b"]}"#);
        insta::assert_snapshot!(report.render(Encoding::Yaml).unwrap().trim_end(), @r#"
        ---
        a:
          - 1
          - b
        "#);
    }

    #[test]
    fn test_load_document_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.txt");
        std::fs::write(&path, "a: 1\n").unwrap();
        let err = load_document(&NativeFetcher::new(), &path).unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_document_invalid_utf8_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.yaml");
        std::fs::write(&path, b"a: \xff\n").unwrap();
        let err = load_document(&NativeFetcher::new(), &path).unwrap_err();
        assert!(matches!(err, MergeError::Decode { .. }));
    }

    #[test]
    fn test_merge_file_cycle_through_entry_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.yaml"),
            "defs:\n  Node:\n    $ref: '#/defs/Other'\n  Other:\n    $ref: ./index.yaml#/defs/Node\n",
        )
        .unwrap();

        let entry = dir.path().join(".").join("index.yaml");
        let err = merge_file(&NativeFetcher::new(), &entry, "t", MergeOptions::default()).unwrap_err();
        match err {
            MergeError::CyclicReference { chain } => {
                assert_eq!(chain.len(), 3);
                assert_eq!(chain[0], chain[2]);
                assert!(!chain[0].contains("/./"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_load_document_missing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&NativeFetcher::new(), &dir.path().join("api.yaml")).unwrap_err();
        assert!(matches!(err, MergeError::Fetch { .. }));
        assert!(!err.is_recoverable());
    }
}
