//! The recursive merge engine.
//!
//! The engine walks a document depth-first and builds a new tree. Mapping
//! keys that are reference markers are resolved, the target is merged
//! recursively in its own base directory, and the result is spliced into the
//! mapping that holds the marker (rather than nested under the marker key).
//!
//! # Splicing
//!
//! Each mapping is rebuilt in an [`Accumulator`] that starts out as an empty
//! mapping and may change shape exactly once, when the first thing spliced
//! into it is a sequence or a scalar:
//!
//! | accumulator   | target    | result                                   |
//! |---------------|-----------|------------------------------------------|
//! | empty mapping | any       | the target                               |
//! | mapping       | mapping   | overlay (shallow) or recursive (deep)    |
//! | sequence      | sequence  | concatenation                            |
//! | anything else |           | shape mismatch, key dropped and reported |
//!
//! # Guards
//!
//! The keys of all targets currently being expanded are kept on a stack.
//! Re-entering one of them is a cycle; a stack deeper than
//! [`MergeOptions::max_depth`] is rejected as well.

use crate::diagnostics::DiagnosticMessage;
use crate::error::MergeError;
use crate::fetch::ResourceFetcher;
use crate::locator;
use crate::options::{MergeMode, MergeOptions};
use crate::resolver::{ResolvedFragment, Resolver, Substitution};
use crate::tree::{Scalar, Tree};
use indexmap::IndexMap;
use std::path::Path;

/// Identifier of an entry document that was not loaded from a file.
pub const ROOT_DOCUMENT_ID: &str = "<root>";

/// Per-level merge context.
///
/// Everything except the base directory and the current document is fixed
/// for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Namespace for remote downloads.
    pub tag: &'a str,
    /// Directory relative references are resolved against.
    pub base_dir: &'a Path,
    /// Root of the document being expanded, for `#/...` references.
    pub document: &'a Tree,
    pub document_id: &'a str,
}

impl Frame<'_> {
    /// Human-readable location for error messages.
    pub fn describe(&self) -> String {
        format!("`{}`", self.document_id)
    }
}

/// A mapping under construction.
#[derive(Debug)]
enum Accumulator {
    Mapping(IndexMap<String, Tree>),
    Sequence(Vec<Tree>),
    Scalar(Scalar),
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator::Mapping(IndexMap::new())
    }
}

impl Accumulator {
    fn kind_name(&self) -> &'static str {
        match self {
            Accumulator::Mapping(_) => "mapping",
            Accumulator::Sequence(_) => "sequence",
            Accumulator::Scalar(_) => "scalar",
        }
    }

    fn is_empty_mapping(&self) -> bool {
        matches!(self, Accumulator::Mapping(entries) if entries.is_empty())
    }

    /// Set a plain key. Fails with the accumulator's kind once it is no
    /// longer a mapping.
    fn insert(&mut self, key: String, value: Tree) -> Result<(), &'static str> {
        match self {
            Accumulator::Mapping(entries) => {
                entries.insert(key, value);
                Ok(())
            }
            other => Err(other.kind_name()),
        }
    }

    /// Splice a resolved target. Fails with the accumulator's kind when the
    /// shapes cannot be combined.
    fn splice(&mut self, resolved: Tree, mode: MergeMode) -> Result<(), &'static str> {
        if self.is_empty_mapping() {
            *self = match resolved {
                Tree::Mapping(entries) => Accumulator::Mapping(entries),
                Tree::Sequence(items) => Accumulator::Sequence(items),
                Tree::Scalar(scalar) => Accumulator::Scalar(scalar),
            };
            return Ok(());
        }

        let container = self.kind_name();
        match (self, resolved) {
            (Accumulator::Sequence(items), Tree::Sequence(more)) => {
                items.extend(more);
                Ok(())
            }
            (Accumulator::Mapping(entries), Tree::Mapping(incoming)) => {
                match mode {
                    MergeMode::Shallow => entries.extend(incoming),
                    MergeMode::Deep => deep_merge(entries, incoming),
                }
                Ok(())
            }
            _ => Err(container),
        }
    }

    fn into_tree(self) -> Tree {
        match self {
            Accumulator::Mapping(entries) => Tree::Mapping(entries),
            Accumulator::Sequence(items) => Tree::Sequence(items),
            Accumulator::Scalar(scalar) => Tree::Scalar(scalar),
        }
    }
}

/// Merge `incoming` into `entries` at every depth: mappings merge key by key,
/// sequences concatenate, anything else is replaced.
pub fn deep_merge(entries: &mut IndexMap<String, Tree>, incoming: IndexMap<String, Tree>) {
    for (key, value) in incoming {
        match entries.get_mut(&key) {
            Some(existing) => deep_merge_value(existing, value),
            None => {
                entries.insert(key, value);
            }
        }
    }
}

fn deep_merge_value(existing: &mut Tree, incoming: Tree) {
    match (existing, incoming) {
        (Tree::Mapping(entries), Tree::Mapping(more)) => deep_merge(entries, more),
        (Tree::Sequence(items), Tree::Sequence(more)) => items.extend(more),
        (slot, value) => *slot = value,
    }
}

/// Merges `$ref`-linked documents.
///
/// One merger can run several merges; diagnostics accumulate until taken.
pub struct Merger<'f, F: ResourceFetcher + ?Sized> {
    fetcher: &'f F,
    options: MergeOptions,
    diagnostics: Vec<DiagnosticMessage>,
    /// Keys of the targets currently being expanded, outermost first.
    stack: Vec<String>,
}

impl<'f, F: ResourceFetcher + ?Sized> Merger<'f, F> {
    pub fn new(fetcher: &'f F, options: MergeOptions) -> Self {
        Self {
            fetcher,
            options,
            diagnostics: Vec::new(),
            stack: Vec::new(),
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Diagnostics for the references dropped so far.
    pub fn diagnostics(&self) -> &[DiagnosticMessage] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<DiagnosticMessage> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Resolve every reference in `root`, an entry document that does not
    /// come from a file.
    pub fn merge_tree(&mut self, tag: &str, base_dir: &Path, root: &Tree) -> Result<Tree, MergeError> {
        self.merge_root(tag, base_dir, root, ROOT_DOCUMENT_ID)
    }

    /// Resolve every reference in `root`, identified by `document_id` (the
    /// path of the file it was loaded from) for cycle detection.
    pub fn merge_root(
        &mut self,
        tag: &str,
        base_dir: &Path,
        root: &Tree,
        document_id: &str,
    ) -> Result<Tree, MergeError> {
        self.stack.clear();
        let frame = Frame {
            tag,
            base_dir,
            document: root,
            document_id,
        };
        self.merge_node(root, &frame)
    }

    fn merge_node(&mut self, tree: &Tree, frame: &Frame<'_>) -> Result<Tree, MergeError> {
        match tree {
            Tree::Scalar(_) => Ok(tree.clone()),
            Tree::Sequence(items) => items
                .iter()
                .map(|item| self.merge_node(item, frame))
                .collect::<Result<Vec<_>, _>>()
                .map(Tree::Sequence),
            Tree::Mapping(entries) => self.merge_mapping(entries, frame),
        }
    }

    fn merge_mapping(
        &mut self,
        entries: &IndexMap<String, Tree>,
        frame: &Frame<'_>,
    ) -> Result<Tree, MergeError> {
        let mut acc = Accumulator::default();

        for (key, value) in entries {
            let outcome = match value.as_str() {
                Some(raw) if self.options.is_marker(key) => self.apply_marker(&mut acc, key, raw, frame),
                _ => self.apply_plain(&mut acc, key, value, frame),
            };

            match outcome {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => self.recover(err),
                Err(err) => return Err(err),
            }
        }

        Ok(acc.into_tree())
    }

    fn apply_plain(
        &mut self,
        acc: &mut Accumulator,
        key: &str,
        value: &Tree,
        frame: &Frame<'_>,
    ) -> Result<(), MergeError> {
        let merged = self.merge_node(value, frame)?;
        let found = merged.kind_name();
        acc.insert(key.to_string(), merged)
            .map_err(|container| MergeError::ShapeMismatch {
                key: key.to_string(),
                within: frame.describe(),
                container,
                found,
            })
    }

    fn apply_marker(
        &mut self,
        acc: &mut Accumulator,
        key: &str,
        raw: &str,
        frame: &Frame<'_>,
    ) -> Result<(), MergeError> {
        tracing::debug!(reference = raw, within = frame.document_id, "Resolving reference");

        let locator = locator::parse(raw);
        let substitution = Resolver::new(self.fetcher, &self.options).resolve(raw, &locator, frame)?;

        match substitution {
            Substitution::Text(text) => {
                let value = Tree::string(text);
                acc.insert(key.to_string(), value)
                    .map_err(|container| MergeError::ShapeMismatch {
                        key: key.to_string(),
                        within: frame.describe(),
                        container,
                        found: "scalar",
                    })
            }
            Substitution::Omit => Ok(()),
            Substitution::Inline(fragment) => {
                let resolved = self.expand(fragment, frame)?;
                let found = resolved.kind_name();
                acc.splice(resolved, self.options.mode)
                    .map_err(|container| MergeError::ShapeMismatch {
                        key: key.to_string(),
                        within: frame.describe(),
                        container,
                        found,
                    })
            }
        }
    }

    /// Merge a resolved target in its own context, guarded against cycles.
    fn expand(&mut self, fragment: ResolvedFragment, frame: &Frame<'_>) -> Result<Tree, MergeError> {
        self.enter(&fragment.key)?;

        let (document, document_id) = match &fragment.document {
            Some((document, id)) => (document, id.as_str()),
            None => (frame.document, frame.document_id),
        };
        let child = Frame {
            tag: frame.tag,
            base_dir: &fragment.base_dir,
            document,
            document_id,
        };

        let result = self.merge_node(&fragment.tree, &child);
        self.stack.pop();
        result
    }

    fn enter(&mut self, key: &str) -> Result<(), MergeError> {
        let chain = || {
            let mut chain = self.stack.clone();
            chain.push(key.to_string());
            chain
        };

        if self.stack.iter().any(|active| active == key) {
            return Err(MergeError::CyclicReference { chain: chain() });
        }
        if self.stack.len() >= self.options.max_depth {
            return Err(MergeError::NestingTooDeep {
                max_depth: self.options.max_depth,
                chain: chain(),
            });
        }

        self.stack.push(key.to_string());
        Ok(())
    }

    fn recover(&mut self, err: MergeError) {
        tracing::warn!("{}", err);
        if let Some(diagnostic) = err.to_diagnostic() {
            self.diagnostics.push(diagnostic);
        }
    }
}
