//! Resolution of a single reference.
//!
//! Given a parsed [`Locator`] and the frame of the document that contains it,
//! the resolver decides what the reference marker turns into: a sub-tree to
//! splice in (after further recursive merging) or a plain string that
//! replaces the marker's value.

use crate::codec::{self, Format};
use crate::error::MergeError;
use crate::fetch::{ResourceFetcher, is_temp_path};
use crate::fragment;
use crate::locator::{Locator, Origin};
use crate::merge::Frame;
use crate::options::{MergeOptions, SameDocumentPolicy};
use crate::tree::Tree;
use std::path::{Component, Path, PathBuf};

/// What a reference marker is replaced with.
#[derive(Debug)]
pub enum Substitution {
    /// A sub-tree to merge recursively and splice into the container.
    Inline(ResolvedFragment),

    /// A string that replaces the marker's value; the marker key is kept.
    Text(String),

    /// Nothing: the key is dropped without a diagnostic.
    Omit,
}

/// A freshly owned sub-tree obtained from a reference target.
#[derive(Debug)]
pub struct ResolvedFragment {
    /// The sub-tree at the reference's fragment.
    pub tree: Tree,

    /// Directory relative references inside `tree` are resolved against.
    pub base_dir: PathBuf,

    /// The whole decoded document and its identifier, when the fragment came
    /// from another file. `None` for same-document references.
    pub document: Option<(Tree, String)>,

    /// Identity of the target used for cycle detection.
    pub key: String,
}

/// Resolves references for one merge run.
pub struct Resolver<'a, F: ResourceFetcher + ?Sized> {
    fetcher: &'a F,
    options: &'a MergeOptions,
}

impl<'a, F: ResourceFetcher + ?Sized> Resolver<'a, F> {
    pub fn new(fetcher: &'a F, options: &'a MergeOptions) -> Self {
        Self { fetcher, options }
    }

    /// Resolve `raw` (already parsed into `locator`) inside `frame`.
    pub fn resolve(
        &self,
        raw: &str,
        locator: &Locator,
        frame: &Frame<'_>,
    ) -> Result<Substitution, MergeError> {
        match &locator.origin {
            Origin::Remote { .. } => self.resolve_remote(raw, locator, frame),
            Origin::SameDocument => self.resolve_same_document(raw, locator, frame),
            Origin::Local => self.resolve_local(raw, locator, frame),
        }
    }

    fn resolve_remote(
        &self,
        raw: &str,
        locator: &Locator,
        frame: &Frame<'_>,
    ) -> Result<Substitution, MergeError> {
        let url = locator.url().unwrap_or(raw);
        let local = self
            .fetcher
            .download(frame.tag, url)
            .map_err(|source| MergeError::Fetch {
                reference: raw.to_string(),
                source,
            })?;

        let mut text = local.to_string_lossy().into_owned();
        if let Some(fragment) = &locator.fragment {
            text.push('#');
            text.push_str(fragment);
        }
        Ok(Substitution::Text(text))
    }

    fn resolve_same_document(
        &self,
        raw: &str,
        locator: &Locator,
        frame: &Frame<'_>,
    ) -> Result<Substitution, MergeError> {
        let Some(fragment) = locator.fragment.as_deref() else {
            return Ok(Substitution::Text(raw.to_string()));
        };
        if self.options.same_document == SameDocumentPolicy::Preserve {
            return Ok(Substitution::Text(raw.to_string()));
        }

        let tree = fragment::navigate(frame.document, Some(fragment))
            .map_err(|source| MergeError::FragmentNotFound {
                reference: raw.to_string(),
                within: frame.describe(),
                source,
            })?
            .clone();

        Ok(Substitution::Inline(ResolvedFragment {
            tree,
            base_dir: frame.base_dir.to_path_buf(),
            document: None,
            key: format!("{}#{}", frame.document_id, fragment),
        }))
    }

    fn resolve_local(
        &self,
        raw: &str,
        locator: &Locator,
        frame: &Frame<'_>,
    ) -> Result<Substitution, MergeError> {
        if locator.path.is_empty() {
            return Ok(Substitution::Text(raw.to_string()));
        }

        let staged = is_temp_path(&locator.path);
        let path = if staged || Path::new(&locator.path).is_absolute() {
            clean_path(Path::new(&locator.path))
        } else {
            clean_path(&frame.base_dir.join(&locator.path))
        };
        if path.as_os_str().is_empty() {
            return Ok(Substitution::Text(raw.to_string()));
        }

        let bytes = self
            .fetcher
            .read_file(&path)
            .map_err(|source| MergeError::MissingReference {
                reference: raw.to_string(),
                within: frame.describe(),
                path: path.clone(),
                source,
            })?;

        let empty = || {
            if staged {
                Ok(Substitution::Omit)
            } else {
                Err(MergeError::EmptyReference {
                    reference: raw.to_string(),
                    within: frame.describe(),
                    path: path.clone(),
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return empty();
        }

        let Some(format) = Format::from_path(&path) else {
            return Err(MergeError::UnsupportedFormat {
                reference: raw.to_string(),
                within: frame.describe(),
                extension: path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        };

        let document = codec::decode_bytes(bytes, format).map_err(|source| MergeError::Decode {
            reference: raw.to_string(),
            within: frame.describe(),
            path: path.clone(),
            source,
        })?;
        if document.is_null() {
            return empty();
        }

        let tree = fragment::navigate(&document, locator.fragment.as_deref())
            .map_err(|source| MergeError::FragmentNotFound {
                reference: raw.to_string(),
                within: frame.describe(),
                source,
            })?
            .clone();

        let document_id = path.to_string_lossy().into_owned();
        let key = format!(
            "{}#{}",
            document_id,
            locator.fragment.as_deref().unwrap_or_default()
        );
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Substitution::Inline(ResolvedFragment {
            tree,
            base_dir,
            document: Some((document, document_id)),
            key,
        }))
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding normal component. The filesystem is not consulted.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchResult};
    use crate::locator::parse;
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory fetcher keyed by path.
    #[derive(Default)]
    struct MemoryFetcher {
        files: HashMap<PathBuf, String>,
        bytes: HashMap<PathBuf, Vec<u8>>,
    }

    impl MemoryFetcher {
        fn with(mut self, path: &str, content: &str) -> Self {
            self.files.insert(PathBuf::from(path), content.to_string());
            self
        }
    }

    impl ResourceFetcher for MemoryFetcher {
        fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>> {
            self.files
                .get(path)
                .map(|s| s.clone().into_bytes())
                .or_else(|| self.bytes.get(path).cloned())
                .ok_or_else(|| FetchError::NotFound(path.to_path_buf()))
        }

        fn download(&self, tag: &str, url: &str) -> FetchResult<PathBuf> {
            let name = url.rsplit('/').next().unwrap_or_default();
            Ok(PathBuf::from(format!("/cache/{}/{}", tag, name)))
        }
    }

    fn resolve(fetcher: &MemoryFetcher, raw: &str, document: &Tree) -> Result<Substitution, MergeError> {
        let options = MergeOptions::default();
        let frame = Frame {
            tag: "t1",
            base_dir: Path::new("/specs"),
            document,
            document_id: "/specs/api.yaml",
        };
        Resolver::new(fetcher, &options).resolve(raw, &parse(raw), &frame)
    }

    fn inline(sub: Substitution) -> ResolvedFragment {
        match sub {
            Substitution::Inline(fragment) => fragment,
            other => panic!("expected inline substitution, got {:?}", other),
        }
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c.yaml")), PathBuf::from("/a/c.yaml"));
        assert_eq!(clean_path(Path::new("../../x.yaml")), PathBuf::from("../../x.yaml"));
        assert_eq!(clean_path(Path::new("a/../../x")), PathBuf::from("../x"));
        assert_eq!(clean_path(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(clean_path(Path::new("./")), PathBuf::new());
    }

    #[test]
    fn test_remote_becomes_text() {
        let fetcher = MemoryFetcher::default();
        let sub = resolve(&fetcher, "https://host/a.yaml#/foo", &Tree::null()).unwrap();
        match sub {
            Substitution::Text(text) => assert_eq!(text, "/cache/t1/a.yaml#foo"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_local_relative_with_fragment() {
        let fetcher = MemoryFetcher::default()
            .with("/specs/defs/pet.yaml", "Pet:\n  type: object\nOther: 1\n");
        let fragment = inline(resolve(&fetcher, "./defs/pet.yaml#/Pet", &Tree::null()).unwrap());

        assert_eq!(fragment.tree, Tree::from(json!({"type": "object"})));
        assert_eq!(fragment.base_dir, PathBuf::from("/specs/defs"));
        assert_eq!(fragment.key, "/specs/defs/pet.yaml#Pet");
        let (document, id) = fragment.document.unwrap();
        assert!(document.get("Other").is_some());
        assert_eq!(id, "/specs/defs/pet.yaml");
    }

    #[test]
    fn test_local_json_and_extensionless() {
        let fetcher = MemoryFetcher::default()
            .with("/specs/a.json", r#"{"a": [1]}"#)
            .with("/specs/paths", "b: 2\n");
        let a = inline(resolve(&fetcher, "a.json", &Tree::null()).unwrap());
        assert_eq!(a.tree, Tree::from(json!({"a": [1]})));
        let b = inline(resolve(&fetcher, "paths", &Tree::null()).unwrap());
        assert_eq!(b.tree, Tree::from(json!({"b": 2})));
    }

    #[test]
    fn test_missing_file() {
        let fetcher = MemoryFetcher::default();
        let err = resolve(&fetcher, "./gone.yaml", &Tree::null()).unwrap_err();
        assert!(matches!(err, MergeError::MissingReference { ref path, .. } if path == Path::new("/specs/gone.yaml")));
    }

    #[test]
    fn test_empty_file() {
        let fetcher = MemoryFetcher::default()
            .with("/specs/empty.yaml", "")
            .with("/specs/comment.yaml", "# nothing\n");
        assert!(matches!(
            resolve(&fetcher, "empty.yaml", &Tree::null()).unwrap_err(),
            MergeError::EmptyReference { .. }
        ));
        assert!(matches!(
            resolve(&fetcher, "comment.yaml", &Tree::null()).unwrap_err(),
            MergeError::EmptyReference { .. }
        ));
    }

    #[test]
    fn test_empty_staged_file_is_omitted() {
        let staged = std::env::temp_dir().join("staged-empty.yaml");
        let staged = staged.to_string_lossy().into_owned();
        let fetcher = MemoryFetcher::default().with(&staged, "");
        let sub = resolve(&fetcher, &staged, &Tree::null()).unwrap();
        assert!(matches!(sub, Substitution::Omit));
    }

    #[test]
    fn test_unsupported_extension() {
        let fetcher = MemoryFetcher::default().with("/specs/notes.txt", "hello");
        let err = resolve(&fetcher, "notes.txt", &Tree::null()).unwrap_err();
        match err {
            MergeError::UnsupportedFormat { extension, .. } => assert_eq!(extension, "txt"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_or_empty_file_reported_before_extension() {
        let fetcher = MemoryFetcher::default().with("/specs/blank.txt", " \n");
        let err = resolve(&fetcher, "./gone.txt", &Tree::null()).unwrap_err();
        assert!(matches!(err, MergeError::MissingReference { .. }));
        let err = resolve(&fetcher, "./blank.txt", &Tree::null()).unwrap_err();
        assert!(matches!(err, MergeError::EmptyReference { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let mut fetcher = MemoryFetcher::default();
        fetcher
            .bytes
            .insert(PathBuf::from("/specs/bad.yaml"), b"a: \xff\n".to_vec());
        let err = resolve(&fetcher, "bad.yaml", &Tree::null()).unwrap_err();
        match err {
            MergeError::Decode { path, .. } => assert_eq!(path, PathBuf::from("/specs/bad.yaml")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let fetcher = MemoryFetcher::default().with("/specs/bad.json", "{");
        let err = resolve(&fetcher, "bad.json", &Tree::null()).unwrap_err();
        assert!(matches!(err, MergeError::Decode { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_fragment_not_found_is_fatal() {
        let fetcher = MemoryFetcher::default().with("/specs/a.yaml", "a:\n  b: 1\n");
        let err = resolve(&fetcher, "a.yaml#/a/z", &Tree::null()).unwrap_err();
        match err {
            MergeError::FragmentNotFound {
                reference, source, ..
            } => {
                assert_eq!(reference, "a.yaml#/a/z");
                assert_eq!(source.segment, "z");
                assert_eq!(source.path_so_far, "a");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_same_document_inline() {
        let fetcher = MemoryFetcher::default();
        let document = Tree::from(json!({"definitions": {"Pet": {"type": "object"}}}));
        let fragment = inline(resolve(&fetcher, "#/definitions/Pet", &document).unwrap());
        assert_eq!(fragment.tree, Tree::from(json!({"type": "object"})));
        assert_eq!(fragment.base_dir, PathBuf::from("/specs"));
        assert!(fragment.document.is_none());
        assert_eq!(fragment.key, "/specs/api.yaml#definitions/Pet");
    }

    #[test]
    fn test_same_document_preserve_policy() {
        let fetcher = MemoryFetcher::default();
        let options = MergeOptions::default().with_same_document(SameDocumentPolicy::Preserve);
        let document = Tree::from(json!({"definitions": {"Pet": {}}}));
        let frame = Frame {
            tag: "t1",
            base_dir: Path::new("/specs"),
            document: &document,
            document_id: "/specs/api.yaml",
        };
        let raw = "#/definitions/Pet";
        let sub = Resolver::new(&fetcher, &options)
            .resolve(raw, &parse(raw), &frame)
            .unwrap();
        assert!(matches!(sub, Substitution::Text(ref text) if text == raw));
    }

    #[test]
    fn test_root_markers_kept_verbatim() {
        let fetcher = MemoryFetcher::default();
        for raw in ["#", "#/", ""] {
            let sub = resolve(&fetcher, raw, &Tree::null()).unwrap();
            assert!(matches!(sub, Substitution::Text(ref text) if text == raw));
        }
    }
}
