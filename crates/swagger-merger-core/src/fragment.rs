//! Navigation of `/`-delimited fragments inside a decoded tree.

use crate::tree::Tree;
use thiserror::Error;

/// A fragment segment that does not exist in the target tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fragment segment \"{segment}\" not found at \"{path_so_far}\"")]
pub struct FragmentNotFound {
    /// The segment that could not be followed.
    pub segment: String,
    /// The segments successfully followed before it, joined with `/`.
    pub path_so_far: String,
}

/// Walk `fragment` from `tree`.
///
/// Every segment must name a key of a mapping. Empty segments are skipped,
/// and the JSON-pointer escapes `~1` (for `/`) and `~0` (for `~`) are decoded.
pub fn navigate<'a>(tree: &'a Tree, fragment: Option<&str>) -> Result<&'a Tree, FragmentNotFound> {
    let Some(fragment) = fragment else {
        return Ok(tree);
    };

    let mut current = tree;
    let mut followed: Vec<&str> = Vec::new();

    for raw_segment in fragment.split('/').filter(|s| !s.is_empty()) {
        let segment = unescape_segment(raw_segment);
        let next = match current {
            Tree::Mapping(entries) => entries.get(segment.as_str()),
            Tree::Sequence(_) | Tree::Scalar(_) => None,
        };

        match next {
            Some(value) => {
                current = value;
                followed.push(raw_segment);
            }
            None => {
                return Err(FragmentNotFound {
                    segment,
                    path_so_far: followed.join("/"),
                });
            }
        }
    }

    Ok(current)
}

fn unescape_segment(segment: &str) -> String {
    if segment.contains('~') {
        segment.replace("~1", "/").replace("~0", "~")
    } else {
        segment.to_string()
    }
}
