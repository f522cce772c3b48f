//! Core document tree type.
//!
//! Every document that passes through the merger, whether decoded from YAML
//! or JSON, is represented as a [`Tree`]. The structural kind of a node is
//! fixed by the decoder and matched exhaustively everywhere else.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// A decoded document or sub-document.
///
/// Mappings keep insertion order, which is also the order the merge engine
/// visits keys in and the order they are written back out.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// Ordered key/value pairs with unique keys.
    Mapping(IndexMap<String, Tree>),

    /// Ordered list of values.
    Sequence(Vec<Tree>),

    /// Leaf value.
    Scalar(Scalar),
}

impl Tree {
    /// Create an empty mapping.
    pub fn empty_mapping() -> Self {
        Tree::Mapping(IndexMap::new())
    }

    /// Create a null scalar.
    pub fn null() -> Self {
        Tree::Scalar(Scalar::Null)
    }

    /// Create a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        Tree::Scalar(Scalar::String(s.into()))
    }

    /// Check if this is a mapping.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Tree::Mapping(_))
    }

    /// Check if this is a sequence.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Tree::Sequence(_))
    }

    /// Check if this is a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Tree::Scalar(_))
    }

    /// Check if this is the null scalar.
    pub fn is_null(&self) -> bool {
        matches!(self, Tree::Scalar(Scalar::Null))
    }

    /// Get as mapping entries if this is a mapping.
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Tree>> {
        match self {
            Tree::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get as sequence items if this is a sequence.
    pub fn as_sequence(&self) -> Option<&[Tree]> {
        match self {
            Tree::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Get the string value if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a key if this is a mapping.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        self.as_mapping().and_then(|entries| entries.get(key))
    }

    /// Short name of the structural kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Tree::Mapping(_) => "mapping",
            Tree::Sequence(_) => "sequence",
            Tree::Scalar(_) => "scalar",
        }
    }
}

impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Tree::null(),
            Value::Bool(b) => Tree::Scalar(Scalar::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Tree::Scalar(Scalar::Integer(i))
                } else {
                    // u64 beyond i64::MAX and all reals end up here
                    Tree::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Tree::Scalar(Scalar::String(s)),
            Value::Array(items) => Tree::Sequence(items.into_iter().map(Tree::from).collect()),
            Value::Object(entries) => Tree::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Tree::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tree::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Tree::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Tree::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}
