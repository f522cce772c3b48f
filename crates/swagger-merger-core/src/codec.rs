//! Decoding and encoding of document text.
//!
//! YAML is read with `yaml-rust2` and JSON with `serde_json`; both are
//! converted into [`Tree`]. The format of a referenced file is chosen from its
//! extension, with extension-less files treated as YAML.

use crate::tree::{Scalar, Tree};
use indexmap::IndexMap;
use std::path::Path;
use thiserror::Error;
use yaml_rust2::yaml::Hash;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Pick a format from a file extension (without the leading dot).
    ///
    /// A missing extension means YAML. Returns `None` for anything that is
    /// not a recognized structured-markup extension.
    pub fn from_extension(extension: Option<&str>) -> Option<Format> {
        match extension.map(|ext| ext.to_ascii_lowercase()) {
            None => Some(Format::Yaml),
            Some(ext) => match ext.as_str() {
                "" | "yaml" | "yml" => Some(Format::Yaml),
                "json" => Some(Format::Json),
                _ => None,
            },
        }
    }

    /// Pick a format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        Format::from_extension(path.extension().and_then(|ext| ext.to_str()))
    }
}

/// Output encoding for a merged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Compact single-line JSON.
    #[default]
    Json,
    /// Indented JSON.
    JsonPretty,
    /// Block-style YAML.
    Yaml,
}

impl Encoding {
    /// Choose an encoding from an output path: `.yaml`/`.yml` give YAML,
    /// everything else JSON.
    pub fn from_path(path: &Path, compact: bool) -> Encoding {
        match Format::from_path(path) {
            Some(Format::Yaml) if path.extension().is_some() => Encoding::Yaml,
            _ if compact => Encoding::Json,
            _ => Encoding::JsonPretty,
        }
    }
}

/// Malformed source text.
#[derive(Debug, Clone, Error)]
#[error("{format:?} decode error: {message}")]
pub struct DecodeError {
    pub format: Format,
    pub message: String,
}

/// Failure to write a tree back out.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encode error: {0}")]
    Yaml(String),
}

/// Decode document text in the given format.
///
/// A YAML stream with no documents decodes to null; multi-document streams
/// only contribute their first document.
pub fn decode(text: &str, format: Format) -> Result<Tree, DecodeError> {
    match format {
        Format::Json => serde_json::from_str::<serde_json::Value>(text)
            .map(Tree::from)
            .map_err(|e| DecodeError {
                format,
                message: e.to_string(),
            }),
        Format::Yaml => {
            let mut docs = YamlLoader::load_from_str(text).map_err(|e| DecodeError {
                format,
                message: e.to_string(),
            })?;
            if docs.is_empty() {
                return Ok(Tree::null());
            }
            tree_from_yaml(docs.swap_remove(0))
        }
    }
}

/// Decode raw file contents, which must be valid UTF-8.
pub fn decode_bytes(bytes: Vec<u8>, format: Format) -> Result<Tree, DecodeError> {
    let text = String::from_utf8(bytes).map_err(|e| DecodeError {
        format,
        message: e.to_string(),
    })?;
    decode(&text, format)
}

fn tree_from_yaml(yaml: Yaml) -> Result<Tree, DecodeError> {
    Ok(match yaml {
        Yaml::Null => Tree::null(),
        Yaml::Boolean(b) => Tree::Scalar(Scalar::Bool(b)),
        Yaml::Integer(i) => Tree::Scalar(Scalar::Integer(i)),
        Yaml::Real(text) => match parse_real(&text) {
            Some(f) => Tree::Scalar(Scalar::Float(f)),
            None => Tree::Scalar(Scalar::String(text)),
        },
        Yaml::String(s) => Tree::Scalar(Scalar::String(s)),
        Yaml::Array(items) => Tree::Sequence(
            items
                .into_iter()
                .map(tree_from_yaml)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Hash(hash) => {
            let mut entries = IndexMap::with_capacity(hash.len());
            for (key, value) in hash {
                entries.insert(yaml_key_to_string(key)?, tree_from_yaml(value)?);
            }
            Tree::Mapping(entries)
        }
        Yaml::Alias(_) | Yaml::BadValue => {
            return Err(DecodeError {
                format: Format::Yaml,
                message: "unresolvable YAML node".to_string(),
            });
        }
    })
}

fn parse_real(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        _ => text.parse::<f64>().ok(),
    }
}

/// Non-string keys (`200:` under `responses`, `true:`) become their
/// canonical string form.
fn yaml_key_to_string(key: Yaml) -> Result<String, DecodeError> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(DecodeError {
            format: Format::Yaml,
            message: format!("unsupported mapping key: {:?}", other),
        }),
    }
}

/// Encode a tree as text.
pub fn encode(tree: &Tree, encoding: Encoding) -> Result<String, EncodeError> {
    match encoding {
        Encoding::Json => Ok(serde_json::to_string(tree)?),
        Encoding::JsonPretty => Ok(serde_json::to_string_pretty(tree)?),
        Encoding::Yaml => {
            let yaml = yaml_from_tree(tree);
            let mut out = String::new();
            YamlEmitter::new(&mut out)
                .dump(&yaml)
                .map_err(|e| EncodeError::Yaml(format!("{:?}", e)))?;
            out.push('\n');
            Ok(out)
        }
    }
}

fn yaml_from_tree(tree: &Tree) -> Yaml {
    match tree {
        Tree::Scalar(Scalar::Null) => Yaml::Null,
        Tree::Scalar(Scalar::Bool(b)) => Yaml::Boolean(*b),
        Tree::Scalar(Scalar::Integer(i)) => Yaml::Integer(*i),
        Tree::Scalar(Scalar::Float(f)) => Yaml::Real(format_real(*f)),
        Tree::Scalar(Scalar::String(s)) => Yaml::String(s.clone()),
        Tree::Sequence(items) => Yaml::Array(items.iter().map(yaml_from_tree).collect()),
        Tree::Mapping(entries) => {
            let mut hash = Hash::new();
            for (key, value) in entries {
                hash.insert(Yaml::String(key.clone()), yaml_from_tree(value));
            }
            Yaml::Hash(hash)
        }
    }
}

fn format_real(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        // Debug keeps the fractional part ("1.0"), so the value reads back as a real
        format!("{:?}", f)
    }
}
