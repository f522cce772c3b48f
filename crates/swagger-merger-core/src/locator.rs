//! Parsing of reference strings into locators.
//!
//! A reference string such as `./definitions.yaml#/Pet`,
//! `https://example.com/common.yaml#/Error` or `#/definitions/Pet` is split
//! into where the target lives ([`Origin`]), the path to the target document,
//! and an optional fragment inside that document.
//!
//! Parsing never fails. Input that does not fit any recognized shape ends up
//! as a local path with no fragment, and the resolver reports it from there.

use url::Url;

/// Where a reference target lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A file on the local filesystem, relative to the current base directory
    /// unless absolute.
    Local,

    /// A network resource (`http`/`https`).
    Remote {
        /// Lowercase scheme, without `://`.
        scheme: String,
        /// The full URL without its fragment, userinfo and query included.
        url: String,
    },

    /// A fragment of the document currently being expanded.
    SameDocument,
}

/// Parsed form of a reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub origin: Origin,

    /// Path to the target document. For remote origins this is the
    /// scheme-stripped `host/path`; for same-document references it is empty.
    pub path: String,

    /// `/`-separated path inside the target, never starting with `/`.
    pub fragment: Option<String>,
}

impl Locator {
    /// The full URL of a remote locator, without fragment.
    pub fn url(&self) -> Option<&str> {
        match &self.origin {
            Origin::Remote { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Check if the locator names neither a document nor a fragment.
    pub fn is_root(&self) -> bool {
        self.path.is_empty() && self.fragment.is_none()
    }
}

const REMOTE_SCHEMES: &[&str] = &["http", "https"];

/// A `#` at or before this byte offset of a local reference is part of the
/// path.
const MIN_FRAGMENT_OFFSET: usize = 5;

/// Parse a raw reference string.
pub fn parse(raw: &str) -> Locator {
    if let Some(locator) = parse_remote(raw) {
        return locator;
    }

    if let Some(rest) = raw.strip_prefix('#') {
        return Locator {
            origin: Origin::SameDocument,
            path: String::new(),
            fragment: clean_fragment(rest),
        };
    }

    let (path, fragment) = split_reference(raw);
    Locator {
        origin: Origin::Local,
        path,
        fragment,
    }
}

fn parse_remote(raw: &str) -> Option<Locator> {
    let (scheme, _) = raw.split_once("://")?;
    let scheme = scheme.to_ascii_lowercase();
    if !REMOTE_SCHEMES.contains(&scheme.as_str()) {
        return None;
    }

    let mut url = Url::parse(raw).ok()?;
    let mut path = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        path.push_str(&format!(":{}", port));
    }
    path.push_str(url.path());
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let fragment = url.fragment().and_then(clean_fragment);
    url.set_fragment(None);

    Some(Locator {
        origin: Origin::Remote {
            scheme,
            url: url.into(),
        },
        path,
        fragment,
    })
}

/// Split a local reference at its fragment marker.
///
/// A `#` within the first few characters, or directly after a path
/// separator, belongs to the file name and the whole string stays the path.
fn split_reference(raw: &str) -> (String, Option<String>) {
    let Some(idx) = raw.find('#') else {
        return (raw.to_string(), None);
    };

    if idx <= MIN_FRAGMENT_OFFSET {
        return (raw.to_string(), None);
    }

    let path = &raw[..idx];
    if path.ends_with('/') || path.ends_with('\\') {
        return (raw.to_string(), None);
    }

    (path.to_string(), clean_fragment(&raw[idx + 1..]))
}

/// Normalize separators and strip the leading `/`; empty fragments are none.
fn clean_fragment(fragment: &str) -> Option<String> {
    let fragment = fragment.replace('\\', "/");
    let fragment = fragment.strip_prefix('/').unwrap_or(&fragment);
    if fragment.is_empty() {
        None
    } else {
        Some(fragment.to_string())
    }
}
