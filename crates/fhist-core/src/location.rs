#![forbid(unsafe_code)]

//! Raw host locations and the logical-location codec.
//!
//! A [`RawLocation`] is a snapshot of what the host reports for its current
//! document (path, query, fragment, origin, host). The router never works on
//! that directly; it works on a [`HistoryLocation`]: path + query + fragment
//! relative to the configured base, always starting with `/`.
//!
//! # Bases
//!
//! A base without `#` is a path prefix (`/app`). A base containing `#`
//! selects hash mode: everything after the marker in the host fragment is
//! the routable path. Supported hash forms include `#`, `#/`, `/#`, `#!`,
//! `#!/`, `/#!/` and `/folder/#end`.

use serde::{Deserialize, Serialize};

/// Normalized, base-relative location (`/path?query#fragment`).
pub type HistoryLocation = String;

/// Snapshot of the host's current document location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLocation {
    /// Path component, e.g. `/app/foo`.
    pub pathname: String,
    /// Query component including the leading `?`, or empty.
    pub search: String,
    /// Fragment component including the leading `#`, or empty.
    pub hash: String,
    /// `scheme://host[:port]`, or empty when the document has no host.
    pub origin: String,
    /// `host[:port]`, or empty (e.g. `file:` documents).
    pub host: String,
}

impl RawLocation {
    /// Build a location for `origin` with the given path, query and fragment.
    ///
    /// `host` is derived from `origin` by dropping the scheme.
    #[must_use]
    pub fn new(origin: &str, pathname: &str, search: &str, hash: &str) -> Self {
        let host = origin
            .split_once("://")
            .map(|(_, rest)| rest.to_owned())
            .unwrap_or_default();
        Self {
            pathname: pathname.to_owned(),
            search: search.to_owned(),
            hash: hash.to_owned(),
            origin: origin.to_owned(),
            host,
        }
    }
}

/// Normalize a configured base.
///
/// An absent or empty `base` falls back to the document's `<base href>`
/// (origin removed) and then to `/`. The result starts with `/` or `#` and
/// has no trailing slash, so the root base normalizes to the empty string.
#[must_use]
pub fn normalize_base(base: Option<&str>, base_href: Option<&str>) -> String {
    let mut base = match base.filter(|b| !b.is_empty()) {
        Some(base) => base.to_owned(),
        None => base_href
            .filter(|href| !href.is_empty())
            .map(|href| strip_origin(href).to_owned())
            .unwrap_or_else(|| "/".to_owned()),
    };
    if !base.starts_with('/') && !base.starts_with('#') {
        base.insert(0, '/');
    }
    if base.ends_with('/') {
        base.pop();
    }
    base
}

/// Drop a leading `scheme://host` from an absolute URL.
fn strip_origin(href: &str) -> &str {
    let Some((scheme, rest)) = href.split_once("://") else {
        return href;
    };
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return href;
    }
    match rest.find('/') {
        Some(slash) => &rest[slash..],
        None => "",
    }
}

/// Remove `base` from the start of `path` (ASCII case-insensitive).
///
/// Returns `path` untouched when it does not start with `base`, and `/` when
/// nothing remains after the prefix.
#[must_use]
pub fn strip_base<'a>(path: &'a str, base: &str) -> &'a str {
    if base.is_empty() {
        return path;
    }
    match path.get(..base.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(base) => {
            let rest = &path[base.len()..];
            if rest.is_empty() { "/" } else { rest }
        }
        _ => path,
    }
}

/// Build the href the router renders for `location` under `base`.
///
/// Everything up to and including the first `#` of the base collapses to `#`.
#[must_use]
pub fn create_href(base: &str, location: &str) -> String {
    match base.find('#') {
        Some(pos) => format!("#{}{location}", &base[pos + 1..]),
        None => format!("{base}{location}"),
    }
}

/// Derive the base used by hash-mode history.
///
/// Documents without a host (e.g. `file:`) cannot use a path base, so the
/// base collapses to the bare marker there.
#[must_use]
pub fn hash_base(base: Option<&str>, raw: &RawLocation) -> String {
    let mut base = if raw.host.is_empty() {
        String::new()
    } else {
        match base.filter(|b| !b.is_empty()) {
            Some(base) => base.to_owned(),
            None => format!("{}{}", raw.pathname, raw.search),
        }
    };
    if !base.contains('#') {
        base.push('#');
    }
    base
}

/// Decode the host location into a logical location under `base`.
#[must_use]
pub fn decode_location(base: &str, raw: &RawLocation) -> HistoryLocation {
    if let Some(marker) = base.find('#') {
        let suffix = &base[marker..];
        let from_hash = if raw.hash.starts_with(suffix) {
            &raw.hash[suffix.len()..]
        } else {
            let mut chars = raw.hash.chars();
            chars.next();
            chars.as_str()
        };
        return if from_hash.starts_with('/') {
            from_hash.to_owned()
        } else {
            format!("/{from_hash}")
        };
    }
    let path = strip_base(&raw.pathname, base);
    format!("{path}{}{}", raw.search, raw.hash)
}

/// Encode `location` into the URL handed to the host's push/replace.
///
/// In hash mode the full base is reused only when the document has a host
/// and declares a `<base>` element; otherwise only the fragment part of the
/// base is written, keeping the document path untouched.
#[must_use]
pub fn encode_url(base: &str, location: &str, raw: &RawLocation, has_base_element: bool) -> String {
    match base.find('#') {
        Some(marker) => {
            let prefix = if !raw.host.is_empty() && has_base_element {
                base
            } else {
                &base[marker..]
            };
            format!("{prefix}{location}")
        }
        None => format!("{}{base}{location}", raw.origin),
    }
}
