use serde_json::Value;

use crate::asset::{clean_path, extension, parent_dir, Asset};
use crate::mime;

/// A pure predicate over a single asset. Filtering operations combine
/// multiple filters with AND.
pub type Filter = Box<dyn Fn(&Asset) -> bool>;

/// Logical negation. Every `without_*` constructor is defined through
/// this, so positive and negative filters always share one predicate.
pub fn not(filter: Filter) -> Filter {
    Box::new(move |asset| !filter(asset))
}

/// Match an exact (normalized) virtual path.
pub fn with_path(path: impl Into<String>) -> Filter {
    let path = clean_path(&path.into());
    Box::new(move |asset| clean_path(&asset.path) == path)
}

pub fn without_path(path: impl Into<String>) -> Filter {
    not(with_path(path))
}

/// Match any of the given file extensions (dot included, e.g. `".html"`).
pub fn with_extensions<I, S>(extensions: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let extensions: Vec<String> = extensions.into_iter().map(Into::into).collect();
    Box::new(move |asset| extensions.iter().any(|ext| extension(&asset.path) == ext))
}

pub fn without_extensions<I, S>(extensions: I) -> Filter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    not(with_extensions(extensions))
}

/// Match assets nested (at any depth) under `parent`. Purely structural:
/// path segments are climbed upward until the root or a match, no
/// directory has to exist anywhere.
pub fn with_parent_dir(parent: impl Into<String>) -> Filter {
    let parent = clean_path(&parent.into());
    Box::new(move |asset| {
        let mut current = clean_path(&asset.path);
        loop {
            if current == parent {
                return true;
            }
            let dir = parent_dir(&current);
            if dir == "/" || dir == current {
                return false;
            }
            current = dir.to_string();
        }
    })
}

pub fn without_parent_dir(parent: impl Into<String>) -> Filter {
    not(with_parent_dir(parent))
}

/// Match assets whose metadata holds a truthy value under `key`.
///
/// Truthiness is tri-state: a missing key (or an uninitialized metadata
/// container) is false; booleans are used directly; the strings `"true"`
/// and `"false"` (case-insensitive, surrounding whitespace ignored)
/// coerce to their boolean; any other present value is truthy.
pub fn with_meta(key: impl Into<String>) -> Filter {
    let key = key.into();
    Box::new(move |asset| {
        asset
            .meta
            .as_ref()
            .and_then(|meta| meta.get(&key))
            .map(truthy)
            .unwrap_or(false)
    })
}

pub fn without_meta(key: impl Into<String>) -> Filter {
    not(with_meta(key))
}

/// Match on the MIME type resolved from the path's extension. `pattern`
/// is either an exact MIME string (`"text/css"`) or a top-level wildcard
/// (`"text/*"`). Parameters like `; charset=utf-8` are ignored.
pub fn with_mime_type(pattern: impl Into<String>) -> Filter {
    let pattern = pattern.into();
    Box::new(move |asset| {
        let resolved = mime::essence(mime::from_path(&asset.path));
        match pattern.split_once("/*") {
            Some((top, "")) => resolved.split('/').next() == Some(top),
            _ => resolved == pattern,
        }
    })
}

pub fn without_mime_type(pattern: impl Into<String>) -> Filter {
    not(with_mime_type(pattern))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().eq_ignore_ascii_case("false"),
        _ => true,
    }
}
