use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::filter::Filter;
use crate::transform::{TransformError, Transformer};

/// Open-ended per-asset metadata: string keys mapped to JSON-like values
/// (string, bool, number, or nested structures).
pub type Meta = serde_json::Map<String, Value>;

/// One in-memory document: a rooted virtual path, an opaque byte payload,
/// and an optional metadata container.
///
/// `meta` distinguishes "never collected" (`None`) from "collected but
/// empty" (`Some` with no entries). Operations that derive metadata skip
/// assets whose container was never initialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Asset {
    pub path: String,
    pub data: Vec<u8>,
    pub meta: Option<Meta>,
}

impl Asset {
    /// Create an asset with a cleaned, rooted path and no metadata.
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: clean_path(&path.into()),
            data: data.into(),
            meta: None,
        }
    }

    /// Create an asset with an initialized (empty) metadata container.
    pub fn with_empty_meta(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            meta: Some(Meta::new()),
            ..Self::new(path, data)
        }
    }
}

#[derive(Debug)]
pub enum WriteError {
    /// The asset's path resolves outside the output root.
    Escape(String),
    Io(PathBuf, std::io::Error),
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteError::Escape(path) => write!(f, "asset path escapes output dir: {}", path),
            WriteError::Io(path, e) => write!(f, "write failed for {}: {}", path.display(), e),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Escape(_) => None,
            WriteError::Io(_, e) => Some(e),
        }
    }
}

/// An ordered collection of assets. Insertion order is preserved: it
/// decides which of two colliding paths wins at write time and the order
/// sitemap entries appear in.
///
/// Path uniqueness is not enforced; duplicates may coexist until write
/// time, where the last writer wins.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Assets(pub(crate) Vec<Asset>);

impl Assets {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an asset, normalizing its path to a rooted virtual path.
    pub fn add(&mut self, mut asset: Asset) {
        asset.path = clean_path(&asset.path);
        self.0.push(asset);
    }

    /// Move every asset of `other` to the end of this collection.
    pub fn append(&mut self, other: Assets) {
        self.0.extend(other.0);
    }

    /// Apply each transformer, in order, to every asset before the next
    /// transformer begins. The first failing (transformer, asset) pair
    /// aborts the whole pass.
    pub fn transform(&mut self, transformers: &[&dyn Transformer]) -> Result<(), TransformError> {
        for transformer in transformers {
            for asset in &mut self.0 {
                transformer.transform(asset)?;
            }
        }
        Ok(())
    }

    /// Remove and return every asset matching all given filters, keeping
    /// relative order in both halves. With no filters, nothing is popped
    /// and the collection is left untouched.
    pub fn pop(&mut self, filters: &[Filter]) -> Assets {
        if filters.is_empty() {
            return Assets::new();
        }

        let mut keep = Vec::with_capacity(self.0.len());
        let mut popped = Vec::new();

        for asset in self.0.drain(..) {
            if filters.iter().all(|filter| filter(&asset)) {
                popped.push(asset);
            } else {
                keep.push(asset);
            }
        }

        self.0 = keep;
        Assets(popped)
    }

    /// Non-destructive read: clones of every asset matching all given
    /// filters, in order. With no filters, a full copy.
    pub fn filter(&self, filters: &[Filter]) -> Assets {
        Assets(
            self.0
                .iter()
                .filter(|asset| filters.iter().all(|filter| filter(asset)))
                .cloned()
                .collect(),
        )
    }

    /// Project the collection into a map keyed by the string value stored
    /// under `meta_key`. Assets without that key, or with a non-string
    /// value, are skipped; key collisions resolve last-write-wins.
    pub fn to_map(&self, meta_key: &str) -> HashMap<String, &Asset> {
        let mut map = HashMap::new();
        for asset in &self.0 {
            if let Some(Value::String(key)) = asset.meta.as_ref().and_then(|m| m.get(meta_key)) {
                map.insert(key.clone(), asset);
            }
        }
        map
    }

    /// Owning variant of [`to_map`](Self::to_map), consuming the collection.
    pub fn into_map(self, meta_key: &str) -> HashMap<String, Asset> {
        let mut map = HashMap::new();
        for asset in self.0 {
            let key = match asset.meta.as_ref().and_then(|m| m.get(meta_key)) {
                Some(Value::String(key)) => key.clone(),
                _ => continue,
            };
            map.insert(key, asset);
        }
        map
    }

    /// Store a derived value under `key` for every asset whose metadata
    /// container is initialized. Assets that never collected metadata are
    /// left untouched, not upgraded.
    pub fn set_meta_fn<F>(&mut self, key: &str, f: F)
    where
        F: Fn(&Asset) -> Value,
    {
        for asset in &mut self.0 {
            if asset.meta.is_some() {
                let value = f(asset);
                if let Some(meta) = asset.meta.as_mut() {
                    meta.insert(key.to_string(), value);
                }
            }
        }
    }

    /// Stamp a constant value under `key` on every asset with initialized
    /// metadata.
    pub fn add_to_meta(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.set_meta_fn(key, move |_| value.clone());
    }

    /// Write every asset under `out_dir`, creating intermediate
    /// directories and overwriting existing files. An asset whose path
    /// resolves outside the output root is rejected before anything is
    /// written for it.
    pub fn write(&self, out_dir: &Path) -> Result<(), WriteError> {
        let base = std::path::absolute(out_dir)
            .map_err(|e| WriteError::Io(out_dir.to_path_buf(), e))?;

        for asset in &self.0 {
            let cleaned = clean_path(&asset.path);

            let mut target = base.clone();
            for segment in cleaned.split('/').filter(|s| !s.is_empty()) {
                // clean_path clamps "..", so any survivor means the path
                // cannot be brought in-root.
                if segment == ".." {
                    return Err(WriteError::Escape(asset.path.clone()));
                }
                target.push(segment);
            }
            if !target.starts_with(&base) {
                return Err(WriteError::Escape(asset.path.clone()));
            }

            if let Some(parent) = target.parent() {
                // Fails when a segment already exists as a regular file.
                std::fs::create_dir_all(parent)
                    .map_err(|e| WriteError::Io(parent.to_path_buf(), e))?;
            }
            std::fs::write(&target, &asset.data).map_err(|e| WriteError::Io(target.clone(), e))?;
        }

        Ok(())
    }
}

impl std::ops::Deref for Assets {
    type Target = [Asset];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Assets {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl IntoIterator for Assets {
    type Item = Asset;
    type IntoIter = std::vec::IntoIter<Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Asset> for Assets {
    fn from_iter<T: IntoIterator<Item = Asset>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Normalize a virtual path: rooted, slash-separated, no empty/`.`
/// segments, `..` resolved and clamped at the root (so `/../a` becomes
/// `/a` rather than escaping).
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Parent directory of a cleaned virtual path ("/" at the top).
pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// File extension of a virtual path, dot included ("" when absent).
pub(crate) fn extension(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(i) => &base[i..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;

    fn asset(path: &str, data: &str) -> Asset {
        Asset {
            path: path.to_string(),
            data: data.as_bytes().to_vec(),
            meta: None,
        }
    }

    fn meta_asset(path: &str, entries: &[(&str, Value)]) -> Asset {
        let mut meta = Meta::new();
        for (k, v) in entries {
            meta.insert(k.to_string(), v.clone());
        }
        Asset {
            path: path.to_string(),
            data: Vec::new(),
            meta: Some(meta),
        }
    }

    #[test]
    fn clean_path_roots_and_collapses() {
        assert_eq!(clean_path("a/b.txt"), "/a/b.txt");
        assert_eq!(clean_path("/a//b/./c.txt"), "/a/b/c.txt");
        assert_eq!(clean_path("/a/b/../c.txt"), "/a/c.txt");
        assert_eq!(clean_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("/.."), "/");
    }

    #[test]
    fn parent_dir_climbs_to_root() {
        assert_eq!(parent_dir("/a/b/c.txt"), "/a/b");
        assert_eq!(parent_dir("/a"), "/");
        assert_eq!(parent_dir("/"), "/");
    }

    #[test]
    fn extension_includes_dot() {
        assert_eq!(extension("/a/b.txt"), ".txt");
        assert_eq!(extension("/a/archive.tar.gz"), ".gz");
        assert_eq!(extension("/a/noext"), "");
        assert_eq!(extension("/a.dir/noext"), "");
    }

    #[test]
    fn add_normalizes_paths() {
        let mut assets = Assets::new();
        assets.add(asset("first.txt", "data"));
        assets.add(asset("/second.txt", "data"));

        assert_eq!(assets[0].path, "/first.txt");
        assert_eq!(assets[1].path, "/second.txt");
    }

    #[test]
    fn pop_partitions_preserving_order() {
        let mut assets = Assets::new();
        assets.add(meta_asset("/file1.txt", &[("tag", Value::from("odd"))]));
        assets.add(meta_asset("/file2.txt", &[("tag", Value::from("even"))]));
        assets.add(meta_asset("/file3.txt", &[("tag", Value::from("odd"))]));

        let odd: Filter = Box::new(|a: &Asset| {
            matches!(
                a.meta.as_ref().and_then(|m| m.get("tag")),
                Some(Value::String(s)) if s == "odd"
            )
        });

        let popped = assets.pop(&[odd]);
        assert_eq!(
            popped.iter().map(|a| a.path.as_str()).collect::<Vec<_>>(),
            ["/file1.txt", "/file3.txt"]
        );
        assert_eq!(
            assets.iter().map(|a| a.path.as_str()).collect::<Vec<_>>(),
            ["/file2.txt"]
        );
    }

    #[test]
    fn pop_with_no_filters_pops_nothing() {
        let mut assets = Assets::new();
        assets.add(asset("/a.txt", "a"));
        assets.add(asset("/b.txt", "b"));
        let before = assets.clone();

        let popped = assets.pop(&[]);
        assert!(popped.is_empty());
        assert_eq!(assets, before);
    }

    #[test]
    fn pop_then_concat_is_a_partition() {
        let mut assets = Assets::new();
        for i in 0..6 {
            assets.add(asset(&format!("/f{i}.txt"), "x"));
        }
        let original = assets.clone();

        let even: Filter = Box::new(|a: &Asset| {
            a.path
                .trim_start_matches("/f")
                .trim_end_matches(".txt")
                .parse::<u32>()
                .map(|n| n % 2 == 0)
                .unwrap_or(false)
        });
        let popped = assets.pop(&[even]);

        assert_eq!(assets.len() + popped.len(), original.len());
        let mut all: Vec<&Asset> = assets.iter().chain(popped.iter()).collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        let mut expected: Vec<&Asset> = original.iter().collect();
        expected.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(all, expected);
    }

    #[test]
    fn filter_with_no_filters_copies_everything() {
        let mut assets = Assets::new();
        assets.add(asset("/a.txt", "a"));
        assets.add(asset("/b.md", "b"));
        let before = assets.clone();

        let filtered = assets.filter(&[]);
        assert_eq!(filtered, before);
        assert_eq!(assets, before);
    }

    #[test]
    fn filter_does_not_mutate_the_source() {
        let mut assets = Assets::new();
        assets.add(asset("/a.txt", "a"));
        assets.add(asset("/b.md", "b"));
        let before = assets.clone();

        let filtered = assets.filter(&[filter::with_extensions([".md"])]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].path, "/b.md");
        assert_eq!(assets, before);
    }

    #[test]
    fn to_map_skips_missing_and_non_string_keys() {
        let mut assets = Assets::new();
        assets.add(meta_asset("/a.html", &[("Name", Value::from("nav"))]));
        assets.add(meta_asset("/b.html", &[("Name", Value::from(3))]));
        assets.add(asset("/c.html", ""));
        assets.add(meta_asset("/d.html", &[("Name", Value::from("nav"))]));

        let map = assets.to_map("Name");
        assert_eq!(map.len(), 1);
        // Last write wins on collisions.
        assert_eq!(map["nav"].path, "/d.html");
    }

    #[test]
    fn set_meta_fn_skips_uninitialized_meta() {
        let mut assets = Assets::new();
        assets.add(meta_asset("/a.html", &[]));
        assets.add(asset("/b.html", ""));

        assets.set_meta_fn("Url", |a| Value::from(format!("https://x.test{}", a.path)));

        assert_eq!(
            assets[0].meta.as_ref().and_then(|m| m.get("Url")),
            Some(&Value::from("https://x.test/a.html"))
        );
        assert!(assets[1].meta.is_none());
    }

    #[test]
    fn add_to_meta_stamps_constant_values() {
        let mut assets = Assets::new();
        assets.add(meta_asset("/a.html", &[]));
        assets.add(meta_asset("/b.html", &[]));

        assets.add_to_meta("Section", "docs");

        for asset in assets.iter() {
            assert_eq!(
                asset.meta.as_ref().and_then(|m| m.get("Section")),
                Some(&Value::from("docs"))
            );
        }
    }

    #[test]
    fn transform_is_transformer_major() {
        struct Recorder(&'static str);

        impl Transformer for Recorder {
            fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
                asset.data.extend_from_slice(self.0.as_bytes());
                Ok(())
            }
        }

        let mut assets = Assets::new();
        assets.add(asset("/a.txt", ""));
        assets.add(asset("/b.txt", ""));

        assets
            .transform(&[&Recorder("1"), &Recorder("2")])
            .unwrap();

        // Every asset saw transformer 1 before any saw transformer 2.
        assert_eq!(assets[0].data, b"12");
        assert_eq!(assets[1].data, b"12");
    }

    #[test]
    fn transform_aborts_on_first_error() {
        struct Failing;

        impl Transformer for Failing {
            fn transform(&self, asset: &mut Asset) -> Result<(), TransformError> {
                if asset.path == "/b.txt" {
                    return Err(TransformError::Utf8 {
                        path: asset.path.clone(),
                    });
                }
                asset.data.push(b'x');
                Ok(())
            }
        }

        let mut assets = Assets::new();
        assets.add(asset("/a.txt", ""));
        assets.add(asset("/b.txt", ""));
        assets.add(asset("/c.txt", ""));

        assert!(assets.transform(&[&Failing]).is_err());
        // The third asset was never reached.
        assert_eq!(assets[0].data, b"x");
        assert!(assets[2].data.is_empty());
    }

    #[test]
    fn write_places_files_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut assets = Assets::new();
        assets.add(asset("/index.html", "<p>hi</p>"));
        assets.add(asset("/docs/setup/guide.html", "guide"));

        assets.write(dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<p>hi</p>"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("docs/setup/guide.html")).unwrap(),
            "guide"
        );
    }

    #[test]
    fn write_last_duplicate_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut assets = Assets::new();
        assets.add(asset("/page.html", "first"));
        assets.add(asset("/page.html", "second"));

        assets.write(dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("page.html")).unwrap(),
            "second"
        );
    }

    #[test]
    fn write_clamps_traversal_inside_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut assets = Assets::new();
        // Normalization collapses this to /etc/passwd under the root.
        assets.add(asset("/../../etc/passwd", "not really"));

        assets.write(dir.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("etc/passwd")).unwrap(),
            "not really"
        );
    }

    #[test]
    fn write_fails_when_a_directory_segment_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blog"), "a file, not a dir").unwrap();

        let mut assets = Assets::new();
        assets.add(asset("/blog/post.html", "content"));

        assert!(assets.write(dir.path()).is_err());
    }
}
