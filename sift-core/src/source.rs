use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::asset::{clean_path, Asset, Assets, Meta};

#[derive(Debug)]
pub enum SourceError {
    Walk(walkdir::Error),
    Read(PathBuf, std::io::Error),
    Clone(String, git2::Error),
    Scratch(std::io::Error),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Walk(e) => write!(f, "walk error: {}", e),
            SourceError::Read(path, e) => write!(f, "could not read {}: {}", path.display(), e),
            SourceError::Clone(url, e) => {
                write!(f, "could not clone repository {}: {}", url, e)
            }
            SourceError::Scratch(e) => write!(f, "could not create scratch dir: {}", e),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Walk(e) => Some(e),
            SourceError::Read(_, e) => Some(e),
            SourceError::Clone(_, e) => Some(e),
            SourceError::Scratch(e) => Some(e),
        }
    }
}

impl From<walkdir::Error> for SourceError {
    fn from(err: walkdir::Error) -> Self {
        SourceError::Walk(err)
    }
}

impl Assets {
    /// Collect every regular file under `root` into a fresh collection.
    ///
    /// Payloads are trimmed of surrounding whitespace and each asset gets
    /// a rooted virtual path relative to `root`, with an initialized
    /// (empty) metadata container. The first read error aborts the walk.
    pub fn from_dir(root: &Path) -> Result<Assets, SourceError> {
        Self::from_dir_prefixed(root, "")
    }

    /// Like [`from_dir`](Self::from_dir), but virtual paths start with
    /// the given prefix segment (e.g. prefix `"docs"` turns `a/b.md`
    /// into `/docs/a/b.md`).
    pub fn from_dir_prefixed(root: &Path, prefix: &str) -> Result<Assets, SourceError> {
        let mut assets = Assets::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.file_name().to_str() != Some(".git"));

        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let data = std::fs::read(entry.path())
                .map_err(|e| SourceError::Read(entry.path().to_path_buf(), e))?;

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let mut virtual_path = format!("/{}", prefix);
            for component in relative.components() {
                virtual_path.push('/');
                virtual_path.push_str(&component.as_os_str().to_string_lossy());
            }

            assets.add(Asset {
                path: clean_path(&virtual_path),
                data: data.trim_ascii().to_vec(),
                meta: Some(Meta::new()),
            });
        }

        Ok(assets)
    }

    /// Clone a single branch of a remote repository into a scratch
    /// directory and collect its files, with `prefix` as the leading
    /// virtual path segment.
    pub fn from_git(url: &str, branch: &str, prefix: &str) -> Result<Assets, SourceError> {
        let scratch = tempfile::tempdir().map_err(SourceError::Scratch)?;

        let mut builder = git2::build::RepoBuilder::new();
        builder.branch(branch);
        builder
            .clone(url, scratch.path())
            .map_err(|e| SourceError::Clone(url.to_string(), e))?;

        Self::from_dir_prefixed(scratch.path(), prefix)
    }
}
