//! Fallback-aware file resolution.
//!
//! [`FallbackFileSystem::open`] maps a logical request path to a file under
//! the asset root. When nothing exists at that path the configured
//! [`FallbackRule`] picks a substitute: one fixed asset, or the nearest file
//! of a given name found by walking up the requested path's directories.

use log::{debug, warn};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up inside a directory requested by its own path.
pub const DIRECTORY_INDEX: &str = "index.html";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path contains a parent directory segment: {0}")]
    Traversal(String),

    #[error("path contains an invalid character: {0}")]
    InvalidCharacter(String),
}

/// A normalized logical path: always starts with `/`, has no empty, `.` or
/// `..` segments, and keeps a trailing `/` when the original had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath(String);

impl RequestPath {
    /// Normalizes an already percent-decoded path, rejecting `..` segments
    /// outright rather than resolving them.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(PathError::Traversal(raw.to_string())),
                s if s.contains(['\0', '\\']) => {
                    return Err(PathError::InvalidCharacter(raw.to_string()));
                }
                s => segments.push(s),
            }
        }

        let mut normalized = format!("/{}", segments.join("/"));
        if raw.ends_with('/') && !segments.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// True when the path names a directory explicitly (`/docs/`).
    pub fn has_trailing_slash(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The last segment, or an empty string for the root.
    pub fn file_name(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    fn to_relative(&self) -> PathBuf {
        self.segments().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackRule {
    /// Serve this one asset for every miss.
    Absolute(RequestPath),
    /// Serve the nearest file with this relative name, searching from the
    /// requested directory up to the asset root.
    Relative(String),
}

impl FallbackRule {
    /// Parses the `--fallback` value. An empty value disables fallback.
    pub fn parse(value: &str) -> Result<Option<Self>, PathError> {
        if value.is_empty() {
            return Ok(None);
        }
        let path = RequestPath::parse(value)?;
        let rule = if value.starts_with('/') {
            FallbackRule::Absolute(path)
        } else {
            FallbackRule::Relative(path.segments().collect::<Vec<_>>().join("/"))
        };
        Ok(Some(rule))
    }

    /// Logical path of the root-level asset this rule names; this is the file
    /// rewritten at startup and served as the shell document.
    pub fn shell_path(&self) -> RequestPath {
        match self {
            FallbackRule::Absolute(path) => path.clone(),
            FallbackRule::Relative(name) => RequestPath(format!("/{}", name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The requested path is a file.
    File,
    /// The requested path is a directory and this is its index.
    DirectoryIndex,
    /// Nothing existed at the requested path; the fallback rule chose this.
    Fallback,
}

#[derive(Debug)]
pub struct Asset {
    pub path: PathBuf,
    pub metadata: Metadata,
    pub matched: Match,
}

#[derive(Debug)]
pub enum ResolvedAsset {
    Found(Asset),
    NotFound,
}

impl ResolvedAsset {
    pub fn is_found(&self) -> bool {
        matches!(self, ResolvedAsset::Found(_))
    }
}

/// Read-only view of an asset directory with fallback resolution.
///
/// Nothing is cached: each [`open`](Self::open) consults the filesystem so
/// files added or removed while the server runs are picked up.
#[derive(Debug, Clone)]
pub struct FallbackFileSystem {
    root: PathBuf,
    rule: Option<FallbackRule>,
}

impl FallbackFileSystem {
    pub fn new(root: impl AsRef<Path>, rule: Option<FallbackRule>) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref()).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!(
                    "failed to canonicalize asset directory {}: {err}",
                    root.as_ref().display()
                ),
            )
        })?;
        Ok(Self { root, rule })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule(&self) -> Option<&FallbackRule> {
        self.rule.as_ref()
    }

    pub fn open(&self, path: &RequestPath) -> ResolvedAsset {
        if let Some(asset) = self.open_exact(path) {
            return ResolvedAsset::Found(asset);
        }

        let found = match &self.rule {
            None => None,
            Some(FallbackRule::Absolute(target)) => self.lookup_file(&target.to_relative()),
            Some(FallbackRule::Relative(name)) => self.search_upwards(path, name),
        };

        match found {
            Some((path, metadata)) => ResolvedAsset::Found(Asset {
                path,
                metadata,
                matched: Match::Fallback,
            }),
            None => {
                debug!("No asset for {}", path.as_str());
                ResolvedAsset::NotFound
            }
        }
    }

    fn open_exact(&self, path: &RequestPath) -> Option<Asset> {
        let relative = path.to_relative();
        let metadata = fs::metadata(self.root.join(&relative)).ok()?;

        if metadata.is_dir() {
            let (path, metadata) = self.lookup_file(&relative.join(DIRECTORY_INDEX))?;
            return Some(Asset {
                path,
                metadata,
                matched: Match::DirectoryIndex,
            });
        }

        let (path, metadata) = self.lookup_file(&relative)?;
        Some(Asset {
            path,
            metadata,
            matched: Match::File,
        })
    }

    /// Looks for `name` in the requested directory, then each ancestor up to
    /// and including the root. Terminates after at most depth + 1 probes.
    fn search_upwards(&self, path: &RequestPath, name: &str) -> Option<(PathBuf, Metadata)> {
        let mut directory: Vec<&str> = path.segments().collect();
        if !path.has_trailing_slash() {
            directory.pop();
        }

        loop {
            let candidate: PathBuf = directory.iter().collect::<PathBuf>().join(name);
            if let Some(found) = self.lookup_file(&candidate) {
                return Some(found);
            }
            if directory.pop().is_none() {
                return None;
            }
        }
    }

    /// Returns the canonical path and metadata of a regular file under the
    /// root. Symlinks resolving outside the root count as missing.
    fn lookup_file(&self, relative: &Path) -> Option<(PathBuf, Metadata)> {
        let candidate = self.root.join(relative);
        let metadata = fs::metadata(&candidate).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let canonical = fs::canonicalize(&candidate).ok()?;
        if !canonical.starts_with(&self.root) {
            warn!(
                "Refusing {:?}: resolves outside the asset directory",
                candidate
            );
            return None;
        }
        Some((canonical, metadata))
    }
}
