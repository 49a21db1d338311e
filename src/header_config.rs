//! Response headers configured outside the server.
//!
//! Two sources: a JSON file mapping path/extension matchers to headers, and
//! the single `--append-header Name:Value` flag.

use log::{debug, info, warn};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderConfig {
    configs: Vec<HeaderRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRule {
    /// `*` or a path prefix.
    path: String,
    /// `*` or an extension without the leading dot.
    file_extension: String,
    headers: Vec<HeaderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeaderEntry {
    key: String,
    value: String,
}

impl HeaderRule {
    fn matches(&self, path: &str) -> bool {
        let path_match = self.path == "*" || path.starts_with(&self.path);
        let extension_match =
            self.file_extension == "*" || extension(path) == Some(self.file_extension.as_str());
        path_match && extension_match
    }
}

fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext)
}

impl HeaderConfig {
    /// Loads the config file. Any failure yields `None` so the server runs
    /// without custom headers instead of refusing to start.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No header config at {:?}", path);
                return None;
            }
            Err(err) => {
                warn!("Unable to read header config {:?}: {}", path, err);
                return None;
            }
        };

        match Self::from_json(&raw) {
            Ok(config) => {
                info!(
                    "Loaded {} header rules from {:?}",
                    config.configs.len(),
                    path
                );
                Some(config)
            }
            Err(err) => {
                warn!("Ignoring invalid header config {:?}: {}", path, err);
                None
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Headers for `path`, in rule order; later rules may repeat a name to
    /// override an earlier value.
    pub fn lookup(&self, path: &str) -> Vec<(&str, &str)> {
        self.configs
            .iter()
            .filter(|rule| rule.matches(path))
            .flat_map(|rule| rule.headers.iter())
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
            .collect()
    }
}

/// The header given with `--append-header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraHeader {
    pub name: String,
    pub value: String,
}

impl ExtraHeader {
    /// Parses `Name:Value`. A missing name or value, or characters that cannot
    /// appear in a header, disable the feature with a warning.
    pub fn parse(flag: &str) -> Option<Self> {
        if flag.is_empty() {
            return None;
        }
        let parsed = flag.split_once(':').and_then(|(name, value)| {
            let valid_name = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
            let valid_value = !value.is_empty() && !value.contains(['\r', '\n']);
            (valid_name && valid_value).then(|| ExtraHeader {
                name: name.to_string(),
                value: value.to_string(),
            })
        });
        if parsed.is_none() {
            warn!("append-header misconfigured; ignoring.");
        }
        parsed
    }
}
