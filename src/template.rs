//! One-time rewrite of the shell document.
//!
//! Each `(key, value)` substitution replaces every `'key' : '<anything>'`
//! occurrence in the asset with `'key':'value'`. The result is written back to
//! the asset and kept in memory for serving.

use log::{info, warn};
use regex::{NoExpand, Regex};
use std::fs;
use std::path::Path;

use crate::error::StartupError;

pub type Substitution = (String, String);

/// Pairs up trailing `key value key value ...` arguments.
pub fn parse_substitutions(args: &[String]) -> Result<Vec<Substitution>, StartupError> {
    if args.len() % 2 != 0 {
        return Err(StartupError::OddSubstitutions(args.len()));
    }
    Ok(args
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Applies `substitutions` to `text`, last pair first. When a key is given
/// twice the earlier pair runs last and its value is the one left in place.
pub fn substitute(text: &str, substitutions: &[Substitution]) -> String {
    let mut page = text.to_string();
    for (key, value) in substitutions.iter().rev() {
        let pattern = format!("'{}' *: *'[^']*'", regex::escape(key));
        let Ok(regex) = Regex::new(&pattern) else {
            warn!("Skipping substitution for key {:?}: invalid pattern", key);
            continue;
        };
        let replacement = format!("'{}':'{}'", key, value);
        page = regex
            .replace_all(&page, NoExpand(&replacement))
            .into_owned();
    }
    page
}

pub struct TemplateRewriter;

impl TemplateRewriter {
    /// Rewrites `asset` in place and returns the new contents.
    ///
    /// Any failure is fatal to startup: a partially rewritten shell document
    /// must never be served.
    pub fn rewrite(asset: &Path, substitutions: &[Substitution]) -> Result<Vec<u8>, StartupError> {
        let original = fs::read_to_string(asset)
            .map_err(|err| StartupError::TemplateRead(asset.to_path_buf(), err))?;

        let page = substitute(&original, substitutions).into_bytes();

        fs::write(asset, &page)
            .map_err(|err| StartupError::TemplateWrite(asset.to_path_buf(), err))?;

        info!(
            "Prepared shell document {:?} ({} substitutions, {} bytes)",
            asset,
            substitutions.len(),
            page.len()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn subs(pairs: &[(&str, &str)]) -> Vec<Substitution> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn pairs_arguments() {
        let args: Vec<String> = ["a", "1", "b", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_substitutions(&args).unwrap(), subs(&[("a", "1"), ("b", "2")]));
        assert!(matches!(
            parse_substitutions(&args[..3]),
            Err(StartupError::OddSubstitutions(3))
        ));
        assert!(parse_substitutions(&[]).unwrap().is_empty());
    }

    #[test]
    fn rewrites_quoted_pairs() {
        let page = "window.env = { 'greeting' : 'hi', 'api':'http://old' };";
        let out = substitute(page, &subs(&[("greeting", "hello"), ("api", "https://new")]));
        assert_eq!(out, "window.env = { 'greeting':'hello', 'api':'https://new' };");
    }

    #[test]
    fn earlier_duplicate_wins() {
        let out = substitute("'k': 'v'", &subs(&[("k", "first"), ("k", "second")]));
        assert_eq!(out, "'k':'first'");
    }

    #[test]
    fn keys_and_values_are_literal() {
        let out = substitute("'a.b' : 'x' 'axb' : 'y'", &subs(&[("a.b", "$1 cost")]));
        assert_eq!(out, "'a.b':'$1 cost' 'axb' : 'y'");
    }

    #[test]
    fn rewrite_persists_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let asset = dir.path().join("index.html");
        fs::write(&asset, "<script>var c = {'greeting' : 'hi'};</script>").unwrap();
        let pairs = subs(&[("greeting", "hello")]);

        let first = TemplateRewriter::rewrite(&asset, &pairs).unwrap();
        assert_eq!(first, b"<script>var c = {'greeting':'hello'};</script>");
        assert_eq!(fs::read(&asset).unwrap(), first);

        let second = TemplateRewriter::rewrite(&asset, &pairs).unwrap();
        assert_eq!(second, first);
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_asset_is_a_write_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let asset = dir.path().join("index.html");
        fs::write(&asset, "{'k':'v'}").unwrap();
        fs::set_permissions(&asset, fs::Permissions::from_mode(0o444)).unwrap();
        if fs::OpenOptions::new().write(true).open(&asset).is_ok() {
            // Permission bits do not bind this user (root).
            return;
        }

        let err = TemplateRewriter::rewrite(&asset, &subs(&[("k", "new")])).unwrap_err();
        assert!(matches!(err, StartupError::TemplateWrite(..)));
        assert_eq!(err.exit_code(), 3);
        assert_eq!(fs::read_to_string(&asset).unwrap(), "{'k':'v'}");
    }

    #[test]
    fn missing_asset_is_a_read_error() {
        let dir = tempdir().unwrap();
        let err = TemplateRewriter::rewrite(&dir.path().join("nope.html"), &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
