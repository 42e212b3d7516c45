//! Exclude-pattern matching for relative paths.
//!
//! Three pattern shapes are recognized:
//! - `name/` excludes the directory `name` and everything beneath it
//! - a pattern containing `/` is a glob over the whole relative path
//! - any other pattern is a glob over the file's base name
//!
//! `*` and `?` never cross a `/`; `**` matches across directories.

use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

/// Returns true if `relative_path` matches any of `patterns`.
///
/// Compiles the patterns on every call; hold an [`ExcludeFilter`] when the
/// same patterns are checked repeatedly.
pub fn is_excluded(relative_path: &str, patterns: &[String]) -> bool {
    ExcludeFilter::new(patterns).is_excluded(relative_path)
}

#[derive(Debug, Clone)]
enum Rule {
    /// `dir/` patterns: prefix match plus a glob over the full path.
    Directory {
        dir: String,
        glob: Option<GlobMatcher>,
    },
    /// Globs containing `/`, matched against the full path.
    Path(GlobMatcher),
    /// Globs without `/`, matched against the base name.
    BaseName(GlobMatcher),
}

/// A compiled set of exclude patterns.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    rules: Vec<Rule>,
}

impl ExcludeFilter {
    /// Compile `patterns`. Blank patterns are ignored; patterns that are not
    /// valid globs are logged and can then only match as directory prefixes.
    pub fn new(patterns: &[String]) -> Self {
        let rules = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .filter_map(compile_rule)
            .collect();

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns true if the path (slash-normalized before matching) is excluded.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        let normalized = relative_path.replace('\\', "/");
        let path = normalized.as_str();
        let base_name = path.rsplit('/').next().unwrap_or(path);

        self.rules.iter().any(|rule| match rule {
            Rule::Directory { dir, glob } => {
                path == dir
                    || path
                        .strip_prefix(dir.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    || glob.as_ref().is_some_and(|g| g.is_match(path))
            }
            Rule::Path(glob) => glob.is_match(path),
            Rule::BaseName(glob) => glob.is_match(base_name),
        })
    }
}

fn compile_rule(pattern: &str) -> Option<Rule> {
    if let Some(dir) = pattern.strip_suffix('/') {
        return Some(Rule::Directory {
            dir: dir.to_string(),
            glob: compile_glob(pattern),
        });
    }

    let glob = compile_glob(pattern)?;
    if pattern.contains('/') {
        Some(Rule::Path(glob))
    } else {
        Some(Rule::BaseName(glob))
    }
}

fn compile_glob(pattern: &str) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
    {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
            None
        }
    }
}
