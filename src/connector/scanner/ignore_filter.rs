use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::domain::{to_storage_path, DomainError};

/// Name of the per-directory rule file.
pub const IGNORE_FILE_NAME: &str = ".lienignore";

/// Directories excluded unconditionally; user negations cannot re-include
/// them.
pub const ALWAYS_IGNORE_DIRS: &[&str] =
    &["node_modules", "vendor", ".git", ".lien", "dist", "build"];

/// File suffixes excluded unconditionally (minified assets).
pub const ALWAYS_IGNORE_SUFFIXES: &[&str] = &[".min.js", ".min.css"];

struct DirRules {
    /// Canonical relative directory the rules apply under; empty for root.
    prefix: String,
    matcher: Gitignore,
}

/// A pure `ignored(path) -> bool` predicate built from the always-ignore
/// list plus every `.lienignore` file under the root.
///
/// Rules at directory `D` apply only to paths inside `D`; deeper rules
/// override shallower ones, so a nested negation can re-include what a
/// parent excluded. Nothing re-includes the always-ignore list.
pub struct IgnoreFilter {
    root: PathBuf,
    rules: Vec<DirRules>,
}

impl IgnoreFilter {
    pub fn build(root: &Path) -> Result<Self, DomainError> {
        if !root.is_dir() {
            return Err(DomainError::invalid_input(format!(
                "Workspace root does not exist: {}",
                root.display()
            )));
        }

        let mut rules = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            // Rule files inside always-ignored directories are not collected.
            entry
                .file_name()
                .to_str()
                .map(|name| !ALWAYS_IGNORE_DIRS.contains(&name))
                .unwrap_or(true)
        });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error walking for ignore rules: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.file_name() != IGNORE_FILE_NAME {
                continue;
            }

            let dir = entry.path().parent().unwrap_or(root);
            let mut builder = GitignoreBuilder::new(dir);
            if let Some(e) = builder.add(entry.path()) {
                warn!("Skipping unreadable ignore file {}: {}", entry.path().display(), e);
                continue;
            }
            match builder.build() {
                Ok(matcher) => rules.push(DirRules {
                    prefix: to_storage_path(root, &dir.to_string_lossy()),
                    matcher,
                }),
                Err(e) => {
                    warn!("Skipping malformed ignore file {}: {}", entry.path().display(), e);
                }
            }
        }

        // Shallow rules first; deeper rules get the last word.
        rules.sort_by_key(|r| (r.prefix.matches('/').count(), r.prefix.clone()));

        Ok(Self {
            root: root.to_path_buf(),
            rules,
        })
    }

    /// Whether a canonical relative path is excluded from indexing.
    pub fn ignored(&self, relative: &str, is_dir: bool) -> bool {
        if Self::always_ignored(relative) {
            return true;
        }

        let absolute = self.root.join(relative);
        let mut decision = false;

        for rules in &self.rules {
            if !path_is_under(relative, &rules.prefix) {
                continue;
            }
            let matched = rules.matcher.matched_path_or_any_parents(&absolute, is_dir);
            if matched.is_ignore() {
                decision = true;
            } else if matched.is_whitelist() {
                decision = false;
            }
        }

        decision
    }

    /// Built-in exclusions; these are non-overridable.
    pub fn always_ignored(relative: &str) -> bool {
        let normalized = relative.replace('\\', "/");
        if normalized
            .split('/')
            .any(|component| ALWAYS_IGNORE_DIRS.contains(&component))
        {
            return true;
        }
        ALWAYS_IGNORE_SUFFIXES
            .iter()
            .any(|suffix| normalized.ends_with(suffix))
    }
}

fn path_is_under(relative: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || relative == prefix
        || relative
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
