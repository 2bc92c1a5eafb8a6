//! Breadth-first workspace walk honouring the ignore hierarchy.

mod ignore_filter;

pub use ignore_filter::{IgnoreFilter, ALWAYS_IGNORE_DIRS, ALWAYS_IGNORE_SUFFIXES, IGNORE_FILE_NAME};

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{to_storage_path, DomainError, Language};

/// One candidate source file found under the root.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub language: Language,
}

/// Walks the tree breadth-first, pruning ignored directories without
/// descending. Output is deduplicated by canonical relative path and
/// tagged with the language detected from the extension.
pub struct Scanner {
    root: PathBuf,
    filter: IgnoreFilter,
    include: Vec<Regex>,
}

impl Scanner {
    pub fn new(root: &Path, filter: IgnoreFilter, include_globs: &[String]) -> Self {
        let include = include_globs
            .iter()
            .filter_map(|glob| match glob_to_regex(glob) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid include glob {:?}: {}", glob, e);
                    None
                }
            })
            .collect();
        Self {
            root: root.to_path_buf(),
            filter,
            include,
        }
    }

    pub fn scan(&self) -> Result<Vec<ScannedFile>, DomainError> {
        let mut files = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        queue.push_back(self.root.clone());

        while let Some(dir) = queue.pop_front() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            let mut children: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .collect();
            children.sort();

            for path in children {
                let relative = to_storage_path(&self.root, &path.to_string_lossy());
                if relative.is_empty() {
                    continue;
                }

                if path.is_dir() {
                    if self.filter.ignored(&relative, true) {
                        debug!("Pruning ignored directory {}", relative);
                        continue;
                    }
                    queue.push_back(path);
                    continue;
                }

                if self.filter.ignored(&relative, false) {
                    continue;
                }

                let language = Language::from_path(&path);
                if language == Language::Unknown && !self.matches_include(&relative) {
                    continue;
                }

                if seen.insert(relative.clone()) {
                    files.push(ScannedFile {
                        relative_path: relative,
                        absolute_path: path,
                        language,
                    });
                }
            }
        }

        Ok(files)
    }

    fn matches_include(&self, relative: &str) -> bool {
        self.include.iter().any(|re| re.is_match(relative))
    }
}

/// Translate a legacy include glob into an anchored regex. Supports `**`
/// (any depth), `*` (within a component), and `?`. Patterns without a
/// separator match at any depth.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    if !glob.contains('/') {
        pattern.push_str("(?:.*/)?");
    }

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Consume a following slash so `**/x` also matches `x`.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        pattern.push_str("(?:.*/)?");
                    } else {
                        pattern.push_str(".*");
                    }
                } else {
                    pattern.push_str("[^/]*");
                }
            }
            '?' => pattern.push_str("[^/]"),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scan(root: &Path, include: &[String]) -> Vec<ScannedFile> {
        let filter = IgnoreFilter::build(root).unwrap();
        Scanner::new(root, filter, include).scan().unwrap()
    }

    #[test]
    fn test_scan_finds_and_tags_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.ts", "export const a = 1;");
        write(dir.path(), "src/util.py", "x = 1");
        write(dir.path(), "README.md", "# readme");

        let files = scan(dir.path(), &[]);
        let by_path: Vec<(&str, Language)> = files
            .iter()
            .map(|f| (f.relative_path.as_str(), f.language))
            .collect();

        assert!(by_path.contains(&("src/app.ts", Language::TypeScript)));
        assert!(by_path.contains(&("src/util.py", Language::Python)));
        // Unknown extensions are skipped without an include glob.
        assert!(!by_path.iter().any(|(p, _)| *p == "README.md"));
    }

    #[test]
    fn test_scan_prunes_ignored_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", "x");
        write(dir.path(), "src/app.ts", "x");

        let files = scan(dir.path(), &[]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/app.ts");
    }

    #[test]
    fn test_scan_respects_nested_ignore_rules() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "packages/app/.lienignore", "generated/\n");
        write(dir.path(), "packages/app/generated/types.ts", "x");
        write(dir.path(), "generated/types.ts", "x");

        let files = scan(dir.path(), &[]);
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert!(paths.contains(&"generated/types.ts"));
        assert!(!paths.contains(&"packages/app/generated/types.ts"));
    }

    #[test]
    fn test_include_globs_admit_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "config/settings.toml", "x = 1");
        write(dir.path(), "config/other.env", "Y=2");

        let files = scan(dir.path(), &["*.toml".to_string()]);
        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert!(paths.contains(&"config/settings.toml"));
        assert!(!paths.contains(&"config/other.env"));
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("**/*.liquid").unwrap();
        assert!(re.is_match("sections/hero.liquid"));
        assert!(re.is_match("hero.liquid"));
        assert!(!re.is_match("hero.liquid.bak"));

        let re = glob_to_regex("src/*.rs").unwrap();
        assert!(re.is_match("src/main.rs"));
        assert!(!re.is_match("src/nested/main.rs"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.ts", "x");
        write(dir.path(), "a.ts", "x");
        write(dir.path(), "src/c.ts", "x");

        let first: Vec<String> = scan(dir.path(), &[])
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        let second: Vec<String> = scan(dir.path(), &[])
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(first, second);
        // Breadth-first: root files precede nested ones.
        assert_eq!(first, vec!["a.ts", "b.ts", "src/c.ts"]);
    }
}
