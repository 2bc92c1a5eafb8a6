use std::sync::LazyLock;

use regex::Regex;

/// Extensions considered equivalent when matching import targets to files.
const MATCH_EXTENSIONS: &[&str] = &[
    ".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".rs", ".py", ".php",
];

static TEST_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(test|spec)\.[^/]+$").expect("valid test-file regex"));

const TEST_COMPONENTS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];

/// Normalize an import target string into its index form: quotes stripped,
/// separators unified, relative prefixes removed, known extension dropped.
pub fn normalize_target(raw: &str) -> String {
    let trimmed = strip_quotes(raw.trim());
    let mut s = trimmed.replace('\\', "/");

    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        } else if let Some(rest) = s.strip_prefix("../") {
            s = rest.to_string();
        } else {
            break;
        }
    }

    strip_known_extension(&s).to_string()
}

/// Whether two path-like strings refer to the same file.
///
/// Matching is deliberately fuzzy across language conventions: quotes and
/// separators are normalized, a known extension may be missing from either
/// side, Python dotted modules and Rust `crate::`/`super::` paths are
/// expanded, and the shorter form must then be a suffix of the longer at a
/// component boundary. `src/logger-utils` is never a match for
/// `src/logger`: the boundary check rejects mid-component suffixes.
pub fn paths_match(a: &str, b: &str) -> bool {
    if a.trim().is_empty() || b.trim().is_empty() {
        return false;
    }

    let forms_a = candidate_forms(a);
    let forms_b = candidate_forms(b);

    for fa in &forms_a {
        for fb in &forms_b {
            if suffix_at_boundary(fa, fb) || suffix_at_boundary(fb, fa) {
                return true;
            }
        }
    }
    false
}

/// Whether a canonical relative path looks like a test file.
pub fn is_test_file(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    if TEST_FILE_PATTERN.is_match(&normalized) {
        return true;
    }
    normalized
        .split('/')
        .any(|component| TEST_COMPONENTS.contains(&component))
}

/// All normalized spellings a path-like string may be known by.
fn candidate_forms(raw: &str) -> Vec<String> {
    let base = normalize_target(raw);
    let mut forms = vec![base.clone()];

    // Rust module paths: crate::auth::session -> auth/session, optionally
    // rooted at src/.
    if base.contains("::") {
        let mut stripped = base.as_str();
        stripped = stripped.strip_prefix("crate::").unwrap_or(stripped);
        while let Some(rest) = stripped.strip_prefix("super::") {
            stripped = rest;
        }
        let slashed = stripped.replace("::", "/");
        forms.push(format!("src/{}", slashed));
        forms.push(slashed);
    }

    // Dotted Python modules: models.user -> models/user. Only when the
    // string has no separator already, so filenames keep their dots.
    if !base.contains('/') && !base.contains("::") && base.contains('.') {
        forms.push(base.replace('.', "/"));
    }

    forms.sort();
    forms.dedup();
    forms.retain(|f| !f.is_empty());
    forms
}

fn suffix_at_boundary(needle: &str, hay: &str) -> bool {
    if needle.is_empty() || !hay.ends_with(needle) {
        return false;
    }
    let boundary = hay.len() - needle.len();
    boundary == 0 || hay.as_bytes()[boundary - 1] == b'/'
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn strip_known_extension(s: &str) -> &str {
    for ext in MATCH_EXTENSIONS {
        if let Some(stripped) = s.strip_suffix(ext) {
            if !stripped.is_empty() && !stripped.ends_with('/') {
                return stripped;
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_equivalence() {
        assert!(paths_match("src/auth.ts", "src/auth"));
        assert!(paths_match("src/auth.tsx", "src/auth.js"));
        assert!(paths_match("./auth", "src/auth.ts"));
    }

    #[test]
    fn test_component_boundary_rejects_partial_names() {
        assert!(!paths_match("src/logger", "src/logger-utils"));
        assert!(!paths_match("logger", "my-logger"));
        assert!(paths_match("logger", "src/logger"));
    }

    #[test]
    fn test_relative_import_matches_file() {
        assert!(paths_match("./auth", "src/auth.ts"));
        assert!(paths_match("../models/user", "app/models/user.py"));
    }

    #[test]
    fn test_python_dotted_modules() {
        assert!(paths_match("models.user", "models/user.py"));
        assert!(paths_match("app.services.auth", "app/services/auth.py"));
        assert!(!paths_match("models.user", "models/user_admin.py"));
    }

    #[test]
    fn test_rust_crate_paths() {
        assert!(paths_match("crate::auth::session", "src/auth/session.rs"));
        assert!(paths_match("crate::auth", "src/auth.rs"));
        assert!(paths_match("super::session", "auth/session.rs"));
    }

    #[test]
    fn test_php_namespaces() {
        assert!(paths_match(
            "App\\Services\\Auth",
            "App/Services/Auth.php"
        ));
    }

    #[test]
    fn test_quotes_are_stripped() {
        assert!(paths_match("'./auth'", "src/auth.ts"));
        assert!(paths_match("\"fmt\"", "fmt"));
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("'./auth.ts'"), "auth");
        assert_eq!(normalize_target("..\\models\\user.py"), "models/user");
        assert_eq!(normalize_target("fmt"), "fmt");
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("src/auth.test.ts"));
        assert!(is_test_file("src/auth.spec.js"));
        assert!(is_test_file("tests/integration.rs"));
        assert!(is_test_file("src/__tests__/auth.ts"));
        assert!(is_test_file("e2e/login.ts"));
        assert!(!is_test_file("src/auth.ts"));
        assert!(!is_test_file("src/testing-utils.ts"));
        assert!(!is_test_file("src/attest.rs"));
    }

    #[test]
    fn test_bare_module_names() {
        // Go / system imports: exact component match only.
        assert!(paths_match("fmt", "fmt"));
        assert!(!paths_match("fmt", "format"));
    }
}
