use std::path::Path;

/// Rewrite any path crossing the index boundary into its canonical storage
/// form: relative to the workspace root, forward-slash separated, no
/// leading `./`, no trailing slash. Two paths refer to the same file iff
/// their canonical forms are byte-equal.
pub fn to_storage_path(root: &Path, input: &str) -> String {
    let normalized = normalize_separators(input);
    let root_normalized = normalize_separators(&root.to_string_lossy());
    let root_trimmed = root_normalized.trim_end_matches('/');

    let relative = match normalized.strip_prefix(root_trimmed) {
        Some(rest) if rest.is_empty() => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        // Shares a prefix string but not a path component boundary
        // ("/repo-other" under root "/repo"): treat as outside the root.
        Some(_) => &normalized,
        None => &normalized,
    };

    clean_relative(relative)
}

/// Canonicalize a path that is already relative to the root.
pub fn clean_relative(input: &str) -> String {
    let normalized = normalize_separators(input);
    let mut rest = normalized.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.trim_start_matches('/').trim_end_matches('/').to_string()
}

fn normalize_separators(input: &str) -> String {
    input.replace('\\', "/")
}
