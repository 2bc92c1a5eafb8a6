use std::path::Path;

use md5::{Digest, Md5};

/// Stable repository identifier: the root's basename plus the first 8 hex
/// characters of the MD5 of the absolute root path. Stable across runs.
pub fn compute_repo_id(root: &Path) -> String {
    let normalized = root.to_string_lossy().replace('\\', "/");
    let basename = normalized
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repo")
        .to_string();

    let digest = Md5::digest(normalized.as_bytes());
    let hex = format!("{:x}", digest);
    format!("{}-{}", basename, &hex[..8])
}
