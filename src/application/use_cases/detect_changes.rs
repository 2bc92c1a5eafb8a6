use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::VcsProbe;
use crate::domain::{
    clean_relative, mtime_ms, ChangeReason, ChangeSet, Manifest, VcsState,
};

/// Outcome of change detection: the change set plus the VCS state observed
/// during the run, which the indexer records into the manifest afterwards.
#[derive(Debug, Clone)]
pub struct DetectedChanges {
    pub change_set: ChangeSet,
    pub current_vcs_state: Option<VcsState>,
}

/// Decides which files need re-indexing between two runs by reconciling
/// the saved manifest against the current working tree. Source-control
/// state wins over modification times when both are available.
pub struct ChangeDetector {
    vcs: Arc<dyn VcsProbe>,
}

impl ChangeDetector {
    pub fn new(vcs: Arc<dyn VcsProbe>) -> Self {
        Self { vcs }
    }

    /// `current_files` is the scanner's output in canonical relative form.
    pub async fn detect(
        &self,
        root: &Path,
        manifest: Option<&Manifest>,
        current_files: &[String],
    ) -> DetectedChanges {
        let current_vcs_state = if self.vcs.is_available().await && self.vcs.is_repo(root).await {
            self.vcs.current_state(root).await
        } else {
            None
        };

        let Some(manifest) = manifest else {
            // First run: everything is new.
            let mut change_set = ChangeSet::new(ChangeReason::Full);
            change_set.added = current_files.to_vec();
            change_set.added.sort();
            return DetectedChanges {
                change_set,
                current_vcs_state,
            };
        };

        if let (Some(current), Some(saved)) = (&current_vcs_state, &manifest.vcs_state) {
            if current != saved {
                info!(
                    "VCS state changed: {}@{} -> {}@{}",
                    saved.branch, saved.commit, current.branch, current.commit
                );
                let change_set = self
                    .detect_from_vcs(root, manifest, current_files, saved, current)
                    .await;
                return DetectedChanges {
                    change_set,
                    current_vcs_state,
                };
            }
        }

        let change_set = self.detect_from_mtime(root, manifest, current_files);
        DetectedChanges {
            change_set,
            current_vcs_state,
        }
    }

    async fn detect_from_vcs(
        &self,
        root: &Path,
        manifest: &Manifest,
        current_files: &[String],
        saved: &VcsState,
        current: &VcsState,
    ) -> ChangeSet {
        let current_set: HashSet<&str> = current_files.iter().map(String::as_str).collect();
        let mut change_set = ChangeSet::new(ChangeReason::VcsStateChanged);

        match self.vcs.diff(root, &saved.commit, &current.commit).await {
            Ok(diffed) => {
                let mut diffed_paths: HashSet<String> = HashSet::new();
                for raw in diffed {
                    let path = clean_relative(&raw);
                    if path.is_empty() || !diffed_paths.insert(path.clone()) {
                        continue;
                    }
                    let exists = current_set.contains(path.as_str());
                    let tracked = manifest.contains(&path);
                    match (exists, tracked) {
                        (true, true) => change_set.modified.push(path),
                        (true, false) => change_set.added.push(path),
                        (false, true) => change_set.deleted.push(path),
                        // Touched between the commits but neither present
                        // nor tracked: nothing to do.
                        (false, false) => {}
                    }
                }

                // Full-scan supplement: the diff only covers the two
                // commits; the working tree may have drifted further.
                for path in current_files {
                    if !manifest.contains(path) && !diffed_paths.contains(path) {
                        change_set.added.push(path.clone());
                    }
                }
                for path in manifest.paths() {
                    if !current_set.contains(path.as_str()) && !diffed_paths.contains(path) {
                        change_set.deleted.push(path.clone());
                    }
                }
            }
            Err(e) => {
                // Diff failure: full reindex under the same reason, with
                // deletions still enumerated.
                warn!("VCS diff failed, falling back to full reindex: {}", e);
                for path in current_files {
                    if manifest.contains(path) {
                        change_set.modified.push(path.clone());
                    } else {
                        change_set.added.push(path.clone());
                    }
                }
                for path in manifest.paths() {
                    if !current_set.contains(path.as_str()) {
                        change_set.deleted.push(path.clone());
                    }
                }
            }
        }

        change_set.added.sort();
        change_set.modified.sort();
        change_set.deleted.sort();
        change_set
    }

    fn detect_from_mtime(
        &self,
        root: &Path,
        manifest: &Manifest,
        current_files: &[String],
    ) -> ChangeSet {
        let current_set: HashSet<&str> = current_files.iter().map(String::as_str).collect();
        let mut change_set = ChangeSet::new(ChangeReason::Mtime);

        for path in current_files {
            match manifest.entry(path) {
                Some(entry) => {
                    let mtime = mtime_ms(&root.join(path));
                    if mtime > entry.last_modified {
                        debug!("mtime advanced for {}: {} > {}", path, mtime, entry.last_modified);
                        change_set.modified.push(path.clone());
                    }
                }
                None => change_set.added.push(path.clone()),
            }
        }

        for path in manifest.paths() {
            if !current_set.contains(path.as_str()) {
                change_set.deleted.push(path.clone());
            }
        }

        change_set.added.sort();
        change_set.modified.sort();
        change_set.deleted.sort();
        change_set
    }
}
