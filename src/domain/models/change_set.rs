use serde::{Deserialize, Serialize};

/// Why the change detector produced this particular change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "mtime")]
    Mtime,
    #[serde(rename = "vcs-state-changed")]
    VcsStateChanged,
}

impl ChangeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::Full => "full",
            ChangeReason::Mtime => "mtime",
            ChangeReason::VcsStateChanged => "vcs-state-changed",
        }
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Files that need re-indexing between two runs, in canonical relative form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub reason: ChangeReason,
}

impl ChangeSet {
    pub fn new(reason: ChangeReason) -> Self {
        Self {
            added: Vec::new(),
            modified: Vec::new(),
            deleted: Vec::new(),
            reason,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Paths that need (re-)indexing: added plus modified.
    pub fn to_index(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }
}
