//! In-memory store of directory-scoped tool approvals.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Process-lifetime cache of which tools a human has approved for which
/// working directories.
///
/// Grows only on explicit human approval and is never persisted. No
/// operation fails: a poisoned lock is recovered.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use warden_approval::ApprovalMemory;
///
/// let memory = ApprovalMemory::new();
/// memory.remember(Path::new("/repo"), "Write");
/// assert!(memory.is_approved(Path::new("/repo"), "Write"));
/// assert!(!memory.is_approved(Path::new("/other"), "Write"));
/// ```
#[derive(Debug, Default)]
pub struct ApprovalMemory {
    entries: RwLock<BTreeMap<PathBuf, BTreeSet<String>>>,
}

impl ApprovalMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `tool` has been approved for exactly `directory`.
    #[must_use]
    pub fn is_approved(&self, directory: &Path, tool: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| {
            tracing::warn!("ApprovalMemory read lock poisoned, recovering");
            e.into_inner()
        });
        entries.get(directory).is_some_and(|tools| tools.contains(tool))
    }

    /// Record that `tool` is approved for `directory`.
    pub fn remember(&self, directory: &Path, tool: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| {
            tracing::warn!("ApprovalMemory lock poisoned, recovering");
            e.into_inner()
        });
        let inserted = entries
            .entry(directory.to_path_buf())
            .or_default()
            .insert(tool.to_string());
        if inserted {
            tracing::info!(directory = %directory.display(), tool, "remembered tool approval");
        }
    }

    /// Every directory with its approved tools, sorted.
    #[must_use]
    pub fn list_all(&self) -> Vec<(PathBuf, Vec<String>)> {
        let entries = self.entries.read().unwrap_or_else(|e| {
            tracing::warn!("ApprovalMemory read lock poisoned, recovering");
            e.into_inner()
        });
        entries
            .iter()
            .map(|(dir, tools)| (dir.clone(), tools.iter().cloned().collect()))
            .collect()
    }

    /// Forget every approval.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| {
            tracing::warn!("ApprovalMemory lock poisoned, recovering");
            e.into_inner()
        });
        let count = entries.len();
        entries.clear();
        tracing::info!(directories = count, "cleared approval memory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_approves_nothing() {
        let memory = ApprovalMemory::new();
        assert!(!memory.is_approved(Path::new("/repo"), "Bash"));
        assert!(memory.list_all().is_empty());
    }

    #[test]
    fn approval_is_scoped_to_tool_and_directory() {
        let memory = ApprovalMemory::new();
        memory.remember(Path::new("/repo"), "Write");

        assert!(memory.is_approved(Path::new("/repo"), "Write"));
        assert!(!memory.is_approved(Path::new("/repo"), "Bash"));
        assert!(!memory.is_approved(Path::new("/repo/sub"), "Write"));
        assert!(!memory.is_approved(Path::new("/"), "Write"));
    }

    #[test]
    fn remember_is_idempotent() {
        let memory = ApprovalMemory::new();
        memory.remember(Path::new("/repo"), "Write");
        memory.remember(Path::new("/repo"), "Write");
        memory.remember(Path::new("/repo"), "Edit");

        assert_eq!(
            memory.list_all(),
            vec![(
                PathBuf::from("/repo"),
                vec!["Edit".to_string(), "Write".to_string()]
            )]
        );
    }

    #[test]
    fn list_all_is_sorted_by_directory() {
        let memory = ApprovalMemory::new();
        memory.remember(Path::new("/z"), "Bash");
        memory.remember(Path::new("/a"), "Bash");

        let dirs: Vec<PathBuf> = memory.list_all().into_iter().map(|(d, _)| d).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a"), PathBuf::from("/z")]);
    }

    #[test]
    fn clear_forgets_everything() {
        let memory = ApprovalMemory::new();
        memory.remember(Path::new("/repo"), "Write");
        memory.clear();

        assert!(!memory.is_approved(Path::new("/repo"), "Write"));
        assert!(memory.list_all().is_empty());
    }
}
