//! Directory scoping for remembered approvals.
//!
//! A remembered approval for `(tool, directory)` only covers a request whose
//! filesystem targets resolve inside `directory`. Targets are compared in
//! canonical absolute form so `..` segments and symlinks cannot escape.
//! Canonicalization touches the filesystem, so the gate goes through the
//! `*_async` variants, which run it on the blocking pool.

use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};

/// Input keys that carry a filesystem target.
const TARGET_KEYS: &[&str] = &["file_path", "notebook_path", "path"];

/// Filesystem targets named in a tool's input, if any.
#[must_use]
pub fn targets(input: &Map<String, Value>) -> Vec<&str> {
    TARGET_KEYS
        .iter()
        .filter_map(|key| input.get(*key).and_then(Value::as_str))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Canonical absolute form of a working directory.
#[must_use]
pub fn canonical_directory(directory: &Path) -> PathBuf {
    canonicalize_lenient(&lexical_normalize(directory))
}

/// Resolve `target` against `directory` and return its canonical form.
///
/// Relative targets are joined onto `directory`. Components that do not
/// exist yet are normalized lexically on top of the deepest existing
/// ancestor.
#[must_use]
pub fn resolve_target(target: &str, directory: &Path) -> PathBuf {
    let target = Path::new(target);
    let joined = if target.is_absolute() {
        target.to_path_buf()
    } else {
        directory.join(target)
    };
    canonicalize_lenient(&joined)
}

/// [`canonical_directory`] on the blocking pool.
pub async fn canonical_directory_async(directory: &Path) -> PathBuf {
    let owned = directory.to_path_buf();
    match tokio::task::spawn_blocking(move || canonical_directory(&owned)).await {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::warn!(error = %e, "directory canonicalization task failed");
            lexical_normalize(directory)
        },
    }
}

/// [`targets_within`] on the blocking pool. A failed check counts as
/// outside the directory.
pub async fn targets_within_async(input: &Map<String, Value>, directory: &Path) -> bool {
    let owned: Vec<String> = targets(input).into_iter().map(str::to_owned).collect();
    if owned.is_empty() {
        return true;
    }
    let directory = directory.to_path_buf();
    tokio::task::spawn_blocking(move || {
        all_within(owned.iter().map(String::as_str), &directory)
    })
    .await
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "target scope check failed");
        false
    })
}

/// Whether every filesystem target in `input` resolves to `directory` or a
/// descendant of it. Inputs without targets are trivially within scope.
#[must_use]
pub fn targets_within(input: &Map<String, Value>, directory: &Path) -> bool {
    all_within(targets(input), directory)
}

fn all_within<'a>(targets: impl IntoIterator<Item = &'a str>, directory: &Path) -> bool {
    let root = canonical_directory(directory);
    targets.into_iter().all(|target| {
        let resolved = resolve_target(target, &root);
        let inside = resolved.starts_with(&root);
        if !inside {
            tracing::debug!(
                path = target,
                resolved = %resolved.display(),
                directory = %root.display(),
                "tool target resolves outside approved directory"
            );
        }
        inside
    })
}

/// Canonicalize the deepest existing ancestor of `path`, then append the
/// remaining components and normalize them lexically.
fn canonicalize_lenient(path: &Path) -> PathBuf {
    let components: Vec<Component<'_>> = path.components().collect();
    for split in (1..=components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        if let Ok(canonical) = prefix.canonicalize() {
            let full = components[split..]
                .iter()
                .fold(canonical, |acc, c| acc.join(c));
            return lexical_normalize(&full);
        }
    }
    lexical_normalize(path)
}

/// Lexically normalize a path (resolve `.` and `..` without filesystem access).
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                }
            },
            Component::CurDir => {},
            other => components.push(other),
        }
    }
    components.iter().collect()
}
