//! The on-disk stack tree: `<root>/<node>/<stack>/<stack file>`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::ScanError;
use crate::types::StackRef;

/// Root directory plus the definition file name used inside every stack dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    root: PathBuf,
    stack_file: String,
}

impl StackLayout {
    pub fn new(root: impl Into<PathBuf>, stack_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stack_file: stack_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Immediate subdirectories of the root (node names), sorted.
    pub fn nodes(&self) -> Result<Vec<String>, ScanError> {
        list_dirs(&self.root)
    }

    /// Immediate subdirectories of one node (stack names), sorted.
    pub fn stacks(&self, node: &str) -> Result<Vec<String>, ScanError> {
        list_dirs(&self.root.join(node))
    }

    /// Path of the definition file for a pair. Never cached by callers.
    pub fn definition_path(&self, stack: &StackRef) -> PathBuf {
        self.root
            .join(&stack.node)
            .join(&stack.stack)
            .join(&self.stack_file)
    }
}

fn list_dirs(dir: &Path) -> Result<Vec<String>, ScanError> {
    let read_err = |source| ScanError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // Follows symlinks; a dangling link is not a directory.
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::warn!(
                    dir = %dir.display(),
                    name = %raw.to_string_lossy(),
                    "skip directory with non UTF-8 name"
                );
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Map a changed path to the pair it belongs to.
///
/// Only the last three path segments matter: `<node>/<stack>/<file>`. Paths
/// with fewer than three segments name no specific stack and yield `None`.
pub fn stack_for_path(path: &Path) -> Option<StackRef> {
    let segments: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    if segments.len() < 3 {
        return None;
    }
    let tail = &segments[segments.len() - 3..];
    Some(StackRef::new(tail[0], tail[1]))
}
