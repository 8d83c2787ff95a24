//! File System Collaborator
//!
//! Reads source files and lists a project as a `FileNode` tree. Node ids are
//! the absolute paths of the entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use codeask_core::FileNode;
use ignore::WalkBuilder;
use tracing::debug;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::SIDECAR_FILE_NAME;

/// File access used by the analysis services
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Raw file content. Fails with `FileUnavailable`.
    async fn read_bytes(&self, path: &Path) -> AppResult<Vec<u8>>;

    /// File content as text; invalid UTF-8 sequences become U+FFFD.
    async fn read_file(&self, path: &Path) -> AppResult<String> {
        let bytes = self.read_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write_file(&self, path: &Path, content: &str) -> AppResult<()>;

    /// Recursive listing of `root`; the order is stable for an unchanged directory
    async fn list_directory_tree(&self, root: &Path) -> AppResult<Vec<FileNode>>;
}

/// Local disk implementation
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_bytes(&self, path: &Path) -> AppResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| AppError::file_unavailable(path, e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn list_directory_tree(&self, root: &Path) -> AppResult<Vec<FileNode>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || build_tree(&root))
            .await
            .map_err(|e| AppError::internal(format!("directory walk failed: {}", e)))?
    }
}

/// Walk `root` honoring gitignore rules and assemble the node tree.
///
/// Directories come before files; names ascend within each group. `.git`
/// and the sidecar document are left out.
pub fn build_tree(root: &Path) -> AppResult<Vec<FileNode>> {
    if !root.is_dir() {
        return Err(AppError::not_found(format!(
            "project directory: {}",
            root.display()
        )));
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .follow_links(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(true)
        .filter_entry(|entry| {
            let name = entry.file_name();
            name != ".git" && name != SIDECAR_FILE_NAME
        });

    let mut children: HashMap<PathBuf, Vec<(PathBuf, bool)>> = HashMap::new();
    let mut count = 0usize;
    for entry in builder.build() {
        let Ok(entry) = entry else {
            continue;
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path().to_path_buf();
        let Some(parent) = path.parent().map(Path::to_path_buf) else {
            continue;
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        children.entry(parent).or_default().push((path, is_dir));
        count += 1;
    }

    debug!(root = %root.display(), entries = count, "project tree listed");
    Ok(assemble(root, &mut children))
}

fn assemble(dir: &Path, children: &mut HashMap<PathBuf, Vec<(PathBuf, bool)>>) -> Vec<FileNode> {
    let Some(mut entries) = children.remove(dir) else {
        return Vec::new();
    };
    entries.sort_by(|(a, a_dir), (b, b_dir)| {
        b_dir
            .cmp(a_dir)
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });

    entries
        .into_iter()
        .map(|(path, is_dir)| {
            let id = path.to_string_lossy().to_string();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if is_dir {
                let nested = assemble(&path, children);
                FileNode::directory(id, name, nested)
            } else {
                FileNode::file(id, name)
            }
        })
        .collect()
}
