use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{DirHandle, FileHandle, Node, SharedContent};
use crate::{DirItem, DiskInfo, FsConfig, FsDir, FsError, FsFile, MAX_PATH, OpenMode, Result};

#[derive(Clone, Debug)]
pub struct MemFsConfig {
    /// Longest accepted path component, and longest path reported by
    /// `cwd`/`exe`.
    pub max_path: usize,
    /// Byte budget shared by all file content. `None` means unbounded, in
    /// which case `disk_info` is unsupported.
    pub capacity: Option<u64>,
    /// Relative paths are resolved against this directory.
    pub cwd: PathBuf,
    /// What `exe` reports.
    pub exe: PathBuf,
}

impl Default for MemFsConfig {
    fn default() -> Self {
        Self {
            max_path: MAX_PATH,
            capacity: None,
            cwd: PathBuf::from("/"),
            exe: PathBuf::from("/"),
        }
    }
}

/// The in-memory filesystem.
#[derive(Clone, Debug)]
pub struct FileSystem {
    inner: Arc<RwLock<FileSystemInner>>,
    config: Arc<MemFsConfig>,
    limits: FsConfig,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new(MemFsConfig::default())
    }
}

#[derive(Debug)]
pub(super) struct FileSystemInner {
    root: Node,
    used: u64,
    capacity: Option<u64>,
}

impl FileSystemInner {
    fn node_at(&self, path: &[String]) -> Option<&Node> {
        let mut node = &self.root;

        for name in path {
            match node {
                Node::Directory { children } => node = children.get(name)?,
                Node::File { .. } => return None,
            }
        }

        Some(node)
    }

    fn node_at_mut(&mut self, path: &[String]) -> Option<&mut Node> {
        let mut node = &mut self.root;

        for name in path {
            match node {
                Node::Directory { children } => node = children.get_mut(name)?,
                Node::File { .. } => return None,
            }
        }

        Some(node)
    }

    fn children(&self, path: &[String]) -> Result<&BTreeMap<String, Node>> {
        match self.node_at(path) {
            Some(Node::Directory { children }) => Ok(children),
            Some(Node::File { .. }) => Err(FsError::BaseNotDirectory),
            None => Err(FsError::EntryNotFound),
        }
    }

    fn children_mut(&mut self, path: &[String]) -> Result<&mut BTreeMap<String, Node>> {
        match self.node_at_mut(path) {
            Some(Node::Directory { children }) => Ok(children),
            Some(Node::File { .. }) => Err(FsError::BaseNotDirectory),
            None => Err(FsError::EntryNotFound),
        }
    }

    /// Grants up to `wanted` more bytes of content and records them as used.
    pub(super) fn reserve(&mut self, wanted: u64) -> u64 {
        let granted = match self.capacity {
            Some(capacity) => wanted.min(capacity.saturating_sub(self.used)),
            None => wanted,
        };
        self.used += granted;
        granted
    }

    pub(super) fn release(&mut self, bytes: u64) {
        self.used = self.used.saturating_sub(bytes);
    }
}

fn split_last(path: &[String]) -> Option<(&[String], &str)> {
    path.split_last()
        .map(|(name, parent)| (parent, name.as_str()))
}

impl FileSystem {
    pub fn new(config: MemFsConfig) -> Self {
        let inner = FileSystemInner {
            root: Node::new_directory(),
            used: 0,
            capacity: config.capacity,
        };
        let limits = FsConfig {
            max_path: config.max_path,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            config: Arc::new(config),
            limits,
        }
    }

    pub fn config(&self) -> &MemFsConfig {
        &self.config
    }

    /// Turns `path` into the list of names leading to it from the root.
    fn resolve(&self, path: &Path) -> Result<Vec<String>> {
        self.limits.check_path(path)?;

        let joined;
        let path = if path.has_root() {
            path
        } else {
            joined = self.config.cwd.join(path);
            &joined
        };

        let mut names = Vec::new();
        for component in path.components() {
            match component {
                Component::Prefix(..) => return Err(FsError::InvalidInput),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    names.pop();
                }
                Component::Normal(name) => {
                    let name = name.to_str().ok_or(FsError::InvalidInput)?;
                    names.push(name.to_owned());
                }
            }
        }

        Ok(names)
    }

    /// Snapshot of the entries of the directory at `path`, sorted by name.
    pub(super) fn list(&self, path: &[String]) -> Result<Vec<DirItem>> {
        let inner = self.inner.read();

        inner
            .children(path)?
            .iter()
            .map(|(name, node)| DirItem::new(&self.limits, name.clone(), node.kind()))
            .collect()
    }

    fn rename(&self, from: &Path, to: &Path, want_dir: bool) -> Result<()> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        let (from_parent, from_name) = split_last(&from).ok_or(FsError::BaseNotDirectory)?;
        let (to_parent, to_name) = split_last(&to).ok_or(FsError::BaseNotDirectory)?;

        let mut inner = self.inner.write();

        // everything is checked before the tree is touched, so a failed
        // rename leaves the namespace as it was
        match inner.node_at(&from) {
            Some(Node::Directory { .. }) if !want_dir => return Err(FsError::NotAFile),
            Some(Node::File { .. }) if want_dir => return Err(FsError::BaseNotDirectory),
            Some(_) => {}
            None => return Err(FsError::EntryNotFound),
        }
        if inner.node_at(&to).is_some() {
            return Err(FsError::AlreadyExists);
        }
        inner.children(to_parent)?;
        if to.starts_with(&from) {
            return Err(FsError::InvalidInput);
        }

        let node = inner
            .children_mut(from_parent)?
            .remove(from_name)
            .ok_or(FsError::EntryNotFound)?;
        inner
            .children_mut(to_parent)?
            .insert(to_name.to_owned(), node);

        debug!("renamed /{} to /{}", from.join("/"), to.join("/"));
        Ok(())
    }
}

impl crate::FileSystem for FileSystem {
    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FsFile>> {
        if !mode.read() && !mode.writable() {
            return Err(FsError::InvalidMode);
        }
        if mode.truncate() && !mode.writable() {
            return Err(FsError::InvalidMode);
        }

        let resolved = self.resolve(path)?;
        let (parent, name) = split_last(&resolved).ok_or(FsError::NotAFile)?;

        let mut inner = self.inner.write();
        let children = inner.children_mut(parent)?;
        let content: SharedContent = match children.get(name) {
            Some(Node::File { content }) => content.clone(),
            Some(Node::Directory { .. }) => return Err(FsError::NotAFile),
            None if mode.must_exist() => return Err(FsError::EntryNotFound),
            None => {
                let content = SharedContent::default();
                children.insert(
                    name.to_owned(),
                    Node::File {
                        content: content.clone(),
                    },
                );
                content
            }
        };

        if mode.truncate() {
            let mut locked = content.lock();
            let len = locked.data.len() as u64;
            locked.data.clear();
            inner.release(len);
        }

        trace!(path = %path.display(), ?mode, "opened in-memory file");
        Ok(Box::new(FileHandle::new(self.inner.clone(), content, mode)))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let resolved = self.resolve(path)?;
        let (parent, name) = split_last(&resolved).ok_or(FsError::NotAFile)?;

        let mut inner = self.inner.write();
        let children = inner.children_mut(parent)?;
        match children.get(name) {
            Some(Node::File { .. }) => {}
            Some(Node::Directory { .. }) => return Err(FsError::NotAFile),
            None => return Err(FsError::EntryNotFound),
        }

        if let Some(Node::File { content }) = children.remove(name) {
            let mut locked = content.lock();
            locked.unlinked = true;
            let len = locked.data.len() as u64;
            inner.release(len);
        }

        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        let Ok(resolved) = self.resolve(path) else {
            return false;
        };
        matches!(
            self.inner.read().node_at(&resolved),
            Some(Node::File { .. })
        )
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename(from, to, false)
    }

    fn open_dir(&self, path: &Path) -> Result<Box<dyn FsDir>> {
        let resolved = self.resolve(path)?;
        let entries = self.list(&resolved)?;

        Ok(Box::new(DirHandle::new(self.clone(), resolved, entries)))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let resolved = self.resolve(path)?;
        let (parent, name) = split_last(&resolved).ok_or(FsError::AlreadyExists)?;

        let mut inner = self.inner.write();
        let children = inner.children_mut(parent)?;
        if children.contains_key(name) {
            return Err(FsError::AlreadyExists);
        }
        children.insert(name.to_owned(), Node::new_directory());

        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let resolved = self.resolve(path)?;
        let (parent, name) = split_last(&resolved).ok_or(FsError::BaseNotDirectory)?;

        let mut inner = self.inner.write();
        let children = inner.children_mut(parent)?;
        match children.get(name) {
            Some(Node::Directory { children }) if !children.is_empty() => {
                return Err(FsError::DirectoryNotEmpty);
            }
            Some(Node::Directory { .. }) => {}
            Some(Node::File { .. }) => return Err(FsError::BaseNotDirectory),
            None => return Err(FsError::EntryNotFound),
        }
        children.remove(name);

        Ok(())
    }

    fn dir_exists(&self, path: &Path) -> bool {
        let Ok(resolved) = self.resolve(path) else {
            return false;
        };
        matches!(
            self.inner.read().node_at(&resolved),
            Some(Node::Directory { .. })
        )
    }

    fn rename_dir(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename(from, to, true)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let resolved = self.resolve(path)?;

        match self.inner.read().node_at(&resolved) {
            Some(Node::File { content }) => Ok(content.lock().data.len() as u64),
            Some(Node::Directory { .. }) => Err(FsError::NotAFile),
            None => Err(FsError::EntryNotFound),
        }
    }

    fn disk_info(&self, volume: &Path) -> Result<DiskInfo> {
        let resolved = self.resolve(volume)?;

        let inner = self.inner.read();
        inner.children(&resolved)?;
        let capacity = inner.capacity.ok_or(FsError::Unsupported)?;

        Ok(DiskInfo {
            free_kb: capacity.saturating_sub(inner.used) / 1024,
            total_kb: capacity / 1024,
        })
    }

    fn cwd(&self) -> Result<PathBuf> {
        self.limits.bounded(self.config.cwd.clone())
    }

    fn exe(&self) -> Result<PathBuf> {
        self.limits.bounded(self.config.exe.clone())
    }
}
