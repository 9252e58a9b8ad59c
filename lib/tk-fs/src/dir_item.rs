use crate::{FsConfig, FsError, Result};

/// What a directory entry refers to.
///
/// `Unknown` covers everything that is neither a regular file nor a
/// directory (devices, sockets, dangling links). Callers must not treat it
/// as either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Dir,
    Unknown,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    name: String,
    kind: ItemKind,
}

impl DirItem {
    /// Builds an item, rejecting names longer than `config.max_path`.
    pub fn new(config: &FsConfig, name: impl Into<String>, kind: ItemKind) -> Result<Self> {
        let name = name.into();
        if name.len() > config.max_path {
            return Err(FsError::NameTooLong);
        }
        Ok(Self { name, kind })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == ItemKind::File
    }
}
