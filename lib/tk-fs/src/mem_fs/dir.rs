use tracing::trace;

use super::FileSystem;
use crate::{DirItem, FsDir, Result};

/// An open in-memory directory listing.
///
/// The entries are a snapshot taken when the directory is opened or
/// rewound; later changes to the tree show up after the next rewind.
#[derive(Debug)]
pub struct DirHandle {
    fs: FileSystem,
    path: Vec<String>,
    entries: Vec<DirItem>,
    index: usize,
}

impl DirHandle {
    pub(super) fn new(fs: FileSystem, path: Vec<String>, entries: Vec<DirItem>) -> Self {
        Self {
            fs,
            path,
            entries,
            index: 0,
        }
    }
}

impl FsDir for DirHandle {
    fn rewind(&mut self) -> Result<()> {
        self.entries = self.fs.list(&self.path)?;
        self.index = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<DirItem>> {
        let item = self.entries.get(self.index).cloned();
        if item.is_some() {
            self.index += 1;
        }
        Ok(item)
    }

    fn close(self: Box<Self>) -> Result<()> {
        trace!(entries = self.entries.len(), "closing in-memory directory");
        Ok(())
    }
}
