//! A filesystem that lives entirely in memory.
//!
//! Cloning a [`FileSystem`] yields another view of the same tree. Open file
//! handles share the file's content with the tree, so a file removed while
//! open stays readable and writable through the handles that already have it.

mod dir;
mod file;
mod filesystem;

pub use dir::DirHandle;
pub use file::FileHandle;
pub use filesystem::{FileSystem, MemFsConfig};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ItemKind;

#[derive(Debug, Default)]
struct Content {
    data: Vec<u8>,
    // set once the node is gone from the tree; the bytes no longer count
    // against the capacity
    unlinked: bool,
}

type SharedContent = Arc<Mutex<Content>>;

#[derive(Debug)]
enum Node {
    File { content: SharedContent },
    Directory { children: BTreeMap<String, Node> },
}

impl Node {
    fn new_directory() -> Self {
        Node::Directory {
            children: BTreeMap::new(),
        }
    }

    fn kind(&self) -> ItemKind {
        match self {
            Node::File { .. } => ItemKind::File,
            Node::Directory { .. } => ItemKind::Dir,
        }
    }
}
