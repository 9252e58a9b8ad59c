//! A small virtual filesystem layer.
//!
//! Callers talk to a [`FileSystem`] and the [`FsFile`] / [`FsDir`] handles it
//! hands out without knowing which backend serves the request. Two backends
//! ship with the crate: [`mem_fs`] keeps everything in memory and
//! [`host_fs`] forwards to the operating system.
//!
//! ```
//! use tk_fs::{mem_fs, ops, FileSystem};
//!
//! let fs = mem_fs::FileSystem::default();
//! ops::write_file(&fs, "/hello.txt", b"hello").unwrap();
//! assert_eq!(ops::read_file(&fs, "/hello.txt").unwrap(), b"hello");
//! assert!(fs.file_exists("/hello.txt".as_ref()));
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod default_fs;
mod dir_item;
pub mod host_fs;
pub mod mem_fs;
mod mode;
pub mod ops;

pub use default_fs::{os_fs, set_os_fs};
pub use dir_item::{DirItem, ItemKind};
pub use mode::OpenMode;
pub use ops::{file_exists, file_get_size, file_read, file_read_part, file_remove, file_write};

pub type Result<T> = std::result::Result<T, FsError>;

/// Default upper bound for a single path component and for the paths
/// returned by [`FileSystem::cwd`] and [`FileSystem::exe`].
pub const MAX_PATH: usize = 255;

/// Settings shared by every backend.
#[derive(Clone, Debug)]
pub struct FsConfig {
    /// Longest accepted path component, and longest path reported by
    /// `cwd`/`exe`.
    pub max_path: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self { max_path: MAX_PATH }
    }
}

impl FsConfig {
    /// Rejects any component of `path` longer than `max_path`.
    pub fn check_path(&self, path: &Path) -> Result<()> {
        let too_long = path
            .components()
            .any(|component| component.as_os_str().len() > self.max_path);
        if too_long {
            return Err(FsError::NameTooLong);
        }
        Ok(())
    }

    /// Bounds a path reported back to the caller.
    pub fn bounded(&self, path: PathBuf) -> Result<PathBuf> {
        if path.as_os_str().len() > self.max_path {
            return Err(FsError::NameTooLong);
        }
        Ok(path)
    }
}

/// An open file.
///
/// A handle is owned by exactly one caller. It is released by [`close`],
/// which consumes it, or by dropping it (in which case flush errors are lost).
///
/// [`close`]: FsFile::close
pub trait FsFile: fmt::Debug + Send {
    /// Reads up to `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes up to `buf.len()` bytes and returns how many were written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Moves the cursor to the absolute `offset`.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Resizes the file to `size` bytes, zero filling when it grows.
    fn truncate(&mut self, size: u64) -> Result<()>;

    /// Whether the cursor is at or past the end of the content.
    fn eof(&self) -> bool;

    /// Flushes and releases the file.
    fn close(self: Box<Self>) -> Result<()>;
}

/// An open directory listing.
pub trait FsDir: fmt::Debug + Send {
    /// Restarts the listing from the first entry.
    fn rewind(&mut self) -> Result<()>;

    /// Returns the next entry, or `None` once the listing is exhausted.
    /// Calling it again after the end keeps returning `None`.
    fn read(&mut self) -> Result<Option<DirItem>>;

    /// Releases the listing.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Free and total space of a volume, in KiB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiskInfo {
    pub free_kb: u64,
    pub total_kb: u64,
}

/// One filesystem namespace.
///
/// Implementations are shared (usually behind an `Arc`) and must tolerate
/// concurrent calls; the handles they return are not shared.
pub trait FileSystem: fmt::Debug + Send + Sync {
    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FsFile>>;
    fn remove_file(&self, path: &Path) -> Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
    /// Fails with [`FsError::AlreadyExists`] if `to` is taken.
    fn rename_file(&self, from: &Path, to: &Path) -> Result<()>;

    fn open_dir(&self, path: &Path) -> Result<Box<dyn FsDir>>;
    fn create_dir(&self, path: &Path) -> Result<()>;
    /// Only empty directories can be removed.
    fn remove_dir(&self, path: &Path) -> Result<()>;
    fn dir_exists(&self, path: &Path) -> bool;
    fn rename_dir(&self, from: &Path, to: &Path) -> Result<()>;

    fn file_size(&self, path: &Path) -> Result<u64>;
    fn disk_info(&self, volume: &Path) -> Result<DiskInfo>;

    /// The current working directory.
    fn cwd(&self) -> Result<PathBuf>;

    /// The directory containing the running executable.
    fn exe(&self) -> Result<PathBuf>;
}

impl dyn FileSystem + '_ {
    /// Opens `path` with an `fopen`-style mode string such as `"rb"`.
    pub fn open(&self, path: impl AsRef<Path>, mode: &str) -> Result<Box<dyn FsFile>> {
        let mode = mode.parse::<OpenMode>()?;
        self.open_file(path.as_ref(), mode)
    }
}

/// Error type for external users
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum FsError {
    /// The requested file or directory could not be found
    #[error("entry not found")]
    EntryNotFound,
    /// Caller was not allowed to perform this operation
    #[error("permission denied")]
    PermissionDenied,
    /// The handle was not opened with the access this operation needs
    #[error("handle is not writable")]
    ReadOnly,
    /// The provided data is invalid
    #[error("invalid input")]
    InvalidInput,
    /// A path component, or a reported path, is longer than allowed
    #[error("name too long")]
    NameTooLong,
    /// The mode string is not one of `r`, `w`, `a` with optional `+`/`b`
    #[error("invalid open mode")]
    InvalidMode,
    /// Expected a file but found not a file
    #[error("not a file")]
    NotAFile,
    /// The path (or one of its parents) is not a directory
    #[error("not a directory")]
    BaseNotDirectory,
    /// File exists
    #[error("entry exists")]
    AlreadyExists,
    /// Directory not Empty
    #[error("directory not empty")]
    DirectoryNotEmpty,
    /// A write made no progress
    #[error("write returned 0")]
    WriteZero,
    /// Found EOF when EOF was not expected
    #[error("unexpected eof")]
    UnexpectedEof,
    /// A buffer could not be allocated
    #[error("out of memory")]
    OutOfMemory,
    /// The backing storage has no space left
    #[error("storage full")]
    StorageFull,
    /// Something failed when doing IO. These errors can generally not be handled.
    #[error("io error")]
    IOError,
    /// The backend does not support this operation
    #[error("unsupported")]
    Unsupported,
    /// Some other unhandled error. If you see this, it's probably a bug.
    #[error("unknown error found")]
    UnknownError,
}

impl From<io::Error> for FsError {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::NotFound => FsError::EntryNotFound,
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied,
            io::ErrorKind::ReadOnlyFilesystem => FsError::PermissionDenied,
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            io::ErrorKind::InvalidInput => FsError::InvalidInput,
            io::ErrorKind::InvalidFilename => FsError::NameTooLong,
            io::ErrorKind::NotADirectory => FsError::BaseNotDirectory,
            io::ErrorKind::IsADirectory => FsError::NotAFile,
            io::ErrorKind::DirectoryNotEmpty => FsError::DirectoryNotEmpty,
            io::ErrorKind::WriteZero => FsError::WriteZero,
            io::ErrorKind::UnexpectedEof => FsError::UnexpectedEof,
            io::ErrorKind::OutOfMemory => FsError::OutOfMemory,
            io::ErrorKind::StorageFull => FsError::StorageFull,
            io::ErrorKind::Unsupported => FsError::Unsupported,
            io::ErrorKind::Other => FsError::IOError,
            // if the following triggers, a new error type was added to this non-exhaustive enum
            _ => FsError::UnknownError,
        }
    }
}
