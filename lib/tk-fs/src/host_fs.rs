//! The host operating system's filesystem.
//!
//! An unscoped [`FileSystem`] passes paths through untouched. A scoped one
//! (see [`FileSystem::scoped`]) treats its root directory as `/`: every
//! path is normalized lexically and joined under the root, so `..` can not
//! climb out of it.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::{DirItem, DiskInfo, FsConfig, FsDir, FsError, FsFile, ItemKind, OpenMode, Result};

#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    root: Option<PathBuf>,
    config: FsConfig,
}

pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(FsError::InvalidInput);
    }
    dunce::canonicalize(path).map_err(Into::into)
}

// Copied from cargo
// https://github.com/rust-lang/cargo/blob/fede83ccf973457de319ba6fa0e36ead454d2e20/src/cargo/util/paths.rs#L61
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

impl FileSystem {
    /// The whole host filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filesystem rooted at the existing directory `root`.
    pub fn scoped(root: impl Into<PathBuf>) -> Result<Self> {
        let root = canonicalize(&root.into())?;
        if !root.is_dir() {
            return Err(FsError::BaseNotDirectory);
        }

        debug!(root = %root.display(), "scoping host filesystem");
        Ok(Self {
            root: Some(root),
            config: FsConfig::default(),
        })
    }

    pub fn with_config(mut self, config: FsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn prepare_path(&self, path: &Path) -> Result<PathBuf> {
        self.config.check_path(path)?;

        let Some(root) = &self.root else {
            return Ok(path.to_owned());
        };

        let path = normalize_path(path);
        let path = path.strip_prefix("/").unwrap_or(&path);
        let path = root.join(path);

        debug_assert!(path.starts_with(root));
        Ok(path)
    }

    /// Maps a host path back into this filesystem's namespace.
    fn to_virtual(&self, host_path: PathBuf) -> Result<PathBuf> {
        let Some(root) = &self.root else {
            return Ok(host_path);
        };

        let host_path = dunce::canonicalize(host_path)?;
        let relative = host_path
            .strip_prefix(root)
            .map_err(|_| FsError::EntryNotFound)?;
        Ok(Path::new("/").join(relative))
    }

    /// `path` is a path in this filesystem's namespace, not a host path.
    fn check_not_root(path: &Path) -> Result<()> {
        if normalize_path(path).parent().is_none() {
            return Err(FsError::BaseNotDirectory);
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path, want_dir: bool) -> Result<()> {
        Self::check_not_root(from)?;
        Self::check_not_root(to)?;
        let from = self.prepare_path(from)?;
        let to = self.prepare_path(to)?;

        let metadata = fs::metadata(&from)?;
        if metadata.is_dir() && !want_dir {
            return Err(FsError::NotAFile);
        }
        if !metadata.is_dir() && want_dir {
            return Err(FsError::BaseNotDirectory);
        }
        if fs::symlink_metadata(&to).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        if want_dir && to.starts_with(&from) {
            return Err(FsError::InvalidInput);
        }

        // `fs::rename` silently replaces files on unix
        rename_no_replace(&from, &to)?;
        debug!(from = %from.display(), to = %to.display(), "renamed");
        Ok(())
    }
}

fn item_kind(entry: &fs::DirEntry) -> ItemKind {
    let file_type = match entry.file_type() {
        Ok(file_type) if file_type.is_symlink() => match fs::metadata(entry.path()) {
            Ok(metadata) => metadata.file_type(),
            Err(_) => return ItemKind::Unknown,
        },
        Ok(file_type) => file_type,
        Err(_) => return ItemKind::Unknown,
    };

    if file_type.is_dir() {
        ItemKind::Dir
    } else if file_type.is_file() {
        ItemKind::File
    } else {
        ItemKind::Unknown
    }
}

/// Entries whose name does not fit in `config.max_path` are left out.
fn list(path: &Path, config: &FsConfig) -> Result<Vec<DirItem>> {
    let mut items = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match DirItem::new(config, name, item_kind(&entry)) {
            Ok(item) => items.push(item),
            Err(FsError::NameTooLong) => {
                warn!(
                    entry = %entry.path().display(),
                    max_path = config.max_path,
                    "skipping directory entry with an overlong name"
                );
            }
            Err(e) => return Err(e),
        }
    }
    items.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(items)
}

/// Renames `from` to `to`, failing with `AlreadyExists` if `to` is taken.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let from_c = CString::new(from.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    let to_c = CString::new(to.as_os_str().as_bytes())
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;

    // SAFETY: both strings are NUL terminated and outlive the call.
    let rc = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            from_c.as_ptr(),
            libc::AT_FDCWD,
            to_c.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // the kernel or the filesystem has no RENAME_NOREPLACE
        Some(libc::EINVAL) | Some(libc::ENOSYS) => rename_checked(from, to),
        _ => Err(err),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    rename_checked(from, to)
}

/// Check-then-rename. A `to` created between the check and the rename is
/// replaced on unix.
fn rename_checked(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_ok() {
        return Err(io::ErrorKind::AlreadyExists.into());
    }
    fs::rename(from, to)
}

#[cfg(unix)]
fn statvfs(path: &Path) -> Result<DiskInfo> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::InvalidInput)?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // SAFETY: `c_path` is NUL terminated and outlives the call, and `stat`
    // points to writable memory of the right size.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: statvfs succeeded, so it filled in the struct.
    let stat = unsafe { stat.assume_init() };

    let block = stat.f_frsize as u64;
    Ok(DiskInfo {
        free_kb: (stat.f_bavail as u64).saturating_mul(block) / 1024,
        total_kb: (stat.f_blocks as u64).saturating_mul(block) / 1024,
    })
}

#[cfg(not(unix))]
fn statvfs(_path: &Path) -> Result<DiskInfo> {
    Err(FsError::Unsupported)
}

impl crate::FileSystem for FileSystem {
    fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FsFile>> {
        if !mode.read() && !mode.writable() {
            return Err(FsError::InvalidMode);
        }

        let path = self.prepare_path(path)?;
        let inner = fs::OpenOptions::new()
            .read(mode.read())
            .write(mode.write())
            .append(mode.append())
            .create(mode.create())
            .truncate(mode.truncate())
            .open(&path)?;

        // opening a directory read-only succeeds on unix
        if inner.metadata()?.is_dir() {
            return Err(FsError::NotAFile);
        }

        trace!(path = %path.display(), ?mode, "opened host file");
        Ok(Box::new(File {
            inner,
            host_path: path,
            mode,
        }))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Self::check_not_root(path)?;
        let path = self.prepare_path(path)?;

        if path.is_dir() {
            return Err(FsError::NotAFile);
        }
        fs::remove_file(path).map_err(Into::into)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.prepare_path(path)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename(from, to, false)
    }

    fn open_dir(&self, path: &Path) -> Result<Box<dyn FsDir>> {
        let path = self.prepare_path(path)?;
        if path.is_file() {
            return Err(FsError::BaseNotDirectory);
        }
        let entries = list(&path, &self.config)?;

        Ok(Box::new(DirHandle {
            host_path: path,
            config: self.config.clone(),
            entries,
            index: 0,
        }))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let path = self.prepare_path(path)?;

        fs::create_dir(path).map_err(Into::into)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        Self::check_not_root(path)?;
        let path = self.prepare_path(path)?;

        if path.is_file() {
            return Err(FsError::BaseNotDirectory);
        }
        // https://github.com/rust-lang/rust/issues/86442
        // DirectoryNotEmpty is not implemented consistently
        if path.is_dir() && fs::read_dir(&path)?.next().is_some() {
            return Err(FsError::DirectoryNotEmpty);
        }
        fs::remove_dir(path).map_err(Into::into)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.prepare_path(path)
            .map(|path| path.is_dir())
            .unwrap_or(false)
    }

    fn rename_dir(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename(from, to, true)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let path = self.prepare_path(path)?;

        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(FsError::NotAFile);
        }
        Ok(metadata.len())
    }

    fn disk_info(&self, volume: &Path) -> Result<DiskInfo> {
        let path = self.prepare_path(volume)?;

        statvfs(&path)
    }

    fn cwd(&self) -> Result<PathBuf> {
        if self.root.is_some() {
            return Ok(PathBuf::from("/"));
        }

        let cwd = std::env::current_dir()?;
        self.config.bounded(cwd)
    }

    fn exe(&self) -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or(FsError::EntryNotFound)?.to_owned();

        self.config.bounded(self.to_virtual(dir)?)
    }
}

/// A thin wrapper around `std::fs::File`
#[derive(Debug)]
pub struct File {
    inner: fs::File,
    host_path: PathBuf,
    mode: OpenMode,
}

impl File {
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }
}

impl FsFile for File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.mode.read() {
            return Err(FsError::PermissionDenied);
        }

        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(Into::into),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }

        loop {
            match self.inner.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                result => return result.map_err(Into::into),
            }
        }
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }

        self.inner.set_len(size).map_err(Into::into)
    }

    fn eof(&self) -> bool {
        let mut file = &self.inner;
        match (file.stream_position(), file.metadata()) {
            (Ok(position), Ok(metadata)) => position >= metadata.len(),
            _ => true,
        }
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        trace!(path = %self.host_path.display(), "closing host file");
        self.inner.flush()?;
        if self.mode.writable() {
            self.inner.sync_data()?;
        }
        Ok(())
    }
}

/// An open host directory listing, sorted by name.
#[derive(Debug)]
pub struct DirHandle {
    host_path: PathBuf,
    config: FsConfig,
    entries: Vec<DirItem>,
    index: usize,
}

impl FsDir for DirHandle {
    fn rewind(&mut self) -> Result<()> {
        self.entries = list(&self.host_path, &self.config)?;
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
        Ok(())
    }
}
