use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::SharedContent;
use super::filesystem::FileSystemInner;
use crate::{FsError, FsFile, OpenMode, Result};

/// An open in-memory file.
pub struct FileHandle {
    fs: Arc<RwLock<FileSystemInner>>,
    content: SharedContent,
    cursor: u64,
    mode: OpenMode,
}

impl FileHandle {
    pub(super) fn new(
        fs: Arc<RwLock<FileSystemInner>>,
        content: SharedContent,
        mode: OpenMode,
    ) -> Self {
        Self {
            fs,
            content,
            cursor: 0,
            mode,
        }
    }

    fn offset(value: u64) -> Result<usize> {
        usize::try_from(value).map_err(|_| FsError::InvalidInput)
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("cursor", &self.cursor)
            .field("mode", &self.mode)
            .finish()
    }
}

impl FsFile for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.mode.read() {
            return Err(FsError::PermissionDenied);
        }

        let content = self.content.lock();
        let data = &content.data;
        let start = Self::offset(self.cursor)?;
        if start >= data.len() {
            return Ok(0);
        }

        let amount = buf.len().min(data.len() - start);
        buf[..amount].copy_from_slice(&data[start..start + amount]);
        self.cursor += amount as u64;

        Ok(amount)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut fs = self.fs.write();
        let mut content = self.content.lock();

        if self.mode.append() {
            self.cursor = content.data.len() as u64;
        }
        let start = Self::offset(self.cursor)?;

        // bytes past the current end, including any gap left by seeking
        // beyond it, have to come out of the capacity
        let len = content.data.len();
        let end = start.checked_add(buf.len()).ok_or(FsError::InvalidInput)?;
        let growth = end.saturating_sub(len) as u64;
        let granted = if content.unlinked {
            growth
        } else {
            fs.reserve(growth)
        };

        let amount = if granted == growth {
            buf.len()
        } else {
            // only part of the new bytes fit; the gap counts first
            let fits_until = len as u64 + granted;
            (fits_until.saturating_sub(start as u64)) as usize
        };
        if amount == 0 {
            fs.release(granted);
            trace!(cursor = self.cursor, "in-memory filesystem is full");
            return Err(FsError::StorageFull);
        }

        let end = start + amount;
        if end > content.data.len() {
            content.data.resize(end, 0);
        }
        content.data[start..end].copy_from_slice(&buf[..amount]);
        self.cursor = end as u64;

        Ok(amount)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        Self::offset(offset)?;
        self.cursor = offset;
        Ok(())
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        if !self.mode.writable() {
            return Err(FsError::ReadOnly);
        }
        let new_len = Self::offset(size)?;

        let mut fs = self.fs.write();
        let mut content = self.content.lock();
        let len = content.data.len();

        if !content.unlinked {
            if new_len > len {
                let growth = (new_len - len) as u64;
                let granted = fs.reserve(growth);
                if granted < growth {
                    fs.release(granted);
                    return Err(FsError::StorageFull);
                }
            } else {
                fs.release((len - new_len) as u64);
            }
        }
        content.data.resize(new_len, 0);

        Ok(())
    }

    fn eof(&self) -> bool {
        self.cursor >= self.content.lock().data.len() as u64
    }

    fn close(self: Box<Self>) -> Result<()> {
        trace!(cursor = self.cursor, "closing in-memory file");
        Ok(())
    }
}

#[cfg(test)]
mod test_file {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use crate::mem_fs::{FileSystem, MemFsConfig};
    use crate::{FileSystem as FS, FsError, FsFile};

    fn open(fs: &FileSystem, name: &str, mode: &str) -> Box<dyn FsFile> {
        fs.open_file(Path::new(name), mode.parse().unwrap())
            .unwrap()
    }

    #[test]
    fn test_eof_follows_the_cursor() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/a", "wb");
        file.write(b"abc").unwrap();
        file.close().unwrap();

        let mut file = open(&fs, "/a", "rb");
        assert!(!file.eof());

        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf), Ok(2));
        assert!(!file.eof());
        assert_eq!(file.read(&mut buf), Ok(1));
        assert!(file.eof());
        assert_eq!(file.read(&mut buf), Ok(0));
        assert!(file.eof());

        file.seek(1).unwrap();
        assert!(!file.eof());
        file.seek(10).unwrap();
        assert!(file.eof());
        assert_eq!(file.read(&mut buf), Ok(0));
    }

    #[test]
    fn test_access_checks() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/a", "wb");
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Err(FsError::PermissionDenied));
        file.close().unwrap();

        let mut file = open(&fs, "/a", "rb");
        assert_eq!(file.write(b"x"), Err(FsError::ReadOnly));
        assert_eq!(file.truncate(0), Err(FsError::ReadOnly));
    }

    #[test]
    fn test_append_writes_at_the_end() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/log", "wb");
        file.write(b"one").unwrap();
        file.close().unwrap();

        let mut file = open(&fs, "/log", "a+");
        file.seek(0).unwrap();
        file.write(b"two").unwrap();
        file.seek(0).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(file.read(&mut buf), Ok(6));
        assert_eq!(&buf[..6], b"onetwo");
    }

    #[test]
    fn test_update_mode_overwrites_in_place() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/f", "wb");
        file.write(b"hello world").unwrap();
        file.close().unwrap();

        let mut file = open(&fs, "/f", "r+b");
        file.seek(6).unwrap();
        file.write(b"there").unwrap();
        file.close().unwrap();

        let mut file = open(&fs, "/f", "rb");
        let mut buf = [0u8; 32];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello there");
    }

    #[test]
    fn test_write_past_the_end_zero_fills() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/gap", "w+");
        file.seek(3).unwrap();
        file.write(b"x").unwrap();
        file.seek(0).unwrap();

        let mut buf = [0xffu8; 4];
        assert_eq!(file.read(&mut buf), Ok(4));
        assert_eq!(buf, [0, 0, 0, b'x']);
    }

    #[test]
    fn test_truncate() {
        let fs = FileSystem::default();
        let mut file = open(&fs, "/t", "w+");
        file.write(b"abcdef").unwrap();

        file.truncate(2).unwrap();
        assert_eq!(fs.file_size(Path::new("/t")), Ok(2));
        assert!(file.eof(), "cursor is past the new end");

        file.truncate(4).unwrap();
        file.seek(0).unwrap();
        let mut buf = [0xffu8; 8];
        assert_eq!(file.read(&mut buf), Ok(4));
        assert_eq!(&buf[..4], &[b'a', b'b', 0, 0]);
    }

    #[test]
    fn test_short_write_when_full() {
        let fs = FileSystem::new(MemFsConfig {
            capacity: Some(4),
            ..Default::default()
        });
        let mut file = open(&fs, "/full", "wb");

        assert_eq!(file.write(b"abcdef"), Ok(4), "short write");
        assert_eq!(file.write(b"gh"), Err(FsError::StorageFull));
        assert_eq!(file.truncate(8), Err(FsError::StorageFull));

        file.truncate(1).unwrap();
        file.seek(1).unwrap();
        assert_eq!(file.write(b"xyz"), Ok(3));
        assert_eq!(fs.file_size(Path::new("/full")), Ok(4));
    }
}
