//! Whole-file helpers built on top of [`FileSystem`].
//!
//! The functions taking a `fs` argument work on any filesystem; the `file_*`
//! shorthands use [`os_fs`].

use std::path::Path;

use tracing::{debug, trace};

use crate::{FileSystem, FsError, FsFile, Result, os_fs};

/// Reads until `buf` is full or the file ends.
fn read_fully(file: &mut dyn FsFile, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Reads the whole file.
///
/// The size is looked up first and the buffer allocated up front. If the
/// file shrinks before it is read, the bytes that were there are returned;
/// bytes appended after the size lookup are not read.
pub fn read_file(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();

    let size = fs.file_size(path)?;
    let size = usize::try_from(size).map_err(|_| FsError::OutOfMemory)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| FsError::OutOfMemory)?;
    buf.resize(size, 0);

    let mut file = fs.open(path, "rb")?;
    let read = read_fully(file.as_mut(), &mut buf)?;
    file.close()?;

    if read < size {
        debug!(
            path = %path.display(),
            expected = size,
            read,
            "file shrank while it was being read"
        );
        buf.truncate(read);
    }
    Ok(buf)
}

/// Reads up to `buf.len()` bytes starting at `offset`, returning how many
/// were read. Reading at or past the end returns `0`.
pub fn read_file_part(
    fs: &dyn FileSystem,
    path: impl AsRef<Path>,
    buf: &mut [u8],
    offset: u64,
) -> Result<usize> {
    let mut file = fs.open(path, "rb")?;
    file.seek(offset)?;
    let read = read_fully(file.as_mut(), buf)?;
    file.close()?;

    Ok(read)
}

/// Replaces the content of the file with `data`, creating it if needed.
pub fn write_file(fs: &dyn FileSystem, path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let mut file = fs.open(path, "wb")?;

    let mut written = 0;
    while written < data.len() {
        match file.write(&data[written..])? {
            0 => return Err(FsError::WriteZero),
            n => written += n,
        }
    }
    file.close()?;

    trace!(path = %path.display(), written, "wrote file");
    Ok(())
}

pub fn file_exists(path: impl AsRef<Path>) -> bool {
    os_fs().file_exists(path.as_ref())
}

pub fn file_remove(path: impl AsRef<Path>) -> Result<()> {
    os_fs().remove_file(path.as_ref())
}

pub fn file_get_size(path: impl AsRef<Path>) -> Result<u64> {
    os_fs().file_size(path.as_ref())
}

/// [`read_file`] on the default filesystem.
pub fn file_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    read_file(os_fs().as_ref(), path)
}

/// [`read_file_part`] on the default filesystem.
pub fn file_read_part(path: impl AsRef<Path>, buf: &mut [u8], offset: u64) -> Result<usize> {
    read_file_part(os_fs().as_ref(), path, buf, offset)
}

/// [`write_file`] on the default filesystem.
pub fn file_write(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    write_file(os_fs().as_ref(), path, data)
}

#[cfg(test)]
mod test_ops {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mem_fs::{self, MemFsConfig};
    use crate::{DiskInfo, FsDir, OpenMode};

    /// Hands out at most `chunk` bytes per read or write, and can be told
    /// to fail reads after a number of calls.
    #[derive(Debug)]
    struct Trickle {
        inner: Box<dyn FsFile>,
        chunk: usize,
        fail_read_after: Option<usize>,
    }

    impl FsFile for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if let Some(left) = self.fail_read_after.as_mut() {
                if *left == 0 {
                    return Err(FsError::IOError);
                }
                *left -= 1;
            }
            let len = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..len])
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            let len = buf.len().min(self.chunk);
            self.inner.write(&buf[..len])
        }

        fn seek(&mut self, offset: u64) -> Result<()> {
            self.inner.seek(offset)
        }

        fn truncate(&mut self, size: u64) -> Result<()> {
            self.inner.truncate(size)
        }

        fn eof(&self) -> bool {
            self.inner.eof()
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.inner.close()
        }
    }

    #[derive(Debug, Default)]
    struct TrickleFs {
        inner: mem_fs::FileSystem,
        fail_read_after: Option<usize>,
        /// Reported by `file_size` in place of the real size.
        claimed_size: Option<u64>,
    }

    impl FileSystem for TrickleFs {
        fn open_file(&self, path: &Path, mode: OpenMode) -> Result<Box<dyn FsFile>> {
            Ok(Box::new(Trickle {
                inner: self.inner.open_file(path, mode)?,
                chunk: 3,
                fail_read_after: self.fail_read_after,
            }))
        }

        fn remove_file(&self, path: &Path) -> Result<()> {
            self.inner.remove_file(path)
        }

        fn file_exists(&self, path: &Path) -> bool {
            self.inner.file_exists(path)
        }

        fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.rename_file(from, to)
        }

        fn open_dir(&self, path: &Path) -> Result<Box<dyn FsDir>> {
            self.inner.open_dir(path)
        }

        fn create_dir(&self, path: &Path) -> Result<()> {
            self.inner.create_dir(path)
        }

        fn remove_dir(&self, path: &Path) -> Result<()> {
            self.inner.remove_dir(path)
        }

        fn dir_exists(&self, path: &Path) -> bool {
            self.inner.dir_exists(path)
        }

        fn rename_dir(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.rename_dir(from, to)
        }

        fn file_size(&self, path: &Path) -> Result<u64> {
            match self.claimed_size {
                Some(size) => Ok(size),
                None => self.inner.file_size(path),
            }
        }

        fn disk_info(&self, volume: &Path) -> Result<DiskInfo> {
            self.inner.disk_info(volume)
        }

        fn cwd(&self) -> Result<PathBuf> {
            self.inner.cwd()
        }

        fn exe(&self) -> Result<PathBuf> {
            self.inner.exe()
        }
    }

    #[test]
    fn test_round_trip() {
        let fs = mem_fs::FileSystem::default();

        for data in [
            &b""[..],
            &b"x"[..],
            &b"hello world"[..],
            &[0u8, 255, 1, 254][..],
        ] {
            write_file(&fs, "/data.bin", data).unwrap();
            assert_eq!(read_file(&fs, "/data.bin").unwrap(), data);
            assert_eq!(fs.file_size(Path::new("/data.bin")), Ok(data.len() as u64));
        }
    }

    #[test]
    fn test_short_reads_and_writes_are_looped_over() {
        let fs = TrickleFs::default();
        let data = b"a payload longer than one chunk".to_vec();

        write_file(&fs, "/f", &data).unwrap();
        assert_eq!(fs.file_size(Path::new("/f")), Ok(data.len() as u64));
        assert_eq!(read_file(&fs, "/f").unwrap(), data);

        let mut buf = [0u8; 10];
        assert_eq!(read_file_part(&fs, "/f", &mut buf, 2), Ok(10));
        assert_eq!(&buf, &data[2..12]);
    }

    #[test]
    fn test_read_errors_propagate() {
        let fs = TrickleFs {
            fail_read_after: Some(2),
            ..Default::default()
        };
        write_file(&fs, "/f", b"0123456789").unwrap();

        assert_eq!(read_file(&fs, "/f"), Err(FsError::IOError));
    }

    #[test]
    fn test_read_fails_cleanly_when_the_buffer_can_not_be_allocated() {
        let fs = TrickleFs {
            claimed_size: Some(u64::MAX),
            ..Default::default()
        };
        write_file(&fs, "/huge", b"tiny").unwrap();

        assert_eq!(read_file(&fs, "/huge"), Err(FsError::OutOfMemory));
        // nothing was left open or changed
        assert_eq!(fs.inner.file_size(Path::new("/huge")), Ok(4));
        assert_eq!(read_file(&fs.inner, "/huge").unwrap(), b"tiny");
    }

    #[test]
    fn test_read_missing_file() {
        let fs = mem_fs::FileSystem::default();

        assert_eq!(read_file(&fs, "/missing"), Err(FsError::EntryNotFound));
        let mut buf = [0u8; 4];
        assert_eq!(
            read_file_part(&fs, "/missing", &mut buf, 0),
            Err(FsError::EntryNotFound)
        );
    }

    #[test]
    fn test_read_file_part() {
        let fs = mem_fs::FileSystem::default();
        let content = b"0123456789";
        write_file(&fs, "/digits", content).unwrap();

        for (size, offset) in [(4usize, 0u64), (4, 8), (10, 3), (0, 5), (3, 10), (3, 12)] {
            let mut buf = vec![0u8; size];
            let start = (offset as usize).min(content.len());
            let expected = size.min(content.len() - start);

            let read = read_file_part(&fs, "/digits", &mut buf, offset).unwrap();
            assert_eq!(read, expected, "size {size} offset {offset}");
            assert_eq!(&buf[..read], &content[start..start + read]);
        }
    }

    #[test]
    fn test_write_fails_when_storage_runs_out() {
        let fs = mem_fs::FileSystem::new(MemFsConfig {
            capacity: Some(4),
            ..Default::default()
        });

        assert_eq!(
            write_file(&fs, "/big", b"more than four bytes"),
            Err(FsError::StorageFull)
        );
        assert_eq!(write_file(&fs, "/big", b"four"), Ok(()));
    }

    #[test]
    fn test_write_into_missing_directory() {
        let fs = mem_fs::FileSystem::default();

        assert_eq!(
            write_file(&fs, "/no/such/dir/file", b"x"),
            Err(FsError::EntryNotFound)
        );
    }
}
