use std::str::FromStr;

use crate::FsError;

/// How a file is opened.
///
/// Usually parsed from an `fopen`-style mode string; the builder methods
/// exist for callers that want something the strings cannot express, such
/// as write access without truncation on a missing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    read: bool,
    write: bool,
    create: bool,
    truncate: bool,
    append: bool,
}

impl OpenMode {
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
            create: false,
            truncate: false,
            append: false,
        }
    }

    pub const fn read(&self) -> bool {
        self.read
    }

    pub const fn write(&self) -> bool {
        self.write
    }

    pub const fn create(&self) -> bool {
        self.create
    }

    pub const fn truncate(&self) -> bool {
        self.truncate
    }

    pub const fn append(&self) -> bool {
        self.append
    }

    pub const fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub const fn with_write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    pub const fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub const fn with_truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub const fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Whether the file has to exist already.
    pub const fn must_exist(&self) -> bool {
        !self.create
    }

    /// Whether the file may be modified through the handle.
    pub const fn writable(&self) -> bool {
        self.write || self.append
    }
}

impl FromStr for OpenMode {
    type Err = FsError;

    /// Accepts `r`, `w` or `a`, followed by `+` and `b` in any order, each at
    /// most once.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let mut mode = match chars.next() {
            Some('r') => OpenMode::new().with_read(true),
            Some('w') => OpenMode::new()
                .with_write(true)
                .with_create(true)
                .with_truncate(true),
            Some('a') => OpenMode::new()
                .with_write(true)
                .with_create(true)
                .with_append(true),
            _ => return Err(FsError::InvalidMode),
        };

        let mut plus = false;
        let mut binary = false;
        for c in chars {
            match c {
                '+' if !plus => plus = true,
                'b' if !binary => binary = true,
                _ => return Err(FsError::InvalidMode),
            }
        }

        if plus {
            mode.read = true;
            mode.write = true;
        }

        Ok(mode)
    }
}

#[cfg(test)]
mod test_mode {
    use super::*;

    #[test]
    fn test_parse_plain_modes() {
        let r: OpenMode = "rb".parse().unwrap();
        assert!(r.read() && !r.write() && !r.create() && r.must_exist());

        let w: OpenMode = "wb".parse().unwrap();
        assert!(!w.read() && w.write() && w.create() && w.truncate());

        let a: OpenMode = "a".parse().unwrap();
        assert!(a.append() && a.create() && !a.truncate() && a.writable());
    }

    #[test]
    fn test_parse_update_modes() {
        let r: OpenMode = "r+b".parse().unwrap();
        assert!(r.read() && r.write() && r.must_exist());
        assert_eq!("rb+".parse::<OpenMode>(), Ok(r));

        let w: OpenMode = "w+".parse().unwrap();
        assert!(w.read() && w.write() && w.truncate());

        let a: OpenMode = "ab+".parse().unwrap();
        assert!(a.read() && a.append());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "x", "rr", "r++", "wbb", "br", "rw"] {
            assert_eq!(bad.parse::<OpenMode>(), Err(FsError::InvalidMode), "{bad}");
        }
    }
}
