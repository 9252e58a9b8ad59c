//! Binds `tk-fs` to the runtime embedding it.
//!
//! The embedder hands over a [`HostOps`] bundle once, through [`init`].
//! After that the bundle's primitives are reachable from anywhere in the
//! process, and its filesystem is the `tk-fs` default.
//!
//! ```
//! use std::sync::Arc;
//!
//! use awtk_vsf_port::HostOps;
//! use tk_fs::mem_fs;
//!
//! let ops = HostOps::std().with_os_fs(|| Arc::new(mem_fs::FileSystem::default()));
//! awtk_vsf_port::init(ops).unwrap();
//!
//! tk_fs::file_write("/hello.txt", b"hi").unwrap();
//! assert!(tk_fs::file_exists("/hello.txt"));
//! ```

pub mod logging;

use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;
use tk_fs::FileSystem;
use tracing::{debug, warn};

type PrintFn = dyn Fn(fmt::Arguments<'_>) + Send + Sync;
type SleepFn = dyn Fn(u32) + Send + Sync;
type TimeFn = dyn Fn() -> u64 + Send + Sync;
type CompareFn = dyn Fn(&str, &str) -> Ordering + Send + Sync;
type FsFactory = dyn Fn() -> Arc<dyn FileSystem> + Send + Sync;

static OPS: OnceCell<HostOps> = OnceCell::new();
static START: Lazy<Instant> = Lazy::new(Instant::now);

/// The primitives an embedding runtime provides.
///
/// Start from [`HostOps::std`] and replace the pieces the host does
/// differently.
pub struct HostOps {
    print: Box<PrintFn>,
    sleep_ms: Box<SleepFn>,
    time_ms: Box<TimeFn>,
    compare_ignore_case: Box<CompareFn>,
    os_fs: Box<FsFactory>,
}

impl HostOps {
    /// A bundle backed by the standard library and the host filesystem.
    pub fn std() -> Self {
        Self {
            print: Box::new(|args| {
                let mut out = std::io::stdout().lock();
                let _ = out.write_fmt(args);
                let _ = out.flush();
            }),
            sleep_ms: Box::new(|ms| std::thread::sleep(Duration::from_millis(ms.into()))),
            time_ms: Box::new(|| START.elapsed().as_millis() as u64),
            compare_ignore_case: Box::new(ascii_compare_ignore_case),
            os_fs: Box::new(|| Arc::new(tk_fs::host_fs::FileSystem::new())),
        }
    }

    pub fn with_print(mut self, f: impl Fn(fmt::Arguments<'_>) + Send + Sync + 'static) -> Self {
        self.print = Box::new(f);
        self
    }

    pub fn with_sleep_ms(mut self, f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.sleep_ms = Box::new(f);
        self
    }

    /// `f` must never go backwards.
    pub fn with_time_ms(mut self, f: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.time_ms = Box::new(f);
        self
    }

    pub fn with_compare_ignore_case(
        mut self,
        f: impl Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.compare_ignore_case = Box::new(f);
        self
    }

    /// Sets the factory for the filesystem [`init`] installs as the default.
    pub fn with_os_fs(mut self, f: impl Fn() -> Arc<dyn FileSystem> + Send + Sync + 'static) -> Self {
        self.os_fs = Box::new(f);
        self
    }

    pub fn print(&self, args: fmt::Arguments<'_>) {
        (self.print)(args)
    }

    pub fn sleep_ms(&self, ms: u32) {
        (self.sleep_ms)(ms)
    }

    /// Milliseconds on a monotonic clock with an arbitrary origin.
    pub fn time_ms(&self) -> u64 {
        (self.time_ms)()
    }

    pub fn compare_ignore_case(&self, a: &str, b: &str) -> Ordering {
        (self.compare_ignore_case)(a, b)
    }

    pub fn os_fs(&self) -> Arc<dyn FileSystem> {
        (self.os_fs)()
    }
}

impl fmt::Debug for HostOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostOps").finish_non_exhaustive()
    }
}

/// Compares two strings byte by byte with ASCII letters folded to lower case.
pub fn ascii_compare_ignore_case(a: &str, b: &str) -> Ordering {
    let a = a.bytes().map(|b| b.to_ascii_lowercase());
    let b = b.bytes().map(|b| b.to_ascii_lowercase());
    a.cmp(b)
}

#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortError {
    #[error("the host port is already initialized")]
    AlreadyInitialized,
    #[error("the host port is not initialized")]
    NotInitialized,
    /// The default filesystem was fixed before [`init`] could install one.
    #[error("the default filesystem is already in use")]
    DefaultFsTaken,
    #[error("a global tracing subscriber is already installed")]
    SubscriberTaken,
}

/// Installs the host bundle for the rest of the process.
///
/// Works once. The bundle's filesystem becomes the `tk-fs` default, which
/// requires that nothing called [`tk_fs::os_fs`] earlier; when something
/// did, the bundle stays installed and [`PortError::DefaultFsTaken`] is
/// returned. A call rejected as `AlreadyInitialized` never runs the
/// bundle's filesystem factory.
pub fn init(ops: HostOps) -> Result<(), PortError> {
    OPS.set(ops).map_err(|_| PortError::AlreadyInitialized)?;

    if tk_fs::set_os_fs(self::ops()?.os_fs()).is_err() {
        warn!("the default filesystem was already chosen, keeping it");
        return Err(PortError::DefaultFsTaken);
    }

    debug!("host port initialized");
    Ok(())
}

/// The bundle passed to [`init`].
pub fn ops() -> Result<&'static HostOps, PortError> {
    OPS.get().ok_or(PortError::NotInitialized)
}

/// Prints through the host. Used by [`host_print!`].
pub fn print(args: fmt::Arguments<'_>) -> Result<(), PortError> {
    ops()?.print(args);
    Ok(())
}

pub fn sleep_ms(ms: u32) -> Result<(), PortError> {
    ops()?.sleep_ms(ms);
    Ok(())
}

pub fn time_ms() -> Result<u64, PortError> {
    Ok(ops()?.time_ms())
}

pub fn compare_ignore_case(a: &str, b: &str) -> Result<Ordering, PortError> {
    Ok(ops()?.compare_ignore_case(a, b))
}

/// Formats its arguments like `print!` and hands them to the host.
///
/// Evaluates to `Err(PortError::NotInitialized)` before [`init`].
#[macro_export]
macro_rules! host_print {
    ($($arg:tt)*) => {
        $crate::print(::std::format_args!($($arg)*))
    };
}
