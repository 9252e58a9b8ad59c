use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::FileSystem;

static OS_FS: OnceCell<Arc<dyn FileSystem>> = OnceCell::new();

/// The process-wide default filesystem.
///
/// Falls back to the unscoped host filesystem when nothing was installed
/// with [`set_os_fs`] before the first call. Code that can take a
/// filesystem as an argument should prefer that over calling this.
pub fn os_fs() -> Arc<dyn FileSystem> {
    OS_FS
        .get_or_init(|| {
            debug!("no default filesystem installed, using the host filesystem");
            Arc::new(crate::host_fs::FileSystem::new())
        })
        .clone()
}

/// Installs the process-wide default filesystem.
///
/// This works once, and only before the first [`os_fs`] call. Later calls
/// hand `fs` back unchanged.
pub fn set_os_fs(fs: Arc<dyn FileSystem>) -> Result<(), Arc<dyn FileSystem>> {
    OS_FS.set(fs)?;
    debug!("default filesystem installed");
    Ok(())
}
