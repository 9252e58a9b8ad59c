use std::sync::Arc;

use awtk_vsf_port::{HostOps, PortError};
use pretty_assertions::assert_eq;
use tk_fs::mem_fs;

#[test]
fn init_after_the_default_filesystem_was_used() {
    let _host = tk_fs::os_fs();

    let ops = HostOps::std().with_os_fs(|| Arc::new(mem_fs::FileSystem::default()));
    assert_eq!(awtk_vsf_port::init(ops), Err(PortError::DefaultFsTaken));

    // the rest of the bundle is still installed
    assert!(awtk_vsf_port::ops().is_ok());
    assert_eq!(
        awtk_vsf_port::init(HostOps::std()),
        Err(PortError::AlreadyInitialized)
    );
}
