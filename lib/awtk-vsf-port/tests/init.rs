//! `init` is process-wide, so the whole lifecycle runs in one test.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use awtk_vsf_port::{HostOps, PortError, host_print};
use pretty_assertions::assert_eq;
use tk_fs::{FileSystem, mem_fs};

#[test]
fn init_lifecycle() {
    assert_eq!(awtk_vsf_port::ops().map(|_| ()), Err(PortError::NotInitialized));
    assert_eq!(host_print!("dropped"), Err(PortError::NotInitialized));
    assert_eq!(awtk_vsf_port::time_ms(), Err(PortError::NotInitialized));

    let printed = Arc::new(Mutex::new(String::new()));
    let sink = printed.clone();
    let mem = mem_fs::FileSystem::default();
    let shared = mem.clone();

    let ops = HostOps::std()
        .with_print(move |args| sink.lock().unwrap().push_str(&args.to_string()))
        .with_time_ms(|| 1_000)
        .with_os_fs(move || Arc::new(shared.clone()));
    awtk_vsf_port::init(ops).unwrap();

    let factory_calls = Arc::new(AtomicUsize::new(0));
    let counter = factory_calls.clone();
    let rejected = HostOps::std().with_os_fs(move || {
        counter.fetch_add(1, AtomicOrdering::SeqCst);
        Arc::new(mem_fs::FileSystem::default())
    });
    assert_eq!(
        awtk_vsf_port::init(rejected),
        Err(PortError::AlreadyInitialized)
    );
    assert_eq!(factory_calls.load(AtomicOrdering::SeqCst), 0);

    host_print!("{} files", 3).unwrap();
    assert_eq!(*printed.lock().unwrap(), "3 files");
    assert_eq!(awtk_vsf_port::time_ms(), Ok(1_000));
    assert_eq!(awtk_vsf_port::sleep_ms(0), Ok(()));
    assert_eq!(
        awtk_vsf_port::compare_ignore_case("README", "readme"),
        Ok(Ordering::Equal)
    );

    // the bundle's filesystem is now the default one
    tk_fs::file_write("/from-default", b"abc").unwrap();
    assert!(mem.file_exists(Path::new("/from-default")));
    assert_eq!(tk_fs::file_read("/from-default").unwrap(), b"abc");
}
