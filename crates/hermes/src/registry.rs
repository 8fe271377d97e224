//! Process-wide registry of open services, for graceful shutdown.
//!
//! The registry weakly holds each open handle's cancellation flag keyed by
//! canonical store path. It exists solely so a shutdown hook can cancel
//! in-flight streams; it never keeps a store alive.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

static REGISTRY: Mutex<Vec<(PathBuf, Weak<AtomicBool>)>> = Mutex::new(Vec::new());

/// Registers a newly opened service and returns its cancellation flag.
pub(crate) fn register(path: &Path) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let mut registry = REGISTRY.lock();
    registry.retain(|(_, weak)| weak.strong_count() > 0);
    registry.push((path.to_path_buf(), Arc::downgrade(&flag)));
    flag
}

/// Removes a closed service from the registry.
pub(crate) fn deregister(path: &Path) {
    let mut registry = REGISTRY.lock();
    registry.retain(|(p, weak)| p != path && weak.strong_count() > 0);
}

/// Paths of services currently open in this process.
pub fn open_services() -> Vec<PathBuf> {
    REGISTRY
        .lock()
        .iter()
        .filter(|(_, weak)| weak.strong_count() > 0)
        .map(|(path, _)| path.clone())
        .collect()
}

/// Cancels every in-flight stream of every open service.
pub fn shutdown_all() {
    for (_, weak) in REGISTRY.lock().iter() {
        if let Some(flag) = weak.upgrade() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}
