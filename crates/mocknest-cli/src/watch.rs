//! Filesystem watcher driving hot reload
//!
//! Watches the catalog path and re-runs the loader on change. A failed
//! reload keeps the previous catalog in place; the error is only logged.

use mocknest_http::ReloadFn;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{error, info, warn};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Spawn the watcher thread. Lives for the rest of the process.
pub fn spawn(path: PathBuf, reload: ReloadFn) {
    std::thread::Builder::new()
        .name("mocknest-watch".to_string())
        .spawn(move || run(path, reload))
        .expect("failed to spawn watcher thread");
}

fn run(path: PathBuf, reload: ReloadFn) {
    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("failed to create filesystem watcher: {}", e);
            return;
        }
    };
    if let Err(e) = watcher.watch(&path, RecursiveMode::Recursive) {
        error!("failed to watch {}: {}", path.display(), e);
        return;
    }
    info!("watching {} for changes", path.display());

    loop {
        let event = match rx.recv() {
            Ok(event) => event,
            Err(_) => return,
        };
        if !is_relevant(&event) {
            continue;
        }
        // Editors fire bursts of events per save; collapse them.
        while rx.recv_timeout(DEBOUNCE).is_ok() {}

        match reload() {
            Ok(count) => info!("hot reload applied: {} mocks active", count),
            Err(e) => warn!("hot reload failed, keeping previous catalog: {}", e),
        }
    }
}

fn is_relevant(event: &notify::Result<Event>) -> bool {
    match event {
        Ok(event) => matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ),
        Err(_) => false,
    }
}
