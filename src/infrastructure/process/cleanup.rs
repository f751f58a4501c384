//! Signal handling and end-of-run cleanup.
//!
//! One global cleanup routine serves the normal exit path and the
//! INT/TERM/HUP handlers: stop the spinner, kill every live child process
//! group, remove the transient files the run created. It is idempotent and
//! safe to run partially.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use indicatif::ProgressBar;
use tracing::warn;

use crate::infrastructure::process::runner::kill_process_group_blocking;

fn interrupt_flag() -> &'static AtomicBool {
    static FLAG: OnceLock<AtomicBool> = OnceLock::new();
    FLAG.get_or_init(|| AtomicBool::new(false))
}

fn child_registry() -> &'static Mutex<HashSet<i32>> {
    static REGISTRY: OnceLock<Mutex<HashSet<i32>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

fn transient_files() -> &'static Mutex<HashSet<PathBuf>> {
    static FILES: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    FILES.get_or_init(|| Mutex::new(HashSet::new()))
}

fn active_spinner() -> &'static Mutex<Option<ProgressBar>> {
    static SPINNER: OnceLock<Mutex<Option<ProgressBar>>> = OnceLock::new();
    SPINNER.get_or_init(|| Mutex::new(None))
}

/// Whether an interrupt signal arrived.
pub fn is_interrupted() -> bool {
    interrupt_flag().load(Ordering::Relaxed)
}

/// Record a live child process group.
pub fn register_child(pgid: i32) {
    if let Ok(mut registry) = child_registry().lock() {
        registry.insert(pgid);
    }
}

/// Forget a reaped child process group.
pub fn unregister_child(pgid: i32) {
    if let Ok(mut registry) = child_registry().lock() {
        registry.remove(&pgid);
    }
}

/// Record a file to delete on exit (status file, backup, capture temp).
pub fn register_transient(path: &Path) {
    if let Ok(mut files) = transient_files().lock() {
        files.insert(path.to_path_buf());
    }
}

/// Remove a file from the exit-time delete list (already cleaned up).
pub fn unregister_transient(path: &Path) {
    if let Ok(mut files) = transient_files().lock() {
        files.remove(path);
    }
}

/// Hand the cleanup routine the currently drawn spinner, or `None` once a
/// phase ends. The handler clears it so a killed run leaves a sane terminal.
pub fn set_active_spinner(spinner: Option<ProgressBar>) {
    if let Ok(mut slot) = active_spinner().lock() {
        *slot = spinner;
    }
}

/// Run the cleanup routine: spinner, children, transient files.
pub fn run_cleanup() {
    if let Ok(mut slot) = active_spinner().lock() {
        if let Some(spinner) = slot.take() {
            spinner.finish_and_clear();
        }
    }

    let pgids: Vec<i32> = match child_registry().lock() {
        Ok(registry) => registry.iter().copied().collect(),
        Err(_) => Vec::new(),
    };
    for pgid in pgids {
        kill_process_group_blocking(pgid);
        unregister_child(pgid);
    }

    let files: Vec<PathBuf> = match transient_files().lock() {
        Ok(files) => files.iter().cloned().collect(),
        Err(_) => Vec::new(),
    };
    for path in files {
        let _ = std::fs::remove_file(&path);
        unregister_transient(&path);
    }
}

/// Install INT/TERM/HUP handlers that clean up and exit.
///
/// Call once at binary startup, inside the tokio runtime.
pub fn install_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    for (kind, code) in [
        (SignalKind::interrupt(), 130),
        (SignalKind::terminate(), 143),
        (SignalKind::hangup(), 129),
    ] {
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    stream.recv().await;
                    interrupt_flag().store(true, Ordering::Relaxed);
                    warn!("signal received; cleaning up");
                    run_cleanup();
                    std::process::exit(code);
                });
            }
            Err(e) => warn!("failed to install signal handler: {e}"),
        }
    }
}
