//! Screenshot directory watcher
//!
//! Wraps a non-recursive `notify` watcher. Creation events for image files are
//! handed to a dispatch callback after a short settle delay, one at a time, on
//! the thread that calls [`ScreenshotWatcher::run`].

use notify::event::CreateKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::constants::screenshots::SHUTDOWN_POLL_MS;
use crate::screenshot::is_image_path;

pub struct ScreenshotWatcher {
    // Dropping the watcher stops the OS subscription
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    settle_delay: Duration,
}

impl ScreenshotWatcher {
    pub fn new(dir: &Path, settle_delay: Duration) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(dir = %dir.display(), "Watching screenshot directory");

        Ok(Self {
            _watcher: watcher,
            rx,
            settle_delay,
        })
    }

    /// Dispatch new screenshots until `stop` is set
    pub fn run(self, stop: &AtomicBool, dispatch: impl FnMut(PathBuf)) {
        let ScreenshotWatcher {
            _watcher,
            rx,
            settle_delay,
        } = self;
        drain_events(&rx, stop, settle_delay, dispatch);
        info!("Stopped watching screenshot directory");
    }
}

/// Image files created by this event (folders and other kinds are ignored)
pub fn created_screenshots(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| is_image_path(path) && !path.is_dir())
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// The watch loop proper. Returns when `stop` is set or the sender side is gone.
fn drain_events(
    rx: &Receiver<notify::Result<Event>>,
    stop: &AtomicBool,
    settle_delay: Duration,
    mut dispatch: impl FnMut(PathBuf),
) {
    let poll = Duration::from_millis(SHUTDOWN_POLL_MS);

    while !stop.load(Ordering::Relaxed) {
        let event = match rx.recv_timeout(poll) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                error!(error = %e, "Watch error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        for path in created_screenshots(&event) {
            debug!(path = %path.display(), delay_ms = settle_delay.as_millis() as u64, "New screenshot, waiting for writer to finish");
            // Let the capture tool finish writing before we decode
            thread::sleep(settle_delay);
            dispatch(path);
        }
    }
}
