//! Transient answer overlay running on its own UI thread
//!
//! The watch thread only ever holds an [`OverlayHandle`] and posts commands;
//! the X11 connection, the window and the display state live on the
//! overlay thread.

mod font;
mod font_discovery;
mod state;
mod window;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;

use crate::config::OverlayConfig;
use crate::constants::overlay;
use crate::x11_utils::CachedAtoms;
use font::FontRenderer;
use state::DisplayState;
use window::AnswerWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Normal,
    Warning,
}

/// Anything that can put answer text in front of the user
pub trait AnswerSink {
    fn show(&self, text: &str, duration: Duration, style: Style);
}

#[derive(Debug, PartialEq)]
pub enum OverlayCommand {
    Show {
        text: String,
        style: Style,
        duration: Duration,
    },
    Hide,
    Shutdown,
}

/// Fire-and-forget sender for overlay commands, cheap to clone
///
/// Commands posted before the window exists queue up in the channel and are
/// drained once the UI thread is ready.
#[derive(Clone)]
pub struct OverlayHandle {
    tx: Sender<OverlayCommand>,
    ready: Arc<AtomicBool>,
}

impl OverlayHandle {
    fn send(&self, command: OverlayCommand) {
        if !self.ready.load(Ordering::Acquire) {
            warn!("Overlay is not ready yet, display request queued");
        }
        if self.tx.send(command).is_err() {
            warn!("Overlay thread has exited, dropping display request");
        }
    }
}

impl AnswerSink for OverlayHandle {
    fn show(&self, text: &str, duration: Duration, style: Style) {
        self.send(OverlayCommand::Show {
            text: text.to_string(),
            style,
            duration,
        });
    }
}

pub struct Overlay {
    control: Sender<OverlayCommand>,
    // Set by the UI thread once its window exists, however late
    ready: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Overlay {
    /// Start the UI thread and wait (bounded) for the window to exist
    pub fn spawn(config: OverlayConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let ready = Arc::new(AtomicBool::new(false));
        let ui_ready = Arc::clone(&ready);

        let thread = match thread::Builder::new()
            .name("overlay".to_string())
            .spawn(move || {
                if let Err(e) = run_ui(&config, &rx, &ui_ready, ready_tx) {
                    error!(error = ?e, "Overlay thread failed");
                }
            }) {
            Ok(thread) => Some(thread),
            Err(e) => {
                error!(error = %e, "Failed to spawn overlay thread");
                None
            }
        };

        if thread.is_some() {
            let timeout = Duration::from_millis(overlay::READY_TIMEOUT_MS);
            match ready_rx.recv_timeout(timeout) {
                Ok(()) => info!("Overlay ready"),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(timeout_ms = overlay::READY_TIMEOUT_MS, "Overlay not ready yet, answers will queue until it is")
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Overlay failed to start, answers will not be displayed")
                }
            }
        }

        Self {
            control: tx,
            ready,
            thread,
        }
    }

    pub fn handle(&self) -> OverlayHandle {
        OverlayHandle {
            tx: self.control.clone(),
            ready: Arc::clone(&self.ready),
        }
    }

    /// Withdraw the window now (idempotent)
    pub fn hide(&self) {
        let _ = self.control.send(OverlayCommand::Hide);
    }

    /// Stop the UI thread, which tears the window down on its way out
    pub fn destroy(mut self) {
        self.hide();
        let _ = self.control.send(OverlayCommand::Shutdown);
        let Some(thread) = self.thread.take() else {
            return;
        };
        // A thread still stuck in startup is left detached
        if !self.ready.load(Ordering::Acquire) && !thread.is_finished() {
            debug!("Overlay thread still starting, not waiting for it");
            return;
        }
        if thread.join().is_err() {
            error!("Overlay thread panicked");
        }
        debug!("Overlay destroyed");
    }
}

fn run_ui(
    config: &OverlayConfig,
    rx: &Receiver<OverlayCommand>,
    ready: &AtomicBool,
    ready_tx: SyncSender<()>,
) -> Result<()> {
    let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11 display")?;
    let screen = conn
        .setup()
        .roots
        .get(screen_num)
        .with_context(|| format!("X11 screen {} not found", screen_num))?;
    info!(
        screen = screen_num,
        width = screen.width_in_pixels,
        height = screen.height_in_pixels,
        "Connected to X11"
    );

    let atoms = CachedAtoms::new(&conn).context("Failed to cache X11 atoms")?;
    let font = FontRenderer::load(&config.font, config.text_size).context("Failed to load overlay font")?;
    let mut window = AnswerWindow::new(&conn, screen, &atoms, config, &font)?;

    ready.store(true, Ordering::Release);
    let _ = ready_tx.send(());
    drop(ready_tx);

    let mut state = DisplayState::Hidden;
    let poll = Duration::from_millis(overlay::EVENT_POLL_MS);

    loop {
        let wait = state.remaining(Instant::now()).map_or(poll, |left| left.min(poll));
        match rx.recv_timeout(wait) {
            Ok(OverlayCommand::Show { text, style, duration }) => {
                state.show(&text, style, duration, Instant::now());
                if let Some((text, style)) = state.visible()
                    && let Err(e) = window.show(text, style)
                {
                    error!(error = ?e, "Failed to show overlay");
                }
            }
            Ok(OverlayCommand::Hide) => {
                if state.hide()
                    && let Err(e) = window.hide()
                {
                    error!(error = ?e, "Failed to hide overlay");
                }
            }
            Ok(OverlayCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if state.expire(Instant::now()) {
            debug!("Overlay display time elapsed");
            if let Err(e) = window.hide() {
                error!(error = ?e, "Failed to hide overlay");
            }
        }

        while let Some(event) = conn.poll_for_event().context("Failed to poll X11 events")? {
            if let Event::Expose(expose) = event
                && expose.count == 0
                && let Err(e) = window.redraw()
            {
                error!(error = ?e, "Failed to redraw overlay");
            }
        }
    }

    info!("Overlay thread exiting");
    Ok(())
}
