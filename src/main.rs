//! clipcards - Clipboard watcher
//!
//! Logs every clipboard change until interrupted.
//! Usage: clipcards [settings.json]

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use clipcards::clipboard::{ClipboardLock, Handler, Monitor, MonitorEvent, PlatformClipboard};
use clipcards::config::init_settings;
use clipcards::storage::ClipHistory;

fn main() {
    clipcards::init_logging();
    log::info!("clipcards starting...");

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    if let Err(e) = init_settings(settings_path.as_deref()) {
        log::error!("Failed to load settings, using defaults: {}", e);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(watch());
    log::info!("clipcards stopped");
}

async fn watch() {
    let history = Arc::new(Mutex::new(ClipHistory::new()));
    let handler = Handler::new(PlatformClipboard::default(), ClipboardLock::new());

    let recorder = Arc::clone(&history);
    let monitor = Monitor::new(handler, move |event| {
        if let MonitorEvent::NewClip(clip) = &event {
            for datum in clip {
                log::info!("  {}", datum);
            }
        }
        recorder.lock().record(event);
    });

    let (handle, commands) = clipcards::clipboard::monitor::channel();
    let running = tokio::spawn(monitor.run(commands));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for interrupt: {}", e);
    }
    handle.stop().await;
    if let Err(e) = running.await {
        log::error!("Monitor task failed: {}", e);
    }

    let history = history.lock();
    log::info!("Captured {} distinct clip(s) this session", history.len());
    for entry in history.iter() {
        log::info!("  {} {}", entry.captured_at.format("%H:%M:%S%.3f"), entry.clip);
    }
}
