//! Ctrl-C watcher.
//!
//! Runs a single-threaded tokio runtime on a background thread and trips a
//! `CancellationToken` when an interrupt arrives.

use std::thread;

use crate::domain::{AppError, CancellationToken, Result};

/// Spawns the watcher thread.
///
/// # Errors
/// Returns error if the runtime or the thread cannot be created.
pub fn watch_interrupts(token: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::io("Failed to start interrupt watcher", e))?;

    thread::Builder::new()
        .name("interrupt-watcher".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("Interrupt received, stopping after the current attachment");
                        token.cancel();
                    }
                    Err(e) => tracing::warn!("Failed to listen for interrupts: {e}"),
                }
            });
        })
        .map_err(|e| AppError::io("Failed to spawn interrupt watcher", e))?;

    Ok(())
}
