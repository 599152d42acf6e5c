// src/progress.rs

//! Progress reporting for long-running export and import runs
//!
//! The `ProgressTracker` trait is what the engine talks to. Implementations:
//! - `CliProgress`: indicatif progress bar for interactive use
//! - `LogProgress`: logs progress to tracing
//! - `SilentProgress`: no-op for scripted runs and tests
//! - `CallbackProgress`: forwards events to a closure

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Core trait for progress tracking
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Increment progress by the given amount
    fn increment(&self, amount: u64);

    /// Set the total (length) of the progress
    fn set_length(&self, length: u64);

    fn position(&self) -> u64;

    fn length(&self) -> u64;

    /// Finish progress successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish progress with an error/abandonment message
    fn finish_with_error(&self, message: &str);

    fn is_finished(&self) -> bool;
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn finish_with_error(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Logging progress tracker
///
/// Logs roughly every tenth of the total at info level.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl LogProgress {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(length),
            finished: AtomicBool::new(false),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let old_pos = self.position.fetch_add(amount, Ordering::Relaxed);
        let new_pos = old_pos + amount;
        let length = self.length.load(Ordering::Relaxed);
        let interval = std::cmp::max(1, length / 10);

        if length > 0 && new_pos / interval > old_pos / interval {
            let percent = (new_pos * 100) / length;
            info!("{}: {}% ({}/{})", self.name, percent, new_pos, length);
        }
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: ERROR - {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Interactive progress bar
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(operation: &str, length: u64) -> Self {
        let bar = ProgressBar::new(length);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg:30} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_message(operation.to_string());
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("ERROR: {message}"));
    }

    fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

/// Events emitted by callback progress tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message(String),
    Position { current: u64, total: u64 },
    Finished(String),
    Error(String),
}

/// Callback-based progress tracker
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(length: u64, callback: F) -> Self {
        Self {
            callback,
            position: AtomicU64::new(0),
            length: AtomicU64::new(length),
            finished: AtomicBool::new(false),
        }
    }
}

impl<F> ProgressTracker for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn set_message(&self, message: &str) {
        (self.callback)(ProgressEvent::Message(message.to_string()));
    }

    fn increment(&self, amount: u64) {
        let current = self.position.fetch_add(amount, Ordering::Relaxed) + amount;
        let total = self.length.load(Ordering::Relaxed);
        (self.callback)(ProgressEvent::Position { current, total });
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        (self.callback)(ProgressEvent::Finished(message.to_string()));
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        (self.callback)(ProgressEvent::Error(message.to_string()));
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}
