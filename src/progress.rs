//! Progress bar display for provisioning runs
//!
//! The total size is not known up front: it depends on which optional steps
//! the configuration enabled and on how many files are embedded. Callers grow
//! it with [`ProgressTracker::set_size`] and [`ProgressTracker::add_size`]
//! before stepping through the work.

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "[{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Bounded counter with a mutable total and a status message
///
/// The bar is finalized exactly once, either by [`ProgressTracker::stop`] or
/// when the tracker is dropped, so every exit path leaves the terminal clean.
pub struct ProgressTracker {
    bar: ProgressBar,
    stopped: bool,
}

impl ProgressTracker {
    /// Create a visible progress bar with an initial message
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message.to_string());

        Self { bar, stopped: false }
    }

    /// Create a tracker that keeps count without drawing anything
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            stopped: false,
        }
    }

    /// Set the total size to exactly `size`
    pub fn set_size(&self, size: u64) {
        self.bar.set_length(size);
    }

    /// Grow the total size by `delta`
    pub fn add_size(&self, delta: u64) {
        self.bar.inc_length(delta);
    }

    /// Advance the position by one
    ///
    /// Stepping past the total is tolerated; the bar simply renders full.
    pub fn step(&self) {
        self.bar.inc(1);
    }

    /// Replace the status message without moving the position
    pub fn msg(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn size(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    /// Print a line to stdout without tearing the bar
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{line}"));
    }

    /// Finalize the bar; later calls are no-ops
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if self.position() >= self.size() {
            self.bar.finish();
        } else {
            self.bar.abandon();
        }
    }

    #[cfg(test)]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_accumulate() {
        let tracker = ProgressTracker::hidden();
        tracker.set_size(18);
        tracker.add_size(3);
        tracker.add_size(1);
        assert_eq!(tracker.size(), 22);
    }

    #[test]
    fn test_set_size_overrides() {
        let tracker = ProgressTracker::hidden();
        tracker.add_size(5);
        tracker.set_size(2);
        assert_eq!(tracker.size(), 2);
    }

    #[test]
    fn test_step_and_message() {
        let tracker = ProgressTracker::hidden();
        tracker.set_size(2);
        tracker.msg("Updating");
        assert_eq!(tracker.position(), 0);
        tracker.step();
        tracker.step();
        assert_eq!(tracker.position(), 2);
    }

    #[test]
    fn test_overshoot_does_not_panic() {
        let mut tracker = ProgressTracker::hidden();
        tracker.set_size(1);
        tracker.step();
        tracker.step();
        tracker.step();
        assert_eq!(tracker.position(), 3);
        tracker.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut tracker = ProgressTracker::hidden();
        assert!(!tracker.is_stopped());
        tracker.stop();
        tracker.stop();
        assert!(tracker.is_stopped());
    }

    #[test]
    fn test_visible_tracker_creation() {
        let mut tracker = ProgressTracker::new("Installing");
        tracker.add_size(1);
        tracker.step();
        tracker.stop();
        assert!(tracker.is_stopped());
    }
}
