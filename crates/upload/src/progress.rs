//! Progress reporting.
//!
//! The engine emits discrete events so a caller can render feedback.
//! Observers are optional; correctness never depends on them.

/// Upload phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Whole-file checksum computation.
    Checksum,
    /// Per-chunk upload progress within one file.
    Uploading,
    /// Server-side merge request.
    Merging,
    /// Per-file progress within a collection.
    File,
}

/// Receiver for progress events.
pub trait ProgressObserver: Send + Sync {
    /// Called with the phase, the current unit (1-based), and the
    /// total units for that phase.
    fn on_progress(&self, phase: Phase, current: u64, total: u64);
}

/// Observer that ignores everything. The default.
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _phase: Phase, _current: u64, _total: u64) {}
}
