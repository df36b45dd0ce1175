//! Progress reporting for long-running stages.
//!
//! The inpainter reports once per diffusion iteration and the batch runner
//! once per input file. Callers that do not care pass [`Progress::none`].
//!
//! ```
//! use flatgi::algo::Progress;
//!
//! let progress = Progress::new(|current, total, message| {
//!     eprintln!("[{current}/{total}] {message}");
//! });
//! progress.report(1, 20, "Diffusing channel 0");
//! ```

/// A progress callback receiving `(current, total, message)`.
///
/// `current == total` signals completion of the reported task.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Report step `step` of `steps` for one of `parts` equal parts.
    ///
    /// Used when the same task runs once per channel: channel `part` owns the
    /// slice `[part * steps, (part + 1) * steps)` of the overall range.
    #[inline]
    pub fn report_part(&self, part: usize, parts: usize, step: usize, steps: usize, message: &str) {
        if parts == 0 || steps == 0 {
            return;
        }
        (self.callback)(part * steps + step.min(steps), parts * steps, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}
