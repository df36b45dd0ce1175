//! Existence checks for stage artifacts.
//!
//! Every stage looks for its output before doing any work; a file that
//! exists and is larger than a small threshold counts as done. This makes an
//! interrupted batch restartable without redoing finished files.

use std::fs;
use std::path::Path;

use crate::error::{CodecError, Result};

/// Default size threshold, in bytes, for treating an artifact as complete.
pub const MIN_ARTIFACT_SIZE: u64 = 10;

/// Result of a stage that may have been skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The artifact was computed and written.
    Written,
    /// A valid artifact already existed; nothing was recomputed.
    Skipped,
}

impl StageOutcome {
    /// True if the stage did no work.
    pub fn is_skipped(self) -> bool {
        self == StageOutcome::Skipped
    }
}

/// True if `path` exists and is strictly larger than `min_size` bytes.
pub fn output_exists<P: AsRef<Path>>(path: P, min_size: u64) -> bool {
    fs::metadata(path.as_ref())
        .map(|m| m.is_file() && m.len() > min_size)
        .unwrap_or(false)
}

/// Require an input artifact to exist and be strictly larger than `min_size`.
pub fn require_input<P: AsRef<Path>>(path: P, min_size: u64) -> Result<()> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|_| CodecError::load(path, "file does not exist"))?;
    if !meta.is_file() {
        return Err(CodecError::load(path, "not a regular file"));
    }
    if meta.len() <= min_size {
        return Err(CodecError::load(path, format!("file is empty ({} bytes)", meta.len())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let dir = std::env::temp_dir().join(format!("flatgi-artifact-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let small = dir.join("small.off");
        let large = dir.join("large.off");
        fs::write(&small, b"OFF\n").unwrap();
        fs::write(&large, b"OFF\n3 1 0\n0 0 0\n").unwrap();

        assert!(!output_exists(&small, MIN_ARTIFACT_SIZE));
        assert!(output_exists(&large, MIN_ARTIFACT_SIZE));
        assert!(!output_exists(dir.join("missing.off"), MIN_ARTIFACT_SIZE));
        assert!(!output_exists(&dir, 0));

        assert!(require_input(&large, MIN_ARTIFACT_SIZE).is_ok());
        assert!(require_input(&small, MIN_ARTIFACT_SIZE).is_err());
        assert!(require_input(dir.join("missing.off"), 0).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
