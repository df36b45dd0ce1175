//! The persistent run log written next to a list file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{CodecError, Result};

/// Seconds since the Unix epoch, used to name run logs without a prefix.
pub fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Path of the run log for `list_file`: `Report_<liststem>_<suffix>.txt`.
pub fn log_path<P: AsRef<Path>>(list_file: P, suffix: &str) -> PathBuf {
    let list_file = list_file.as_ref();
    let stem = list_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("Report_{stem}_{}.txt", suffix.trim_end_matches(['/', '\\']));
    match list_file.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

/// Append-only log of one batch run.
///
/// Text for the current file is buffered and written out by [`RunLog::flush`].
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: File,
    pending: String,
}

impl RunLog {
    /// Open (or create) the log at `path` in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CodecError::SaveError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(Self {
            path,
            file,
            pending: String::new(),
        })
    }

    /// Location of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer `text` without a line break.
    pub fn append(&mut self, text: &str) {
        self.pending.push_str(text);
    }

    /// Buffer one line.
    pub fn line(&mut self, text: &str) {
        self.pending.push_str(text);
        self.pending.push('\n');
    }

    /// Buffer the footer of one processed file.
    pub fn file_footer(&mut self, counter: usize, index: usize, total: usize, elapsed: Duration) {
        self.line(&format!("{counter}-{index}/{total} ({:.1} s)", elapsed.as_secs_f64()));
    }

    /// Buffer the closing line of the run.
    pub fn finished(&mut self, elapsed: Duration) {
        self.line(&format!("Finished in {:.2} min", elapsed.as_secs_f64() / 60.0));
    }

    /// Write buffered text to disk.
    pub fn flush(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.file.write_all(self.pending.as_bytes())?;
            self.pending.clear();
        }
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path() {
        assert_eq!(
            log_path("/data/batch.txt", "out/"),
            PathBuf::from("/data/Report_batch_out.txt")
        );
    }

    #[test]
    fn test_appends_across_runs() {
        let dir = std::env::temp_dir().join(format!("flatgi-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Report_x_1.txt");

        {
            let mut log = RunLog::open(&path).unwrap();
            log.append("/a.off");
            log.append(", sliced");
            log.line("");
            assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
            log.flush().unwrap();
            log.file_footer(1, 0, 2, Duration::from_millis(1500));
        }
        {
            let mut log = RunLog::open(&path).unwrap();
            log.finished(Duration::from_secs(90));
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "/a.off, sliced\n1-0/2 (1.5 s)\nFinished in 1.50 min\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
