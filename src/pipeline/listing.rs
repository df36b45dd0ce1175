//! Building and reading input list files.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{CodecError, Result};

/// Filter applied while enumerating input files.
#[derive(Debug, Clone)]
pub struct ListFilter {
    /// Required extension, with or without the leading dot.
    pub extension: String,
    /// Substring the file stem must contain, if set.
    pub stem_contains: Option<String>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            extension: ".off".to_string(),
            stem_contains: None,
        }
    }
}

impl ListFilter {
    fn accepts(&self, path: &Path) -> bool {
        let wanted = self.extension.trim_start_matches('.');
        let ext_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == wanted);
        let stem_ok = match &self.stem_contains {
            Some(needle) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.contains(needle.as_str())),
            None => true,
        };
        ext_ok && stem_ok
    }
}

/// Compare strings so digit runs order by value (`a2` before `a10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a, b);
    loop {
        match (a.chars().next(), b.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let da = a.len() - a.trim_start_matches(|c: char| c.is_ascii_digit()).len();
                let db = b.len() - b.trim_start_matches(|c: char| c.is_ascii_digit()).len();
                let (na, nb) = (a[..da].trim_start_matches('0'), b[..db].trim_start_matches('0'));
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb)).then_with(|| da.cmp(&db));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = &a[da..];
                b = &b[db..];
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a = &a[x.len_utf8()..];
                b = &b[y.len_utf8()..];
            }
        }
    }
}

/// Directory links are not followed; linked files are listed.
fn walk(dir: &Path, filter: &ListFilter, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let kind = entry.file_type()?;
        let path = entry.path();
        let is_file = kind.is_file() || (kind.is_symlink() && path.is_file());
        if kind.is_dir() {
            walk(&path, filter, out)?;
        } else if is_file && filter.accepts(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Recursively list the files under `root` accepted by `filter`, in natural order.
pub fn find_files<P: AsRef<Path>>(root: P, filter: &ListFilter) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut files = Vec::new();
    walk(root, filter, &mut files)?;
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    debug!("Found {} files under {}", files.len(), root.display());
    Ok(files)
}

/// Write one path per line.
pub fn write_list<P: AsRef<Path>>(path: P, files: &[PathBuf]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    for file in files {
        writeln!(writer, "{}", file.display())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a list file.
///
/// Empty lines and lines starting with `#` are skipped; a line starting with
/// `EOF` ends the list.
///
/// # Errors
///
/// [`CodecError::InvalidParameter`] unless the file has a `.txt` extension,
/// and [`CodecError::LoadError`] if it names no files.
pub fn read_list<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) != Some("txt") {
        return Err(CodecError::invalid_param(
            "list",
            path.display(),
            "list file must have a .txt extension",
        ));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut files = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.starts_with("EOF") {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        files.push(PathBuf::from(line));
    }

    if files.is_empty() {
        return Err(CodecError::load(path, "list names no files"));
    }
    Ok(files)
}
