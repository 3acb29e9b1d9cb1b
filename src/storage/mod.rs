use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub fn read_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|err| Error::io(path, err))
}

/// Write `contents`, creating parent directories as needed.
pub fn write_text(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }
    fs::write(path, contents).map_err(|err| Error::io(path, err))
}

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_relative(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}
