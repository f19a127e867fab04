//! Path confinement for the upload destination.
//!
//! Every client-declared path is validated component by component and the
//! resolved destination is re-checked against the base directory before
//! anything touches the filesystem.

use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
pub enum PathValidationError {
    ContainsParentDir,
    AbsolutePath,
    InvalidComponent,
    NullByte,
    Empty,
    OutsideBase,
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationError::ContainsParentDir => {
                write!(f, "Path contains parent directory (..)")
            }
            PathValidationError::AbsolutePath => write!(f, "Path is absolute"),
            PathValidationError::InvalidComponent => write!(f, "Path contains invalid component"),
            PathValidationError::NullByte => write!(f, "Path contains null byte"),
            PathValidationError::Empty => write!(f, "Path is empty"),
            PathValidationError::OutsideBase => write!(f, "Path escapes the base directory"),
        }
    }
}

impl std::error::Error for PathValidationError {}

// Checks for: empty strings, null bytes, parent directory traversal,
// absolute paths. Shared by file names and relative target directories.
fn validate_path_components(path_str: &str) -> Result<(), PathValidationError> {
    if path_str.is_empty() {
        return Err(PathValidationError::Empty);
    }

    // Null bytes can truncate the path at C-style API boundaries.
    if path_str.contains('\0') {
        return Err(PathValidationError::NullByte);
    }

    let path = Path::new(path_str);

    for component in path.components() {
        match component {
            Component::Normal(_) => continue,
            Component::ParentDir => return Err(PathValidationError::ContainsParentDir),
            Component::RootDir => return Err(PathValidationError::AbsolutePath),
            Component::CurDir => continue, // "./" is okay, just redundant
            Component::Prefix(_) => return Err(PathValidationError::InvalidComponent), // Windows
        }
    }

    Ok(())
}

/// Validate a client-declared relative path (target dir or file name).
pub fn validate_relative(path: &str) -> Result<(), PathValidationError> {
    validate_path_components(path)?;

    if Path::new(path).is_absolute() {
        return Err(PathValidationError::AbsolutePath);
    }

    Ok(())
}

/// Resolve `base / target_dir / file_name` and confirm the result stays
/// under `base`. `target_dir` of `None` means the base directory itself.
///
/// Component validation already forbids `..`, so the final prefix check is
/// a belt check against symlink-free lexical escapes.
pub fn confine_target_path(
    base: &Path,
    target_dir: Option<&str>,
    file_name: &str,
) -> Result<PathBuf, PathValidationError> {
    validate_relative(file_name)?;

    let mut resolved = base.to_path_buf();
    if let Some(dir) = target_dir {
        validate_relative(dir)?;
        resolved.push(dir);
    }
    resolved.push(file_name);

    if !resolved.starts_with(base) {
        return Err(PathValidationError::OutsideBase);
    }

    Ok(resolved)
}
