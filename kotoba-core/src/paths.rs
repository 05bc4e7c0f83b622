//! Client-supplied path validation (spec §6 "File-path security", §8
//! property 9). Every path a client names must normalize without a `..`
//! component and resolve under an allowed root.

use std::path::{Component, Path, PathBuf};

use crate::error::ErrorCategory;

/// Audio/video extensions accepted for transcription endpoints, ported
/// from `original_source/src/constants.py`'s `SharedConstants.
/// SUPPORTED_EXTENSIONS`.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "flac", "ogg", "aac", "wma", "opus", "amr", "mp4", "avi", "mov", "mkv",
    "3gp", "webm",
];

/// Validates a client-supplied path: must normalize without escaping via
/// `..`, must resolve under one of `allowed_roots`, and (when `check_ext`
/// is true) must carry one of `SUPPORTED_EXTENSIONS`.
pub fn validate_path(
    candidate: &Path,
    allowed_roots: &[PathBuf],
    check_extension: bool,
) -> Result<PathBuf, ErrorCategory> {
    let normalized = normalize(candidate);

    if !normalized.is_absolute() {
        return Err(ErrorCategory::Validation);
    }

    let under_allowed_root = allowed_roots
        .iter()
        .any(|root| normalized.starts_with(normalize(root)));
    if !under_allowed_root {
        return Err(ErrorCategory::Validation);
    }

    if check_extension {
        let ext_ok = normalized
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !ext_ok {
            return Err(ErrorCategory::Validation);
        }
    }

    Ok(normalized)
}

/// Lexical normalization (no filesystem access): resolves `.` and `..`
/// components without touching the filesystem, so the check works even
/// for paths that don't exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True if the lexical normalization of `path` contains a `..` that
/// escapes past the root (i.e. more `ParentDir`s than preceding normal
/// components) — the condition spec §8 property 9 tests for directly.
pub fn escapes_via_traversal(path: &Path) -> bool {
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            Component::Normal(_) => depth += 1,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_outside_root() {
        let root = PathBuf::from("/home/user/watched");
        let candidate = root.join("../../etc/passwd");
        assert!(validate_path(&candidate, &[root], false).is_err());
    }

    #[test]
    fn accepts_path_under_allowed_root_with_supported_extension() {
        let root = PathBuf::from("/home/user/watched");
        let candidate = root.join("clip.wav");
        assert!(validate_path(&candidate, &[root], true).is_ok());
    }

    #[test]
    fn rejects_unsupported_extension() {
        let root = PathBuf::from("/home/user/watched");
        let candidate = root.join("notes.txt");
        assert!(validate_path(&candidate, &[root], true).is_err());
    }

    #[test]
    fn escapes_via_traversal_detects_dot_dot_past_root() {
        assert!(escapes_via_traversal(Path::new("a/../../b")));
        assert!(!escapes_via_traversal(Path::new("a/b/../c")));
    }

    #[test]
    fn rejects_relative_paths() {
        let root = PathBuf::from("/home/user/watched");
        assert!(validate_path(Path::new("clip.wav"), &[root], false).is_err());
    }
}
