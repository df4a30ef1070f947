use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Lexically normalise a path, dropping `.` segments and folding `..` into its parent.
///
/// The filesystem is never consulted, so symlinks are not resolved. A `..` that would climb
/// above the root of an absolute path is discarded, while leading `..` segments of a relative
/// path are kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut anchor = PathBuf::new();
    let mut rooted = false;
    let mut parts: Vec<&OsStr> = Vec::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => anchor.push(prefix.as_os_str()),
            Component::RootDir => {
                anchor.push(component.as_os_str());
                rooted = true;
            }
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(OsStr::new("..")),
            },
            Component::Normal(part) => parts.push(part),
        }
    }

    let mut normalized = anchor;
    for part in parts {
        normalized.push(part);
    }

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Express `target` relative to the directory `base`, joined with forward slashes.
///
/// Both paths must be absolute and share the same root (drive prefix on Windows). Returns
/// `None` otherwise, since no relative path can reach the target.
pub fn relative_path(target: &Path, base: &Path) -> Option<String> {
    if !target.is_absolute() || !base.is_absolute() {
        return None;
    }

    let target = normalize_path(target);
    let base = normalize_path(base);

    let (target_root, target_parts) = split_root(&target);
    let (base_root, base_parts) = split_root(&base);
    if target_root != base_root {
        return None;
    }

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let segments: Vec<String> = std::iter::repeat_n("..".to_string(), base_parts.len() - common)
        .chain(
            target_parts[common..]
                .iter()
                .map(|part| part.to_string_lossy().into_owned()),
        )
        .collect();

    if segments.is_empty() {
        Some(".".to_string())
    } else {
        Some(segments.join("/"))
    }
}

/// Render a path with forward slashes regardless of the native separator.
pub fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn split_root(path: &Path) -> (Vec<Component<'_>>, Vec<&OsStr>) {
    let mut root = Vec::new();
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            other => root.push(other),
        }
    }
    (root, parts)
}
