//! Path algebra for slash-separated, root-relative DBAFS paths.
//!
//! Paths handled here never start with a slash and never end with one; the
//! empty string denotes the root. Directory paths only carry a trailing slash
//! inside the change set computation.

use crate::error::DbafsError;

/// Canonicalize a path: collapse separators, resolve `.` and `..`, trim slashes.
///
/// Fails for absolute paths and for paths escaping the root.
pub fn canonicalize(path: &str) -> Result<String, DbafsError> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(DbafsError::invalid_path(path, "absolute paths are not allowed"));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(DbafsError::invalid_path(path, "path escapes the root"));
                }
            }
            s => segments.push(s),
        }
    }

    Ok(segments.join("/"))
}

/// Parent of a path; the root (`""`) for top-level entries and for the root itself
pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[..pos],
        None => "",
    }
}

/// Last segment of a path, ignoring a trailing slash
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Whether `path` equals `base` or lies below it
pub fn is_base_path(base: &str, path: &str) -> bool {
    if base.is_empty() {
        return true;
    }
    path == base
        || (path.len() > base.len() && path.starts_with(base) && path.as_bytes()[base.len()] == b'/')
}

/// `path` relative to `base`; `None` if `path` is not below `base`
pub fn make_relative<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(path);
    }
    if path == base {
        return Some("");
    }
    if is_base_path(base, path) {
        return Some(&path[base.len() + 1..]);
    }
    None
}

/// Join two root-relative paths
pub fn join(base: &str, path: &str) -> String {
    match (base.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, path),
    }
}

/// All ancestors of a path, nearest first, excluding the root
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut current = parent(path);
    while !current.is_empty() {
        result.push(current);
        current = parent(current);
    }
    result
}

/// Whether `child` is a direct child of the directory `dir`
pub fn is_direct_child(dir: &str, child: &str) -> bool {
    let child = child.trim_end_matches('/');
    let dir = dir.trim_end_matches('/');
    !child.is_empty() && child != dir && parent(child) == dir && is_base_path(dir, child)
}
