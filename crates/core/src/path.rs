//! Virtual path helpers
//!
//! Paths handed to the watch engine are `/`-separated and relative to the
//! served root (`/` is the root itself). These helpers never touch the disk.

/// Strip a single trailing `/`, keeping `/` itself intact
pub fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Join a containing directory and a child name with exactly one `/`
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.strip_suffix('/').unwrap_or(parent);
    let child = child.strip_prefix('/').unwrap_or(child);
    format!("{}/{}", parent, child)
}

/// Containing directory of `path`
///
/// `parent("/")` is `/`, as is the parent of any top-level entry. A path
/// without any `/` has no containing directory and is returned unchanged.
pub fn parent(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }

    let trimmed = trim_trailing_slash(path);
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => trimmed[..pos].to_string(),
        None => trimmed.to_string(),
    }
}

/// Last component of `path`
pub fn leaf(path: &str) -> String {
    if path == "/" {
        return path.to_string();
    }

    let trimmed = trim_trailing_slash(path);
    match trimmed.rfind('/') {
        Some(pos) => trimmed[pos + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Iterate the non-empty components of a virtual path
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

/// Canonical spelling of a virtual path
///
/// Repeated separators, `.` and `..` components are dropped (`..` can never
/// climb above the root), so every spelling of a directory maps to one
/// string: `//dir/./` becomes `/dir`.
pub fn normalize(path: &str) -> String {
    let mut normalized = String::new();
    for component in components(path).filter(|c| *c != "..") {
        normalized.push('/');
        normalized.push_str(component);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
