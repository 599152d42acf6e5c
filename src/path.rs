// src/path.rs

//! VFS path handling
//!
//! Repository paths are `/`-separated strings rooted at `/`. Site roots such as
//! `/sites/default` prefix the site-relative paths stored in archives. Paths read
//! from an archive are untrusted and go through [`sanitize`] before use.

use crate::error::{Error, Result};

/// Folder holding system resources, excluded from exports unless requested
pub const SYSTEM_FOLDER: &str = "/system";

/// Sanitize a path from an untrusted source
///
/// Rejects `..` components, drops `.` and empty components, and returns an
/// absolute path without a trailing slash (`/` for the root itself).
///
/// ```
/// use vfsport::path::sanitize;
///
/// assert_eq!(sanitize("news//item.html").unwrap(), "/news/item.html");
/// assert_eq!(sanitize("/a/./b/").unwrap(), "/a/b");
/// assert!(sanitize("/a/../../etc").is_err());
/// ```
pub fn sanitize(path: &str) -> Result<String> {
    let mut normalized = String::with_capacity(path.len() + 1);

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                return Err(Error::InvalidPath(format!("path traversal in {path}")));
            }
            c => {
                normalized.push('/');
                normalized.push_str(c);
            }
        }
    }

    if normalized.is_empty() {
        normalized.push('/');
    }
    Ok(normalized)
}

/// Join a site root (or folder) with a relative path
///
/// ```
/// use vfsport::path::join;
///
/// assert_eq!(join("/sites/default", "/news/a.html").unwrap(), "/sites/default/news/a.html");
/// assert_eq!(join("/", "a.html").unwrap(), "/a.html");
/// assert_eq!(join("/sites/default", "/").unwrap(), "/sites/default");
/// ```
pub fn join(root: &str, path: &str) -> Result<String> {
    let root = sanitize(root)?;
    let path = sanitize(path)?;
    if root == "/" {
        Ok(path)
    } else if path == "/" {
        Ok(root)
    } else {
        Ok(format!("{root}{path}"))
    }
}

/// Parent folder of a path; `None` for the root
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" || path.is_empty() {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Last component of a path
pub fn name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Whether `path` is `prefix` or lies below it
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Strip a site root from a root path, giving the site-relative path
///
/// ```
/// use vfsport::path::strip_root;
///
/// assert_eq!(strip_root("/sites/default/a.html", "/sites/default"), Some("/a.html"));
/// assert_eq!(strip_root("/sites/default", "/sites/default"), Some("/"));
/// assert_eq!(strip_root("/sites/other/a.html", "/sites/default"), None);
/// ```
pub fn strip_root<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    if root == "/" {
        return Some(path);
    }
    if !is_under(path, root) {
        return None;
    }
    let rest = &path[root.len()..];
    if rest.is_empty() { Some("/") } else { Some(rest) }
}

/// Whether the path belongs to the system folder
pub fn is_system(path: &str) -> bool {
    is_under(path, SYSTEM_FOLDER)
}

/// Every ancestor folder of `path`, outermost first, excluding `/` and the path itself
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        if p == "/" {
            break;
        }
        result.push(p);
        current = parent(p);
    }
    result.reverse();
    result
}
