//! user supplied paths
use crate::error::{FsError, Result};

/// normalize `path` to an absolute, `/`-separated path
///
/// backslashes become slashes, a leading drive prefix such as `C:` is dropped
/// and empty components are collapsed
pub fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = match path.split_once(':') {
        Some((drive, rest)) if drive.len() == 1 && drive.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.to_string()
        }
        _ => path,
    };
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    format!("/{}", components.join("/"))
}

/// the components of `path` after normalization, root has none
pub fn components(path: &str) -> Vec<String> {
    normalize(path)
        .split('/')
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// split `path` into its parent components and its final name
pub fn split_parent(path: &str) -> Result<(Vec<String>, String)> {
    let mut components = components(path);
    let name = components
        .pop()
        .ok_or_else(|| FsError::InvalidParameter(format!("'{path}' does not name a file")))?;
    Ok((components, name))
}
