use crate::StorageError;
use std::path::{Component, Path};

/// Lexically normalize a store path to `a/b/c` form.
///
/// `.` segments are dropped and `..` pops a segment; popping past the root,
/// absolute paths and empty paths are rejected. Nothing touches the disk.
pub fn normalize_path(path: &str) -> Result<String, StorageError> {
    let outside = || StorageError::OutsideRoot {
        path: path.to_owned(),
    };
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(p) => parts.push(p.to_str().ok_or_else(outside)?),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(outside)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }
    if parts.is_empty() {
        return Err(outside());
    }
    Ok(parts.join("/"))
}
