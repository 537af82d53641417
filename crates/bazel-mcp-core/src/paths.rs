//! Lexical path algebra
//!
//! Nothing in here touches the filesystem: symlinks are not followed and
//! targets do not need to exist.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` segments, fold `name/..` pairs, and drop
/// `..` directly under the root. An empty result becomes `.`.
pub fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = cleaned.components().next_back();
                let can_pop = matches!(last, Some(Component::Normal(_)));
                // `/..` is `/`
                let at_root = matches!(last, Some(Component::RootDir));
                if can_pop {
                    cleaned.pop();
                } else if !at_root {
                    cleaned.push(component.as_os_str());
                }
            }
            _ => cleaned.push(component.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Make `path` absolute against the current directory and clean it
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    Ok(clean(&std::path::absolute(path)?))
}

/// Lexical path of `target` relative to `base`, both expected to be cleaned.
///
/// The result may start with `..` segments when `target` is not under `base`.
/// Fails when no relative path exists, e.g. one side is absolute and the other
/// is not, or the two sit on different Windows prefixes.
pub fn relative(base: &Path, target: &Path) -> Result<PathBuf, String> {
    if base.is_absolute() != target.is_absolute() {
        return Err(format!(
            "cannot relate {} to {}: only one of them is absolute",
            target.display(),
            base.display()
        ));
    }

    let base_parts: Vec<Component> = base.components().collect();
    let target_parts: Vec<Component> = target.components().collect();

    let base_prefix = base_parts.iter().find(|c| matches!(c, Component::Prefix(_)));
    let target_prefix = target_parts.iter().find(|c| matches!(c, Component::Prefix(_)));
    if base_prefix != target_prefix {
        return Err(format!(
            "{} and {} are on different volumes",
            target.display(),
            base.display()
        ));
    }

    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for part in &base_parts[common..] {
        match part {
            Component::CurDir => {}
            Component::Normal(_) => rel.push(".."),
            // A `..` left in `base` means it escaped its own anchor and we
            // cannot know what to climb back into.
            _ => {
                return Err(format!(
                    "cannot relate {} to {}",
                    target.display(),
                    base.display()
                ))
            }
        }
    }
    for part in &target_parts[common..] {
        rel.push(part.as_os_str());
    }

    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Ok(rel)
}
