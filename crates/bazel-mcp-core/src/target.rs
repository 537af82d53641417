//! Target resolution
//!
//! Maps whatever the caller passed as a target (a Bazel label, or a file path
//! absolute or relative to the project) onto a canonical Bazel label.

use std::fmt;
use std::path::{Component, Path};
use tracing::debug;

use crate::error::{Error, Result};
use crate::paths;

/// A canonical Bazel label: `//pkg/path:name`, `//:name` or `@repo//pkg:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    /// Whether `input` is already written as a label rather than a path
    pub fn is_label(input: &str) -> bool {
        input.starts_with("//") || input.starts_with('@')
    }

    /// Build the label for file `name` in package `package` (empty = root)
    fn for_file(package: &[String], name: &str) -> Self {
        if package.is_empty() {
            Self(format!("//:{}", name))
        } else {
            Self(format!("//{}:{}", package.join("/"), name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for Label {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Resolve `input` to a canonical label relative to `project_path`.
///
/// Labels (`//...`, `@...`) pass through untouched. Anything else is a file
/// path; the result is computed lexically and the file need not exist.
pub fn resolve(input: &str, project_path: &str) -> Result<Label> {
    if input.is_empty() {
        return Err(Error::invalid_argument("target", "target input cannot be empty"));
    }
    if project_path.is_empty() {
        return Err(Error::invalid_argument(
            "project_path",
            "project path cannot be empty",
        ));
    }

    if Label::is_label(input) {
        debug!("Input {:?} is already a Bazel label", input);
        return Ok(Label(input.to_string()));
    }

    debug!(
        "Input {:?} is not a label, resolving as a file path relative to project {:?}",
        input, project_path
    );

    let root = paths::absolute(Path::new(project_path)).map_err(|e| Error::PathResolution {
        target: project_path.into(),
        root: ".".into(),
        reason: format!("could not determine absolute project path: {}", e),
    })?;

    let target = Path::new(input);
    let absolute = if target.is_absolute() {
        paths::clean(target)
    } else {
        paths::clean(&root.join(target))
    };

    let rel = paths::relative(&root, &absolute).map_err(|reason| Error::PathResolution {
        target: absolute.clone(),
        root: root.clone(),
        reason,
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::OutsideProject {
                    input: input.to_string(),
                    absolute,
                    root,
                });
            }
        }
    }

    let Some(name) = parts.pop() else {
        return Err(Error::invalid_argument(
            "target",
            format!("{:?} resolves to the project directory itself, not a file", input),
        ));
    };

    let label = Label::for_file(&parts, &name);
    debug!(
        "Interpreted {:?} as a file path, converted to {} relative to {}",
        input,
        label,
        root.display()
    );
    Ok(label)
}
