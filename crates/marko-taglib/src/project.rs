//! Project roots, package names and the installed Marko version.
//!
//! A project root is the nearest directory containing a `package.json`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const PACKAGE_JSON: &str = "package.json";
pub const NODE_MODULES: &str = "node_modules";

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
}

fn read_package(path: &Path) -> Option<PackageJson> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(package) => Some(package),
        Err(err) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), err);
            None
        }
    }
}

/// Nearest ancestor of `dir` (itself included) that has a `package.json`.
pub fn find_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|candidate| candidate.join(PACKAGE_JSON).is_file())
        .map(Path::to_path_buf)
}

/// The project root for `dir`, else `fallback`, else `dir` itself.
pub fn resolve_root(dir: &Path, fallback: Option<&Path>) -> PathBuf {
    find_root(dir)
        .or_else(|| fallback.map(Path::to_path_buf))
        .unwrap_or_else(|| dir.to_path_buf())
}

/// `name` from the root's `package.json`.
pub fn package_name(root: &Path) -> Option<String> {
    read_package(&root.join(PACKAGE_JSON))?.name
}

/// Leading digits of a version string: `"4.18.2"` -> 4.
pub fn parse_major(version: &str) -> Option<u32> {
    let digits: String = version.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Resolves `node_modules/<package>` the way Node does, walking up from `root`.
pub fn resolve_package(root: &Path, package: &str) -> Option<PathBuf> {
    root.ancestors()
        .map(|dir| dir.join(NODE_MODULES).join(package))
        .find(|candidate| candidate.join(PACKAGE_JSON).is_file())
}

/// Major version of the `marko` package installed for `root`.
pub fn marko_major_version(root: &Path) -> Option<u32> {
    let package_dir = resolve_package(root, "marko")?;
    let version = read_package(&package_dir.join(PACKAGE_JSON))?.version?;
    parse_major(&version)
}

/// Short label for a taglib file: `<package>/<path in package>` when the
/// file belongs to a named package, else its parent directory's name.
pub fn taglib_label(taglib_path: &Path) -> Option<String> {
    let dir = taglib_path.parent()?;
    if let Some(root) = find_root(dir)
        && let Some(name) = package_name(&root)
        && let Ok(relative) = taglib_path.strip_prefix(&root)
    {
        let relative: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        return Some(format!("{}/{}", name, relative.join("/")));
    }

    dir.file_name().map(|name| name.to_string_lossy().into_owned())
}
