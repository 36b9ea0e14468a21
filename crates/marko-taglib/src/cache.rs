//! Per-project taglib cache.
//!
//! Loading a taglib touches the file system (the project's own taglibs,
//! every installed package), so lookups are cached by project root and
//! dropped explicitly when a taglib-relevant file is saved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::json::{Taglib, builtin_html};
use crate::project::{self, NODE_MODULES};
use crate::TaglibResult;

/// Conventional tags directory at a project root.
const COMPONENTS_DIR: &str = "components";

/// How taglibs are discovered.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Taglib file names looked for in the root and in each package
    pub file_names: Vec<String>,

    /// Also load taglibs of installed packages
    pub scan_node_modules: bool,

    /// Saving a file with one of these names drops every cached taglib
    pub invalidate_on_save: Vec<String>,

    /// Root used when no `package.json` is found
    pub project_dir: Option<PathBuf>,

    /// Start from the built-in HTML tags
    pub include_html: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            file_names: vec!["marko.json".to_string(), "marko-tag.json".to_string()],
            scan_node_modules: true,
            invalidate_on_save: [
                "marko.json",
                "marko-tag.json",
                "package.json",
                "template.marko",
                "renderer.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            project_dir: None,
            include_html: true,
        }
    }
}

/// Taglibs and Marko versions, cached by project root.
#[derive(Debug, Default)]
pub struct TaglibCache {
    options: LoadOptions,
    taglibs: HashMap<PathBuf, Arc<Taglib>>,
    versions: HashMap<PathBuf, Option<u32>>,
}

impl TaglibCache {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Number of cached taglibs.
    pub fn len(&self) -> usize {
        self.taglibs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taglibs.is_empty()
    }

    /// Project root that `dir` belongs to.
    pub fn root_for(&self, dir: &Path) -> PathBuf {
        project::resolve_root(dir, self.options.project_dir.as_deref())
    }

    /// The taglib for templates in `dir`, loading it on first use.
    pub fn lookup_for(&mut self, dir: &Path) -> TaglibResult<Arc<Taglib>> {
        let root = self.root_for(dir);
        if let Some(taglib) = self.taglibs.get(&root) {
            return Ok(Arc::clone(taglib));
        }

        let taglib = Arc::new(load_project(&root, &self.options)?);
        tracing::debug!(
            "Loaded {} tags for {} from {} files",
            taglib.len(),
            root.display(),
            taglib.sources().len()
        );
        self.taglibs.insert(root, Arc::clone(&taglib));
        Ok(taglib)
    }

    /// Marko major version installed for `dir`'s project, if known.
    pub fn marko_major_version(&mut self, dir: &Path) -> Option<u32> {
        let root = self.root_for(dir);
        *self
            .versions
            .entry(root)
            .or_insert_with_key(|root| project::marko_major_version(root))
    }

    /// Drops the entries of one project root.
    pub fn invalidate(&mut self, root: &Path) -> bool {
        self.versions.remove(root);
        self.taglibs.remove(root).is_some()
    }

    pub fn clear(&mut self) {
        self.taglibs.clear();
        self.versions.clear();
    }

    /// Reacts to a saved file. Taglib and package files can change what any
    /// project sees (a package may be linked into several), so everything
    /// is dropped.
    pub fn handle_saved(&mut self, path: &Path) -> bool {
        let relevant = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.options.invalidate_on_save.iter().any(|n| n == name));

        if relevant {
            tracing::debug!("{} saved, clearing {} cached taglibs", path.display(), self.len());
            self.clear();
        }
        relevant
    }
}

/// Builds the merged taglib of a project: HTML, then installed packages,
/// then the project's own taglibs, each layer overriding the previous.
fn load_project(root: &Path, options: &LoadOptions) -> TaglibResult<Taglib> {
    let mut taglib = if options.include_html {
        builtin_html()
    } else {
        Taglib::new()
    };

    if options.scan_node_modules {
        for package in installed_packages(&root.join(NODE_MODULES)) {
            for name in &options.file_names {
                let path = package.join(name);
                if !path.is_file() {
                    continue;
                }
                let mut package_taglib = Taglib::new();
                match package_taglib.load_file(&path) {
                    Ok(()) => taglib.extend(package_taglib),
                    Err(err) => tracing::warn!("Skipping taglib: {}", err),
                }
            }
        }
    }

    taglib.load_tags_dir(&root.join(COMPONENTS_DIR))?;
    for name in &options.file_names {
        let path = root.join(name);
        if path.is_file() {
            taglib.load_file(&path)?;
        }
    }

    Ok(taglib)
}

/// Package directories under `node_modules`, scoped packages included.
fn installed_packages(node_modules: &Path) -> Vec<PathBuf> {
    let list = |dir: &Path| -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    };

    let mut packages = Vec::new();
    for dir in list(node_modules) {
        let name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
        match name.as_deref() {
            Some(name) if name.starts_with('@') => packages.extend(list(&dir)),
            Some(name) if name.starts_with('.') => {}
            _ => packages.push(dir),
        }
    }
    packages
}
