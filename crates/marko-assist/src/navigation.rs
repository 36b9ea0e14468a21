//! Where a click leads.
//!
//! [`resolve`] turns a [`ClickInspection`] into a [`NavigationTarget`]: a
//! file plus a description of where to land in it. Landing is resolved
//! lazily against the target's text with [`NavigationTarget::locate`], so
//! callers that only need the file never read it.
//!
//! Resolution order:
//!
//! 1. event handler name on an `on*(...)` / `w-on*` attribute -> component file
//! 2. string literal naming an existing file -> that file
//! 3. attribute name -> taglib file declaring the attribute
//! 4. tag name -> file implementing the tag
//! 5. `state` -> component file, at `this.state =`
//! 6. `data` -> component file, at `getTemplateData`

use marko_buffer::Position;
use marko_taglib::{TaglibCache, TaglibLookup, project::NODE_MODULES};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::hyperclick::{ClickInspection, ClickTarget};
use crate::{AssistError, AssistResult};

const STATE_INIT_PATTERN: &str = r"this\.state\s*[=]";
const TEMPLATE_DATA_PATTERN: &str = "getTemplateData";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    EventHandler,
    File,
    Attribute,
    Tag,
    State,
    Data,
}

/// Where to put the cursor once the target file is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Landing {
    Start,
    /// First match of a regex
    Pattern { pattern: String },
    /// An attribute declaration inside a taglib file
    Attribute {
        tag_name: String,
        attribute_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationTarget {
    pub kind: NavigationKind,
    pub path: PathBuf,
    pub landing: Landing,
}

impl NavigationTarget {
    fn new(kind: NavigationKind, path: impl Into<PathBuf>, landing: Landing) -> Self {
        Self {
            kind,
            path: path.into(),
            landing,
        }
    }

    /// Landing position within `text`, if it can be found.
    pub fn locate(&self, text: &str) -> Option<Position> {
        let offset = match &self.landing {
            Landing::Start => 0,
            Landing::Pattern { pattern } => match Regex::new(pattern) {
                Ok(regex) => regex.find(text)?.start(),
                Err(err) => {
                    tracing::warn!("Bad landing pattern {}: {}", pattern, err);
                    return None;
                }
            },
            Landing::Attribute {
                tag_name,
                attribute_name,
            } => locate_attribute(text, tag_name, attribute_name)?,
        };
        Some(position_of(text, offset))
    }

    /// Reads the target file and locates the landing in it.
    pub fn locate_file(&self) -> AssistResult<Option<Position>> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| AssistError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.locate(&text))
    }
}

/// Byte offset of the attribute declaration: `@name` (or `"name"`) after the
/// tag's key, else the tag's key itself.
fn locate_attribute(text: &str, tag_name: &str, attribute_name: &str) -> Option<usize> {
    let find_tag = |name: &str| {
        let keyed = format!("<{name}>");
        let quoted = format!("\"{name}\"");
        text.find(&keyed)
            .map(|start| (start, start + keyed.len()))
            .or_else(|| text.find(&quoted).map(|start| (start, start + quoted.len())))
    };
    let tag = find_tag(tag_name).or_else(|| find_tag(marko_taglib::GLOBAL_TAG));

    let from = tag.map_or(0, |(_, end)| end);
    let rest = &text[from..];
    let attribute = rest
        .find(&format!("@{attribute_name}"))
        .or_else(|| rest.find(&format!("\"{attribute_name}\"")))
        .map(|offset| from + offset);

    attribute.or(tag.map(|(start, _)| start))
}

/// Row and column (in chars) of a byte offset.
fn position_of(text: &str, offset: usize) -> Position {
    let before = &text[..offset];
    let row = before.matches('\n').count();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Position::new(row, before[line_start..].chars().count())
}

/// `w-on*` attributes, and `on*` ones written with an argument.
fn is_event_attribute(name: &str, has_argument: bool) -> bool {
    (has_argument && name.starts_with("on")) || name.starts_with("w-on")
}

/// Resolves what a click leads to.
///
/// `template` is the clicked document's path, `component_files` the file
/// names tried next to it for component code, and `fallback_dir` the
/// directory used for taglib lookups when the document was never saved.
pub fn resolve(
    inspection: &ClickInspection,
    template: Option<&Path>,
    component_files: &[String],
    fallback_dir: &Path,
    taglibs: &mut TaglibCache,
) -> AssistResult<Option<NavigationTarget>> {
    let dir = template
        .and_then(Path::parent)
        .unwrap_or(fallback_dir)
        .to_path_buf();

    let target = match &inspection.target {
        ClickTarget::Literal {
            value,
            attribute_name: Some(attribute_name),
            attribute_has_argument,
        } if !value.is_empty() && is_event_attribute(attribute_name, *attribute_has_argument) => {
            template.map(|template| {
                let handler = regex::escape(value);
                NavigationTarget::new(
                    NavigationKind::EventHandler,
                    component_file(template, component_files),
                    Landing::Pattern {
                        pattern: format!(r"{handler}\s*[(]|{handler}\s*[:]"),
                    },
                )
            })
        }
        ClickTarget::Literal { value, .. } if !value.is_empty() => template
            .and_then(|template| resolve_file(value, template, taglibs))
            .map(|path| NavigationTarget::new(NavigationKind::File, path, Landing::Start)),
        ClickTarget::Literal { .. } => None,
        ClickTarget::Attribute {
            tag_name,
            attribute_name,
            ..
        } => {
            let lookup = taglibs.lookup_for(&dir)?;
            lookup
                .attribute(tag_name, attribute_name)
                .and_then(|attr| attr.file_path.clone())
                .map(|path| {
                    NavigationTarget::new(
                        NavigationKind::Attribute,
                        path,
                        Landing::Attribute {
                            tag_name: tag_name.clone(),
                            attribute_name: attribute_name.clone(),
                        },
                    )
                })
        }
        ClickTarget::Tag { tag_name, .. } => {
            let lookup = taglibs.lookup_for(&dir)?;
            lookup
                .tag(tag_name)
                .and_then(|tag| tag.definition_file())
                .map(|path| NavigationTarget::new(NavigationKind::Tag, path, Landing::Start))
        }
        ClickTarget::StateVar => template.map(|template| {
            NavigationTarget::new(
                NavigationKind::State,
                component_file(template, component_files),
                Landing::Pattern {
                    pattern: STATE_INIT_PATTERN.to_string(),
                },
            )
        }),
        ClickTarget::DataVar => template.map(|template| {
            NavigationTarget::new(
                NavigationKind::Data,
                component_file(template, component_files),
                Landing::Pattern {
                    pattern: TEMPLATE_DATA_PATTERN.to_string(),
                },
            )
        }),
    };

    match &target {
        Some(target) => tracing::debug!("Navigating to {}", target.path.display()),
        None => tracing::debug!("Nothing to navigate to for {:?}", inspection.target),
    }
    Ok(target)
}

/// First component file next to the template, else the template itself.
pub fn component_file(template: &Path, component_files: &[String]) -> PathBuf {
    template
        .parent()
        .and_then(|dir| {
            component_files
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        })
        .unwrap_or_else(|| template.to_path_buf())
}

/// A literal naming a file: relative to the template, then relative to the
/// project root.
fn resolve_file(value: &str, template: &Path, taglibs: &TaglibCache) -> Option<PathBuf> {
    let dir = template.parent()?;
    if let Some(path) = resolve_from(dir, value) {
        return Some(path);
    }

    if value.starts_with('.') {
        return None;
    }
    let root = taglibs.root_for(dir);
    resolve_from(&root, &format!("./{value}"))
}

/// Module-style resolution of `request` from `dir`.
fn resolve_from(dir: &Path, request: &str) -> Option<PathBuf> {
    if request.starts_with("./") || request.starts_with("../") || request.starts_with('/') {
        return resolve_as_file(&dir.join(request));
    }
    dir.ancestors()
        .find_map(|ancestor| resolve_as_file(&ancestor.join(NODE_MODULES).join(request)))
}

/// `path`, `path.js`, `path.json`, then `path/index.js`.
fn resolve_as_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let with_extension = |ext: &str| {
        let mut name = path.as_os_str().to_os_string();
        name.push(ext);
        PathBuf::from(name)
    };
    [
        with_extension(".js"),
        with_extension(".json"),
        path.join("index.js"),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}
