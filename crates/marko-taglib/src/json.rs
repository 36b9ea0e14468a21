//! JSON taglibs (`marko.json`, `marko-tag.json`) and the built-in HTML tags.
//!
//! A project taglib maps `<tag-name>` keys to tag definitions:
//!
//! ```json
//! {
//!     "<fancy-button>": {
//!         "renderer": "./components/fancy-button/renderer.js",
//!         "@size": { "type": "string", "enum": ["small", "large"] },
//!         "attributes": { "disabled": "boolean" },
//!         "open-tag-only": false
//!     },
//!     "<*>": { "@track-id": "string" },
//!     "tags-dir": "./components"
//! }
//! ```
//!
//! ## Learning: `serde_json::Value` for Loose Formats
//!
//! Taglib files accept several spellings of the same property (`openTagOnly`
//! and `open-tag-only`), values that are either a string or an object, and
//! arbitrary tag names as keys. Walking a `Value` handles that more directly
//! than a derived struct would.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{AttrDef, AutocompleteEntry, EnumValue, GLOBAL_TAG, TagDef, TagFiles};
use crate::{TaglibError, TaglibLookup, TaglibResult};

/// Tag definition file inside a tags directory.
pub const TAG_FILE: &str = "marko-tag.json";

/// A merged set of tag definitions.
#[derive(Debug, Clone, Default)]
pub struct Taglib {
    tags: BTreeMap<String, TagDef>,
    sources: Vec<PathBuf>,
}

impl Taglib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tags, the global pseudo-tag included.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Files loaded so far, in load order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Adds a tag, layering it over an existing definition.
    pub fn insert(&mut self, tag: TagDef) {
        match self.tags.get_mut(&tag.name) {
            Some(existing) => existing.merge(tag),
            None => {
                self.tags.insert(tag.name.clone(), tag);
            }
        }
    }

    /// Layers every tag of `other` over this taglib.
    pub fn extend(&mut self, other: Taglib) {
        self.sources.extend(other.sources);
        for tag in other.tags.into_values() {
            self.insert(tag);
        }
    }

    /// Reads and merges a taglib file.
    pub fn load_file(&mut self, path: &Path) -> TaglibResult<()> {
        let text = read(path)?;
        self.load_str(&text, path)
    }

    /// Merges taglib JSON whose relative paths resolve against `path`'s directory.
    pub fn load_str(&mut self, text: &str, path: &Path) -> TaglibResult<()> {
        let object = parse_object(text, path)?;
        let dir = path.parent().unwrap_or(Path::new(""));
        self.sources.push(path.to_path_buf());

        for (key, value) in &object {
            if let Some(name) = tag_key(key) {
                self.load_tag_value(name, value, path)?;
            } else if key == "tags" {
                if let Some(tags) = value.as_object() {
                    for (name, value) in tags {
                        self.load_tag_value(name, value, path)?;
                    }
                }
            } else if key == "tags-dir" || key == "tagsDir" {
                for tags_dir in string_list(value) {
                    self.load_tags_dir(&dir.join(tags_dir))?;
                }
            } else {
                tracing::trace!("Ignoring taglib key {} in {}", key, path.display());
            }
        }
        Ok(())
    }

    /// Loads one tag per subdirectory (`marko-tag.json`, `renderer.js`,
    /// `index.marko`, `template.marko`) and one per `*.marko` file.
    pub fn load_tags_dir(&mut self, dir: &Path) -> TaglibResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Tags directory {} does not exist", dir.display());
                return Ok(());
            }
            Err(source) => {
                return Err(TaglibError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();

        for path in paths {
            let is_dir = path.is_dir();
            let name = if is_dir { path.file_name() } else { path.file_stem() };
            let Some(name) = name.and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            if is_dir {
                let tag_file = path.join(TAG_FILE);
                if tag_file.is_file() {
                    let text = read(&tag_file)?;
                    let object = parse_object(&text, &tag_file)?;
                    let mut tag = parse_tag(&name, &object, &tag_file);
                    tag.files = tag.files.or(implementation_files(&path));
                    self.sources.push(tag_file);
                    self.insert(tag);
                } else {
                    let files = implementation_files(&path);
                    if files.first().is_some() {
                        let mut tag = TagDef::new(name);
                        tag.files = files;
                        self.insert(tag);
                    }
                }
            } else if path.extension().is_some_and(|ext| ext == "marko") {
                let mut tag = TagDef::new(name);
                tag.files.template = Some(path);
                self.insert(tag);
            }
        }
        Ok(())
    }

    fn load_tag_value(&mut self, name: &str, value: &Value, taglib: &Path) -> TaglibResult<()> {
        let dir = taglib.parent().unwrap_or(Path::new(""));
        match value {
            Value::Object(object) => self.insert(parse_tag(name, object, taglib)),
            Value::String(target) if target.ends_with(".json") => {
                let tag_file = dir.join(target);
                let text = read(&tag_file)?;
                let object = parse_object(&text, &tag_file)?;
                self.sources.push(tag_file.clone());
                self.insert(parse_tag(name, &object, &tag_file));
            }
            Value::String(target) => {
                let mut tag = TagDef::new(name);
                tag.taglib_path = Some(taglib.to_path_buf());
                let file = dir.join(target);
                if target.ends_with(".marko") {
                    tag.files.template = Some(file);
                } else {
                    tag.files.renderer = Some(file);
                }
                self.insert(tag);
            }
            _ => tracing::warn!("Tag <{}> in {} has no definition", name, taglib.display()),
        }
        Ok(())
    }
}

impl TaglibLookup for Taglib {
    fn tags_sorted(&self) -> Vec<&TagDef> {
        self.tags.values().collect()
    }

    fn tag(&self, name: &str) -> Option<&TagDef> {
        self.tags.get(name)
    }

    fn for_each_attribute(&self, tag_name: &str, f: &mut dyn FnMut(&AttrDef, &TagDef)) {
        let tag = self.tags.get(tag_name);
        if let Some(tag) = tag {
            for attr in &tag.attributes {
                f(attr, tag);
            }
        }

        if let Some(global) = self.tags.get(GLOBAL_TAG) {
            for attr in &global.attributes {
                if tag.and_then(|tag| tag.attribute(&attr.name)).is_none() {
                    f(attr, global);
                }
            }
        }
    }

    fn attribute(&self, tag_name: &str, attr_name: &str) -> Option<&AttrDef> {
        self.tags
            .get(tag_name)
            .and_then(|tag| tag.attribute(attr_name))
            .or_else(|| self.tags.get(GLOBAL_TAG)?.attribute(attr_name))
    }
}

// ==================== Parsing ====================

fn read(path: &Path) -> TaglibResult<String> {
    fs::read_to_string(path).map_err(|source| TaglibError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_object(text: &str, path: &Path) -> TaglibResult<Map<String, Value>> {
    let value: Value = serde_json::from_str(text).map_err(|source| TaglibError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(TaglibError::NotAnObject(path.to_path_buf())),
    }
}

/// `<name>` -> `name`
fn tag_key(key: &str) -> Option<&str> {
    key.strip_prefix('<')?.strip_suffix('>')
}

/// First property present under any of `names`.
fn prop<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn flag(object: &Map<String, Value>, names: &[&str]) -> bool {
    prop(object, names).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn path_prop(object: &Map<String, Value>, names: &[&str], dir: &Path) -> Option<PathBuf> {
    match prop(object, names)? {
        Value::String(path) => Some(dir.join(path)),
        Value::Object(inner) => prop(inner, &["path", "filePath"])
            .and_then(Value::as_str)
            .map(|path| dir.join(path)),
        _ => None,
    }
}

fn autocomplete_entries(value: Option<&Value>) -> Vec<AutocompleteEntry> {
    let parse = |value: &Value| serde_json::from_value::<AutocompleteEntry>(value.clone()).ok();
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(parse).collect(),
        Some(value @ Value::Object(_)) => parse(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn parse_tag(name: &str, object: &Map<String, Value>, source: &Path) -> TagDef {
    let dir = source.parent().unwrap_or(Path::new(""));
    let mut tag = TagDef::new(name);
    tag.html = flag(object, &["html"]);
    tag.deprecated = flag(object, &["deprecated"]);
    tag.open_tag_only = flag(object, &["openTagOnly", "open-tag-only"]);
    tag.autocomplete = autocomplete_entries(object.get("autocomplete"));
    tag.taglib_path = Some(source.to_path_buf());

    tag.files.renderer = path_prop(object, &["renderer"], dir);
    tag.files.template = path_prop(object, &["template"], dir);
    tag.files.code_generator =
        path_prop(object, &["codeGeneratorModulePath", "code-generator", "codeGenerator"], dir);
    tag.files.node_factory =
        path_prop(object, &["nodeFactoryPath", "node-factory", "nodeFactory"], dir);
    tag.files.transformer = path_prop(object, &["transformer", "transform"], dir);
    tag.files.file_path = Some(source.to_path_buf());

    for (key, value) in object {
        if let Some(attr_name) = key.strip_prefix('@') {
            tag.set_attribute(parse_attr(attr_name, value, source));
        }
    }
    if let Some(Value::Object(attributes)) = object.get("attributes") {
        for (attr_name, value) in attributes {
            let attr_name = attr_name.strip_prefix('@').unwrap_or(attr_name);
            tag.set_attribute(parse_attr(attr_name, value, source));
        }
    }
    tag
}

fn parse_attr(name: &str, value: &Value, source: &Path) -> AttrDef {
    let mut attr = AttrDef::new(name);
    attr.file_path = Some(source.to_path_buf());

    match value {
        Value::String(attr_type) => attr.attr_type = Some(attr_type.clone()),
        Value::Object(object) => {
            attr.attr_type = object.get("type").and_then(Value::as_str).map(str::to_string);
            attr.html = flag(object, &["html"]);
            attr.deprecated = flag(object, &["deprecated"]);
            attr.autocomplete = autocomplete_entries(object.get("autocomplete"));
            if let Some(Value::Array(values)) = object.get("enum") {
                attr.enum_values = values
                    .iter()
                    .filter_map(|v| serde_json::from_value::<EnumValue>(v.clone()).ok())
                    .collect();
            }
        }
        _ => {}
    }
    attr
}

/// Implementation files found by convention in a tag directory.
fn implementation_files(dir: &Path) -> TagFiles {
    let existing = |names: &[&str]| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    };
    TagFiles {
        renderer: existing(&["renderer.js", "index.js"]),
        template: existing(&["index.marko", "template.marko"]),
        ..TagFiles::default()
    }
}

// ==================== Built-in HTML ====================

const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "audio", "b", "blockquote", "body", "button",
    "canvas", "caption", "code", "dd", "details", "div", "dl", "dt", "em", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "html", "i", "iframe", "label", "legend", "li", "main", "nav", "noscript", "ol",
    "optgroup", "option", "p", "pre", "section", "select", "small", "span", "strong", "sub",
    "summary", "sup", "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead",
    "title", "tr", "u", "ul", "video", "script", "style",
];

const HTML_VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const HTML_GLOBAL_ATTRS: &[&str] = &[
    "accesskey", "class", "contenteditable", "draggable", "hidden", "id", "lang", "role",
    "style", "tabindex", "title", "onclick", "onchange", "oninput", "onsubmit", "onkeydown",
    "onkeyup", "onfocus", "onblur", "onmouseover", "onmouseout",
];

const HTML_TAG_ATTRS: &[(&str, &[&str])] = &[
    ("a", &["href", "download", "rel", "hreflang"]),
    ("audio", &["src", "autoplay", "controls", "loop", "muted"]),
    ("button", &["disabled", "name", "value", "form"]),
    ("form", &["action", "enctype", "name", "novalidate"]),
    ("iframe", &["src", "name", "width", "height", "allow"]),
    ("img", &["src", "alt", "width", "height", "srcset", "sizes"]),
    ("input", &["name", "value", "placeholder", "checked", "disabled", "readonly", "required", "min", "max", "step", "pattern"]),
    ("label", &["for", "form"]),
    ("link", &["href", "media", "type", "sizes"]),
    ("meta", &["name", "content", "charset", "http-equiv"]),
    ("option", &["value", "selected", "disabled", "label"]),
    ("script", &["src", "async", "defer", "type", "integrity"]),
    ("select", &["name", "multiple", "disabled", "required", "size"]),
    ("td", &["colspan", "rowspan", "headers"]),
    ("textarea", &["name", "rows", "cols", "placeholder", "disabled", "readonly", "required"]),
    ("th", &["colspan", "rowspan", "scope"]),
    ("video", &["src", "autoplay", "controls", "loop", "muted", "poster", "width", "height"]),
];

const HTML_ENUM_ATTRS: &[(&str, &str, &[&str])] = &[
    (GLOBAL_TAG, "dir", &["ltr", "rtl", "auto"]),
    ("a", "target", &["_blank", "_self", "_parent", "_top"]),
    ("button", "type", &["button", "submit", "reset"]),
    ("form", "method", &["get", "post", "dialog"]),
    ("form", "target", &["_blank", "_self", "_parent", "_top"]),
    ("input", "type", &[
        "button", "checkbox", "color", "date", "datetime-local", "email", "file", "hidden",
        "image", "month", "number", "password", "radio", "range", "reset", "search", "submit",
        "tel", "text", "time", "url", "week",
    ]),
    ("link", "rel", &["stylesheet", "icon", "preload", "prefetch", "alternate", "canonical"]),
    ("script", "type", &["module", "text/javascript"]),
];

fn html_attr(name: &str) -> AttrDef {
    let mut attr = AttrDef::new(name);
    attr.html = true;
    attr.attr_type = Some("string".to_string());
    attr
}

/// Common HTML tags and attributes, all flagged `html`.
pub fn builtin_html() -> Taglib {
    let mut taglib = Taglib::new();

    for name in HTML_TAGS.iter().chain(HTML_VOID_TAGS) {
        let mut tag = TagDef::new(*name);
        tag.html = true;
        tag.open_tag_only = HTML_VOID_TAGS.contains(name);
        taglib.insert(tag);
    }

    let mut global = TagDef::new(GLOBAL_TAG);
    global.html = true;
    global.attributes = HTML_GLOBAL_ATTRS.iter().map(|name| html_attr(name)).collect();
    taglib.insert(global);

    for (tag_name, attrs) in HTML_TAG_ATTRS {
        if let Some(tag) = taglib.tags.get_mut(*tag_name) {
            for name in *attrs {
                tag.set_attribute(html_attr(name));
            }
        }
    }

    for (tag_name, attr_name, values) in HTML_ENUM_ATTRS {
        if let Some(tag) = taglib.tags.get_mut(*tag_name) {
            let mut attr = html_attr(attr_name);
            attr.enum_values = values.iter().map(|v| EnumValue::Plain(v.to_string())).collect();
            tag.set_attribute(attr);
        }
    }

    taglib
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGLIB: &str = r#"{
        "<fancy-button>": {
            "renderer": "./fancy-button/renderer.js",
            "@size": { "type": "string", "enum": ["small", "large"] },
            "@label": "string",
            "attributes": { "disabled": { "type": "boolean", "deprecated": true } },
            "autocomplete": [{ "snippet": "fancy-button size=\"${1:size}\"" }]
        },
        "<fancy-icon>": { "template": "./icon.marko", "open-tag-only": true },
        "<*>": { "@track-id": "string" },
        "taglib-id": "ignored"
    }"#;

    fn fancy() -> Taglib {
        let mut taglib = Taglib::new();
        taglib
            .load_str(TAGLIB, Path::new("/project/marko.json"))
            .unwrap();
        taglib
    }

    #[test]
    fn test_parse_tags_and_attributes() {
        let taglib = fancy();
        assert_eq!(taglib.len(), 3);

        let button = taglib.tag("fancy-button").unwrap();
        assert_eq!(
            button.files.renderer,
            Some(PathBuf::from("/project/./fancy-button/renderer.js"))
        );
        assert_eq!(button.autocomplete.len(), 1);
        assert_eq!(button.attributes.len(), 3);

        let size = button.attribute("size").unwrap();
        assert_eq!(size.attr_type.as_deref(), Some("string"));
        assert_eq!(size.enum_values.len(), 2);
        assert_eq!(size.file_path, Some(PathBuf::from("/project/marko.json")));

        assert!(button.attribute("disabled").unwrap().deprecated);
        assert!(taglib.tag("fancy-icon").unwrap().open_tag_only);
    }

    #[test]
    fn test_global_attributes_follow_local_ones() {
        let taglib = fancy();
        let mut seen = Vec::new();
        taglib.for_each_attribute("fancy-button", &mut |attr, tag| {
            seen.push((attr.name.clone(), tag.name.clone()));
        });
        assert_eq!(seen.last(), Some(&("track-id".to_string(), "*".to_string())));
        assert_eq!(seen.len(), 4);

        assert!(taglib.attribute("fancy-icon", "track-id").is_some());
        assert!(taglib.attribute("fancy-icon", "size").is_none());
    }

    #[test]
    fn test_unknown_tag_still_gets_globals() {
        let taglib = fancy();
        let mut count = 0;
        taglib.for_each_attribute("nope", &mut |_, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut taglib = Taglib::new();
        let err = taglib.load_str("{ nope", Path::new("marko.json")).unwrap_err();
        assert!(matches!(err, TaglibError::Json { .. }));

        let err = taglib.load_str("[]", Path::new("marko.json")).unwrap_err();
        assert!(matches!(err, TaglibError::NotAnObject(_)));
    }

    #[test]
    fn test_later_taglib_overrides() {
        let mut taglib = builtin_html();
        taglib
            .load_str(
                r#"{ "<button>": { "template": "./button.marko", "@variant": "string" } }"#,
                Path::new("/app/marko.json"),
            )
            .unwrap();

        let button = taglib.tag("button").unwrap();
        assert!(!button.html);
        assert!(button.attribute("type").is_some());
        assert!(button.attribute("variant").is_some());
    }

    #[test]
    fn test_builtin_html() {
        let taglib = builtin_html();
        assert!(taglib.tag("div").unwrap().html);
        assert!(taglib.tag("br").unwrap().open_tag_only);
        assert!(taglib.attribute("input", "type").unwrap().has_enum());
        assert!(taglib.attribute("span", "class").unwrap().html);
        assert!(taglib.attribute("span", "dir").unwrap().has_enum());
    }

    #[test]
    fn test_tags_dir() {
        let dir = tempfile::tempdir().unwrap();
        let components = dir.path().join("components");
        fs::create_dir_all(components.join("app-header")).unwrap();
        fs::write(components.join("app-header").join("index.marko"), "<header/>").unwrap();
        fs::create_dir_all(components.join("app-footer")).unwrap();
        fs::write(
            components.join("app-footer").join(TAG_FILE),
            r#"{ "@year": "number" }"#,
        )
        .unwrap();
        fs::write(components.join("app-footer").join("renderer.js"), "").unwrap();
        fs::write(components.join("app-nav.marko"), "<nav/>").unwrap();
        fs::create_dir_all(components.join("empty")).unwrap();

        let taglib_path = dir.path().join("marko.json");
        fs::write(&taglib_path, r#"{ "tags-dir": "./components" }"#).unwrap();

        let mut taglib = Taglib::new();
        taglib.load_file(&taglib_path).unwrap();

        assert_eq!(taglib.len(), 3);
        let header = taglib.tag("app-header").unwrap();
        assert_eq!(
            header.definition_file(),
            Some(components.join("app-header").join("index.marko").as_path())
        );
        let footer = taglib.tag("app-footer").unwrap();
        assert!(footer.attribute("year").is_some());
        assert_eq!(
            footer.definition_file(),
            Some(components.join("app-footer").join("renderer.js").as_path())
        );
        assert!(taglib.tag("app-nav").is_some());
        assert!(taglib.tag("empty").is_none());
    }
}
