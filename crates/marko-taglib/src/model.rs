//! Tag and attribute definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the pseudo-tag that carries global attributes.
pub const GLOBAL_TAG: &str = "*";

/// Read-only view over the tags and attributes known to a project.
pub trait TaglibLookup {
    /// Every tag, sorted by name.
    fn tags_sorted(&self) -> Vec<&TagDef>;

    fn tag(&self, name: &str) -> Option<&TagDef>;

    /// Calls `f` with each attribute usable on `tag_name` and the tag that
    /// defines it: the tag's own attributes first, then global ones it does
    /// not shadow.
    fn for_each_attribute(&self, tag_name: &str, f: &mut dyn FnMut(&AttrDef, &TagDef));

    /// The attribute `attr_name` as seen on `tag_name`, falling back to the
    /// global definition.
    fn attribute(&self, tag_name: &str, attr_name: &str) -> Option<&AttrDef>;
}

/// One completion offered by a tag or attribute definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutocompleteEntry {
    pub text: Option<String>,
    pub snippet: Option<String>,
    pub display_text: Option<String>,
    pub description: Option<String>,
    pub open_tag_only: bool,
}

/// An allowed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Plain(String),
    Described {
        value: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl EnumValue {
    pub fn value(&self) -> &str {
        match self {
            EnumValue::Plain(value) | EnumValue::Described { value, .. } => value,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            EnumValue::Plain(_) => None,
            EnumValue::Described { description, .. } => description.as_deref(),
        }
    }
}

/// An attribute definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttrDef {
    pub name: String,
    pub html: bool,
    pub deprecated: bool,
    /// Declared value type (`string`, `expression`, ...)
    pub attr_type: Option<String>,
    pub enum_values: Vec<EnumValue>,
    pub autocomplete: Vec<AutocompleteEntry>,
    /// Taglib file the attribute was declared in
    pub file_path: Option<PathBuf>,
}

impl AttrDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_enum(&self) -> bool {
        !self.enum_values.is_empty()
    }

    /// False for deprecated, wildcard and private (`_`) attributes.
    pub fn is_suggestable(&self) -> bool {
        !self.deprecated && self.name != GLOBAL_TAG && !self.name.starts_with('_')
    }
}

/// Files implementing a tag, in the order navigation prefers them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagFiles {
    pub renderer: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub code_generator: Option<PathBuf>,
    pub node_factory: Option<PathBuf>,
    pub transformer: Option<PathBuf>,
    pub file_path: Option<PathBuf>,
}

impl TagFiles {
    /// The first implementation file that is set.
    pub fn first(&self) -> Option<&Path> {
        [
            &self.renderer,
            &self.template,
            &self.code_generator,
            &self.node_factory,
            &self.transformer,
            &self.file_path,
        ]
        .into_iter()
        .find_map(|path| path.as_deref())
    }

    /// Fills unset slots from `other`, keeping what is already set.
    pub fn or(self, other: TagFiles) -> TagFiles {
        TagFiles {
            renderer: self.renderer.or(other.renderer),
            template: self.template.or(other.template),
            code_generator: self.code_generator.or(other.code_generator),
            node_factory: self.node_factory.or(other.node_factory),
            transformer: self.transformer.or(other.transformer),
            file_path: self.file_path.or(other.file_path),
        }
    }
}

/// A tag definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagDef {
    pub name: String,
    pub html: bool,
    pub deprecated: bool,
    pub open_tag_only: bool,
    pub autocomplete: Vec<AutocompleteEntry>,
    /// Attributes in declaration order
    pub attributes: Vec<AttrDef>,
    /// Taglib file that declared the tag
    pub taglib_path: Option<PathBuf>,
    pub files: TagFiles,
}

impl TagDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_global(&self) -> bool {
        self.name == GLOBAL_TAG
    }

    /// False for deprecated, wildcard and private (`_`) tags.
    pub fn is_suggestable(&self) -> bool {
        !self.deprecated && !self.name.contains('*') && !self.name.starts_with('_')
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrDef> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Adds an attribute, replacing one with the same name.
    pub fn set_attribute(&mut self, attr: AttrDef) {
        match self.attributes.iter_mut().find(|a| a.name == attr.name) {
            Some(existing) => *existing = attr,
            None => self.attributes.push(attr),
        }
    }

    /// File navigation should open for this tag.
    pub fn definition_file(&self) -> Option<&Path> {
        self.files.first()
    }

    /// Layers a later definition of the same tag over this one.
    pub fn merge(&mut self, later: TagDef) {
        self.html = later.html;
        self.deprecated = later.deprecated;
        self.open_tag_only = later.open_tag_only;
        if !later.autocomplete.is_empty() {
            self.autocomplete = later.autocomplete;
        }
        if later.taglib_path.is_some() {
            self.taglib_path = later.taglib_path;
        }
        self.files = later.files.or(std::mem::take(&mut self.files));
        for attr in later.attributes {
            self.set_attribute(attr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_file_order() {
        let files = TagFiles {
            template: Some(PathBuf::from("template.marko")),
            transformer: Some(PathBuf::from("transform.js")),
            ..TagFiles::default()
        };
        assert_eq!(files.first(), Some(Path::new("template.marko")));
        assert_eq!(TagFiles::default().first(), None);
    }

    #[test]
    fn test_suggestable_names() {
        assert!(TagDef::new("my-tag").is_suggestable());
        assert!(!TagDef::new("_private").is_suggestable());
        assert!(!TagDef::new("*").is_suggestable());

        let mut old = TagDef::new("old");
        old.deprecated = true;
        assert!(!old.is_suggestable());

        assert!(!AttrDef::new("*").is_suggestable());
        assert!(AttrDef::new("class").is_suggestable());
    }

    #[test]
    fn test_merge_keeps_earlier_attributes() {
        let mut tag = TagDef::new("button");
        tag.html = true;
        tag.set_attribute(AttrDef::new("type"));
        tag.files.renderer = Some(PathBuf::from("a.js"));

        let mut later = TagDef::new("button");
        later.set_attribute(AttrDef::new("size"));
        later.files.template = Some(PathBuf::from("b.marko"));
        tag.merge(later);

        assert!(!tag.html);
        assert_eq!(tag.attributes.len(), 2);
        assert_eq!(tag.definition_file(), Some(Path::new("a.js")));
        assert_eq!(tag.files.template, Some(PathBuf::from("b.marko")));
    }

    #[test]
    fn test_enum_value_forms() {
        let values: Vec<EnumValue> =
            serde_json::from_str(r#"["small", {"value": "large", "description": "Big"}]"#)
                .unwrap();
        assert_eq!(values[0].value(), "small");
        assert_eq!(values[1].value(), "large");
        assert_eq!(values[1].description(), Some("Big"));
    }
}
