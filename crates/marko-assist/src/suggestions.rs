//! Completion suggestions for an inspected cursor context.
//!
//! ## Ranking
//!
//! With a non-empty prefix every candidate is scored by the
//! [`FuzzyScorer`]; a score of zero or less drops it. Survivors sort by
//! priority (tag-local attributes before global ones), then score, then
//! sort text, and finally insertion order so equal entries stay stable.
//!
//! ## Snippets
//!
//! Snippets use `${n}` / `${n:label}` tab stops. Tags that complete their
//! ending get `name${1}>${2}</name>${3}`, open-tag-only tags `name${1} />${2}`.

use marko_taglib::{AttrDef, AutocompleteEntry, TagDef, TaglibLookup, project};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::autocomplete::{CompletionType, InspectionResult};
use crate::fuzzy::FuzzyScorer;

const SORT_PRIORITY_GLOBAL: u32 = 5;
const SORT_PRIORITY_LOCAL: u32 = 10;

static SNIPPET_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{[0-9]+:([^}]+)\}|\$\{[0-9]+\}|\$[0-9]+").unwrap());

/// `<label>` for labelled tab stops, nothing for bare ones.
pub fn display_text_for_snippet(snippet: &str) -> String {
    SNIPPET_PLACEHOLDER
        .replace_all(snippet, |caps: &Captures| match caps.get(1) {
            Some(label) => format!("<{}>", label.as_str()),
            None => String::new(),
        })
        .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Tag,
    Attribute,
    Value,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    /// Plain replacement text, used when there is no snippet
    pub text: Option<String>,
    pub snippet: Option<String>,
    pub display_text: Option<String>,
    pub description: Option<String>,
    /// Attribute type
    pub left_label: Option<String>,
    /// Where the definition comes from
    pub right_label: Option<String>,
    pub sort_text: String,
    pub sort_priority: u32,
    pub sort_score: f64,
    /// Text before the cursor this suggestion replaces
    pub replacement_prefix: String,
    /// Reopen suggestions after inserting (attribute with allowed values)
    pub trigger_autocomplete_after_insert: bool,
    #[serde(skip)]
    index: usize,
}

impl Suggestion {
    fn new(kind: SuggestionKind, text: &str) -> Self {
        Self {
            kind,
            text: Some(text.to_string()),
            snippet: None,
            display_text: None,
            description: None,
            left_label: None,
            right_label: None,
            sort_text: String::new(),
            sort_priority: 0,
            sort_score: 0.0,
            replacement_prefix: String::new(),
            trigger_autocomplete_after_insert: false,
            index: 0,
        }
    }

    /// Overlays an autocomplete entry from a taglib.
    fn with_entry(&self, entry: &AutocompleteEntry) -> Self {
        let mut merged = self.clone();
        if entry.text.is_some() {
            merged.text = entry.text.clone();
        }
        if entry.snippet.is_some() {
            merged.snippet = entry.snippet.clone();
        }
        if entry.display_text.is_some() {
            merged.display_text = entry.display_text.clone();
        }
        if entry.description.is_some() {
            merged.description = entry.description.clone();
        }
        merged
    }

    /// Text inserted for this suggestion.
    pub fn insert_text(&self) -> &str {
        self.snippet
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.sort_priority
        .cmp(&a.sort_priority)
        .then_with(|| {
            if a.sort_score != 0.0 || b.sort_score != 0.0 {
                b.sort_score
                    .partial_cmp(&a.sort_score)
                    .unwrap_or(Ordering::Equal)
            } else {
                a.sort_text.cmp(&b.sort_text)
            }
        })
        .then(a.index.cmp(&b.index))
}

/// Collects and ranks suggestions for one inspection.
pub struct SuggestionsBuilder<'a> {
    inspected: &'a InspectionResult,
    lookup: &'a dyn TaglibLookup,
    scorer: &'a dyn FuzzyScorer,
    marko_major_version: Option<u32>,
    min_marko_version: u32,
    labels: HashMap<PathBuf, Option<String>>,
    suggestions: Vec<Suggestion>,
}

impl<'a> SuggestionsBuilder<'a> {
    pub fn new(
        inspected: &'a InspectionResult,
        lookup: &'a dyn TaglibLookup,
        scorer: &'a dyn FuzzyScorer,
    ) -> Self {
        Self {
            inspected,
            lookup,
            scorer,
            marko_major_version: None,
            min_marko_version: 3,
            labels: HashMap::new(),
            suggestions: Vec::new(),
        }
    }

    /// Installed Marko major version; tags and attributes are only offered
    /// when it is unknown or at least `min`.
    pub fn with_marko_version(mut self, version: Option<u32>, min: u32) -> Self {
        self.marko_major_version = version;
        self.min_marko_version = min;
        self
    }

    pub fn build(mut self) -> Vec<Suggestion> {
        match self.inspected.completion {
            Some(CompletionType::TagStart | CompletionType::TagEnd) => self.add_tag_suggestions(),
            Some(CompletionType::AttrName) => self.add_attribute_suggestions(),
            Some(CompletionType::AttrValue) => self.add_attribute_value_suggestions(),
            None => {}
        }

        self.suggestions.sort_by(compare);
        tracing::debug!(
            "{} suggestions for {:?} with prefix {:?}",
            self.suggestions.len(),
            self.inspected.completion,
            self.inspected.prefix
        );
        self.suggestions
    }

    fn version_supported(&self) -> bool {
        self.marko_major_version
            .is_none_or(|version| version >= self.min_marko_version)
    }

    fn add(&mut self, mut suggestion: Suggestion) {
        if suggestion.sort_text.is_empty() {
            suggestion.sort_text = suggestion
                .display_text
                .clone()
                .or_else(|| suggestion.snippet.clone())
                .or_else(|| suggestion.text.clone())
                .unwrap_or_default();
        }

        let prefix = &self.inspected.prefix;
        if !prefix.is_empty() {
            suggestion.sort_score = self.scorer.score(&suggestion.sort_text, prefix);
            if suggestion.sort_score <= 0.0 {
                return;
            }
        }

        suggestion.replacement_prefix = prefix.clone();
        suggestion.index = self.suggestions.len();
        self.suggestions.push(suggestion);
    }

    fn label(&mut self, path: Option<&Path>) -> Option<String> {
        let path = path?;
        self.labels
            .entry(path.to_path_buf())
            .or_insert_with(|| project::taglib_label(path))
            .clone()
    }

    // ==================== Tags ====================

    fn add_tag_suggestions(&mut self) {
        if !self.version_supported() {
            return;
        }
        let inspected = self.inspected;

        if inspected.completion == Some(CompletionType::TagEnd) {
            let tag_name = inspected.tag_name.clone().unwrap_or_default();
            let text = if inspected.should_complete_ending_tag == Some(true) {
                format!("{tag_name}>")
            } else {
                tag_name.clone()
            };

            if inspected.prefix != text {
                let mut suggestion = Suggestion::new(SuggestionKind::Tag, &text);
                suggestion.display_text = Some(tag_name.clone());
                suggestion.sort_text = tag_name;
                self.add(suggestion);
            }
            return;
        }

        if inspected.has_shorthand {
            if !inspected.concise && inspected.should_complete_ending_tag != Some(false) {
                let tag_name = inspected.tag_name.as_deref().unwrap_or_default();
                let prefix = &inspected.prefix;
                let mut suggestion = Suggestion::new(SuggestionKind::Tag, tag_name);
                suggestion.display_text = Some(format!("<{prefix}></{tag_name}>"));
                suggestion.snippet = Some(format!("{prefix}${{1}}>${{2}}</{tag_name}>"));
                self.add(suggestion);
            }
            return;
        }

        let lookup = self.lookup;
        for tag in lookup.tags_sorted() {
            if tag.is_suggestable() {
                self.add_tag(tag);
            }
        }
    }

    fn add_tag(&mut self, tag: &TagDef) {
        let name = &tag.name;
        let mut suggestion = Suggestion::new(SuggestionKind::Tag, name);
        suggestion.sort_text = name.clone();
        suggestion.display_text = Some(name.clone());
        suggestion.description = Some(if tag.html {
            format!("HTML <{name}> tag")
        } else {
            format!("Custom Marko <{name}> tag")
        });
        suggestion.right_label = self.label(tag.taglib_path.as_deref());

        if !tag.autocomplete.is_empty() {
            for entry in &tag.autocomplete {
                self.add_tag_entry(&suggestion, entry, tag);
            }
            return;
        }

        let inspected = self.inspected;
        if inspected.should_complete_ending_tag == Some(true) && !inspected.concise {
            suggestion.snippet = Some(if tag.open_tag_only {
                format!("{name}${{1}} />${{2}}")
            } else {
                format!("{name}${{1}}>${{2}}</{name}>${{3}}")
            });
        }
        self.add(suggestion);
    }

    fn add_tag_entry(&mut self, base: &Suggestion, entry: &AutocompleteEntry, tag: &TagDef) {
        let name = &tag.name;
        let mut merged = base.with_entry(entry);

        let mut snippet = match &entry.snippet {
            Some(snippet) => {
                if entry.display_text.is_none() {
                    merged.display_text = Some(display_text_for_snippet(snippet));
                }
                snippet.clone()
            }
            None => {
                merged.display_text = Some(name.clone());
                name.clone()
            }
        };

        let inspected = self.inspected;
        if !inspected.concise && inspected.should_complete_ending_tag == Some(true) {
            if tag.open_tag_only || entry.open_tag_only {
                snippet.push_str("${99} />");
            } else {
                snippet.push_str(&format!("${{98}}>${{99}}</{name}>"));
            }
        }
        snippet.push_str("${100}");
        merged.snippet = Some(snippet);

        self.add(merged);
    }

    // ==================== Attributes ====================

    fn add_attribute_suggestions(&mut self) {
        let Some(tag_name) = self.inspected.tag_name.as_deref() else {
            return;
        };
        if !self.version_supported() {
            return;
        }

        let mut found: Vec<(AttrDef, bool, Option<PathBuf>)> = Vec::new();
        self.lookup.for_each_attribute(tag_name, &mut |attr, tag| {
            if attr.is_suggestable() {
                let source = tag.files.file_path.clone().or_else(|| tag.taglib_path.clone());
                found.push((attr.clone(), tag.is_global(), source));
            }
        });

        for (attr, global, source) in found {
            self.add_attribute(&attr, global, source.as_deref());
        }
    }

    fn add_attribute(&mut self, attr: &AttrDef, global: bool, source: Option<&Path>) {
        let name = &attr.name;
        let mut suggestion = Suggestion::new(SuggestionKind::Attribute, name);
        suggestion.display_text = Some(name.clone());
        suggestion.description = Some(if attr.html {
            format!("HTML attribute: {name}")
        } else {
            format!("Custom Marko attribute: {name}")
        });
        suggestion.sort_priority = if global {
            SORT_PRIORITY_GLOBAL
        } else {
            SORT_PRIORITY_LOCAL
        };
        suggestion.left_label = attr.attr_type.clone();
        suggestion.right_label = self.label(source);

        if !attr.autocomplete.is_empty() {
            for entry in &attr.autocomplete {
                let mut merged = suggestion.with_entry(entry);
                if let Some(snippet) = &entry.snippet
                    && entry.display_text.is_none()
                {
                    merged.display_text = Some(display_text_for_snippet(snippet));
                }
                if let Some(snippet) = merged.snippet.as_mut() {
                    snippet.push_str("${99}");
                    merged.sort_text = name.clone();
                }
                self.add(merged);
            }
            return;
        }

        if self.inspected.should_complete_attribute_value != Some(false) {
            if attr.has_enum() {
                suggestion.snippet = Some(format!("{name}=\"$1\"$0"));
                suggestion.trigger_autocomplete_after_insert = true;
            } else if attr.attr_type.as_deref() == Some("string") {
                suggestion.snippet = Some(format!("{name}=\"$1\""));
            } else {
                suggestion.snippet = Some(format!("{name}=$0"));
            }
        }
        self.add(suggestion);
    }

    fn add_attribute_value_suggestions(&mut self) {
        let inspected = self.inspected;
        let (Some(tag_name), Some(attr_name)) = (
            inspected.tag_name.as_deref(),
            inspected.attribute_name.as_deref(),
        ) else {
            return;
        };

        let lookup = self.lookup;
        let Some(attr) = lookup.attribute(tag_name, attr_name) else {
            return;
        };

        for value in &attr.enum_values {
            let mut suggestion = Suggestion::new(SuggestionKind::Value, value.value());
            suggestion.description = value.description().map(str::to_string);
            self.add(suggestion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::JaroWinklerScorer;
    use marko_taglib::{EnumValue, Taglib, builtin_html};

    fn custom_taglib() -> Taglib {
        let mut taglib = builtin_html();
        taglib
            .load_str(
                r#"{
                    "<fancy-button>": {
                        "renderer": "./renderer.js",
                        "@size": { "type": "string", "enum": ["small", "large"] },
                        "@_internal": "string",
                        "@old": { "type": "string", "deprecated": true },
                        "@on-press": "expression"
                    },
                    "<fancy-icon>": { "template": "./icon.marko", "open-tag-only": true },
                    "<fancy-card>": {
                        "template": "./card.marko",
                        "autocomplete": [
                            { "snippet": "fancy-card title=\"${1:title}\"" },
                            { "displayText": "fancy card (plain)" }
                        ]
                    },
                    "<_hidden>": { "template": "./hidden.marko" },
                    "<legacy>": { "template": "./legacy.marko", "deprecated": true }
                }"#,
                Path::new("/nowhere/taglib/marko.json"),
            )
            .unwrap();
        taglib
    }

    fn tag_start(prefix: &str) -> InspectionResult {
        InspectionResult {
            completion: Some(CompletionType::TagStart),
            tag_name: Some(prefix.to_string()),
            prefix: prefix.to_string(),
            should_complete_ending_tag: Some(true),
            ..InspectionResult::default()
        }
    }

    fn build(inspected: &InspectionResult, taglib: &Taglib) -> Vec<Suggestion> {
        SuggestionsBuilder::new(inspected, taglib, &JaroWinklerScorer).build()
    }

    #[test]
    fn test_display_text_for_snippet() {
        assert_eq!(
            display_text_for_snippet("fancy-card title=\"${1:title}\"${2}$0"),
            "fancy-card title=\"<title>\""
        );
    }

    #[test]
    fn test_tag_snippets() {
        let taglib = custom_taglib();
        let suggestions = build(&tag_start("fancy"), &taglib);

        let icon = suggestions
            .iter()
            .find(|s| s.text.as_deref() == Some("fancy-icon"))
            .unwrap();
        assert_eq!(icon.snippet.as_deref(), Some("fancy-icon${1} />${2}"));
        assert_eq!(icon.description.as_deref(), Some("Custom Marko <fancy-icon> tag"));
        assert_eq!(icon.right_label.as_deref(), Some("taglib"));
        assert_eq!(icon.replacement_prefix, "fancy");

        let button = suggestions
            .iter()
            .find(|s| s.text.as_deref() == Some("fancy-button"))
            .unwrap();
        assert_eq!(
            button.snippet.as_deref(),
            Some("fancy-button${1}>${2}</fancy-button>${3}")
        );
    }

    #[test]
    fn test_hidden_and_deprecated_tags_skipped() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            prefix: String::new(),
            ..tag_start("")
        };
        let names: Vec<_> = build(&inspected, &taglib)
            .into_iter()
            .filter_map(|s| s.text)
            .collect();
        assert!(names.contains(&"div".to_string()));
        assert!(!names.iter().any(|n| n == "_hidden" || n == "legacy" || n == "*"));
    }

    #[test]
    fn test_no_prefix_sorts_by_text() {
        let taglib = custom_taglib();
        let suggestions = build(&tag_start(""), &taglib);
        let sort_texts: Vec<_> = suggestions.iter().map(|s| s.sort_text.clone()).collect();
        let mut sorted = sort_texts.clone();
        sorted.sort();
        assert_eq!(sort_texts, sorted);
    }

    #[test]
    fn test_tag_autocomplete_entries() {
        let taglib = custom_taglib();
        let suggestions = build(&tag_start("fancy-c"), &taglib);
        let cards: Vec<_> = suggestions
            .iter()
            .filter(|s| s.sort_text == "fancy-card")
            .collect();
        assert_eq!(cards.len(), 2);

        let snippet = cards
            .iter()
            .find_map(|s| s.snippet.as_deref().filter(|s| s.contains("title")))
            .unwrap();
        assert_eq!(
            snippet,
            "fancy-card title=\"${1:title}\"${98}>${99}</fancy-card>${100}"
        );
        assert!(cards.iter().any(|s| s.display_text.as_deref() == Some("fancy-card")));
        assert!(
            cards
                .iter()
                .any(|s| s.display_text.as_deref() == Some("fancy-card title=\"<title>\""))
        );
    }

    #[test]
    fn test_concise_tags_get_no_ending() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            concise: true,
            should_complete_ending_tag: None,
            ..tag_start("fancy-b")
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions[0].text.as_deref(), Some("fancy-button"));
        assert_eq!(suggestions[0].snippet, None);
    }

    #[test]
    fn test_shorthand() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            tag_name: Some("div".to_string()),
            prefix: "div.foo".to_string(),
            has_shorthand: true,
            ..tag_start("div.foo")
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].snippet.as_deref(), Some("div.foo${1}>${2}</div>"));
        assert_eq!(suggestions[0].display_text.as_deref(), Some("<div.foo></div>"));

        let concise = InspectionResult {
            concise: true,
            ..inspected.clone()
        };
        assert!(build(&concise, &taglib).is_empty());

        let closed = InspectionResult {
            should_complete_ending_tag: Some(false),
            ..inspected
        };
        assert!(build(&closed, &taglib).is_empty());
    }

    #[test]
    fn test_tag_end() {
        let taglib = Taglib::new();
        let inspected = InspectionResult {
            completion: Some(CompletionType::TagEnd),
            tag_name: Some("div".to_string()),
            should_complete_ending_tag: Some(true),
            ..InspectionResult::default()
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text.as_deref(), Some("div>"));
        assert_eq!(suggestions[0].display_text.as_deref(), Some("div"));

        let typed = InspectionResult {
            prefix: "div".to_string(),
            should_complete_ending_tag: Some(false),
            ..inspected
        };
        assert!(build(&typed, &taglib).is_empty());
    }

    #[test]
    fn test_attributes_local_before_global() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            completion: Some(CompletionType::AttrName),
            tag_name: Some("fancy-button".to_string()),
            ..InspectionResult::default()
        };
        let suggestions = build(&inspected, &taglib);

        let first_global = suggestions
            .iter()
            .position(|s| s.sort_priority == SORT_PRIORITY_GLOBAL)
            .unwrap();
        assert!(suggestions[..first_global]
            .iter()
            .all(|s| s.sort_priority == SORT_PRIORITY_LOCAL));
        assert_eq!(first_global, 2);

        let size = &suggestions[1];
        assert_eq!(size.text.as_deref(), Some("size"));
        assert_eq!(size.snippet.as_deref(), Some("size=\"$1\"$0"));
        assert!(size.trigger_autocomplete_after_insert);
        assert_eq!(size.left_label.as_deref(), Some("string"));

        let press = &suggestions[0];
        assert_eq!(press.snippet.as_deref(), Some("on-press=$0"));

        let class = suggestions
            .iter()
            .find(|s| s.text.as_deref() == Some("class"))
            .unwrap();
        assert_eq!(class.snippet.as_deref(), Some("class=\"$1\""));
        assert_eq!(class.description.as_deref(), Some("HTML attribute: class"));
    }

    #[test]
    fn test_attribute_prefix_filters() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            completion: Some(CompletionType::AttrName),
            tag_name: Some("div".to_string()),
            attribute_name: Some("cl".to_string()),
            prefix: "cl".to_string(),
            should_complete_attribute_value: Some(false),
            ..InspectionResult::default()
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions[0].text.as_deref(), Some("class"));
        assert_eq!(suggestions[0].snippet, None);
        assert!(suggestions.iter().all(|s| s.sort_score > 0.0));
    }

    #[test]
    fn test_attribute_values() {
        let taglib = custom_taglib();
        let inspected = InspectionResult {
            completion: Some(CompletionType::AttrValue),
            tag_name: Some("fancy-button".to_string()),
            attribute_name: Some("size".to_string()),
            prefix: "la".to_string(),
            ..InspectionResult::default()
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text.as_deref(), Some("large"));
        assert_eq!(suggestions[0].kind, SuggestionKind::Value);
    }

    #[test]
    fn test_attribute_autocomplete_entries() {
        let mut taglib = Taglib::new();
        let mut tag = TagDef::new("fancy-list");
        let mut attr = AttrDef::new("items");
        attr.autocomplete = vec![AutocompleteEntry {
            snippet: Some("items=${1:list}".to_string()),
            ..AutocompleteEntry::default()
        }];
        attr.enum_values = vec![EnumValue::Plain("ignored".to_string())];
        tag.set_attribute(attr);
        taglib.insert(tag);

        let inspected = InspectionResult {
            completion: Some(CompletionType::AttrName),
            tag_name: Some("fancy-list".to_string()),
            ..InspectionResult::default()
        };
        let suggestions = build(&inspected, &taglib);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].snippet.as_deref(), Some("items=${1:list}${99}"));
        assert_eq!(suggestions[0].display_text.as_deref(), Some("items=<list>"));
        assert_eq!(suggestions[0].sort_text, "items");
    }

    #[test]
    fn test_old_marko_versions_get_nothing() {
        let taglib = custom_taglib();
        let inspected = tag_start("fancy");
        let suggestions = SuggestionsBuilder::new(&inspected, &taglib, &JaroWinklerScorer)
            .with_marko_version(Some(2), 3)
            .build();
        assert!(suggestions.is_empty());

        let suggestions = SuggestionsBuilder::new(&inspected, &taglib, &JaroWinklerScorer)
            .with_marko_version(Some(4), 3)
            .build();
        assert!(!suggestions.is_empty());
    }
}
