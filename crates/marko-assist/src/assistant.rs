//! Configured entry point for completion and navigation requests.

use marko_buffer::Position;
use marko_core::{Config, Document, EditorEvent};
use marko_syntax::{MarkoScopeClassifier, ScopeClassifier};
use marko_taglib::{LoadOptions, Taglib, TaglibCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::autocomplete::{AutocompleteInspector, InspectionResult};
use crate::fuzzy::{FuzzyScorer, JaroWinklerScorer};
use crate::hyperclick::{ClickInspection, HyperclickInspector};
use crate::navigation::{self, NavigationTarget};
use crate::suggestions::{Suggestion, SuggestionsBuilder};
use crate::AssistResult;

/// Answers completion and jump-to-definition requests for Marko documents.
///
/// Owns the taglib cache; feed it [`EditorEvent`]s so saved taglib files
/// are picked up.
pub struct Assistant {
    config: Config,
    taglibs: TaglibCache,
    scorer: Box<dyn FuzzyScorer>,
    classifier: Box<dyn ScopeClassifier>,
    /// Used for documents that were never saved
    default_dir: PathBuf,
}

impl Assistant {
    pub fn new(config: Config, project_dir: Option<PathBuf>) -> Self {
        let default_dir = project_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let options = LoadOptions {
            file_names: config.taglib.file_names.clone(),
            scan_node_modules: config.taglib.scan_node_modules,
            invalidate_on_save: config.taglib.invalidate_on_save.clone(),
            project_dir,
            include_html: true,
        };

        Self {
            config,
            taglibs: TaglibCache::new(options),
            scorer: Box::new(JaroWinklerScorer),
            classifier: Box::new(MarkoScopeClassifier),
            default_dir,
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn FuzzyScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn taglibs(&mut self) -> &mut TaglibCache {
        &mut self.taglibs
    }

    /// Directory the document's taglib lookups start from.
    pub fn base_dir(&self, doc: &Document) -> PathBuf {
        doc.path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_dir.clone())
    }

    /// Cursor context for completion.
    pub fn inspect(&self, doc: &Document, pos: Position) -> InspectionResult {
        AutocompleteInspector::new(doc, self.classifier.as_ref()).inspect(pos)
    }

    /// Ranked suggestions at `pos`. The taglib is only loaded when the
    /// context needs one.
    pub fn suggestions(&mut self, doc: &Document, pos: Position) -> AssistResult<Vec<Suggestion>> {
        if !self.config.autocomplete.enabled {
            return Ok(Vec::new());
        }

        let inspected = self.inspect(doc, pos);
        if inspected.completion.is_none() {
            return Ok(Vec::new());
        }

        let (taglib, version) = if inspected.needs_taglib() {
            let dir = self.base_dir(doc);
            let taglib = self.taglibs.lookup_for(&dir)?;
            (taglib, self.taglibs.marko_major_version(&dir))
        } else {
            (Arc::new(Taglib::new()), None)
        };

        Ok(
            SuggestionsBuilder::new(&inspected, taglib.as_ref(), self.scorer.as_ref())
                .with_marko_version(version, self.config.autocomplete.min_marko_version)
                .build(),
        )
    }

    /// What the word at `pos` is, for jump-to-definition.
    pub fn click(&self, doc: &Document, pos: Position) -> Option<ClickInspection> {
        if doc.root_scope() != marko_syntax::scopes::MARKO_ROOT {
            return None;
        }
        HyperclickInspector::new(doc, self.classifier.as_ref()).inspect(pos)
    }

    /// Where clicking `pos` leads, with the range of the clicked word.
    pub fn navigate(
        &mut self,
        doc: &Document,
        pos: Position,
    ) -> AssistResult<Option<(ClickInspection, NavigationTarget)>> {
        if !self.config.hyperclick.enabled {
            return Ok(None);
        }
        let Some(inspection) = self.click(doc, pos) else {
            return Ok(None);
        };

        let dir = self.base_dir(doc);
        let target = navigation::resolve(
            &inspection,
            doc.path(),
            &self.config.hyperclick.component_files,
            &dir,
            &mut self.taglibs,
        )?;
        Ok(target.map(|target| (inspection, target)))
    }

    /// Reacts to editor events; returns true when cached taglibs were dropped.
    pub fn handle_event(&mut self, event: &EditorEvent) -> bool {
        match event {
            EditorEvent::Saved(path) => self.taglibs.handle_saved(path),
            _ => false,
        }
    }
}
