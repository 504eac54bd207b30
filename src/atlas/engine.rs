//! The atlas engine.
//!
//! Owns the configuration, the current [`PageSequence`] and the [`Cursor`].
//!
//! ## Invalidation
//!
//! Setters that affect membership or order (enabled, coverage layer, filter
//! enabled/text, sort enabled/text/direction) only mark the atlas dirty. The
//! requery runs at the next [`AtlasEngine::requery`], [`AtlasEngine::update_features`]
//! or [`AtlasEngine::begin_render`]. Navigation fails while dirty.
//!
//! Hide-coverage, filename and page-name setters never invalidate.
//!
//! ## Replacement
//!
//! A requery builds a complete new sequence and swaps it in with the cursor
//! reset in the same step. Readers holding [`AtlasEngine::pages`] keep the old
//! sequence intact.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{
    AtlasConfig, AtlasConfigDocument, ConfigError, FilterSettings, SerializableConfig, SortSettings,
};
use crate::expression::{
    ExpressionBinding, ExpressionCache, ExpressionContext, ExpressionEngine, ExpressionSlot,
    SimpleExpressionEngine,
};
use crate::naming;
use crate::query::{self, QueryBindings, QueryError};
use crate::source::{CoverageLayerRef, CoverageSource, LayerReference, LayerResolver};
use crate::types::{Feature, FeatureId, Page, PageSequence};

use super::cursor::{Cursor, CursorPosition};
use super::observer::{AtlasEvent, AtlasObserver, ObserverId, ObserverList};
use super::render::{CoverageVisibility, PageIterator};
use super::AtlasError;

/// Status pushed when a requery matches nothing.
pub const NO_MATCHING_FEATURES: &str = "No matching atlas features";

/// Atlas iteration engine.
pub struct AtlasEngine {
    enabled: bool,
    hide_coverage: bool,
    coverage_reference: Option<LayerReference>,
    coverage: Option<CoverageLayerRef>,

    filter_enabled: bool,
    filter: ExpressionBinding,
    sort_enabled: bool,
    sort_ascending: bool,
    sort: ExpressionBinding,
    filename: ExpressionBinding,
    page_name: ExpressionBinding,
    cache: Arc<ExpressionCache>,

    pages: Arc<PageSequence>,
    cursor: Cursor,
    dirty: bool,
    queried: bool,

    rendering: bool,
    visibility: Option<Arc<dyn CoverageVisibility>>,
    hidden_layer: Option<LayerReference>,
    observers: ObserverList,
}

impl AtlasEngine {
    /// Create a disabled atlas using the given expression engine.
    pub fn new(engine: Arc<dyn ExpressionEngine>) -> Self {
        Self::with_cache(Arc::new(ExpressionCache::new(engine)))
    }

    /// Create a disabled atlas sharing a compile cache.
    pub fn with_cache(cache: Arc<ExpressionCache>) -> Self {
        let defaults = AtlasConfig::default();
        let mut filename = ExpressionBinding::new(ExpressionSlot::Filename);
        filename.set_text(&defaults.filename_expression);
        Self {
            enabled: defaults.enabled,
            hide_coverage: defaults.hide_coverage,
            coverage_reference: None,
            coverage: None,
            filter_enabled: defaults.filter.enabled,
            filter: ExpressionBinding::new(ExpressionSlot::Filter),
            sort_enabled: defaults.sort.enabled,
            sort_ascending: defaults.sort.ascending,
            sort: ExpressionBinding::new(ExpressionSlot::Sort),
            filename,
            page_name: ExpressionBinding::new(ExpressionSlot::PageName),
            cache,
            pages: Arc::new(PageSequence::empty()),
            cursor: Cursor::new(),
            dirty: false,
            queried: false,
            rendering: false,
            visibility: None,
            hidden_layer: None,
            observers: ObserverList::new(),
        }
    }

    // ------------------------------------------------------------------
    // Observers and collaborators
    // ------------------------------------------------------------------

    /// Register an observer.
    pub fn subscribe(&mut self, observer: Arc<dyn AtlasObserver>) -> ObserverId {
        self.observers.subscribe(observer)
    }

    /// Remove an observer.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Set the collaborator that hides the coverage layer during rendering.
    pub fn set_coverage_visibility(&mut self, visibility: Arc<dyn CoverageVisibility>) {
        self.visibility = Some(visibility);
    }

    /// Shared compile cache.
    pub fn expression_cache(&self) -> &Arc<ExpressionCache> {
        &self.cache
    }

    fn emit(&self, event: AtlasEvent) {
        self.observers.emit(&event);
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(AtlasEvent::StatusMessage(message.into()));
    }

    fn invalidate(&mut self) {
        self.dirty = true;
        self.emit(AtlasEvent::ConfigChanged);
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Whether the atlas is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the atlas. Invalidates.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.dirty = true;
        self.emit(AtlasEvent::Toggled(enabled));
    }

    /// Whether the coverage layer is hidden while rendering.
    pub fn hide_coverage(&self) -> bool {
        self.hide_coverage
    }

    /// Hide the coverage layer while rendering. Does not invalidate.
    pub fn set_hide_coverage(&mut self, hide: bool) {
        if self.hide_coverage == hide {
            return;
        }
        self.hide_coverage = hide;
        self.emit(AtlasEvent::ConfigChanged);
    }

    /// Reference of the coverage layer, bound or not.
    pub fn coverage_layer(&self) -> Option<&LayerReference> {
        self.coverage_reference.as_ref()
    }

    /// Whether a live coverage source is bound.
    pub fn has_coverage_source(&self) -> bool {
        self.coverage.as_ref().is_some_and(CoverageLayerRef::is_alive)
    }

    /// Bind the coverage layer. The atlas holds a weak handle only. Invalidates.
    pub fn set_coverage_layer(&mut self, source: &Arc<dyn CoverageSource>) {
        let handle = CoverageLayerRef::new(source);
        let reference = handle.reference().clone();
        if self.has_coverage_source() && self.coverage_reference.as_ref() == Some(&reference) {
            return;
        }
        self.restore_coverage();
        self.coverage_reference = Some(reference.clone());
        self.coverage = Some(handle);
        self.dirty = true;
        self.emit(AtlasEvent::CoverageLayerChanged(Some(reference)));
    }

    /// Filter enabled flag.
    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// Enable or disable filtering. Invalidates.
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        if self.filter_enabled != enabled {
            self.filter_enabled = enabled;
            self.invalidate();
        }
    }

    /// Filter expression text.
    pub fn filter_expression(&self) -> &str {
        self.filter.text()
    }

    /// Set the filter text. Invalidates.
    ///
    /// The text is stored even when it fails to compile; the error is returned
    /// and kept as [`AtlasEngine::filter_error`].
    pub fn set_filter_expression(&mut self, text: &str) -> Result<(), AtlasError> {
        if self.filter.set_text(text) {
            self.invalidate();
        }
        if self.filter.is_empty() {
            return Ok(());
        }
        self.filter.compile(&self.cache).map(|_| ()).map_err(AtlasError::FilterExpression)
    }

    /// Last filter error.
    pub fn filter_error(&self) -> Option<&str> {
        self.filter.last_error()
    }

    /// Sort enabled flag.
    pub fn sort_enabled(&self) -> bool {
        self.sort_enabled
    }

    /// Enable or disable sorting. Invalidates.
    pub fn set_sort_enabled(&mut self, enabled: bool) {
        if self.sort_enabled != enabled {
            self.sort_enabled = enabled;
            self.invalidate();
        }
    }

    /// Sort expression text.
    pub fn sort_expression(&self) -> &str {
        self.sort.text()
    }

    /// Set the sort key text. Invalidates. Compile errors surface at requery.
    pub fn set_sort_expression(&mut self, text: &str) {
        if self.sort.set_text(text) {
            self.invalidate();
        }
    }

    /// Last sort error.
    pub fn sort_error(&self) -> Option<&str> {
        self.sort.last_error()
    }

    /// Sort direction.
    pub fn sort_ascending(&self) -> bool {
        self.sort_ascending
    }

    /// Set the sort direction. Invalidates.
    pub fn set_sort_ascending(&mut self, ascending: bool) {
        if self.sort_ascending != ascending {
            self.sort_ascending = ascending;
            self.invalidate();
        }
    }

    /// Filename expression text.
    pub fn filename_expression(&self) -> &str {
        self.filename.text()
    }

    /// Set the filename text. Does not invalidate; the current filename is
    /// recomputed when positioned.
    pub fn set_filename_expression(&mut self, text: &str) -> Result<(), AtlasError> {
        let changed = self.filename.set_text(text);
        let compiled = if self.filename.is_empty() {
            Ok(())
        } else {
            self.filename.compile(&self.cache).map(|_| ()).map_err(AtlasError::FilenameExpression)
        };
        if changed {
            self.update_current_filename();
            self.emit(AtlasEvent::ConfigChanged);
        }
        compiled
    }

    /// Last filename error.
    pub fn filename_error(&self) -> Option<&str> {
        self.filename.last_error()
    }

    /// Page name expression text.
    pub fn page_name_expression(&self) -> &str {
        self.page_name.text()
    }

    /// Set the page name text and rename the existing pages in place.
    /// Membership and order are unchanged; the cursor keeps its position.
    pub fn set_page_name_expression(&mut self, text: &str) {
        if !self.page_name.set_text(text) {
            return;
        }
        self.emit(AtlasEvent::ConfigChanged);
        if self.pages.is_empty() {
            return;
        }
        let Some(source) = self.live_source() else {
            return;
        };
        let features = match source.fetch_all() {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch features to rename pages");
                return;
            }
        };
        let by_id: std::collections::HashMap<FeatureId, &Feature> =
            features.iter().map(|f| (f.id, f)).collect();
        let base = ExpressionContext::for_layer(source.layer_id(), source.layer_name());
        let total = self.pages.len();
        let names = self
            .pages
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| match by_id.get(&page.feature_id) {
                Some(feature) => {
                    let ctx = naming::page_context(&base, feature, index, total);
                    naming::page_name(&mut self.page_name, &self.cache, &ctx, index)
                }
                None => naming::default_page_name(index),
            })
            .collect();
        self.pages = Arc::new(self.pages.renamed(names));
        self.update_current_filename();
    }

    /// Last page name error.
    pub fn page_name_error(&self) -> Option<&str> {
        self.page_name.last_error()
    }

    /// True when a setter invalidated the pages since the last requery.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Snapshot of the configuration.
    pub fn config(&self) -> AtlasConfig {
        AtlasConfig {
            enabled: self.enabled,
            hide_coverage: self.hide_coverage,
            coverage_layer: self.coverage_reference.clone(),
            filter: FilterSettings {
                enabled: self.filter_enabled,
                expression: self.filter.text().to_string(),
            },
            sort: SortSettings {
                enabled: self.sort_enabled,
                expression: self.sort.text().to_string(),
                ascending: self.sort_ascending,
            },
            filename_expression: self.filename.text().to_string(),
            page_name_expression: self.page_name.text().to_string(),
        }
    }

    /// Replace the whole configuration. Invalidates.
    ///
    /// Returns [`ConfigError::UnknownLayer`] when the coverage layer cannot be
    /// resolved; everything else is applied regardless.
    pub fn apply_config(&mut self, config: &AtlasConfig, resolver: &dyn LayerResolver) -> Result<(), ConfigError> {
        self.restore_coverage();
        self.hide_coverage = config.hide_coverage;
        self.filter_enabled = config.filter.enabled;
        self.filter.set_text(&config.filter.expression);
        self.sort_enabled = config.sort.enabled;
        self.sort.set_text(&config.sort.expression);
        self.sort_ascending = config.sort.ascending;
        self.filename.set_text(&config.filename_expression);
        self.page_name.set_text(&config.page_name_expression);

        let previous = self.coverage_reference.clone();
        self.coverage_reference = config.coverage_layer.clone();
        let resolved = config.coverage_layer.as_ref().map(|r| (r, resolver.resolve(r)));
        self.coverage = match &resolved {
            Some((_, Some(source))) => Some(CoverageLayerRef::new(source)),
            _ => None,
        };

        let was_enabled = self.enabled;
        self.enabled = config.enabled;
        self.dirty = true;

        self.emit(AtlasEvent::ConfigChanged);
        if was_enabled != self.enabled {
            self.emit(AtlasEvent::Toggled(self.enabled));
        }
        if previous != self.coverage_reference {
            self.emit(AtlasEvent::CoverageLayerChanged(self.coverage_reference.clone()));
        }

        match resolved {
            Some((reference, None)) => {
                tracing::warn!(layer = %reference, "coverage layer not found, atlas left unbound");
                Err(ConfigError::UnknownLayer(reference.clone()))
            }
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Coverage lifecycle
    // ------------------------------------------------------------------

    /// Layers were removed from the project. Unbinds and disables the atlas
    /// when its coverage layer is among them.
    ///
    /// Matches both the persisted reference and the layer actually bound, which
    /// differ when the reference was resolved by name.
    pub fn layers_removed(&mut self, layer_ids: &[&str]) {
        let removed = |r: &LayerReference| layer_ids.contains(&r.id.as_str());
        let bound = self.coverage_reference.as_ref().is_some_and(removed)
            || self.coverage.as_ref().map(CoverageLayerRef::reference).is_some_and(removed);
        if bound {
            self.unbind_coverage();
        }
    }

    fn unbind_coverage(&mut self) {
        let Some(reference) = self.coverage_reference.take() else {
            return;
        };
        tracing::info!(layer = %reference, "coverage layer removed, disabling atlas");
        self.coverage = None;
        // The layer is gone; there is nothing left to restore.
        self.hidden_layer = None;
        let had_pages = !self.pages.is_empty();
        self.pages = Arc::new(PageSequence::empty());
        let was_positioned = self.cursor.reset();
        self.dirty = false;

        if self.enabled {
            self.enabled = false;
            self.emit(AtlasEvent::Toggled(false));
        }
        self.emit(AtlasEvent::CoverageLayerChanged(None));
        if had_pages {
            self.emit(AtlasEvent::FeatureCountChanged(0));
        }
        if was_positioned {
            self.emit(AtlasEvent::FeatureChanged(None));
        }
    }

    /// Upgrade the coverage handle, unbinding if the source was dropped.
    fn live_source(&mut self) -> Option<Arc<dyn CoverageSource>> {
        let source = self.coverage.as_ref()?.get();
        if source.is_none() {
            self.unbind_coverage();
        }
        source
    }

    fn hide_coverage_layer(&mut self) {
        if !self.hide_coverage || !self.enabled || self.hidden_layer.is_some() {
            return;
        }
        let Some(visibility) = &self.visibility else {
            return;
        };
        let reference = match &self.coverage {
            Some(handle) => handle.reference(),
            None => match &self.coverage_reference {
                Some(reference) => reference,
                None => return,
            },
        };
        visibility.hide_layer(reference);
        self.hidden_layer = Some(reference.clone());
    }

    fn restore_coverage(&mut self) {
        if let (Some(visibility), Some(reference)) = (&self.visibility, self.hidden_layer.take()) {
            visibility.restore_layer(&reference);
        }
    }

    // ------------------------------------------------------------------
    // Requery
    // ------------------------------------------------------------------

    /// Rebuild the page sequence from the configuration and the source.
    ///
    /// Returns the page count. A disabled or unbound atlas yields zero pages.
    /// A filter that fails to compile keeps the previous pages and returns
    /// [`AtlasError::FilterExpression`]. A sort that fails to compile falls
    /// back to source order; the error is kept as [`AtlasEngine::sort_error`].
    pub fn requery(&mut self) -> Result<usize, AtlasError> {
        let started = Instant::now();
        self.dirty = false;
        self.queried = true;

        let source = match self.live_source() {
            Some(source) if self.enabled => source,
            _ => {
                self.replace_pages(PageSequence::empty());
                return Ok(0);
            }
        };

        if self.rendering {
            self.hide_coverage_layer();
        }

        let bindings = QueryBindings {
            filter: (self.filter_enabled && !self.filter.is_empty()).then_some(&mut self.filter),
            sort: (self.sort_enabled && !self.sort.is_empty()).then_some((&mut self.sort, self.sort_ascending)),
        };

        let outcome = match query::execute(source.as_ref(), &self.cache, bindings) {
            Ok(outcome) => outcome,
            Err(QueryError::FilterExpression(e)) => {
                let err = AtlasError::FilterExpression(e);
                self.status(err.to_string());
                return Err(err);
            }
            Err(QueryError::Source(e)) => {
                tracing::warn!(layer_id = source.layer_id(), error = %e, "coverage source failed");
                self.replace_pages(PageSequence::empty());
                return Err(AtlasError::Source(e));
            }
        };

        if let Some(e) = &outcome.sort_error {
            self.status(AtlasError::SortExpression(e.clone()).to_string());
        }

        let base = ExpressionContext::for_layer(source.layer_id(), source.layer_name());
        let names = naming::name_pages(&mut self.page_name, &self.cache, &base, &outcome.features);
        let pages: Vec<Page> = outcome
            .features
            .iter()
            .zip(names)
            .map(|(feature, name)| Page { feature_id: feature.id, name })
            .collect();
        let count = pages.len();
        self.replace_pages(PageSequence::new(pages, outcome.sort_keys));

        tracing::info!(
            layer_id = source.layer_id(),
            page_count = count,
            filter_failures = outcome.filter_failures,
            sort_failures = outcome.sort_failures,
            elapsed_us = started.elapsed().as_micros() as u64,
            "atlas requery complete"
        );
        if count == 0 {
            self.status(NO_MATCHING_FEATURES);
        }
        Ok(count)
    }

    /// Requery only when the configuration changed or the atlas was never queried.
    pub fn update_features(&mut self) -> Result<usize, AtlasError> {
        if self.dirty || !self.queried {
            self.requery()
        } else {
            Ok(self.pages.len())
        }
    }

    fn replace_pages(&mut self, pages: PageSequence) {
        let count = pages.len();
        self.pages = Arc::new(pages);
        let was_positioned = self.cursor.reset();
        self.emit(AtlasEvent::FeatureCountChanged(count));
        if was_positioned {
            self.emit(AtlasEvent::FeatureChanged(None));
        }
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    /// Number of pages.
    pub fn count(&self) -> usize {
        self.pages.len()
    }

    /// The current page sequence.
    pub fn pages(&self) -> Arc<PageSequence> {
        Arc::clone(&self.pages)
    }

    /// Name of the page at `index`, without moving the cursor.
    pub fn page_name(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(|p| p.name.as_str())
    }

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    /// Cursor state.
    pub fn position(&self) -> CursorPosition {
        self.cursor.position()
    }

    /// 0-based index of the current page, or -1.
    pub fn current_feature_number(&self) -> i64 {
        self.cursor.position().feature_number()
    }

    /// Feature at the current page, as last fetched.
    pub fn current_feature(&self) -> Option<&Feature> {
        self.cursor.feature()
    }

    /// Name of the current page.
    pub fn current_page_name(&self) -> Option<&str> {
        self.cursor.position().index().and_then(|i| self.page_name(i))
    }

    /// Output path for the current page.
    ///
    /// The evaluated filename is placed in the directory of `base_file_path`;
    /// without one, the default `base-NN.ext` scheme applies.
    pub fn current_filename(&self, base_file_path: &str, extension: &str) -> Option<String> {
        let index = self.cursor.position().index()?;
        Some(match self.cursor.filename() {
            Some(stem) => naming::path_in_base_directory(base_file_path, stem, extension),
            None => naming::default_filename(base_file_path, index, self.pages.len(), extension),
        })
    }

    /// Move to the first page.
    pub fn first(&mut self) -> bool {
        let target = self.navigable().and_then(CursorPosition::first);
        self.move_to(target, "first")
    }

    /// Move to the last page.
    pub fn last(&mut self) -> bool {
        let target = self.navigable().and_then(CursorPosition::last);
        self.move_to(target, "last")
    }

    /// Move to the next page. From unpositioned this is [`AtlasEngine::first`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let position = self.cursor.position();
        let target = self.navigable().and_then(|count| position.next(count));
        self.move_to(target, "next")
    }

    /// Move to the previous page.
    pub fn previous(&mut self) -> bool {
        let position = self.cursor.position();
        let target = self.navigable().and_then(|count| position.previous(count));
        self.move_to(target, "previous")
    }

    /// Move to the page at `index`.
    pub fn seek_to(&mut self, index: usize) -> bool {
        let target = self.navigable().and_then(|count| CursorPosition::seek(index, count));
        self.move_to(target, "seek_to")
    }

    /// Move to the page bound to a feature identifier.
    pub fn seek_to_id(&mut self, id: FeatureId) -> bool {
        let target = self.navigable().and_then(|_| self.pages.position_of(id));
        self.move_to(target, "seek_to_id")
    }

    /// Move to the page bound to `feature`.
    pub fn seek_to_feature(&mut self, feature: &Feature) -> bool {
        self.seek_to_id(feature.id)
    }

    /// Re-fetch the current feature without moving.
    ///
    /// When the feature disappeared from the source, returns
    /// [`AtlasError::FeatureNotFound`] and keeps the stale payload.
    pub fn refresh_current_feature(&mut self) -> Result<(), AtlasError> {
        let index = self.cursor.position().index().ok_or(AtlasError::NotPositioned)?;
        let page = self.pages.get(index).cloned().ok_or(AtlasError::NotPositioned)?;
        let source = self.live_source().ok_or(AtlasError::SourceUnavailable)?;
        let feature = source
            .fetch_by_id(page.feature_id)?
            .ok_or(AtlasError::FeatureNotFound(page.feature_id))?;
        let filename = self.evaluate_filename(source.as_ref(), &feature, index, &page.name);
        self.cursor.refresh(feature.clone(), filename);
        self.emit(AtlasEvent::FeatureChanged(Some(feature)));
        Ok(())
    }

    fn navigable(&self) -> Option<usize> {
        if self.dirty {
            tracing::debug!("atlas configuration changed, requery before navigating");
            return None;
        }
        Some(self.pages.len())
    }

    fn move_to(&mut self, target: Option<usize>, op: &'static str) -> bool {
        let Some(index) = target else {
            tracing::debug!(op, position = self.current_feature_number(), "navigation failed");
            return false;
        };
        self.position_at(index)
    }

    fn position_at(&mut self, index: usize) -> bool {
        let Some(page) = self.pages.get(index).cloned() else {
            return false;
        };
        let Some(source) = self.live_source() else {
            return false;
        };
        let feature = match source.fetch_by_id(page.feature_id) {
            Ok(Some(feature)) => feature,
            Ok(None) => {
                tracing::debug!(feature_id = %page.feature_id, "page feature missing from source");
                return false;
            }
            Err(e) => {
                tracing::warn!(feature_id = %page.feature_id, error = %e, "could not fetch page feature");
                return false;
            }
        };
        let filename = self.evaluate_filename(source.as_ref(), &feature, index, &page.name);
        self.cursor.place(index, feature.clone(), filename);
        self.emit(AtlasEvent::FeatureChanged(Some(feature)));
        true
    }

    fn evaluate_filename(
        &mut self,
        source: &dyn CoverageSource,
        feature: &Feature,
        index: usize,
        page_name: &str,
    ) -> Option<String> {
        let base = ExpressionContext::for_layer(source.layer_id(), source.layer_name());
        let ctx = naming::page_context(&base, feature, index, self.pages.len());
        naming::filename_stem(&mut self.filename, &self.cache, &ctx, page_name)
    }

    fn update_current_filename(&mut self) {
        let Some(index) = self.cursor.position().index() else {
            return;
        };
        let (Some(feature), Some(page)) = (self.cursor.feature().cloned(), self.pages.get(index).cloned()) else {
            return;
        };
        let Some(source) = self.live_source() else {
            return;
        };
        let filename = self.evaluate_filename(source.as_ref(), &feature, index, &page.name);
        self.cursor.set_filename(filename);
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Whether a render pass is in progress.
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Start a render pass: requery when needed and hide the coverage layer.
    pub fn begin_render(&mut self) -> Result<usize, AtlasError> {
        if self.rendering {
            tracing::debug!("begin_render called during a render pass");
        }
        self.rendering = true;
        let result = self.update_features();
        self.hide_coverage_layer();
        self.emit(AtlasEvent::RenderBegun);
        result
    }

    /// Finish a render pass and restore the coverage layer. Pages are kept.
    pub fn end_render(&mut self) {
        self.restore_coverage();
        self.rendering = false;
        self.emit(AtlasEvent::RenderEnded);
    }

    /// Output path for the current page, or `base` plus extension when unpositioned.
    pub fn file_path(&self, base_file_path: &str, extension: &str) -> String {
        self.current_filename(base_file_path, extension)
            .unwrap_or_else(|| format!("{}{}", base_file_path, naming::normalize_extension(extension)))
    }
}

impl Default for AtlasEngine {
    fn default() -> Self {
        Self::new(Arc::new(SimpleExpressionEngine::new()))
    }
}

impl std::fmt::Debug for AtlasEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasEngine")
            .field("enabled", &self.enabled)
            .field("coverage", &self.coverage)
            .field("pages", &self.pages.len())
            .field("position", &self.cursor.position())
            .field("dirty", &self.dirty)
            .field("rendering", &self.rendering)
            .finish()
    }
}

impl PageIterator for AtlasEngine {
    fn count(&self) -> usize {
        AtlasEngine::count(self)
    }

    fn begin_render(&mut self) -> Result<usize, AtlasError> {
        AtlasEngine::begin_render(self)
    }

    fn end_render(&mut self) {
        AtlasEngine::end_render(self)
    }

    fn next(&mut self) -> bool {
        AtlasEngine::next(self)
    }

    fn file_path(&self, base_file_path: &str, extension: &str) -> String {
        AtlasEngine::file_path(self, base_file_path, extension)
    }
}

impl SerializableConfig for AtlasEngine {
    fn write_config(&self) -> AtlasConfigDocument {
        AtlasConfigDocument::new(self.config())
    }

    fn read_config(&mut self, document: &AtlasConfigDocument, resolver: &dyn LayerResolver) -> Result<(), ConfigError> {
        document.validate()?;
        self.apply_config(&document.atlas, resolver)
    }
}
