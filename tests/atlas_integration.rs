//! Integration tests for the atlas render lifecycle.
//!
//! These tests drive the engine the way a render pipeline would:
//! 1. Bind a coverage layer and configure expressions
//! 2. begin_render (lazy requery, hide coverage)
//! 3. Step through pages, asking for names and output paths
//! 4. end_render (restore coverage, pages kept)
//!
//! plus the failure paths: bad expressions, vanished features, removed layers.

use std::sync::Arc;

use atlas_iterator::{
    AtlasEngine, AtlasError, AtlasEvent, CoverageSource, Feature, FeatureId, Geometry,
    InMemoryCoverageSource, LayerRegistry, LayerVisibility, PageIterator, RecordingObserver,
    NO_MATCHING_FEATURES,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parcels() -> Arc<InMemoryCoverageSource> {
    let rows = [
        (11, "Berg", 420.0, Some("2019")),
        (12, "Dahl", 95.5, None),
        (13, "Aas", 1300.0, Some("2021")),
        (14, "Lie", 610.0, Some("2019")),
        (15, "Aas", 75.0, Some("2018")),
    ];
    let features = rows.into_iter().map(|(id, owner, area, year)| {
        Feature::new(id)
            .with_attribute("owner", owner)
            .with_attribute("area", area)
            .with_attribute("year", year)
            .with_geometry(Geometry::Point([id as f64, 60.0]))
    });
    Arc::new(InMemoryCoverageSource::new("parcels_1", "Parcels").with_features(features))
}

struct Fixture {
    registry: LayerRegistry,
    source: Arc<InMemoryCoverageSource>,
    atlas: AtlasEngine,
    visibility: Arc<LayerVisibility>,
    events: Arc<RecordingObserver>,
}

fn fixture() -> Fixture {
    let source = parcels();
    let mut registry = LayerRegistry::new();
    let shared: Arc<dyn CoverageSource> = source.clone();
    let shared = registry.add(shared);

    let visibility = Arc::new(LayerVisibility::new());
    let events = Arc::new(RecordingObserver::new());

    let mut atlas = AtlasEngine::default();
    atlas.subscribe(events.clone());
    atlas.set_coverage_visibility(visibility.clone());
    atlas.set_coverage_layer(&shared);
    atlas.set_enabled(true);

    Fixture { registry, source, atlas, visibility, events }
}

fn render_all(atlas: &mut impl PageIterator, base: &str, ext: &str) -> Vec<String> {
    let mut paths = Vec::new();
    atlas.begin_render().unwrap();
    while atlas.next() {
        paths.push(atlas.file_path(base, ext));
    }
    atlas.end_render();
    paths
}

// ─────────────────────────────────────────────────────────────────────────────
// RENDER PASS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_render_pass_filtered_sorted_named() {
    let mut fx = fixture();
    fx.atlas.set_filter_enabled(true);
    fx.atlas.set_filter_expression("area >= 100").unwrap();
    fx.atlas.set_sort_enabled(true);
    fx.atlas.set_sort_expression("owner");
    fx.atlas.set_filename_expression("lower(owner) || '_' || $id").unwrap();

    let paths = render_all(&mut fx.atlas, "/exports/parcels", "png");
    assert_eq!(
        paths,
        vec!["/exports/aas_13.png", "/exports/berg_11.png", "/exports/lie_14.png"]
    );
    assert_eq!(fx.atlas.count(), 3);
    assert_eq!(fx.events.count(|e| *e == AtlasEvent::RenderBegun), 1);
    assert_eq!(fx.events.count(|e| *e == AtlasEvent::RenderEnded), 1);
}

#[test]
fn test_begin_render_requeries_only_when_needed() {
    let mut fx = fixture();
    assert_eq!(fx.atlas.begin_render().unwrap(), 5);
    fx.atlas.end_render();
    assert_eq!(fx.events.count(|e| matches!(e, AtlasEvent::FeatureCountChanged(_))), 1);

    // Unchanged configuration: the second pass reuses the pages
    fx.source.add_feature(Feature::new(16).with_attribute("owner", "Nes"));
    assert_eq!(fx.atlas.begin_render().unwrap(), 5);
    fx.atlas.end_render();

    fx.atlas.set_sort_enabled(true);
    assert_eq!(fx.atlas.begin_render().unwrap(), 6);
    fx.atlas.end_render();
}

#[test]
fn test_pages_browsable_after_end_render() {
    let mut fx = fixture();
    fx.atlas.begin_render().unwrap();
    fx.atlas.end_render();
    fx.atlas.end_render();

    assert!(!fx.atlas.is_rendering());
    assert!(fx.atlas.last());
    assert_eq!(fx.atlas.current_feature().map(|f| f.id), Some(FeatureId::new(15)));
}

#[test]
fn test_hide_coverage_during_render() {
    let mut fx = fixture();
    fx.atlas.set_hide_coverage(true);

    fx.atlas.begin_render().unwrap();
    assert!(fx.visibility.is_hidden("parcels_1"));
    fx.atlas.end_render();
    assert!(!fx.visibility.is_hidden("parcels_1"));

    fx.atlas.set_hide_coverage(false);
    fx.atlas.begin_render().unwrap();
    assert!(!fx.visibility.is_hidden("parcels_1"));
    fx.atlas.end_render();
}

// ─────────────────────────────────────────────────────────────────────────────
// EXPRESSION FAILURES
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_bad_filter_keeps_previous_pages() {
    let mut fx = fixture();
    fx.atlas.requery().unwrap();
    let before = fx.atlas.pages();

    fx.atlas.set_filter_enabled(true);
    let _ = fx.atlas.set_filter_expression("area >>> 3");
    let err = fx.atlas.begin_render().unwrap_err();
    fx.atlas.end_render();

    assert!(matches!(err, AtlasError::FilterExpression(_)));
    assert_eq!(fx.atlas.pages().fingerprint(), before.fingerprint());
    assert!(fx.events.last_status().unwrap().starts_with("Filter expression error"));
    assert!(fx.atlas.next());
}

#[test]
fn test_null_sort_key_leads_descending() {
    let mut fx = fixture();
    fx.atlas.set_sort_enabled(true);
    fx.atlas.set_sort_expression("year");
    fx.atlas.set_sort_ascending(false);
    fx.atlas.requery().unwrap();

    let ids: Vec<i64> = fx.atlas.pages().feature_ids().iter().map(FeatureId::get).collect();
    // 12 has a null year and leads; the two 2019 parcels keep source order
    assert_eq!(ids, vec![12, 13, 11, 14, 15]);
    assert!(fx.atlas.sort_error().is_none());
}

#[test]
fn test_empty_result_status_message() {
    let mut fx = fixture();
    fx.atlas.set_filter_enabled(true);
    fx.atlas.set_filter_expression("owner = 'Nobody'").unwrap();
    assert_eq!(fx.atlas.requery().unwrap(), 0);
    assert_eq!(fx.events.last_status().as_deref(), Some(NO_MATCHING_FEATURES));
}

#[test]
fn test_error_slots_are_independent() {
    let mut fx = fixture();
    let _ = fx.atlas.set_filename_expression("upper(");
    fx.atlas.set_sort_enabled(true);
    fx.atlas.set_sort_expression("owner");
    fx.atlas.requery().unwrap();

    assert!(fx.atlas.filename_error().is_some());
    assert!(fx.atlas.filter_error().is_none());
    assert!(fx.atlas.sort_error().is_none());
    assert!(fx.atlas.page_name_error().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// SOURCE CHANGES
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_refresh_after_feature_deleted_keeps_stale_payload() {
    let mut fx = fixture();
    fx.atlas.requery().unwrap();
    assert!(fx.atlas.seek_to_id(FeatureId::new(13)));

    fx.source.remove_feature(FeatureId::new(13));
    let err = fx.atlas.refresh_current_feature().unwrap_err();
    assert_eq!(err, AtlasError::FeatureNotFound(FeatureId::new(13)));
    assert_eq!(fx.atlas.current_feature().map(|f| f.id), Some(FeatureId::new(13)));
    assert_eq!(fx.atlas.current_feature_number(), 2);
}

#[test]
fn test_layer_removal_disables_atlas() {
    let mut fx = fixture();
    fx.atlas.requery().unwrap();
    assert!(fx.atlas.first());
    fx.events.take();

    let removed = fx.registry.remove(&["parcels_1"]);
    let removed: Vec<&str> = removed.iter().map(String::as_str).collect();
    fx.atlas.layers_removed(&removed);

    assert!(!fx.atlas.enabled());
    assert!(fx.atlas.coverage_layer().is_none());
    assert_eq!(fx.atlas.count(), 0);
    assert_eq!(fx.atlas.current_feature_number(), -1);
    assert_eq!(
        fx.events.events(),
        vec![
            AtlasEvent::Toggled(false),
            AtlasEvent::CoverageLayerChanged(None),
            AtlasEvent::FeatureCountChanged(0),
            AtlasEvent::FeatureChanged(None),
        ]
    );
    assert_eq!(fx.atlas.requery().unwrap(), 0);
}

#[test]
fn test_unrelated_layer_removal_is_ignored() {
    let mut fx = fixture();
    fx.atlas.layers_removed(&["roads_2"]);
    assert!(fx.atlas.enabled());
    assert!(fx.atlas.has_coverage_source());
}

#[test]
fn test_source_failure_reported() {
    let mut fx = fixture();
    fx.source.set_offline(true);
    assert!(matches!(fx.atlas.requery(), Err(AtlasError::Source(_))));
    assert_eq!(fx.atlas.count(), 0);
    fx.source.set_offline(false);
    assert_eq!(fx.atlas.requery().unwrap(), 5);
}

// ─────────────────────────────────────────────────────────────────────────────
// OBSERVERS
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_feature_changed_follows_navigation() {
    let mut fx = fixture();
    fx.atlas.requery().unwrap();
    fx.events.take();

    assert!(fx.atlas.next());
    assert!(fx.atlas.next());
    assert!(!fx.atlas.seek_to(99));

    let changed: Vec<Option<FeatureId>> = fx
        .events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AtlasEvent::FeatureChanged(f) => Some(f.map(|f| f.id)),
            _ => None,
        })
        .collect();
    assert_eq!(changed, vec![Some(FeatureId::new(11)), Some(FeatureId::new(12))]);
}

#[test]
fn test_setters_only_mark_dirty() {
    let mut fx = fixture();
    fx.atlas.requery().unwrap();
    fx.events.take();

    fx.atlas.set_filter_enabled(true);
    fx.atlas.set_filter_expression("area > 500").unwrap();
    assert!(fx.atlas.is_dirty());
    assert_eq!(fx.atlas.count(), 5);
    assert_eq!(fx.events.count(|e| matches!(e, AtlasEvent::FeatureCountChanged(_))), 0);
    assert_eq!(fx.events.count(|e| *e == AtlasEvent::ConfigChanged), 2);

    assert_eq!(fx.atlas.update_features().unwrap(), 2);
}
