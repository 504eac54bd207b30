//! Atlas plan
//!
//! Runs one render pass over a feature file and prints the plan: one JSON
//! line per page with its 1-based number, name and output path. Nothing is
//! drawn or written.
//!
//! ## Usage
//!
//! ```bash
//! atlas_plan <config.json> <features.json> <base_path> <extension>
//! ```
//!
//! - `config.json`: an atlas config document (`schema_version` + `atlas`)
//! - `features.json`: a JSON array of features (`id`, `attributes`, `geometry`).
//!   String attributes in ISO-8601 datetime form load as dates and sort as
//!   dates.
//!
//! The features are served as the layer named in the config's
//! `coverage_layer`.
//!
//! ## Configuration
//!
//! - `RUST_LOG`: log filter (default: atlas_iterator=info,atlas_plan=info)
//! - `LOG_FORMAT`: "json" or "pretty" (default: json); logs go to stderr

use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use atlas_iterator::{
    init_tracing, AtlasConfigDocument, AtlasEngine, CoverageSource, Feature,
    InMemoryCoverageSource, LayerReference, LayerRegistry, SerializableConfig,
};

#[derive(Serialize)]
struct PlannedPage<'a> {
    page: usize,
    name: &'a str,
    path: String,
}

fn run(args: &[String]) -> Result<usize, Box<dyn std::error::Error>> {
    let [config_path, features_path, base_path, extension] = args else {
        return Err("usage: atlas_plan <config.json> <features.json> <base_path> <extension>".into());
    };

    let document = AtlasConfigDocument::from_json_str(&std::fs::read_to_string(config_path)?)?;
    let features: Vec<Feature> = serde_json::from_str(&std::fs::read_to_string(features_path)?)?;

    let layer = document
        .atlas
        .coverage_layer
        .clone()
        .unwrap_or_else(|| LayerReference::new("coverage", "Coverage"));
    info!(layer = %layer, features = features.len(), "loaded coverage features");

    let mut registry = LayerRegistry::new();
    let source: Arc<dyn CoverageSource> =
        Arc::new(InMemoryCoverageSource::new(layer.id.as_str(), layer.name.as_str()).with_features(features));
    let source = registry.add(source);

    let mut atlas = AtlasEngine::default();
    atlas.read_config(&document, &registry)?;
    if document.atlas.coverage_layer.is_none() {
        atlas.set_coverage_layer(&source);
    }

    let count = atlas.begin_render()?;
    let mut stdout = std::io::stdout().lock();
    while atlas.next() {
        let planned = PlannedPage {
            page: atlas.current_feature_number() as usize + 1,
            name: atlas.current_page_name().unwrap_or_default(),
            path: atlas.file_path(base_path, extension),
        };
        serde_json::to_writer(&mut stdout, &planned)?;
        std::io::Write::write_all(&mut stdout, b"\n")?;
    }
    atlas.end_render();
    Ok(count)
}

fn main() -> ExitCode {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(count) => {
            info!(pages = count, "atlas plan complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "atlas plan failed");
            eprintln!("atlas_plan: {}", e);
            ExitCode::FAILURE
        }
    }
}
