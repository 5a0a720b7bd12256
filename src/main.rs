//! Demo loading two models into one node, the first superseded by the second

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scene_bridge::prelude::*;

/// Pretend decoder: sleeps to simulate I/O and invents materials from the file name
fn decode(source: &ModelSource, kind: ModelKind) -> Result<DecodedModel, String> {
    std::thread::sleep(Duration::from_millis(50));

    let model = source.model();
    if model.contains("missing") {
        return Err(format!("file not found: {model}"));
    }

    let stem = Path::new(model)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model");

    let materials = (0..3)
        .map(|i| Material::new(format!("{stem}_{i}"), Vec3::splat(0.25 * (i + 1) as f32)))
        .collect();

    Ok(match kind {
        ModelKind::Obj => DecodedModel {
            materials,
            geometry: Some(DecodedGeometry {
                name: stem.to_string(),
                vertex_count: 36,
            }),
            children: Vec::new(),
        },
        ModelKind::Fbx => DecodedModel {
            materials,
            geometry: None,
            children: vec![Node::new(format!("{stem}_root")).with_child(Node::new("mesh"))],
        },
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    log::info!("Starting scene bridge demo ({:?} dispatch)", config.dispatch);

    let registries = NativeRegistries::new();
    let loader = Arc::new(WorkerLoader::new(
        config.loader.clone(),
        decode,
        registries.clone(),
    )?);

    let queue = CompletionQueue::new();
    let settings = match config.dispatch {
        DispatchMode::Immediate => Object3DSettings::default(),
        DispatchMode::Queued => Object3DSettings {
            route: queue.route(),
            ..Default::default()
        },
    };

    let node = Object3D::with_settings("heart", loader.clone(), registries.clone(), settings);

    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    let failed_tx = done_tx.clone();
    let listener: Arc<dyn Object3DListener> = Arc::new(FnListener::new(
        move |node: &Object3D, kind: ModelKind| {
            log::info!(
                "{kind} model loaded into '{}': {} materials, {} children",
                node.name(),
                node.materials().len(),
                node.child_count()
            );
            let _ = done_tx.send(());
        },
        move |message: &str| {
            log::warn!("Model failed to load: {message}");
            let _ = failed_tx.send(());
        },
    ));

    // The OBJ load is superseded before it can complete
    node.load_model(
        ModelSource::uri("file:///models/heart.obj"),
        ModelKind::Obj,
        Some(Arc::clone(&listener)),
    )?;
    node.load_model(
        ModelSource::resources("heart.fbx", [("heart_diffuse.png", "textures/heart.png")]),
        ModelKind::from_is_fbx(true),
        Some(listener),
    )?;

    loop {
        queue.drain();
        if done_rx.recv_timeout(Duration::from_millis(10)).is_ok() {
            break;
        }
    }

    // Let the stale OBJ completion arrive so it shows up in the stats
    std::thread::sleep(Duration::from_millis(100));
    queue.drain();

    let stats = node.stats().snapshot();
    log::info!(
        "Completions: {} applied, {} dropped",
        stats.applied,
        stats.dropped()
    );
    log::debug!("Completion stats: {}", serde_json::to_string(&stats)?);

    node.dispose();
    log::info!("Live handles after dispose: {}", registries.live_handles());

    Ok(())
}
