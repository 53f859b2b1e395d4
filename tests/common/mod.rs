#![allow(dead_code)]

use crossbeam_channel::Receiver;
use nalgebra::{Matrix4, Vector3};
use rayforce::assets::{
    AssetId, AssetLoadError, AssetLoader, DEFAULT_COLOR, SubMesh, VisualMesh, VisualVertex,
};
use rayforce::physics::PhysicsEvent;
use rayforce::rendering::InstanceDrawer;
use rayforce::{EngineConfig, EngineContext};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Hands out built-in meshes and counts how often each asset was requested.
///
/// `Cube` is a unit cube, `Sphere` an octahedron, and `DamagedHelmet` a single
/// flat triangle that can't be turned into a hull.
#[derive(Default)]
pub struct MockLoader {
    pub loads: Arc<Mutex<HashMap<AssetId, usize>>>,
    pub total: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new() -> (Self, Arc<Mutex<HashMap<AssetId, usize>>>) {
        let loader = MockLoader::default();
        let loads = loader.loads.clone();
        (loader, loads)
    }
}

impl AssetLoader for MockLoader {
    fn load(&self, asset: AssetId) -> Result<VisualMesh, AssetLoadError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut loads) = self.loads.lock() {
            *loads.entry(asset).or_default() += 1;
        }

        Ok(match asset {
            AssetId::Cube => VisualMesh::unit_cube(DEFAULT_COLOR),
            AssetId::Sphere => octahedron(),
            AssetId::DamagedHelmet => flat_triangle(),
        })
    }
}

fn octahedron() -> VisualMesh {
    let points = [
        Vector3::new(0.5, 0.0, 0.0),
        Vector3::new(-0.5, 0.0, 0.0),
        Vector3::new(0.0, 0.5, 0.0),
        Vector3::new(0.0, -0.5, 0.0),
        Vector3::new(0.0, 0.0, 0.5),
        Vector3::new(0.0, 0.0, -0.5),
    ];
    let vertices = points.into_iter().map(VisualVertex::at).collect();
    VisualMesh::single(SubMesh::new(vertices, None))
}

fn flat_triangle() -> VisualMesh {
    let vertices = vec![
        VisualVertex::at(Vector3::new(0.0, 0.0, 0.0)),
        VisualVertex::at(Vector3::new(1.0, 0.0, 0.0)),
        VisualVertex::at(Vector3::new(0.0, 0.0, 1.0)),
    ];
    VisualMesh::single(SubMesh::new(vertices, None))
}

/// Remembers every draw call instead of issuing it.
#[derive(Debug, Default)]
pub struct RecordingDrawer {
    pub calls: Vec<DrawCall>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub asset: AssetId,
    pub sub_mesh: usize,
    pub instances: Vec<Matrix4<f32>>,
}

impl InstanceDrawer for RecordingDrawer {
    fn draw_instanced(
        &mut self,
        asset: AssetId,
        _mesh: &Arc<VisualMesh>,
        sub_mesh: usize,
        instances: &[Matrix4<f32>],
    ) {
        self.calls.push(DrawCall {
            asset,
            sub_mesh,
            instances: instances.to_vec(),
        });
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig::builder().worker_threads(2).build()
}

pub fn context() -> Arc<EngineContext> {
    init_tracing();
    match EngineContext::new(test_config(), Box::new(MockLoader::default())) {
        Ok(ctx) => ctx,
        Err(e) => panic!("engine context failed to start: {e}"),
    }
}

pub fn observed_context() -> (Arc<EngineContext>, Receiver<PhysicsEvent>) {
    init_tracing();
    match EngineContext::with_observer(test_config(), Box::new(MockLoader::default())) {
        Ok(pair) => pair,
        Err(e) => panic!("engine context failed to start: {e}"),
    }
}
