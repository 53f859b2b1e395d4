mod common;

use rayforce::assets::{AssetId, AssetLoadError, AssetLoader, FALLBACK_COLOR, ModelStore, ObjAssetLoader};
use std::fs;
use std::path::PathBuf;

const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
f 1 4 3 2
";

const TWO_GROUPS: &str = "\
o helmet
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
vn 0 0 1
g shell
f 1//1 2//1 3//1
g visor
f 1 3 4
";

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rayforce-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn missing_file_is_reported() {
    common::init_tracing();
    let loader = ObjAssetLoader::new(scratch_dir("missing"));

    let result = loader.load(AssetId::Sphere);
    assert!(matches!(result, Err(AssetLoadError::Missing { .. })));
}

#[test]
fn store_falls_back_to_the_purple_cube() {
    common::init_tracing();
    let store = ModelStore::new(Box::new(ObjAssetLoader::new(scratch_dir("fallback"))));

    let mesh = store.get(AssetId::DamagedHelmet);
    assert_eq!(mesh.sub_meshes.len(), 1);
    assert_eq!(mesh.sub_meshes[0].color, FALLBACK_COLOR);
    assert_eq!(mesh.vertex_count(), 24);
    assert_eq!(mesh.triangle_count(), 12);

    // the failure is cached, the loader isn't asked again
    let again = store.get(AssetId::DamagedHelmet);
    assert!(std::sync::Arc::ptr_eq(&mesh, &again));
    assert_eq!(store.load_count(), 1);

    // but the strict path still reports it
    store.unload(AssetId::DamagedHelmet);
    assert!(store.try_get(AssetId::DamagedHelmet).is_err());
    assert!(!store.is_loaded(AssetId::DamagedHelmet));
}

#[test]
fn quads_are_triangulated() {
    common::init_tracing();
    let dir = scratch_dir("quad");
    fs::write(dir.join(AssetId::Cube.file_name()), QUAD).unwrap();

    let mesh = ObjAssetLoader::new(&dir).load(AssetId::Cube).unwrap();
    assert_eq!(mesh.sub_meshes.len(), 1);
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.vertex_count(), 6);

    // counter-clockwise seen from above, so the computed normal points up
    for vertex in &mesh.sub_meshes[0].vertices {
        assert!((vertex.normal.y - 1.0).abs() < 1e-6, "{:?}", vertex.normal);
    }
}

#[test]
fn groups_become_sub_meshes() {
    common::init_tracing();
    let dir = scratch_dir("groups");
    fs::write(dir.join(AssetId::DamagedHelmet.file_name()), TWO_GROUPS).unwrap();

    let store = ModelStore::new(Box::new(ObjAssetLoader::new(&dir)));
    let mesh = store.try_get(AssetId::DamagedHelmet).unwrap();

    assert_eq!(mesh.sub_meshes.len(), 2);
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.sub_meshes[0].vertices[0].normal.z, 1.0);
    assert!(store.is_loaded(AssetId::DamagedHelmet));
}

#[test]
fn out_of_range_index_is_malformed() {
    common::init_tracing();
    let dir = scratch_dir("malformed");
    fs::write(dir.join(AssetId::Sphere.file_name()), "v 0 0 0\nf 1 2 3\n").unwrap();

    let result = ObjAssetLoader::new(&dir).load(AssetId::Sphere);
    assert!(matches!(
        result,
        Err(AssetLoadError::Malformed { .. } | AssetLoadError::Parse { .. })
    ));
}
