use crate::assets::{AssetId, SubMesh, VisualMesh, VisualVertex};
use itertools::Itertools;
use nalgebra::{Vector2, Vector3};
use obj::{IndexTuple, Obj, ObjData, ObjError};
use snafu::{ResultExt, Snafu, ensure};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum AssetLoadError {
    #[snafu(display("Model file {} does not exist", path.display()))]
    Missing { path: PathBuf },

    #[snafu(display("Model file {} could not be parsed: {source}", path.display()))]
    Parse { path: PathBuf, source: ObjError },

    #[snafu(display("Model file {} is malformed: {reason}", path.display()))]
    Malformed { path: PathBuf, reason: String },

    #[snafu(display("Model file {} contains no geometry", path.display()))]
    Empty { path: PathBuf },
}

/// Turns an [`AssetId`] into raw mesh data.
///
/// Loaders may fail; the [`ModelStore`](crate::assets::ModelStore) in front of
/// them is what guarantees callers always get something renderable.
pub trait AssetLoader: Send + Sync {
    fn load(&self, asset: AssetId) -> Result<VisualMesh, AssetLoadError>;
}

/// Loads Wavefront OBJ files from a directory, one file per [`AssetId`].
#[derive(Debug, Clone)]
pub struct ObjAssetLoader {
    root: PathBuf,
}

impl ObjAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ObjAssetLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, asset: AssetId) -> PathBuf {
        self.root.join(asset.file_name())
    }
}

impl AssetLoader for ObjAssetLoader {
    fn load(&self, asset: AssetId) -> Result<VisualMesh, AssetLoadError> {
        let path = self.path_of(asset);
        ensure!(path.is_file(), MissingErr { path });

        let obj = Obj::load(&path).context(ParseErr { path: path.clone() })?;
        let mesh = mesh_from_obj(&obj.data, &path)?;

        ensure!(!mesh.is_empty(), EmptyErr { path });

        debug!(
            "Loaded {asset} with {} sub-meshes and {} triangles",
            mesh.sub_meshes.len(),
            mesh.triangle_count()
        );

        Ok(mesh)
    }
}

fn mesh_from_obj(data: &ObjData, path: &Path) -> Result<VisualMesh, AssetLoadError> {
    let mut sub_meshes = Vec::new();

    for group in data.objects.iter().flat_map(|o| o.groups.iter()) {
        let mut vertices = Vec::new();

        for poly in &group.polys {
            let corners = poly
                .0
                .iter()
                .map(|tuple| vertex_from_tuple(data, tuple, path))
                .collect::<Result<Vec<_>, _>>()?;

            if corners.len() < 3 {
                trace!("Skipping degenerate polygon in {}", path.display());
                continue;
            }

            // fan around the first corner
            for (b, c) in corners[1..].iter().tuple_windows() {
                let mut triangle = [corners[0], *b, *c];
                fill_missing_normals(&mut triangle);
                vertices.extend_from_slice(&triangle);
            }
        }

        if !vertices.is_empty() {
            sub_meshes.push(SubMesh::new(vertices, None));
        }
    }

    Ok(VisualMesh::new(sub_meshes))
}

fn vertex_from_tuple(
    data: &ObjData,
    IndexTuple(pi, ti, ni): &IndexTuple,
    path: &Path,
) -> Result<VisualVertex, AssetLoadError> {
    let Some(position) = data.position.get(*pi) else {
        return MalformedErr {
            path,
            reason: format!("position index {pi} out of range"),
        }
        .fail();
    };

    let uv = ti
        .and_then(|i| data.texture.get(i))
        .map_or(Vector2::zeros(), |t| Vector2::new(t[0], t[1]));
    let normal = ni
        .and_then(|i| data.normal.get(i))
        .map_or(Vector3::zeros(), |n| Vector3::from(*n));

    Ok(VisualVertex::new(Vector3::from(*position), normal, uv))
}

fn fill_missing_normals(triangle: &mut [VisualVertex; 3]) {
    if triangle.iter().all(|v| v.normal != Vector3::zeros()) {
        return;
    }

    let [a, b, c] = triangle.map(|v| v.position);
    let face_normal = (b - a).cross(&(c - a)).try_normalize(f32::EPSILON);
    let Some(face_normal) = face_normal else {
        return;
    };

    for vertex in triangle.iter_mut() {
        if vertex.normal == Vector3::zeros() {
            vertex.normal = face_normal;
        }
    }
}
