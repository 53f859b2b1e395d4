use nalgebra::{Point3, Vector2, Vector3, Vector4};
use smallvec::SmallVec;
use static_assertions::const_assert_eq;
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexStepMode};

/// Color of the cube handed out when an asset can't be loaded.
pub const FALLBACK_COLOR: Vector4<f32> = Vector4::new(0.55, 0.0, 0.75, 1.0);
pub const DEFAULT_COLOR: Vector4<f32> = Vector4::new(0.7, 0.7, 0.7, 1.0);

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VisualVertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub uv: Vector2<f32>,
}

const_assert_eq!(size_of::<VisualVertex>(), 32);

impl VisualVertex {
    pub const fn new(position: Vector3<f32>, normal: Vector3<f32>, uv: Vector2<f32>) -> Self {
        VisualVertex {
            position,
            normal,
            uv,
        }
    }

    pub const fn at(position: Vector3<f32>) -> Self {
        Self::new(position, Vector3::new(0.0, 0.0, 0.0), Vector2::new(0.0, 0.0))
    }

    /// Vertex buffer layout for slot 0. Locations 0..=2.
    pub const fn continuous_descriptor<'a>() -> VertexBufferLayout<'a> {
        const ATTRIBUTES: [VertexAttribute; 3] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
        ];

        VertexBufferLayout {
            array_stride: size_of::<VisualVertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// One drawable part of a mesh. Drawn with a single (instanced) draw call.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub vertices: Vec<VisualVertex>,
    pub indices: Option<Vec<u32>>,
    pub color: Vector4<f32>,
}

impl SubMesh {
    pub fn new(vertices: Vec<VisualVertex>, indices: Option<Vec<u32>>) -> Self {
        SubMesh {
            vertices,
            indices,
            color: DEFAULT_COLOR,
        }
    }

    pub fn with_color(mut self, color: Vector4<f32>) -> Self {
        self.color = color;
        self
    }

    /// Number of elements a draw call has to cover.
    #[inline]
    pub fn element_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertices.len() as u32,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisualMesh {
    pub sub_meshes: SmallVec<[SubMesh; 1]>,
}

impl VisualMesh {
    pub fn new(sub_meshes: impl IntoIterator<Item = SubMesh>) -> Self {
        VisualMesh {
            sub_meshes: sub_meshes.into_iter().collect(),
        }
    }

    pub fn single(sub_mesh: SubMesh) -> Self {
        Self::new([sub_mesh])
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.sub_meshes.iter().map(|s| s.vertices.len()).sum()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.sub_meshes
            .iter()
            .map(|s| s.element_count() as usize / 3)
            .sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    /// All vertex positions of all sub-meshes, in order.
    pub fn point_cloud(&self) -> Vec<Point3<f32>> {
        self.sub_meshes
            .iter()
            .flat_map(|s| s.vertices.iter())
            .map(|v| Point3::from(v.position))
            .collect()
    }

    /// An indexed cube of side length one, centered at the origin.
    pub fn unit_cube(color: Vector4<f32>) -> Self {
        // (normal, u, v) with u x v == normal, so every face winds counter-clockwise
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        const CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u, v) in FACES {
            let normal = Vector3::from(normal);
            let u = Vector3::from(u);
            let v = Vector3::from(v);
            let base = vertices.len() as u32;

            for (cu, cv) in CORNERS {
                let position = normal * 0.5 + u * cu + v * cv;
                let uv = Vector2::new(cu + 0.5, cv + 0.5);
                vertices.push(VisualVertex::new(position, normal, uv));
            }

            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::single(SubMesh::new(vertices, Some(indices)).with_color(color))
    }

    pub fn fallback() -> Self {
        Self::unit_cube(FALLBACK_COLOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cube_shape() {
        let cube = VisualMesh::fallback();
        assert_eq!(cube.sub_meshes.len(), 1);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.sub_meshes[0].color, FALLBACK_COLOR);

        for p in cube.point_cloud() {
            assert!(p.coords.iter().all(|c| c.abs() == 0.5));
        }
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let cube = VisualMesh::unit_cube(DEFAULT_COLOR);
        let sub = &cube.sub_meshes[0];
        let Some(indices) = &sub.indices else {
            panic!("cube must be indexed");
        };

        for tri in indices.chunks_exact(3) {
            let a = sub.vertices[tri[0] as usize];
            let b = sub.vertices[tri[1] as usize];
            let c = sub.vertices[tri[2] as usize];
            let face_normal = (b.position - a.position).cross(&(c.position - a.position));
            assert!(face_normal.dot(&a.normal) > 0.0);
        }
    }
}
