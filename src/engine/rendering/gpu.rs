//! wgpu backend for the [`InstanceBatcher`](crate::rendering::InstanceBatcher).
//!
//! Meshes are uploaded once per asset. Every asset also owns an instance
//! buffer that grows to the largest batch seen and is rewritten once per flush.
//!
//! [`GpuInstancePass`] draws with an [`InstancePipeline`]: mesh vertices at
//! slot 0 ([`VisualVertex::continuous_descriptor`], locations 0 to 2) and
//! instance matrices at slot 1 ([`instance_descriptor`], locations 3 to 6).

use crate::assets::{AssetId, VisualMesh, VisualVertex};
use crate::rendering::{CameraBinding, InstanceDrawer, InstancePipeline, MaterialUniform};
use nalgebra::{Matrix4, Vector4};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{trace, warn};
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BufferAddress,
    BufferDescriptor, BufferUsages, Device, IndexFormat, Queue, RenderPass, VertexAttribute,
    VertexBufferLayout, VertexStepMode,
};

const MATRIX_SIZE: BufferAddress = size_of::<Matrix4<f32>>() as BufferAddress;
const MIN_INSTANCE_CAPACITY: usize = 16;

pub const fn instance_descriptor<'a>() -> VertexBufferLayout<'a> {
    const ATTRIBUTES: [VertexAttribute; 4] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
    ];

    VertexBufferLayout {
        array_stride: MATRIX_SIZE,
        step_mode: VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

#[derive(Debug)]
pub struct GpuSubMesh {
    pub(crate) vertices_buf: wgpu::Buffer,
    pub(crate) vertices_num: u32,
    pub(crate) indices_buf: Option<wgpu::Buffer>,
    pub(crate) indices_num: u32,
    pub color: Vector4<f32>,
    pub(crate) material: BindGroup,
}

/// The mesh a GPU upload was made from.
///
/// Holding the `Arc` keeps the allocation alive, so a reloaded mesh can never
/// reuse the address and pass for the uploaded one.
#[derive(Debug, Clone)]
pub struct UploadSource(Arc<VisualMesh>);

impl UploadSource {
    pub fn new(mesh: &Arc<VisualMesh>) -> Self {
        UploadSource(mesh.clone())
    }

    #[inline]
    pub fn matches(&self, mesh: &Arc<VisualMesh>) -> bool {
        Arc::ptr_eq(&self.0, mesh)
    }
}

#[derive(Debug)]
pub struct GpuMesh {
    pub sub_meshes: Vec<GpuSubMesh>,
    instance_buf: wgpu::Buffer,
    instance_capacity: usize,
    instances: u32,
    source: UploadSource,
}

impl GpuMesh {
    #[inline]
    pub fn instance_capacity(&self) -> usize {
        self.instance_capacity
    }

    #[inline]
    pub fn instance_count(&self) -> u32 {
        self.instances
    }
}

pub struct GpuMeshCache {
    device: Device,
    queue: Queue,
    material_layout: BindGroupLayout,
    meshes: HashMap<AssetId, GpuMesh>,
}

impl GpuMeshCache {
    pub fn new(device: Device, queue: Queue, pipeline: &InstancePipeline) -> Self {
        GpuMeshCache {
            device,
            queue,
            material_layout: pipeline.material_layout.clone(),
            meshes: HashMap::new(),
        }
    }

    /// Makes sure `mesh` is on the GPU and writes `instances` into its instance
    /// buffer, growing the buffer when needed.
    pub fn prepare(
        &mut self,
        asset: AssetId,
        mesh: &Arc<VisualMesh>,
        instances: &[Matrix4<f32>],
    ) -> &GpuMesh {
        let needed = instances.len().max(MIN_INSTANCE_CAPACITY).next_power_of_two();
        let device = &self.device;
        let layout = &self.material_layout;

        let gpu = match self.meshes.entry(asset) {
            Entry::Occupied(entry) if entry.get().source.matches(mesh) => entry.into_mut(),
            Entry::Occupied(mut entry) => {
                trace!("{asset} was reloaded, uploading it again");
                entry.insert(upload(device, layout, asset, mesh, needed));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(upload(device, layout, asset, mesh, needed)),
        };

        if gpu.instance_capacity < instances.len() {
            trace!("Growing instance buffer of {asset} to {needed}");
            gpu.instance_buf = create_instance_buffer(device, needed);
            gpu.instance_capacity = needed;
        }

        self.queue
            .write_buffer(&gpu.instance_buf, 0, bytemuck::cast_slice(instances));
        gpu.instances = instances.len() as u32;

        gpu
    }

    pub fn get(&self, asset: AssetId) -> Option<&GpuMesh> {
        self.meshes.get(&asset)
    }

    pub fn evict(&mut self, asset: AssetId) -> bool {
        self.meshes.remove(&asset).is_some()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

fn upload(
    device: &Device,
    layout: &BindGroupLayout,
    asset: AssetId,
    mesh: &Arc<VisualMesh>,
    capacity: usize,
) -> GpuMesh {
    let sub_meshes = mesh
        .sub_meshes
        .iter()
        .map(|sub| {
            let vertices_buf = device.create_buffer_init(&BufferInitDescriptor {
                label: Some("Instanced Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice::<VisualVertex, u8>(&sub.vertices),
                usage: BufferUsages::VERTEX,
            });

            let indices_buf = sub.indices.as_ref().map(|indices| {
                device.create_buffer_init(&BufferInitDescriptor {
                    label: Some("Instanced Mesh Index Buffer"),
                    contents: bytemuck::cast_slice(indices),
                    usage: BufferUsages::INDEX,
                })
            });

            let material_buf = device.create_buffer_init(&BufferInitDescriptor {
                label: Some("Instanced Mesh Material Buffer"),
                contents: bytemuck::bytes_of(&MaterialUniform { color: sub.color }),
                usage: BufferUsages::UNIFORM,
            });
            let material = device.create_bind_group(&BindGroupDescriptor {
                label: Some("Instanced Mesh Material Bind Group"),
                layout,
                entries: &[BindGroupEntry {
                    binding: 0,
                    resource: material_buf.as_entire_binding(),
                }],
            });

            GpuSubMesh {
                vertices_buf,
                vertices_num: sub.vertices.len() as u32,
                indices_num: sub.indices.as_ref().map_or(0, |i| i.len() as u32),
                indices_buf,
                color: sub.color,
                material,
            }
        })
        .collect();

    trace!("Uploaded {asset} for instanced drawing");

    GpuMesh {
        sub_meshes,
        instance_buf: create_instance_buffer(device, capacity),
        instance_capacity: capacity,
        instances: 0,
        source: UploadSource::new(mesh),
    }
}

fn create_instance_buffer(device: &Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some("Instance Matrix Buffer"),
        size: capacity as BufferAddress * MATRIX_SIZE,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Draws batches into an open render pass.
///
/// Instance data is written through the queue, so it lands before the pass
/// executes. Flush at most once per asset per submitted encoder, or earlier
/// draws of that asset see the later matrices.
pub struct GpuInstancePass<'a, 'p> {
    cache: &'a mut GpuMeshCache,
    pass: &'a mut RenderPass<'p>,
}

impl<'a, 'p> GpuInstancePass<'a, 'p> {
    /// Binds `pipeline` and the camera at group 0 for every draw that follows.
    pub fn new(
        cache: &'a mut GpuMeshCache,
        pipeline: &InstancePipeline,
        camera: &CameraBinding,
        pass: &'a mut RenderPass<'p>,
    ) -> Self {
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &camera.bind_group, &[]);
        GpuInstancePass { cache, pass }
    }
}

impl InstanceDrawer for GpuInstancePass<'_, '_> {
    fn draw_instanced(
        &mut self,
        asset: AssetId,
        mesh: &Arc<VisualMesh>,
        sub_mesh: usize,
        instances: &[Matrix4<f32>],
    ) {
        if sub_mesh == 0 || self.cache.get(asset).is_none() {
            self.cache.prepare(asset, mesh, instances);
        }
        let Some(gpu) = self.cache.get(asset) else {
            return;
        };

        let Some(sub) = gpu.sub_meshes.get(sub_mesh) else {
            warn!("{asset} has no sub-mesh #{sub_mesh} on the GPU");
            return;
        };

        let count = instances.len() as u32;
        let empty_indices = sub.indices_buf.is_some() && sub.indices_num == 0;
        if count == 0 || sub.vertices_num == 0 || empty_indices {
            return;
        }
        let instance_bytes = count as BufferAddress * MATRIX_SIZE;

        self.pass.set_bind_group(1, &sub.material, &[]);
        self.pass.set_vertex_buffer(0, sub.vertices_buf.slice(..));
        self.pass
            .set_vertex_buffer(1, gpu.instance_buf.slice(..instance_bytes));

        match &sub.indices_buf {
            Some(indices_buf) => {
                self.pass
                    .set_index_buffer(indices_buf.slice(..), IndexFormat::Uint32);
                self.pass.draw_indexed(0..sub.indices_num, 0, 0..count);
            }
            None => self.pass.draw(0..sub.vertices_num, 0..count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> Arc<VisualMesh> {
        Arc::new(VisualMesh::default())
    }

    #[test]
    fn upload_source_matches_only_its_own_mesh() {
        let uploaded = mesh();
        let source = UploadSource::new(&uploaded);

        assert!(source.matches(&uploaded));
        assert!(source.matches(&uploaded.clone()));
        assert!(!source.matches(&mesh()));
    }

    #[test]
    fn reloaded_mesh_is_never_mistaken_for_the_uploaded_one() {
        let uploaded = mesh();
        let source = UploadSource::new(&uploaded);
        drop(uploaded);

        // the source still owns the old allocation, so none of these can land on it
        let reloaded: Vec<_> = (0..64).map(|_| mesh()).collect();
        assert!(reloaded.iter().all(|m| !source.matches(m)));
    }

    #[test]
    fn instance_layout_is_one_matrix_per_instance() {
        let layout = instance_descriptor();

        assert_eq!(layout.step_mode, VertexStepMode::Instance);
        assert_eq!(layout.array_stride, 64);
        assert_eq!(layout.attributes.len(), 4);
    }
}
