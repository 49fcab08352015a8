use std::{cell::Cell, collections::HashSet, rc::Rc};

use wgpu::util::DeviceExt;

use crate::geometry::Geometry;

/// Trait for objects that represent a GPU buffer that can be updated from the
/// CPU.
pub trait DynamicGpuBuffer {
    /// Copy data stored in this buffer to the GPU.
    ///
    /// Updating the GPU will also clear the dirty flag on this buffer.
    fn update_gpu(&self, queue: &wgpu::Queue);

    /// Check if this buffer has values that have not yet been copied to the GPU.
    fn is_dirty(&self) -> bool;

    /// Copy values to the GPU only when they changed since the last copy.
    fn update_gpu_if_dirty(&self, queue: &wgpu::Queue) {
        if self.is_dirty() {
            self.update_gpu(queue);
        }
    }
}

/// A trait for bind groups that contain uniforms.
pub trait UniformBindGroup {
    /// Get the bind group representing this uniform buffer.
    fn bind_group(&self) -> &wgpu::BindGroup;
}

/// Maps a Rust struct of uniform values to a wgpu uniform buffer bound at
/// binding zero of its own bind group.
///
/// Update values with `values_mut()` and copy them over with `update_gpu()`.
#[derive(Debug)]
pub struct GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    values: T,
    gpu_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// True if `values` is potentially out of sync with the GPU buffer.
    is_dirty: Cell<bool>,
}

impl<T> GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    /// Create a new uniform buffer holding `values`. `bind_group_layout` must
    /// have a single uniform buffer entry at binding zero.
    pub fn new(
        device: &wgpu::Device,
        label: Option<&str>,
        values: T,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let gpu_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label,
            contents: bytemuck::bytes_of(&values),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout: bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: gpu_buffer.as_entire_binding(),
            }],
        });

        Self {
            values,
            gpu_buffer,
            bind_group,
            is_dirty: Cell::new(false),
        }
    }

    pub fn values(&self) -> &T {
        &self.values
    }

    /// Access the values with a mutable ref. Marks the buffer dirty even if
    /// nothing is changed.
    pub fn values_mut(&mut self) -> &mut T {
        self.is_dirty.set(true);
        &mut self.values
    }
}

impl<T> DynamicGpuBuffer for GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.is_dirty.set(false);
        queue.write_buffer(&self.gpu_buffer, 0, bytemuck::bytes_of(&self.values));
    }

    fn is_dirty(&self) -> bool {
        self.is_dirty.get()
    }
}

impl<T> UniformBindGroup for GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// Vertex and index buffers uploaded for one geometry.
#[derive(Debug)]
pub struct GeometryBuffers {
    /// The geometry these buffers were built from. Meshes swapping in a new
    /// geometry get fresh buffers.
    source: Rc<Geometry>,
    pub vertex_buffer: wgpu::Buffer,
    pub triangle_indices: wgpu::Buffer,
    pub triangle_index_count: u32,
    /// Built the first time the geometry is drawn as a wireframe.
    line_indices: Option<(wgpu::Buffer, u32)>,
}

impl GeometryBuffers {
    pub fn new(device: &wgpu::Device, geometry: &Rc<Geometry>) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh vertex buffer"),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let triangle_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh index buffer"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            source: geometry.clone(),
            vertex_buffer,
            triangle_indices,
            triangle_index_count: geometry.indices.len() as u32,
            line_indices: None,
        }
    }

    pub fn is_built_from(&self, geometry: &Rc<Geometry>) -> bool {
        Rc::ptr_eq(&self.source, geometry)
    }

    /// Build the line list index buffer used to draw the geometry as a
    /// wireframe. Does nothing when it already exists.
    pub fn build_line_indices(&mut self, device: &wgpu::Device) {
        if self.line_indices.is_some() {
            return;
        }

        let indices = wireframe_indices(&self.source.indices);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh wireframe index buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.line_indices = Some((buffer, indices.len() as u32));
    }

    pub fn line_indices(&self) -> Option<(&wgpu::Buffer, u32)> {
        self.line_indices.as_ref().map(|(buffer, count)| (buffer, *count))
    }
}

/// Convert a triangle list into a line list with each shared edge only once.
pub fn wireframe_indices(triangles: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(triangles.len() * 2);

    for face in triangles.chunks_exact(3) {
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            if seen.insert((a.min(b), a.max(b))) {
                lines.extend_from_slice(&[a, b]);
            }
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_edges_are_emitted_once() {
        // Two triangles sharing the 1-2 edge.
        let lines = wireframe_indices(&[0, 1, 2, 2, 1, 3]);
        assert_eq!(10, lines.len());
    }

    #[test]
    fn flat_shaded_triangles_keep_every_edge() {
        // Flat shaded geometry never shares vertices between triangles.
        let cube = Geometry::cube(1.0);
        let lines = wireframe_indices(&cube.indices);

        assert_eq!(12 * 3 * 2, lines.len());
    }
}
