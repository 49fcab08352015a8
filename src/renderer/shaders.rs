mod packed_structs;

use glam::{Mat4, Vec3, Vec4};

use crate::{geometry::Vertex, lighting::ShadowAlgorithm, scene_graph::Mesh};

use super::{
    gpu_buffers::{DynamicGpuBuffer, GenericUniformBuffer, UniformBindGroup},
    textures::Texture,
};

pub use packed_structs::{PackedLight, PackedMaterial, MAX_LIGHTS};

/// Source of the forward lit shader.
pub const LIT_SHADER: &str = include_str!("shaders/lit.wgsl");

/// Source of the depth-only shadow map shader.
pub const SHADOW_SHADER: &str = include_str!("shaders/shadow.wgsl");

/// Per-frame uniform values used by the lit shader.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerFrameBufferData {
    pub view_projection: Mat4,
    pub light_view_projection: Mat4,
    pub view_pos: Vec4,
    /// (enabled, depth bias, filter radius in texels, filter taps per axis).
    pub shadow: Vec4,
    /// .x is the number of packed lights.
    pub counts: [u32; 4],
    pub lights: [PackedLight; MAX_LIGHTS],
}

/// Stores per-frame shader uniform values and copies them to a GPU backed
/// buffer accessible to shaders.
pub struct PerFrameUniforms {
    pub buffer: GenericUniformBuffer<PerFrameBufferData>,
}

impl PerFrameUniforms {
    /// Create a new per frame uniform buffer. Only one instance is needed per
    /// renderer.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        Self {
            buffer: GenericUniformBuffer::new(
                device,
                Some("per-frame uniforms"),
                Default::default(),
                &layouts.uniform_layout,
            ),
        }
    }

    pub fn set_camera(&mut self, view_projection: Mat4, view_pos: Vec3) {
        let values = self.buffer.values_mut();
        values.view_projection = view_projection;
        values.view_pos = packed_structs::vec3_w(view_pos, 1.0);
    }

    /// Replace the lights evaluated this frame. Lights past `MAX_LIGHTS` are
    /// dropped and the count of dropped lights is returned.
    pub fn set_lights(&mut self, lights: &[PackedLight]) -> usize {
        let values = self.buffer.values_mut();
        let count = lights.len().min(MAX_LIGHTS);

        values.lights = [PackedLight::default(); MAX_LIGHTS];
        values.lights[..count].copy_from_slice(&lights[..count]);
        values.counts[0] = count as u32;

        lights.len() - count
    }

    /// Enable shadow sampling with the given light space transform. Passing
    /// `None` turns shadows off for this frame.
    pub fn set_shadow(&mut self, shadow: Option<(Mat4, f32, ShadowAlgorithm, f32)>) {
        let values = self.buffer.values_mut();

        match shadow {
            Some((light_view_projection, bias, algorithm, radius)) => {
                let (radius, taps) = match algorithm {
                    ShadowAlgorithm::Basic => (0.0, 1.0),
                    ShadowAlgorithm::Pcf => (1.0, 3.0),
                    ShadowAlgorithm::PcfSoft => (radius.max(1.0), 5.0),
                };

                values.light_view_projection = light_view_projection;
                values.shadow = Vec4::new(1.0, bias, radius, taps);
            }
            None => values.shadow = Vec4::ZERO,
        }
    }
}

impl DynamicGpuBuffer for PerFrameUniforms {
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.buffer.update_gpu(queue)
    }

    fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }
}

impl UniformBindGroup for PerFrameUniforms {
    fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }
}

/// Per-model uniform values used by both the lit and the shadow shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerModelBufferData {
    pub local_to_world: Mat4,
    pub normal_matrix: Mat4,
    pub material: PackedMaterial,
}

/// Stores per-model shader uniform values. One instance per drawn mesh node.
#[derive(Debug)]
pub struct PerModelUniforms {
    pub buffer: GenericUniformBuffer<PerModelBufferData>,
}

impl PerModelUniforms {
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts) -> Self {
        Self {
            buffer: GenericUniformBuffer::new(
                device,
                Some("per-model uniforms"),
                Default::default(),
                &layouts.uniform_layout,
            ),
        }
    }

    /// Copy the world transform and material of `mesh` into the buffer. Only
    /// marks the buffer dirty when something changed.
    pub fn set_mesh(&mut self, local_to_world: Mat4, mesh: &Mesh) {
        let normal_matrix = local_to_world.inverse().transpose();
        let material = PackedMaterial::from(mesh);
        let current = self.buffer.values();

        if current.local_to_world == local_to_world && current.material == material {
            return;
        }

        let values = self.buffer.values_mut();
        values.local_to_world = local_to_world;
        values.normal_matrix = if normal_matrix.is_finite() {
            normal_matrix
        } else {
            Mat4::IDENTITY
        };
        values.material = material;
    }
}

impl DynamicGpuBuffer for PerModelUniforms {
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.buffer.update_gpu(queue)
    }

    fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }
}

impl UniformBindGroup for PerModelUniforms {
    fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }
}

/// Uniforms for the shadow pass: the light's view projection.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowPassBufferData {
    pub light_view_projection: Mat4,
}

/// Binds a shadow map texture and its comparison sampler for the lit shader.
pub struct ShadowMapBinding {
    pub texture: Texture,
    bind_group: wgpu::BindGroup,
}

impl ShadowMapBinding {
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts, texture: Texture) -> Self {
        let fallback_sampler;
        let sampler = match texture.sampler.as_ref() {
            Some(sampler) => sampler,
            None => {
                fallback_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                    compare: Some(wgpu::CompareFunction::LessEqual),
                    ..Default::default()
                });
                &fallback_sampler
            }
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow map bind group"),
            layout: &layouts.shadow_map_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    // 0: Shadow depth texture.
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    // 1: Comparison sampler.
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        Self {
            texture,
            bind_group,
        }
    }
}

impl UniformBindGroup for ShadowMapBinding {
    fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// A registry of bind group layouts used by this renderer.
pub struct BindGroupLayouts {
    /// A single uniform buffer. Used for per-frame, per-model and shadow pass
    /// uniforms.
    pub uniform_layout: wgpu::BindGroupLayout,
    pub shadow_map_layout: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            uniform_layout: device.create_bind_group_layout(&Self::uniform_desc()),
            shadow_map_layout: device.create_bind_group_layout(&Self::shadow_map_desc()),
        }
    }

    pub fn uniform_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        }
    }

    /// Expected bind group inputs:
    ///  0 - shadow depth texture
    ///  1 - comparison sampler
    pub fn shadow_map_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow map bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        }
    }
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_structs_are_16_byte_aligned() {
        assert_eq!(0, std::mem::size_of::<PerFrameBufferData>() % 16);
        assert_eq!(0, std::mem::size_of::<PerModelBufferData>() % 16);
        assert_eq!(0, std::mem::size_of::<PackedLight>() % 16);
    }

    #[test]
    fn per_frame_layout_matches_shader() {
        // 2 matrices, 3 vec4 and 8 lights of 3 vec4 each.
        assert_eq!(2 * 64 + 3 * 16 + MAX_LIGHTS * 48, std::mem::size_of::<PerFrameBufferData>());
    }
}
