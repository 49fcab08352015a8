/// Stores a wgpu texture along with its view and, for sampled textures, the
/// sampler that reads it.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    fn attachment(
        device: &wgpu::Device,
        label: Option<&str>,
        (width, height): (u32, u32),
        sample_count: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            sampler: None,
        }
    }

    /// Create the depth buffer used by the main pass. `sample_count` must match
    /// the color target.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        surface: &wgpu::SurfaceConfiguration,
        sample_count: u32,
        label: Option<&str>,
    ) -> Self {
        Self::attachment(
            device,
            label,
            (surface.width, surface.height),
            sample_count,
            Self::DEPTH_TEXTURE_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }

    /// Create the multisampled color target that resolves into the surface.
    pub fn create_msaa_target(
        device: &wgpu::Device,
        surface: &wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> Self {
        Self::attachment(
            device,
            Some("msaa color target"),
            (surface.width, surface.height),
            sample_count,
            surface.format,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }

    /// Create a square shadow map that the depth-only shadow pass renders into
    /// and the main pass samples with depth comparison.
    pub fn create_shadow_map(device: &wgpu::Device, resolution: u32) -> Self {
        let mut shadow_map = Self::attachment(
            device,
            Some("shadow map"),
            (resolution, resolution),
            1,
            Self::DEPTH_TEXTURE_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );

        // Lit when the fragment's light space depth is not behind the stored
        // occluder depth.
        shadow_map.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow map sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        }));

        shadow_map
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }
}
