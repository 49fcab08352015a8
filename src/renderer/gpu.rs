use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Context};
use glam::Mat4;
use tracing::{debug, info, warn};
use winit::window::Window;

use crate::{
    camera::Camera,
    geometry::{Geometry, Vertex},
    lighting::ShadowAlgorithm,
    scene_graph::{NodeId, SceneGraph},
};

use super::{
    gpu_buffers::{DynamicGpuBuffer, GenericUniformBuffer, GeometryBuffers, UniformBindGroup},
    prepare_shadow_maps,
    setup::RendererOptions,
    shaders::{
        BindGroupLayouts, PackedLight, PerFrameUniforms, PerModelUniforms, ShadowMapBinding,
        ShadowPassBufferData, LIT_SHADER, SHADOW_SHADER,
    },
    textures::Texture,
    FrameRenderer, RenderError, ShadowCasterKind, ShadowMapSettings,
};

/// GPU resources cached for one mesh node.
struct GpuMesh {
    buffers: GeometryBuffers,
    uniforms: PerModelUniforms,
}

/// A mesh queued for drawing this frame.
struct DrawItem {
    node: NodeId,
    blended: bool,
    wireframe: bool,
    cast_shadow: bool,
    /// View space depth, used to sort blended meshes back to front.
    view_depth: f32,
}

/// The directional shadow currently held in the shadow map texture.
#[derive(Clone, Debug)]
struct ShadowState {
    node: NodeId,
    generation: u64,
    view_projection: Mat4,
    bias: f32,
    radius: f32,
}

/// Forward renderer drawing a scene graph into a window surface with wgpu.
pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    sample_count: u32,
    clear_alpha: f64,
    layouts: BindGroupLayouts,
    opaque_pipeline: wgpu::RenderPipeline,
    blended_pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    depth_texture: Texture,
    msaa_target: Option<Texture>,
    per_frame_uniforms: PerFrameUniforms,
    shadow_pass_uniforms: GenericUniformBuffer<ShadowPassBufferData>,
    shadow_map: ShadowMapBinding,
    shadow_state: Option<ShadowState>,
    meshes: HashMap<NodeId, GpuMesh>,
    /// Logical size, multiplied by `pixel_ratio` to size the surface.
    width: u32,
    height: u32,
    pixel_ratio: f32,
    shadow_settings: ShadowMapSettings,
    shadow_generation: u64,
    frames_rendered: u64,
    light_limit_reported: bool,
    disposed: bool,
    /// Held so the window outlives the surface created from it.
    window: Arc<Window>,
}

impl GpuRenderer {
    /// Create a renderer drawing into `window`. Options that only matter at
    /// creation time (alpha, antialias, power preference) are consumed here;
    /// call `apply_options` afterwards for size, pixel ratio and shadows.
    pub async fn new(window: Arc<Window>, options: &RendererOptions) -> anyhow::Result<Self> {
        let window_size = window.inner_size();

        // Create a WGPU instance that can use any supported graphics API.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create a rendering surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference.into(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no graphics adapter is compatible with the surface"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    },
                    label: None,
                },
                None,
            )
            .await
            .context("failed to open the graphics device")?;

        info!(adapter = ?adapter.get_info(), precision = ?options.precision, "created gpu renderer");

        // Shaders assume they write to an sRGB back buffer.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("the surface supports no texture formats"))?;

        if !surface_format.is_srgb() {
            info!("no sRGB support found for the main rendering surface, defaulting to first available");
        }

        let alpha_mode = surface_caps
            .alpha_modes
            .iter()
            .copied()
            .find(|mode| {
                options.alpha
                    && matches!(
                        mode,
                        wgpu::CompositeAlphaMode::PreMultiplied
                            | wgpu::CompositeAlphaMode::PostMultiplied
                    )
            })
            .or_else(|| surface_caps.alpha_modes.first().copied())
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let sample_count = {
            let requested = options.sample_count();
            let flags = adapter.get_texture_format_features(surface_format).flags;

            if requested > 1 && !flags.sample_count_supported(requested) {
                warn!(requested, "multisampling unsupported for the surface format, disabling");
                1
            } else {
                requested
            }
        };

        let layouts = BindGroupLayouts::new(&device);
        let per_frame_uniforms = PerFrameUniforms::new(&device, &layouts);
        let shadow_pass_uniforms = GenericUniformBuffer::new(
            &device,
            Some("shadow pass uniforms"),
            ShadowPassBufferData::default(),
            &layouts.uniform_layout,
        );

        let lit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lit shader"),
            source: wgpu::ShaderSource::Wgsl(LIT_SHADER.into()),
        });
        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
        });

        let lit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit pipeline layout"),
            bind_group_layouts: &[
                &layouts.uniform_layout,
                &layouts.uniform_layout,
                &layouts.shadow_map_layout,
            ],
            push_constant_ranges: &[],
        });

        let lit_pipeline = |label, topology, blend, depth_write_enabled| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&lit_layout),
                vertex: wgpu::VertexState {
                    module: &lit_shader,
                    entry_point: "vs_main",
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &lit_shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_config.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                // Back faces are discarded in the shader unless the material
                // is double sided.
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: Texture::DEPTH_TEXTURE_FORMAT,
                    depth_write_enabled,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        };

        let opaque_pipeline = lit_pipeline(
            "opaque pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::REPLACE,
            true,
        );
        let blended_pipeline = lit_pipeline(
            "blended pipeline",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::ALPHA_BLENDING,
            false,
        );
        let wireframe_pipeline = lit_pipeline(
            "wireframe pipeline",
            wgpu::PrimitiveTopology::LineList,
            wgpu::BlendState::ALPHA_BLENDING,
            false,
        );

        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow pipeline"),
            layout: Some(
                &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("shadow pipeline layout"),
                    bind_group_layouts: &[&layouts.uniform_layout, &layouts.uniform_layout],
                    push_constant_ranges: &[],
                }),
            ),
            vertex: wgpu::VertexState {
                module: &shadow_shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Texture::DEPTH_TEXTURE_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                // Slope scaled bias keeps lit surfaces from shadowing
                // themselves.
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let depth_texture =
            Texture::create_depth_texture(&device, &surface_config, sample_count, Some("depth buffer"));
        let msaa_target = (sample_count > 1)
            .then(|| Texture::create_msaa_target(&device, &surface_config, sample_count));

        // Bound until a light casts a shadow so the lit pipeline layout is
        // always satisfied.
        let shadow_map = ShadowMapBinding::new(&device, &layouts, Texture::create_shadow_map(&device, 1));

        Ok(Self {
            surface,
            device,
            queue,
            width: surface_config.width,
            height: surface_config.height,
            surface_config,
            sample_count,
            clear_alpha: if options.alpha { 0.0 } else { 1.0 },
            layouts,
            opaque_pipeline,
            blended_pipeline,
            wireframe_pipeline,
            shadow_pipeline,
            depth_texture,
            msaa_target,
            per_frame_uniforms,
            shadow_pass_uniforms,
            shadow_map,
            shadow_state: None,
            meshes: HashMap::new(),
            pixel_ratio: 1.0,
            shadow_settings: ShadowMapSettings::default(),
            shadow_generation: 0,
            frames_rendered: 0,
            light_limit_reported: false,
            disposed: false,
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Surface size in physical pixels.
    fn physical_size(&self) -> (u32, u32) {
        let scale = |logical: u32| ((logical as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    fn configure_surface(&mut self) {
        let (width, height) = self.physical_size();

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);

        // Recreate the attachments to match the new surface size.
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            &self.surface_config,
            self.sample_count,
            Some("depth buffer"),
        );
        self.msaa_target = (self.sample_count > 1).then(|| {
            Texture::create_msaa_target(&self.device, &self.surface_config, self.sample_count)
        });
    }

    fn resize_if_needed(&mut self) {
        if self.physical_size() != (self.surface_config.width, self.surface_config.height) {
            self.configure_surface();
        }
    }

    /// Upload transforms and materials of every visible mesh and return the
    /// draw list, opaque meshes first then blended meshes back to front.
    fn prepare_meshes(&mut self, graph: &SceneGraph, camera: &Camera) -> Vec<DrawItem> {
        self.meshes.retain(|id, _| graph.contains(*id));

        let view = camera.view_matrix();
        let mut items = Vec::new();

        for id in graph.meshes() {
            if !graph.is_visible_in_world(id) {
                continue;
            }

            let Some(mesh) = graph.get(id).and_then(|n| n.mesh()) else {
                continue;
            };

            if mesh.geometry.indices.is_empty() {
                continue;
            }

            let stale = self
                .meshes
                .get(&id)
                .map_or(true, |m| !m.buffers.is_built_from(&mesh.geometry));

            if stale {
                let uploaded = self.upload_mesh(&mesh.geometry);
                self.meshes.insert(id, uploaded);
            }

            let Some(gpu_mesh) = self.meshes.get_mut(&id) else {
                continue;
            };

            let local_to_world = graph.world_matrix(id);
            gpu_mesh.uniforms.set_mesh(local_to_world, mesh);
            gpu_mesh.uniforms.update_gpu_if_dirty(&self.queue);

            if mesh.material.wireframe {
                gpu_mesh.buffers.build_line_indices(&self.device);
            }

            items.push(DrawItem {
                node: id,
                blended: mesh.material.transparent || mesh.material.wireframe,
                wireframe: mesh.material.wireframe,
                cast_shadow: mesh.cast_shadow,
                view_depth: view.transform_point3(local_to_world.w_axis.truncate()).z,
            });
        }

        items.sort_by(|a, b| {
            a.blended
                .cmp(&b.blended)
                .then_with(|| a.view_depth.total_cmp(&b.view_depth))
        });

        items
    }

    fn upload_mesh(&self, geometry: &std::rc::Rc<Geometry>) -> GpuMesh {
        GpuMesh {
            buffers: GeometryBuffers::new(&self.device, geometry),
            uniforms: PerModelUniforms::new(&self.device, &self.layouts),
        }
    }

    fn prepare_lights(&mut self, graph: &SceneGraph) {
        let lights: Vec<PackedLight> = graph
            .lights()
            .into_iter()
            .filter(|id| graph.is_visible_in_world(*id))
            .filter_map(|id| {
                let light = graph.get(id)?.light()?;
                (light.intensity > 0.0)
                    .then(|| PackedLight::pack(light, graph.world_position(id)))
                    .flatten()
            })
            .collect();

        let dropped = self.per_frame_uniforms.set_lights(&lights);

        if dropped > 0 && !self.light_limit_reported {
            warn!(dropped, "scene has more lights than the renderer evaluates");
            self.light_limit_reported = true;
        }
    }

    /// The shadow to sample this frame, if the light that owns the shadow map
    /// still casts it.
    fn active_shadow(&self, graph: &SceneGraph) -> Option<(Mat4, f32, ShadowAlgorithm, f32)> {
        if !self.shadow_settings.enabled {
            return None;
        }

        let state = self.shadow_state.as_ref()?;
        let light = graph.get(state.node)?.light()?;
        let map = light.shadow.as_ref()?.map.as_ref()?;

        (light.casts_active_shadow()
            && map.generation == state.generation
            && graph.is_visible_in_world(state.node))
        .then_some((
            state.view_projection,
            state.bias,
            self.shadow_settings.algorithm,
            state.radius,
        ))
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture, RenderError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!("surface lost or outdated, reconfiguring");
                self.configure_surface();
                Ok(self.surface.get_current_texture()?)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl FrameRenderer for GpuRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resize_if_needed();
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = if ratio > 0.0 { ratio } else { 1.0 };
        self.resize_if_needed();
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn shadow_map(&self) -> &ShadowMapSettings {
        &self.shadow_settings
    }

    fn shadow_map_mut(&mut self) -> &mut ShadowMapSettings {
        &mut self.shadow_settings
    }

    fn render(&mut self, graph: &mut SceneGraph, camera: &Camera) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }

        let jobs = prepare_shadow_maps(&mut self.shadow_settings, graph, &mut self.shadow_generation);
        let shadow_job = jobs.iter().find(|j| j.kind == ShadowCasterKind::Directional);

        if let Some(job) = shadow_job {
            let current = self.shadow_state.as_ref();
            let reallocate = current.map_or(true, |s| s.generation != job.generation)
                || self.shadow_map.texture.width() != job.resolution;

            if reallocate {
                debug!(resolution = job.resolution, generation = job.generation, "allocating shadow map");
                self.shadow_map = ShadowMapBinding::new(
                    &self.device,
                    &self.layouts,
                    Texture::create_shadow_map(&self.device, job.resolution),
                );
            }

            self.shadow_state = Some(ShadowState {
                node: job.node,
                generation: job.generation,
                view_projection: job.view_projection,
                bias: job.bias,
                radius: job.radius,
            });
            self.shadow_pass_uniforms.values_mut().light_view_projection = job.view_projection;
            self.shadow_pass_uniforms.update_gpu(&self.queue);
        }

        let items = self.prepare_meshes(graph, camera);
        self.prepare_lights(graph);

        let shadow = self.active_shadow(graph);
        self.per_frame_uniforms
            .set_camera(camera.view_projection_matrix(), camera.eye());
        self.per_frame_uniforms.set_shadow(shadow);
        self.per_frame_uniforms.update_gpu(&self.queue);

        let backbuffer = self.acquire_frame()?;
        let backbuffer_view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut command_encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        if shadow_job.is_some() {
            let mut shadow_pass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_map.texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            shadow_pass.set_pipeline(&self.shadow_pipeline);
            shadow_pass.set_bind_group(0, self.shadow_pass_uniforms.bind_group(), &[]);

            for item in items.iter().filter(|i| i.cast_shadow) {
                let Some(mesh) = self.meshes.get(&item.node) else {
                    continue;
                };

                shadow_pass.set_bind_group(1, mesh.uniforms.bind_group(), &[]);
                shadow_pass.set_vertex_buffer(0, mesh.buffers.vertex_buffer.slice(..));
                shadow_pass.set_index_buffer(
                    mesh.buffers.triangle_indices.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                shadow_pass.draw_indexed(0..mesh.buffers.triangle_index_count, 0, 0..1);
            }
        }

        {
            let (color_view, resolve_target) = match self.msaa_target.as_ref() {
                Some(msaa) => (&msaa.view, Some(&backbuffer_view)),
                None => (&backbuffer_view, None),
            };

            let mut render_pass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.0,
                            g: 0.0,
                            b: 0.0,
                            a: self.clear_alpha,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, self.per_frame_uniforms.bind_group(), &[]);
            render_pass.set_bind_group(2, self.shadow_map.bind_group(), &[]);

            for item in &items {
                let Some(mesh) = self.meshes.get(&item.node) else {
                    continue;
                };

                render_pass.set_bind_group(1, mesh.uniforms.bind_group(), &[]);
                render_pass.set_vertex_buffer(0, mesh.buffers.vertex_buffer.slice(..));

                match (item.wireframe, mesh.buffers.line_indices()) {
                    (true, Some((lines, count))) => {
                        render_pass.set_pipeline(&self.wireframe_pipeline);
                        render_pass.set_index_buffer(lines.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..count, 0, 0..1);
                    }
                    _ => {
                        render_pass.set_pipeline(if item.blended {
                            &self.blended_pipeline
                        } else {
                            &self.opaque_pipeline
                        });
                        render_pass.set_index_buffer(
                            mesh.buffers.triangle_indices.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );
                        render_pass.draw_indexed(0..mesh.buffers.triangle_index_count, 0, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(command_encoder.finish()));
        backbuffer.present();

        self.frames_rendered += 1;
        Ok(())
    }

    fn release_mesh(&mut self, node: NodeId) {
        self.meshes.remove(&node);
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        info!(
            frames = self.frames_rendered,
            meshes = self.meshes.len(),
            "disposing gpu renderer"
        );

        self.meshes.clear();
        self.shadow_state = None;
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
