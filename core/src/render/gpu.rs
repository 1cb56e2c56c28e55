use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    AddressMode, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindingResource,
    BufferUsages, Color, ColorTargetState, ColorWrites, CommandEncoderDescriptor, Device,
    DownlevelFlags, ErrorFilter, Extent3d, FilterMode, FragmentState, ImageCopyTexture,
    ImageDataLayout, LoadOp, MultisampleState, Operations, Origin3d, PipelineCompilationOptions,
    PrimitiveState, Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, Sampler, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource,
    StoreOp, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexState,
};

use crate::{
    render::{
        backend::{CubeMapBackend, SamplerConfig},
        cube_map::{CubeMapError, CubeMapResult},
        image::Image,
        resource::ShaderData,
    },
    util::{self, cube::CubeFace},
    WgpuRenderer,
};

pub const CUBE_MAP_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Highest anisotropy clamp wgpu accepts.
const MAX_ANISOTROPY: u16 = 16;

/// A six layer texture sampled as a cube. Destroyed on drop.
pub struct GpuCubeTexture {
    texture: Texture,
    view: TextureView,
}

impl GpuCubeTexture {
    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// The whole cube, every mip level.
    #[inline]
    pub fn view(&self) -> &TextureView {
        &self.view
    }

    /// Reads one face back from the GPU.
    ///
    /// The face is first rendered into a plain 2D texture through the cube
    /// view, as some backends cannot copy out of a cube texture's layers.
    pub fn read_face(
        &self,
        renderer: &WgpuRenderer,
        face: CubeFace,
        mip_level: u32,
    ) -> CubeMapResult<Image> {
        if mip_level >= self.texture.mip_level_count() {
            return Err(CubeMapError::GraphicsContext(format!(
                "mip level {mip_level} out of range"
            )));
        }

        let flat = renderer.scoped("extracting cube face", || {
            renderer
                .face_reader
                .extract(&renderer.device, &renderer.queue, self, face, mip_level)
        })?;

        let (dim, raw) = pollster::block_on(util::read_rgba8_texture_layer(
            &renderer.device,
            &renderer.queue,
            &flat,
            0,
            0,
        ))
        .map_err(|err| CubeMapError::GraphicsContext(format!("reading back {face:?}: {err}")))?;

        flat.destroy();

        Image::from_raw(raw, dim.x, dim.y).ok_or_else(|| {
            CubeMapError::GraphicsContext(format!("short readback of {face:?} face"))
        })
    }
}

impl Drop for GpuCubeTexture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

impl WgpuRenderer {
    /// Runs `f`, turning any validation or out-of-memory error it raises into
    /// a [`CubeMapError::GraphicsContext`].
    fn scoped<T>(&self, operation: &str, f: impl FnOnce() -> T) -> CubeMapResult<T> {
        self.device.push_error_scope(ErrorFilter::OutOfMemory);
        self.device.push_error_scope(ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(err) => Err(CubeMapError::GraphicsContext(format!("{operation}: {err}"))),
            None => Ok(value),
        }
    }
}

impl CubeMapBackend for WgpuRenderer {
    type Texture = GpuCubeTexture;
    type Sampler = Sampler;

    fn max_anisotropy(&self) -> u16 {
        if self
            .adapter
            .get_downlevel_capabilities()
            .flags
            .contains(DownlevelFlags::ANISOTROPIC_FILTERING)
        {
            MAX_ANISOTROPY
        } else {
            1
        }
    }

    fn create_cube_texture(
        &self,
        face_size: u32,
        mip_level_count: u32,
    ) -> CubeMapResult<Self::Texture> {
        self.scoped("creating cube texture", || {
            let texture = self.device.create_texture(&TextureDescriptor {
                label: Some("cube_map"),
                size: Extent3d {
                    width: face_size,
                    height: face_size,
                    depth_or_array_layers: 6,
                },
                mip_level_count,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format: CUBE_MAP_FORMAT,
                usage: TextureUsages::TEXTURE_BINDING
                    | TextureUsages::COPY_DST
                    | TextureUsages::COPY_SRC
                    | TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&TextureViewDescriptor {
                label: Some("cube_map_view"),
                dimension: Some(TextureViewDimension::Cube),
                ..Default::default()
            });
            GpuCubeTexture { texture, view }
        })
    }

    fn upload_face(
        &self,
        texture: &Self::Texture,
        face: CubeFace,
        image: &Image,
    ) -> CubeMapResult<()> {
        self.scoped("uploading cube face", || {
            self.queue.write_texture(
                ImageCopyTexture {
                    texture: &texture.texture,
                    mip_level: 0,
                    origin: Origin3d {
                        x: 0,
                        y: 0,
                        z: face.layer(),
                    },
                    aspect: TextureAspect::All,
                },
                image.raw(),
                ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(image.width() * 4),
                    rows_per_image: Some(image.height()),
                },
                Extent3d {
                    width: image.width(),
                    height: image.height(),
                    depth_or_array_layers: 1,
                },
            );
        })
    }

    fn generate_mipmaps(&self, texture: &Self::Texture) -> CubeMapResult<()> {
        self.scoped("generating cube mipmaps", || {
            self.mipmapper
                .generate(&self.device, &self.queue, &texture.texture)
        })
    }

    fn create_sampler(&self, config: &SamplerConfig) -> CubeMapResult<Self::Sampler> {
        self.scoped("creating cube sampler", || {
            self.device.create_sampler(&SamplerDescriptor {
                label: Some("cube_map_sampler"),
                address_mode_u: config.address_mode,
                address_mode_v: config.address_mode,
                address_mode_w: config.address_mode,
                mag_filter: config.mag_filter,
                min_filter: config.min_filter,
                mipmap_filter: config.mipmap_filter,
                anisotropy_clamp: config.anisotropy_clamp,
                ..Default::default()
            })
        })
    }
}

/// Fills mip chains by repeatedly blitting each level into the next.
pub(crate) struct Mipmapper {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: Sampler,
}

impl Mipmapper {
    pub fn new(device: &Device) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("mipmap_shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shader/mipmap.wgsl"))),
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("mipmap_pipeline"),
            layout: None,
            cache: None,
            vertex: VertexState {
                module: &shader,
                entry_point: "vertex",
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fragment",
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format: CUBE_MAP_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
        });
        let layout = pipeline.get_bind_group_layout(0);

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("mipmap_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            layout,
            sampler,
        }
    }

    pub fn generate(&self, device: &Device, queue: &Queue, texture: &Texture) {
        let mip_level_count = texture.mip_level_count();
        if mip_level_count < 2 {
            return;
        }

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("mipmap_encoder"),
        });

        for layer in 0..texture.depth_or_array_layers() {
            let views = (0..mip_level_count)
                .map(|level| {
                    texture.create_view(&TextureViewDescriptor {
                        label: Some("mipmap_level_view"),
                        dimension: Some(TextureViewDimension::D2),
                        base_mip_level: level,
                        mip_level_count: Some(1),
                        base_array_layer: layer,
                        array_layer_count: Some(1),
                        ..Default::default()
                    })
                })
                .collect::<Vec<_>>();

            for level in 1..mip_level_count as usize {
                let bind_group = device.create_bind_group(&BindGroupDescriptor {
                    label: Some("mipmap_bind_group"),
                    layout: &self.layout,
                    entries: &[
                        BindGroupEntry {
                            binding: 0,
                            resource: BindingResource::TextureView(&views[level - 1]),
                        },
                        BindGroupEntry {
                            binding: 1,
                            resource: BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });

                let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some("mipmap_pass"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &views[level],
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(Color::BLACK),
                            store: StoreOp::Store,
                        },
                    })],
                    ..Default::default()
                });

                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        queue.submit(Some(encoder.finish()));
        log::debug!(
            "Generated {} mip levels for {} layers.",
            mip_level_count,
            texture.depth_or_array_layers()
        );
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FaceCopyUniform {
    face: u32,
    mip_level: f32,
    _padding: [u32; 2],
}

impl ShaderData for FaceCopyUniform {}

/// Renders single cube faces into standalone 2D textures for readback.
pub(crate) struct FaceReader {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: Sampler,
}

impl FaceReader {
    pub fn new(device: &Device) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("face_copy_shader"),
            source: ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shader/face_copy.wgsl"))),
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("face_copy_pipeline"),
            layout: None,
            cache: None,
            vertex: VertexState {
                module: &shader,
                entry_point: "vertex",
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "fragment",
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format: CUBE_MAP_FORMAT,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
        });
        let layout = pipeline.get_bind_group_layout(0);

        // Texel centers map exactly onto source texels.
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("face_copy_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            layout,
            sampler,
        }
    }

    /// Copies `face` at `mip_level` of `cube` into a new single layer texture.
    pub fn extract(
        &self,
        device: &Device,
        queue: &Queue,
        cube: &GpuCubeTexture,
        face: CubeFace,
        mip_level: u32,
    ) -> Texture {
        let size = util::mip_size(cube.texture.width(), mip_level);
        let target = device.create_texture(&TextureDescriptor {
            label: Some("face_copy_target"),
            size: Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: CUBE_MAP_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&TextureViewDescriptor::default());

        let uniform = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("face_copy_uniform"),
            contents: FaceCopyUniform {
                face: face.layer(),
                mip_level: mip_level as f32,
                _padding: [0; 2],
            }
            .as_bytes(),
            usage: BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("face_copy_bind_group"),
            layout: &self.layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&cube.view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&self.sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("face_copy_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("face_copy_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::TRANSPARENT),
                        store: StoreOp::Store,
                    },
                })],
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        queue.submit(Some(encoder.finish()));

        target
    }
}
