use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferUsages, ShaderStages,
};

use crate::{
    render::{
        cube_map::{CubeMap, CubeMapBinding},
        helper::Camera,
        resource::{GpuCamera, ShaderData},
    },
    WgpuRenderer,
};

/// Per-frame state shared by every render node: the camera uniform and the
/// environment cube map.
pub struct GpuScene {
    pub camera_layout: BindGroupLayout,
    pub camera_bind_group: BindGroup,
    camera_buffer: Buffer,
    environment: CubeMapBinding<WgpuRenderer>,
}

impl GpuScene {
    pub fn new(renderer: &WgpuRenderer) -> Self {
        let camera_layout = renderer
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("camera_layout"),
                entries: &[BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: GpuCamera::min_binding_size(),
                    },
                    count: None,
                }],
            });

        let camera_buffer = renderer.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("camera_uniform"),
            contents: GpuCamera::default().as_bytes(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let camera_bind_group = renderer.device.create_bind_group(&BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        Self {
            camera_layout,
            camera_bind_group,
            camera_buffer,
            environment: CubeMapBinding::default(),
        }
    }

    pub fn write_camera(&self, renderer: &WgpuRenderer, camera: Camera) {
        renderer
            .queue
            .write_buffer(&self.camera_buffer, 0, GpuCamera::from(camera).as_bytes());
    }

    /// Makes `cube_map` the environment for the next frames.
    pub fn set_environment(&mut self, cube_map: &CubeMap<WgpuRenderer>) -> bool {
        self.environment.assign(cube_map)
    }

    #[inline]
    pub fn environment(&self) -> Option<&CubeMap<WgpuRenderer>> {
        self.environment.get()
    }
}
