use rime_core::{
    render::{
        flow::{NodeBuildError, RenderNode},
        helper::Transform,
        resource::{ShaderData, TargetFormats},
        scene::GpuScene,
    },
    WgpuRenderer,
};
use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroup, BindGroupLayout, Buffer, BufferUsages, ColorTargetState, ColorWrites,
    CompareFunction, DepthStencilState, Face, FragmentState, IndexFormat,
    PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState, RenderPass,
    RenderPipeline, RenderPipelineDescriptor, VertexState,
};

use crate::{
    material::{GpuSurfaceMaps, ReflectiveMaterial, ReflectiveMaterialUniform},
    mesh::{GpuMesh, Mesh, Vertex},
    util::{self, REFLECT_SHADER},
};

struct ReflectiveNodeData {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    uniform: Buffer,
    bind_group: Option<BindGroup>,
    maps: GpuSurfaceMaps,
    mesh: GpuMesh,
}

/// One mesh reflecting the environment.
pub struct ReflectiveNode {
    pub mesh: Mesh,
    pub transform: Transform,
    pub material: ReflectiveMaterial<WgpuRenderer>,
    data: Option<ReflectiveNodeData>,
}

impl ReflectiveNode {
    pub fn new(
        mesh: Mesh,
        transform: Transform,
        material: ReflectiveMaterial<WgpuRenderer>,
    ) -> Self {
        Self {
            mesh,
            transform,
            material,
            data: None,
        }
    }
}

impl RenderNode for ReflectiveNode {
    fn build(
        &mut self,
        renderer: &WgpuRenderer,
        scene: &GpuScene,
        formats: TargetFormats,
    ) -> Result<(), NodeBuildError> {
        let shader = util::create_shader(&renderer.device, "reflect.wgsl", REFLECT_SHADER)?;
        let layout = ReflectiveMaterial::create_layout(&renderer.device);

        let pipeline_layout = renderer
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("reflective_pipeline_layout"),
                bind_group_layouts: &[&scene.camera_layout, &layout],
                push_constant_ranges: &[],
            });

        let pipeline = renderer
            .device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("reflective_pipeline"),
                layout: Some(&pipeline_layout),
                cache: None,
                vertex: VertexState {
                    module: &shader,
                    entry_point: "vertex",
                    compilation_options: PipelineCompilationOptions::default(),
                    buffers: &[Vertex::LAYOUT],
                },
                fragment: Some(FragmentState {
                    module: &shader,
                    entry_point: "fragment",
                    compilation_options: PipelineCompilationOptions::default(),
                    targets: &[Some(ColorTargetState {
                        format: formats.color,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                primitive: PrimitiveState {
                    cull_mode: Some(Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(DepthStencilState {
                    format: formats.depth,
                    depth_write_enabled: true,
                    depth_compare: CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: formats.multisample(),
                multiview: None,
            });

        let uniform = renderer.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("reflective_material_uniform"),
            contents: self
                .material
                .uniform(self.transform.compute_matrix())
                .as_bytes(),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        self.data = Some(ReflectiveNodeData {
            pipeline,
            layout,
            uniform,
            bind_group: None,
            maps: self.material.maps.upload(renderer),
            mesh: self.mesh.upload(&renderer.device),
        });
        Ok(())
    }

    fn prepare(&mut self, renderer: &WgpuRenderer, scene: &GpuScene) {
        let Some(data) = &mut self.data else {
            return;
        };

        let uniform: ReflectiveMaterialUniform =
            self.material.uniform(self.transform.compute_matrix());
        renderer
            .queue
            .write_buffer(&data.uniform, 0, uniform.as_bytes());

        let Some(environment) = scene.environment() else {
            return;
        };
        if self.material.set_environment(environment) || data.bind_group.is_none() {
            log::debug!("Reflective model now samples cube map {:?}.", environment.id().0);
            data.bind_group = self.material.create_bind_group(
                &renderer.device,
                &data.layout,
                &data.uniform,
                &data.maps,
            );
        }
    }

    fn draw(&self, scene: &GpuScene, pass: &mut RenderPass<'_>) {
        let Some(ReflectiveNodeData {
            pipeline,
            bind_group: Some(bind_group),
            mesh,
            ..
        }) = &self.data
        else {
            return;
        };

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &scene.camera_bind_group, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}
