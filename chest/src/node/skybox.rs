use rime_core::{
    render::{
        flow::{NodeBuildError, RenderNode},
        resource::TargetFormats,
        scene::GpuScene,
    },
    WgpuRenderer,
};
use wgpu::{
    BindGroup, BindGroupLayout, ColorTargetState, ColorWrites, CompareFunction,
    DepthStencilState, FragmentState, PipelineCompilationOptions,
    PipelineLayoutDescriptor, PrimitiveState, RenderPass, RenderPipeline,
    RenderPipelineDescriptor, VertexState,
};

use crate::{
    material::SkyboxMaterial,
    util::{self, SKYBOX_SHADER},
};

struct SkyboxNodeData {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    bind_group: Option<BindGroup>,
}

/// Fills every pixel left at the far plane with the environment.
#[derive(Default)]
pub struct SkyboxNode {
    pub material: SkyboxMaterial<WgpuRenderer>,
    data: Option<SkyboxNodeData>,
}

impl RenderNode for SkyboxNode {
    fn build(
        &mut self,
        renderer: &WgpuRenderer,
        scene: &GpuScene,
        formats: TargetFormats,
    ) -> Result<(), NodeBuildError> {
        let shader = util::create_shader(&renderer.device, "skybox.wgsl", SKYBOX_SHADER)?;
        let layout = SkyboxMaterial::create_layout(&renderer.device);

        let pipeline_layout = renderer
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some("skybox_pipeline_layout"),
                bind_group_layouts: &[&scene.camera_layout, &layout],
                push_constant_ranges: &[],
            });

        let pipeline = renderer
            .device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("skybox_pipeline"),
                layout: Some(&pipeline_layout),
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
                        format: formats.color,
                        blend: None,
                        write_mask: ColorWrites::ALL,
                    })],
                }),
                primitive: PrimitiveState::default(),
                // Drawn at depth 1, only where nothing nearer was drawn.
                depth_stencil: Some(DepthStencilState {
                    format: formats.depth,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: formats.multisample(),
                multiview: None,
            });

        self.data = Some(SkyboxNodeData {
            pipeline,
            layout,
            bind_group: None,
        });
        Ok(())
    }

    fn prepare(&mut self, renderer: &WgpuRenderer, scene: &GpuScene) {
        let Some(data) = &mut self.data else {
            return;
        };
        let Some(environment) = scene.environment() else {
            return;
        };

        if self.material.set_environment(environment) || data.bind_group.is_none() {
            log::debug!("Skybox now samples cube map {:?}.", environment.id().0);
            data.bind_group = self
                .material
                .create_bind_group(&renderer.device, &data.layout);
        }
    }

    fn draw(&self, scene: &GpuScene, pass: &mut RenderPass<'_>) {
        let Some(SkyboxNodeData {
            pipeline,
            bind_group: Some(bind_group),
            ..
        }) = &self.data
        else {
            return;
        };

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &scene.camera_bind_group, &[]);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
