use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;
use wgpu::{
    Color, CommandEncoderDescriptor, LoadOp, Operations, RenderPass, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, StoreOp,
};

use crate::{
    render::{
        resource::{RenderTarget, TargetFormats},
        scene::GpuScene,
    },
    WgpuRenderer,
};

#[derive(Error, Debug)]
#[error("Failed to build render node: {0}")]
pub struct NodeBuildError(pub String);

pub trait RenderNode {
    /// Build pipelines and layouts.
    fn build(
        &mut self,
        renderer: &WgpuRenderer,
        scene: &GpuScene,
        formats: TargetFormats,
    ) -> Result<(), NodeBuildError>;
    /// Update bind groups and uniforms for the coming frame.
    fn prepare(&mut self, renderer: &WgpuRenderer, scene: &GpuScene);
    /// Record draws into the shared pass.
    fn draw(&self, scene: &GpuScene, pass: &mut RenderPass<'_>);
}

/// Nodes drawn in insertion order into one render pass.
pub struct RenderFlow {
    pub flow: IndexMap<Uuid, Box<dyn RenderNode>>,
    pub clear_color: Color,
}

impl Default for RenderFlow {
    fn default() -> Self {
        Self {
            flow: IndexMap::new(),
            clear_color: Color::BLACK,
        }
    }
}

impl RenderFlow {
    #[inline]
    pub fn add(&mut self, node: impl RenderNode + 'static) -> Uuid {
        let uuid = Uuid::new_v4();
        self.flow.insert(uuid, Box::new(node));
        uuid
    }

    pub fn build(
        &mut self,
        renderer: &WgpuRenderer,
        scene: &GpuScene,
        formats: TargetFormats,
    ) -> Result<(), NodeBuildError> {
        for node in self.flow.values_mut() {
            node.build(renderer, scene, formats)?;
        }
        Ok(())
    }

    pub fn run(&mut self, renderer: &WgpuRenderer, scene: &GpuScene, target: &RenderTarget) {
        for node in self.flow.values_mut() {
            node.prepare(renderer, scene);
        }

        let mut command_encoder = renderer
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("render_flow_encoder"),
            });

        {
            let mut pass = command_encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render_flow_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target.color,
                    resolve_target: target.resolve,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        // Only the resolved image outlives the pass.
                        store: if target.resolve.is_some() {
                            StoreOp::Discard
                        } else {
                            StoreOp::Store
                        },
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: target.depth,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.),
                        store: StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for node in self.flow.values() {
                node.draw(scene, &mut pass);
            }
        }

        renderer.queue.submit(Some(command_encoder.finish()));
    }
}
