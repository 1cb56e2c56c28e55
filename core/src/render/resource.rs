use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::{MultisampleState, TextureFormat, TextureView};

pub trait ShaderData: Sized + Pod {
    #[inline]
    fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    #[inline]
    fn min_binding_size() -> Option<NonZeroU64> {
        NonZeroU64::new(std::mem::size_of::<Self>() as u64)
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct GpuCamera {
    pub view_proj: Mat4,
    /// Maps clip space back to world directions, ignoring camera position.
    pub sky_inv_view_proj: Mat4,
    pub position_ws: Vec4,
}

impl ShaderData for GpuCamera {}

#[derive(Debug, Clone, Copy)]
pub struct TargetFormats {
    pub color: TextureFormat,
    pub depth: TextureFormat,
    pub sample_count: u32,
}

impl TargetFormats {
    #[inline]
    pub fn multisample(&self) -> MultisampleState {
        MultisampleState {
            count: self.sample_count.max(1),
            ..Default::default()
        }
    }
}

pub struct RenderTarget<'a> {
    /// Multisampled when `resolve` is set.
    pub color: &'a TextureView,
    /// Receives the resolved image of a multisampled `color`.
    pub resolve: Option<&'a TextureView>,
    pub depth: &'a TextureView,
}
