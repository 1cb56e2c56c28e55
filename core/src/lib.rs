use std::time::Instant;

use thiserror::Error;
use wgpu::{
    Adapter, CreateSurfaceError, Device, DeviceDescriptor, Features, Instance, Limits,
    MemoryHints, Queue, RequestAdapterOptions, RequestDeviceError, Surface, SurfaceTarget,
    TextureFormat,
};

use crate::render::gpu::{FaceReader, Mipmapper};

pub use log;
pub use wgpu;

pub mod render;
pub mod util;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("No suitable graphics adapter found.")]
    NoAdapter,
    #[error("{0}")]
    RequestDevice(#[from] RequestDeviceError),
    #[error("{0}")]
    CreateSurface(#[from] CreateSurfaceError),
}

pub struct WgpuRenderer {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
    pub(crate) mipmapper: Mipmapper,
    pub(crate) face_reader: FaceReader,
}

impl WgpuRenderer {
    pub async fn new() -> Result<Self, RendererError> {
        Self::with_surface(Instance::default(), None).await
    }

    /// Sets up a renderer able to present to `target`.
    pub async fn for_surface<'w>(
        target: impl Into<SurfaceTarget<'w>>,
    ) -> Result<(Self, Surface<'w>), RendererError> {
        let instance = Instance::default();
        let surface = instance.create_surface(target)?;
        let renderer = Self::with_surface(instance, Some(&surface)).await?;
        Ok((renderer, surface))
    }

    async fn with_surface(
        instance: Instance,
        compatible_surface: Option<&Surface<'_>>,
    ) -> Result<Self, RendererError> {
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                compatible_surface,
                ..Default::default()
            })
            .await
            .ok_or(RendererError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    // Unlocks sample counts other than 1 and 4 where the adapter has them.
                    required_features: adapter.features()
                        & Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
                    required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: MemoryHints::default(),
                },
                None,
            )
            .await?;

        log::info!("Wgpu context set up on {}.", adapter.get_info().name);

        let mipmapper = Mipmapper::new(&device);
        let face_reader = FaceReader::new(&device);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            mipmapper,
            face_reader,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// The highest sample count up to `requested` that every one of `formats`
    /// can be rendered with.
    pub fn sample_count(&self, formats: &[TextureFormat], requested: u32) -> u32 {
        let adapter_specific = self
            .device
            .features()
            .contains(Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES);

        pick_sample_count(requested, |count| {
            formats.iter().all(|&format| {
                if adapter_specific {
                    self.adapter
                        .get_texture_format_features(format)
                        .flags
                        .sample_count_supported(count)
                } else {
                    format
                        .guaranteed_format_features(self.device.features())
                        .flags
                        .sample_count_supported(count)
                }
            })
        })
    }
}

/// Falls back through 16, 8, 4 and 2 samples to single sampling.
fn pick_sample_count(requested: u32, supported: impl Fn(u32) -> bool) -> u32 {
    [16, 8, 4, 2]
        .into_iter()
        .filter(|&count| count <= requested)
        .find(|&count| supported(count))
        .unwrap_or(1)
}

/// Logs frame time once a second.
pub struct FrameCounter {
    last_printed_instant: Instant,
    frame_count: u32,
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self {
            last_printed_instant: Instant::now(),
            frame_count: 0,
        }
    }
}

impl FrameCounter {
    pub fn update(&mut self) {
        self.frame_count += 1;
        let new_instant = Instant::now();
        let elapsed_secs = (new_instant - self.last_printed_instant).as_secs_f32();
        if elapsed_secs > 1.0 {
            let elapsed_ms = elapsed_secs * 1000.0;
            let frame_time = elapsed_ms / self.frame_count as f32;
            let fps = self.frame_count as f32 / elapsed_secs;
            log::info!("Frame time {:.2}ms ({:.1} FPS)", frame_time, fps);

            self.last_printed_instant = new_instant;
            self.frame_count = 0;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pick_sample_count() {
        assert_eq!(pick_sample_count(16, |_| true), 16);
        assert_eq!(pick_sample_count(16, |count| count <= 4), 4);
        assert_eq!(pick_sample_count(8, |count| count != 8), 4);
        assert_eq!(pick_sample_count(3, |_| true), 2);
        assert_eq!(pick_sample_count(1, |_| true), 1);
        assert_eq!(pick_sample_count(0, |_| true), 1);
        assert_eq!(pick_sample_count(16, |_| false), 1);
    }
}
