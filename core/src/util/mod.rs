use glam::{UVec2, UVec3};
use wgpu::{
    BufferDescriptor, BufferUsages, CommandEncoderDescriptor, Device, Extent3d, ImageCopyBuffer,
    ImageCopyTexture, ImageDataLayout, Maintain, MapMode, Origin3d, Queue, Texture, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor, COPY_BYTES_PER_ROW_ALIGNMENT,
};

pub mod cube;

pub fn create_texture(
    device: &Device,
    dim: UVec3,
    format: TextureFormat,
    usage: TextureUsages,
    sample_count: u32,
) -> (Texture, TextureView) {
    let target = device.create_texture(&TextureDescriptor {
        label: None,
        size: Extent3d {
            width: dim.x,
            height: dim.y,
            depth_or_array_layers: dim.z,
        },
        mip_level_count: 1,
        sample_count,
        dimension: {
            if dim.z == 1 && dim.y == 1 {
                TextureDimension::D1
            } else if dim.z == 1 {
                TextureDimension::D2
            } else {
                TextureDimension::D3
            }
        },
        format,
        usage,
        view_formats: &[format],
    });
    let target_view = target.create_view(&TextureViewDescriptor::default());
    (target, target_view)
}

/// Number of levels in a full mip chain for a square texture of `size`.
#[inline]
pub fn mip_level_count(size: u32) -> u32 {
    u32::BITS - size.leading_zeros()
}

/// Size of mip `level` of a texture whose base level is `size` wide.
#[inline]
pub fn mip_size(size: u32, level: u32) -> u32 {
    (size >> level).max(1)
}

#[inline]
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    unpadded.div_ceil(COPY_BYTES_PER_ROW_ALIGNMENT) * COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Copies one layer and mip of an RGBA8 texture back to the CPU, tightly packed.
pub async fn read_rgba8_texture_layer(
    device: &Device,
    queue: &Queue,
    texture: &Texture,
    layer: u32,
    mip_level: u32,
) -> Result<(UVec2, Vec<u8>), wgpu::BufferAsyncError> {
    let extent = texture.size();
    let dim = UVec2::new(
        mip_size(extent.width, mip_level),
        mip_size(extent.height, mip_level),
    );
    let padded_row = padded_bytes_per_row(dim.x);

    let out_staging_buffer = device.create_buffer(&BufferDescriptor {
        label: Some("texture_readback_buffer"),
        size: (padded_row * dim.y) as u64,
        usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut command_encoder =
        device.create_command_encoder(&CommandEncoderDescriptor { label: None });
    command_encoder.copy_texture_to_buffer(
        ImageCopyTexture {
            texture,
            mip_level,
            origin: Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: TextureAspect::All,
        },
        ImageCopyBuffer {
            buffer: &out_staging_buffer,
            layout: ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(dim.y),
            },
        },
        Extent3d {
            width: dim.x,
            height: dim.y,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(command_encoder.finish()));

    let buffer_slice = out_staging_buffer.slice(..);
    let (sender, receiver) = flume::bounded(1);

    buffer_slice.map_async(MapMode::Read, move |r| {
        let _ = sender.send(r);
    });
    device.poll(Maintain::wait()).panic_on_timeout();
    receiver
        .recv_async()
        .await
        .map_err(|_| wgpu::BufferAsyncError)??;

    let mut texture_data = Vec::with_capacity((dim.x * dim.y * 4) as usize);
    {
        let view = buffer_slice.get_mapped_range();
        for row in view.chunks_exact(padded_row as usize) {
            texture_data.extend_from_slice(&row[..(dim.x * 4) as usize]);
        }
    }

    out_staging_buffer.unmap();

    Ok((dim, texture_data))
}
