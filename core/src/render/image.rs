use std::path::Path;

use image::{ImageResult, RgbaImage};
use wgpu::{
    util::{DeviceExt, TextureDataOrder},
    Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
};

use crate::WgpuRenderer;

/// Decoded RGBA8 pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    raw: Vec<u8>,
}

impl Image {
    pub fn from_path(path: impl AsRef<Path>) -> ImageResult<Self> {
        let img = image::open(path)?.into_rgba8();

        Ok(Self {
            width: img.width(),
            height: img.height(),
            raw: img.into_raw(),
        })
    }

    /// Wraps already decoded RGBA8 data.
    ///
    /// Returns [`None`] if `data` is not exactly `width * height * 4` bytes.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }

        Some(Self {
            width,
            height,
            raw: data,
        })
    }

    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            raw: color.repeat((width * height) as usize),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.raw[i],
            self.raw[i + 1],
            self.raw[i + 2],
            self.raw[i + 3],
        ]
    }

    /// Whether every pixel equals `color`.
    pub fn is_solid(&self, color: [u8; 4]) -> bool {
        self.raw.chunks_exact(4).all(|p| p == color)
    }

    /// Uploads the pixels as a sampled 2D texture. `format` must be one of the
    /// RGBA8 formats.
    pub fn to_texture(&self, renderer: &WgpuRenderer, format: TextureFormat) -> Texture {
        renderer.device.create_texture_with_data(
            &renderer.queue,
            &TextureDescriptor {
                label: None,
                size: Extent3d {
                    width: self.width,
                    height: self.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: TextureDimension::D2,
                format,
                usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
                view_formats: &[format],
            },
            TextureDataOrder::LayerMajor,
            &self.raw,
        )
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        // Length is checked on construction.
        RgbaImage::from_raw(self.width, self.height, self.raw.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?
            .save(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_raw_checks_length() {
        assert!(Image::from_raw(vec![0; 16], 2, 2).is_some());
        assert!(Image::from_raw(vec![0; 15], 2, 2).is_none());
    }

    #[test]
    fn test_solid() {
        let img = Image::solid(3, 2, [255, 0, 0, 255]);
        assert_eq!(img.raw().len(), 24);
        assert!(img.is_solid([255, 0, 0, 255]));
        assert!(!img.is_solid([0, 0, 0, 255]));
        assert_eq!(img.pixel(2, 1), [255, 0, 0, 255]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("rime_image_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("face.png");

        let mut raw = Vec::new();
        for i in 0..16u8 {
            raw.extend_from_slice(&[i * 10, 255 - i, i, 255]);
        }
        let img = Image::from_raw(raw, 4, 4).unwrap();
        img.save(&path).unwrap();

        assert_eq!(Image::from_path(&path).unwrap(), img);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
