use wgpu::{AddressMode, FilterMode};

use crate::{
    render::{cube_map::CubeMapError, image::Image},
    util::cube::CubeFace,
};

/// Sampling parameters shared by every cube map of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode: AddressMode,
    pub anisotropy_clamp: u16,
}

impl SamplerConfig {
    /// Trilinear filtering, clamped on all three axes.
    pub fn cube_map(max_anisotropy: u16) -> Self {
        Self {
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode: AddressMode::ClampToEdge,
            anisotropy_clamp: max_anisotropy.max(1),
        }
    }
}

/// What a graphics backend has to provide to host cube maps.
///
/// Textures are released by dropping them.
pub trait CubeMapBackend {
    type Texture;
    type Sampler;

    /// Highest anisotropy level the backend can sample with, 1 if unsupported.
    fn max_anisotropy(&self) -> u16;

    fn create_cube_texture(
        &self,
        face_size: u32,
        mip_level_count: u32,
    ) -> Result<Self::Texture, CubeMapError>;

    /// Writes `image` into mip 0 of `face`.
    fn upload_face(
        &self,
        texture: &Self::Texture,
        face: CubeFace,
        image: &Image,
    ) -> Result<(), CubeMapError>;

    /// Fills mip levels 1.. of every face from level 0.
    fn generate_mipmaps(&self, texture: &Self::Texture) -> Result<(), CubeMapError>;

    fn create_sampler(&self, config: &SamplerConfig) -> Result<Self::Sampler, CubeMapError>;
}
