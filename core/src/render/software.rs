//! In-memory cube map backend.
//!
//! Stores every face and mip level as an [`Image`] on the CPU. Used to check
//! cube map contents and lifetimes without a GPU.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use glam::Vec3;

use crate::{
    render::{
        backend::{CubeMapBackend, SamplerConfig},
        cube_map::{CubeMapError, CubeMapResult},
        image::Image,
    },
    util::{self, cube::CubeFace},
};

#[derive(Debug, Default)]
struct Counters {
    textures_created: AtomicUsize,
    textures_released: AtomicUsize,
    samplers_created: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct SoftwareBackend {
    max_anisotropy: u16,
    counters: Arc<Counters>,
    failing_face: Mutex<Option<CubeFace>>,
}

impl SoftwareBackend {
    pub fn with_max_anisotropy(max_anisotropy: u16) -> Self {
        Self {
            max_anisotropy,
            ..Default::default()
        }
    }

    /// Makes uploads to `face` fail, as a lost device would.
    pub fn fail_uploads_from(&self, face: CubeFace) {
        *lock(&self.failing_face) = Some(face);
    }

    pub fn textures_created(&self) -> usize {
        self.counters.textures_created.load(Ordering::SeqCst)
    }

    pub fn textures_released(&self) -> usize {
        self.counters.textures_released.load(Ordering::SeqCst)
    }

    pub fn samplers_created(&self) -> usize {
        self.counters.samplers_created.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareSampler {
    pub config: SamplerConfig,
}

/// Faces indexed by layer, then mip level.
#[derive(Debug)]
pub struct SoftwareCubeTexture {
    face_size: u32,
    mip_level_count: u32,
    levels: Mutex<Vec<Vec<Image>>>,
    counters: Arc<Counters>,
}

impl SoftwareCubeTexture {
    #[inline]
    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn read_face(&self, face: CubeFace, mip_level: u32) -> Option<Image> {
        lock(&self.levels)
            .get(face.layer() as usize)?
            .get(mip_level as usize)
            .cloned()
    }

    /// Nearest texel of `mip_level` in `direction`.
    pub fn sample(&self, direction: Vec3, mip_level: u32) -> Option<[u8; 4]> {
        let (face, uv) = CubeFace::project(direction)?;
        let levels = lock(&self.levels);
        let image = levels.get(face.layer() as usize)?.get(mip_level as usize)?;

        let max = image.width() - 1;
        let x = ((uv.x * image.width() as f32) as u32).min(max);
        let y = ((uv.y * image.height() as f32) as u32).min(max);
        Some(image.pixel(x, y))
    }
}

impl Drop for SoftwareCubeTexture {
    fn drop(&mut self) {
        self.counters
            .textures_released
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl CubeMapBackend for SoftwareBackend {
    type Texture = SoftwareCubeTexture;
    type Sampler = SoftwareSampler;

    fn max_anisotropy(&self) -> u16 {
        self.max_anisotropy.max(1)
    }

    fn create_cube_texture(
        &self,
        face_size: u32,
        mip_level_count: u32,
    ) -> CubeMapResult<Self::Texture> {
        if mip_level_count == 0 || mip_level_count > util::mip_level_count(face_size) {
            return Err(CubeMapError::GraphicsContext(format!(
                "{mip_level_count} mip levels requested for a {face_size}px cube map"
            )));
        }

        let levels = CubeFace::ALL
            .iter()
            .map(|_| {
                (0..mip_level_count)
                    .map(|level| {
                        let size = util::mip_size(face_size, level);
                        Image::solid(size, size, [0; 4])
                    })
                    .collect()
            })
            .collect();

        self.counters
            .textures_created
            .fetch_add(1, Ordering::SeqCst);

        Ok(SoftwareCubeTexture {
            face_size,
            mip_level_count,
            levels: Mutex::new(levels),
            counters: Arc::clone(&self.counters),
        })
    }

    fn upload_face(
        &self,
        texture: &Self::Texture,
        face: CubeFace,
        image: &Image,
    ) -> CubeMapResult<()> {
        if let Some(failing) = *lock(&self.failing_face) {
            if face.layer() >= failing.layer() {
                return Err(CubeMapError::GraphicsContext(format!(
                    "upload of {face:?} face rejected"
                )));
            }
        }

        if image.width() != texture.face_size || image.height() != texture.face_size {
            return Err(CubeMapError::GraphicsContext(format!(
                "{}x{} image written to a {}px face",
                image.width(),
                image.height(),
                texture.face_size
            )));
        }

        lock(&texture.levels)[face.layer() as usize][0] = image.clone();
        Ok(())
    }

    fn generate_mipmaps(&self, texture: &Self::Texture) -> CubeMapResult<()> {
        let mut levels = lock(&texture.levels);
        for face_levels in levels.iter_mut() {
            for level in 1..face_levels.len() {
                face_levels[level] = downsample(&face_levels[level - 1]);
            }
        }
        Ok(())
    }

    fn create_sampler(&self, config: &SamplerConfig) -> CubeMapResult<Self::Sampler> {
        self.counters
            .samplers_created
            .fetch_add(1, Ordering::SeqCst);
        Ok(SoftwareSampler { config: *config })
    }
}

/// 2x2 box filter, clamping at the edges of odd-sized images.
fn downsample(src: &Image) -> Image {
    let width = (src.width() / 2).max(1);
    let height = (src.height() / 2).max(1);
    let mut raw = Vec::with_capacity((width * height * 4) as usize);

    for y in 0..height {
        for x in 0..width {
            let x0 = (x * 2).min(src.width() - 1);
            let x1 = (x * 2 + 1).min(src.width() - 1);
            let y0 = (y * 2).min(src.height() - 1);
            let y1 = (y * 2 + 1).min(src.height() - 1);

            let texels = [
                src.pixel(x0, y0),
                src.pixel(x1, y0),
                src.pixel(x0, y1),
                src.pixel(x1, y1),
            ];
            for channel in 0..4 {
                let sum: u32 = texels.iter().map(|t| t[channel] as u32).sum();
                raw.push(((sum + 2) / 4) as u8);
            }
        }
    }

    Image::from_raw(raw, width, height).unwrap_or_else(|| Image::solid(width, height, [0; 4]))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
