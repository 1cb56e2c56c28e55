use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use thiserror::Error;
use uuid::Uuid;

use crate::{
    render::{
        backend::{CubeMapBackend, SamplerConfig},
        image::Image,
    },
    util::{
        self,
        cube::{CubeFace, CubeFaces},
    },
};

#[derive(Error, Debug)]
pub enum CubeMapError {
    #[error("Failed to load {face:?} face from {}: {source}", .path.display())]
    ResourceLoad {
        face: CubeFace,
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{0} face images given, expected 6.")]
    InvalidFaceCount(usize),
    #[error("{face:?} face is empty.")]
    EmptyFace { face: CubeFace },
    #[error("{face:?} face is {width}x{height}, cube map faces must be square.")]
    NonSquareFace {
        face: CubeFace,
        width: u32,
        height: u32,
    },
    #[error("{face:?} face is {width}x{height}, expected {expected}x{expected}.")]
    FaceSizeMismatch {
        face: CubeFace,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("Graphics context error: {0}")]
    GraphicsContext(String),
}

pub type CubeMapResult<T> = Result<T, CubeMapError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CubeMapId(pub Uuid);

struct CubeMapInner<B: CubeMapBackend> {
    id: CubeMapId,
    face_size: u32,
    mip_level_count: u32,
    texture: B::Texture,
    sampler: Arc<B::Sampler>,
}

impl<B: CubeMapBackend> Drop for CubeMapInner<B> {
    fn drop(&mut self) {
        log::debug!("Releasing cube map {:?}.", self.id.0);
    }
}

/// Shared handle to one cube texture.
///
/// Every handle is one owner. A freshly loaded cube map has exactly one owner,
/// its creator. [`CubeMap::share`] adds an owner, [`CubeMap::release`] (or
/// dropping the handle) removes one, and the texture is released when the last
/// owner goes away.
pub struct CubeMap<B: CubeMapBackend> {
    inner: Arc<CubeMapInner<B>>,
}

impl<B: CubeMapBackend> CubeMap<B> {
    pub fn share(&self) -> Self {
        log::debug!(
            "Sharing cube map {:?} ({} owners).",
            self.inner.id.0,
            self.ref_count() + 1
        );
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Gives up this owner. Returns `true` if it was the last one and the
    /// texture has been released.
    pub fn release(self) -> bool {
        Arc::into_inner(self.inner).is_some()
    }

    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    #[inline]
    pub fn id(&self) -> CubeMapId {
        self.inner.id
    }

    #[inline]
    pub fn texture(&self) -> &B::Texture {
        &self.inner.texture
    }

    #[inline]
    pub fn sampler(&self) -> &B::Sampler {
        &self.inner.sampler
    }

    #[inline]
    pub fn face_size(&self) -> u32 {
        self.inner.face_size
    }

    #[inline]
    pub fn mip_level_count(&self) -> u32 {
        self.inner.mip_level_count
    }

    #[inline]
    pub fn shares_sampler_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner.sampler, &other.inner.sampler)
    }
}

impl<B: CubeMapBackend> Clone for CubeMap<B> {
    fn clone(&self) -> Self {
        self.share()
    }
}

impl<B: CubeMapBackend> fmt::Debug for CubeMap<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeMap")
            .field("id", &self.inner.id)
            .field("face_size", &self.inner.face_size)
            .field("mip_level_count", &self.inner.mip_level_count)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Creates cube maps and owns the sampler they share.
///
/// The sampler is created with the first cube map and lives until the loader
/// and every cube map it made are gone.
pub struct CubeMapLoader<B: CubeMapBackend> {
    sampler: OnceLock<Arc<B::Sampler>>,
}

impl<B: CubeMapBackend> Default for CubeMapLoader<B> {
    fn default() -> Self {
        Self {
            sampler: OnceLock::new(),
        }
    }
}

impl<B: CubeMapBackend> CubeMapLoader<B> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn sampler(&self) -> Option<&B::Sampler> {
        self.sampler.get().map(|s| s.as_ref())
    }

    /// Loads six images given in face order (+X, -X, +Y, -Y, +Z, -Z).
    pub fn load_paths<P: AsRef<Path>>(&self, backend: &B, paths: &[P]) -> CubeMapResult<CubeMap<B>> {
        let faces = CubeFaces::try_from(
            paths
                .iter()
                .map(|p| p.as_ref().to_path_buf())
                .collect::<Vec<_>>(),
        )?;
        self.load_files(backend, faces)
    }

    pub fn load_files<P: AsRef<Path>>(
        &self,
        backend: &B,
        paths: CubeFaces<P>,
    ) -> CubeMapResult<CubeMap<B>> {
        let images = paths.try_map(|face, path| {
            let path = path.as_ref();
            Image::from_path(path).map_err(|source| CubeMapError::ResourceLoad {
                face,
                path: path.to_path_buf(),
                source,
            })
        })?;
        self.load_images(backend, images)
    }

    pub fn load_images(&self, backend: &B, faces: CubeFaces<Image>) -> CubeMapResult<CubeMap<B>> {
        let face_size = validate_faces(&faces)?;
        let mip_level_count = util::mip_level_count(face_size);

        let texture = backend.create_cube_texture(face_size, mip_level_count)?;
        for (face, image) in faces.iter() {
            backend.upload_face(&texture, face, image)?;
        }
        backend.generate_mipmaps(&texture)?;

        let sampler = self.shared_sampler(backend)?;
        let id = CubeMapId(Uuid::new_v4());
        log::info!(
            "Loaded cube map {:?}: {}x{} faces, {} mip levels.",
            id.0,
            face_size,
            face_size,
            mip_level_count
        );

        Ok(CubeMap {
            inner: Arc::new(CubeMapInner {
                id,
                face_size,
                mip_level_count,
                texture,
                sampler,
            }),
        })
    }

    fn shared_sampler(&self, backend: &B) -> CubeMapResult<Arc<B::Sampler>> {
        if let Some(sampler) = self.sampler.get() {
            return Ok(Arc::clone(sampler));
        }

        let config = SamplerConfig::cube_map(backend.max_anisotropy());
        let sampler = Arc::new(backend.create_sampler(&config)?);
        log::debug!("Created shared cube map sampler {:?}.", config);

        Ok(Arc::clone(self.sampler.get_or_init(|| sampler)))
    }
}

fn validate_faces(faces: &CubeFaces<Image>) -> CubeMapResult<u32> {
    let expected = faces.positive_x.width();

    for (face, image) in faces.iter() {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(CubeMapError::EmptyFace { face });
        }
        if width != height {
            return Err(CubeMapError::NonSquareFace {
                face,
                width,
                height,
            });
        }
        if width != expected {
            return Err(CubeMapError::FaceSizeMismatch {
                face,
                width,
                height,
                expected,
            });
        }
    }

    Ok(expected)
}

/// A material's reference to the cube map it samples.
pub struct CubeMapBinding<B: CubeMapBackend> {
    bound: Option<CubeMap<B>>,
}

impl<B: CubeMapBackend> Default for CubeMapBinding<B> {
    fn default() -> Self {
        Self { bound: None }
    }
}

impl<B: CubeMapBackend> CubeMapBinding<B> {
    /// Binds `cube_map`, taking a share of it and releasing the previous one.
    /// Returns `false` if it was already bound.
    pub fn assign(&mut self, cube_map: &CubeMap<B>) -> bool {
        if self
            .bound
            .as_ref()
            .is_some_and(|bound| bound.id() == cube_map.id())
        {
            return false;
        }

        if let Some(previous) = self.bound.replace(cube_map.share()) {
            previous.release();
        }
        true
    }

    pub fn clear(&mut self) -> bool {
        self.bound.take().map(CubeMap::release).is_some()
    }

    #[inline]
    pub fn get(&self) -> Option<&CubeMap<B>> {
        self.bound.as_ref()
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use glam::Vec3;

    use super::*;
    use crate::render::software::SoftwareBackend;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn solid_faces(size: u32, color: [u8; 4]) -> CubeFaces<Image> {
        CubeFaces::from_fn(|_| Image::solid(size, size, color))
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rime_cube_map_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn gradient_face(size: u32, seed: u8) -> Image {
        let mut raw = Vec::new();
        for y in 0..size {
            for x in 0..size {
                raw.extend_from_slice(&[seed, (x * 16) as u8, (y * 16) as u8, 255]);
            }
        }
        Image::from_raw(raw, size, size).unwrap()
    }

    #[test]
    fn test_load_starts_with_one_owner() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let cube_map = loader.load_images(&backend, solid_faces(8, RED)).unwrap();

        assert_eq!(cube_map.ref_count(), 1);
        assert_eq!(cube_map.face_size(), 8);
        assert_eq!(cube_map.mip_level_count(), 4);
        assert_eq!(backend.textures_created(), 1);
        assert_eq!(backend.textures_released(), 0);
    }

    #[test]
    fn test_id_is_stable() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let cube_map = loader.load_images(&backend, solid_faces(4, RED)).unwrap();
        let shared = cube_map.share();

        assert_eq!(cube_map.id(), cube_map.id());
        assert_eq!(cube_map.id(), shared.id());
    }

    #[test]
    fn test_share_then_release_frees_once() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let cube_map = loader.load_images(&backend, solid_faces(4, RED)).unwrap();

        let owners = (0..5).map(|_| cube_map.share()).collect::<Vec<_>>();
        assert_eq!(cube_map.ref_count(), 6);

        for owner in owners {
            assert!(!owner.release());
            assert_eq!(backend.textures_released(), 0);
        }

        assert_eq!(cube_map.ref_count(), 1);
        assert!(cube_map.release());
        assert_eq!(backend.textures_released(), 1);
    }

    #[test]
    fn test_interleaved_share_release() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let first = loader.load_images(&backend, solid_faces(4, RED)).unwrap();

        let a = first.share();
        let b = a.share();
        assert!(!first.release());
        let c = b.share();
        assert!(!a.release());
        assert!(!b.release());
        assert_eq!(c.ref_count(), 1);
        assert_eq!(backend.textures_released(), 0);
        assert!(c.release());
        assert_eq!(backend.textures_released(), 1);
    }

    #[test]
    fn test_drop_is_release() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let cube_map = loader.load_images(&backend, solid_faces(4, RED)).unwrap();
        let shared = cube_map.clone();

        drop(cube_map);
        assert_eq!(shared.ref_count(), 1);
        assert_eq!(backend.textures_released(), 0);
        drop(shared);
        assert_eq!(backend.textures_released(), 1);
    }

    #[test]
    fn test_release_across_threads() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let cube_map = loader.load_images(&backend, solid_faces(4, RED)).unwrap();

        let handles = (0..8)
            .map(|_| {
                let owner = cube_map.share();
                thread::spawn(move || {
                    let extra = owner.share();
                    extra.release() as u32 + owner.release() as u32
                })
            })
            .collect::<Vec<_>>();
        let released_by_threads: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(released_by_threads, 0);
        assert_eq!(backend.textures_released(), 0);
        assert!(cube_map.release());
        assert_eq!(backend.textures_released(), 1);
    }

    #[test]
    fn test_sampler_created_once_and_shared() {
        let backend = SoftwareBackend::with_max_anisotropy(16);
        let loader = CubeMapLoader::new();
        assert!(loader.sampler().is_none());

        let a = loader.load_images(&backend, solid_faces(4, RED)).unwrap();
        let b = loader.load_images(&backend, solid_faces(2, RED)).unwrap();

        assert_eq!(backend.samplers_created(), 1);
        assert!(a.shares_sampler_with(&b));

        let config = loader.sampler().unwrap().config;
        assert_eq!(config, SamplerConfig::cube_map(16));
        assert_eq!(config.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(config.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(config.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(config.address_mode, wgpu::AddressMode::ClampToEdge);
        assert_eq!(config.anisotropy_clamp, 16);
    }

    #[test]
    fn test_separate_loaders_have_separate_samplers() {
        let backend = SoftwareBackend::default();
        let a = CubeMapLoader::new()
            .load_images(&backend, solid_faces(4, RED))
            .unwrap();
        let b = CubeMapLoader::new()
            .load_images(&backend, solid_faces(4, RED))
            .unwrap();

        assert_eq!(backend.samplers_created(), 2);
        assert!(!a.shares_sampler_with(&b));
    }

    #[test]
    fn test_wrong_face_count_is_rejected() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();

        for count in [0, 5, 7] {
            let paths = vec![PathBuf::from("missing.png"); count];
            let err = loader.load_paths(&backend, &paths).unwrap_err();
            assert!(matches!(err, CubeMapError::InvalidFaceCount(n) if n == count));
        }
        assert_eq!(backend.textures_created(), 0);
        assert_eq!(backend.samplers_created(), 0);
    }

    #[test]
    fn test_missing_file_names_face() {
        let dir = temp_dir();
        let faces = CubeFaces::from_fn(|face| dir.join(format!("{}.png", face.layer())));
        for (face, path) in faces.iter() {
            if face != CubeFace::PositiveY {
                Image::solid(4, 4, RED).save(path).unwrap();
            }
        }

        let backend = SoftwareBackend::default();
        let err = CubeMapLoader::new()
            .load_files(&backend, faces.clone())
            .unwrap_err();

        match err {
            CubeMapError::ResourceLoad { face, path, .. } => {
                assert_eq!(face, CubeFace::PositiveY);
                assert_eq!(&path, faces.get(CubeFace::PositiveY));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(backend.textures_created(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_undecodable_file() {
        let dir = temp_dir();
        let paths = (0..6)
            .map(|i| {
                let path = dir.join(format!("{i}.png"));
                std::fs::write(&path, b"definitely not a png").unwrap();
                path
            })
            .collect::<Vec<_>>();

        let backend = SoftwareBackend::default();
        let err = CubeMapLoader::new()
            .load_paths(&backend, &paths)
            .unwrap_err();

        assert!(matches!(
            err,
            CubeMapError::ResourceLoad {
                face: CubeFace::PositiveX,
                ..
            }
        ));
        assert_eq!(backend.textures_created(), 0);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_face_size_mismatch() {
        let backend = SoftwareBackend::default();
        let mut faces = solid_faces(8, RED);
        faces.negative_z = Image::solid(4, 4, RED);

        let err = CubeMapLoader::new()
            .load_images(&backend, faces)
            .unwrap_err();
        assert!(matches!(
            err,
            CubeMapError::FaceSizeMismatch {
                face: CubeFace::NegativeZ,
                width: 4,
                height: 4,
                expected: 8,
            }
        ));
        assert_eq!(backend.textures_created(), 0);
    }

    #[test]
    fn test_non_square_and_empty_faces() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();

        let mut faces = solid_faces(8, RED);
        faces.positive_y = Image::solid(8, 4, RED);
        assert!(matches!(
            loader.load_images(&backend, faces).unwrap_err(),
            CubeMapError::NonSquareFace {
                face: CubeFace::PositiveY,
                ..
            }
        ));

        let faces = solid_faces(0, RED);
        assert!(matches!(
            loader.load_images(&backend, faces).unwrap_err(),
            CubeMapError::EmptyFace {
                face: CubeFace::PositiveX
            }
        ));
        assert_eq!(backend.textures_created(), 0);
    }

    #[test]
    fn test_backend_failure_leaves_nothing() {
        let backend = SoftwareBackend::default();
        backend.fail_uploads_from(CubeFace::NegativeY);

        let err = CubeMapLoader::new()
            .load_images(&backend, solid_faces(4, RED))
            .unwrap_err();

        assert!(matches!(err, CubeMapError::GraphicsContext(_)));
        assert_eq!(backend.textures_created(), 1);
        assert_eq!(backend.textures_released(), 1);
        assert_eq!(backend.samplers_created(), 0);
    }

    #[test]
    fn test_round_trip_from_files() {
        let dir = temp_dir();
        let images = CubeFaces::from_fn(|face| gradient_face(16, face.layer() as u8 * 40));
        let paths = images.clone().map(|face, image| {
            let path = dir.join(format!("face_{}.png", face.layer()));
            image.save(&path).unwrap();
            path
        });

        let backend = SoftwareBackend::default();
        let cube_map = CubeMapLoader::new().load_files(&backend, paths).unwrap();

        for (face, image) in images.iter() {
            let read_back = cube_map.texture().read_face(face, 0).unwrap();
            assert_eq!(&read_back, image);
        }
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_solid_faces_stay_solid_down_the_mip_chain() {
        let backend = SoftwareBackend::default();
        let cube_map = CubeMapLoader::new()
            .load_images(&backend, solid_faces(32, RED))
            .unwrap();
        let texture = cube_map.texture();

        for mip in 0..cube_map.mip_level_count() {
            for face in CubeFace::ALL {
                let image = texture.read_face(face, mip).unwrap();
                assert_eq!(image.width(), 32 >> mip);
                assert!(image.is_solid(RED), "{face:?} mip {mip} not solid");
            }

            for dir in [
                Vec3::X,
                Vec3::NEG_Y,
                Vec3::new(0.3, -0.2, 0.9),
                Vec3::new(-1., 1., -1.),
            ] {
                assert_eq!(texture.sample(dir, mip), Some(RED));
            }
        }
    }

    #[test]
    fn test_binding_shares_and_releases() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let red = loader.load_images(&backend, solid_faces(4, RED)).unwrap();
        let blue = loader
            .load_images(&backend, solid_faces(4, [0, 0, 255, 255]))
            .unwrap();

        let mut sky_material = CubeMapBinding::default();
        let mut model_material = CubeMapBinding::default();

        assert!(sky_material.assign(&red));
        assert!(model_material.assign(&red));
        assert_eq!(red.ref_count(), 3);

        // Re-assigning every frame must not grow the count.
        assert!(!sky_material.assign(&red));
        assert!(!model_material.assign(&red));
        assert_eq!(red.ref_count(), 3);

        assert!(sky_material.assign(&blue));
        assert!(model_material.assign(&blue));
        assert_eq!(red.ref_count(), 1);
        assert_eq!(blue.ref_count(), 3);
        assert_eq!(sky_material.get().map(CubeMap::id), Some(blue.id()));

        // The materials keep blue alive after its creator lets go.
        assert!(!blue.release());
        assert_eq!(backend.textures_released(), 0);
        assert!(sky_material.clear());
        drop(model_material);
        assert_eq!(backend.textures_released(), 1);
        assert!(!sky_material.clear());
    }
}
