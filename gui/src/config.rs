use std::{ffi::OsString, path::PathBuf};

use glam::{UVec2, Vec2, Vec3};
use palette::Srgb;
use rime_chest::material::SurfaceMapPaths;

/// Overrides [`AppConfig::asset_root`].
pub const ASSET_ROOT_VAR: &str = "RIME_ASSET_ROOT";

pub struct SkyboxConfig {
    pub name: &'static str,
    /// Directory under the asset root holding the six face images.
    pub directory: &'static str,
    /// Shown instead when the images cannot be loaded.
    pub fallback_color: Srgb<u8>,
}

impl SkyboxConfig {
    const fn new(name: &'static str, directory: &'static str, r: u8, g: u8, b: u8) -> Self {
        Self {
            name,
            directory,
            fallback_color: Srgb::new(r, g, b),
        }
    }

    #[inline]
    pub fn fallback_rgba(&self) -> [u8; 4] {
        let (r, g, b) = self.fallback_color.into_components();
        [r, g, b, 255]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CameraConfig {
    pub tranl_sensi: f32,
    pub rot_sensi: Vec2,
    pub move_smoothness: f32,
    pub rot_smoothness: f32,
    pub boost: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            tranl_sensi: 2.,
            rot_sensi: Vec2::splat(10.),
            move_smoothness: 20.,
            rot_smoothness: 20.,
            boost: 5.,
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 100.,
        }
    }
}

pub struct AppConfig {
    pub title: String,
    pub window_size: UVec2,
    /// Requested multisampling, lowered to what the adapter supports.
    pub sample_count: u32,
    pub asset_root: PathBuf,
    pub capture_root: PathBuf,
    pub skyboxes: Vec<SkyboxConfig>,
    pub model_position: Vec3,
    pub model_radius: f32,
    /// Relative to the asset root.
    pub model_maps: SurfaceMapPaths,
    pub specular_exponent: f32,
    pub reflectivity: f32,
    pub camera: CameraConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Change Sky with Arrow Keys".into(),
            window_size: UVec2::new(800, 600),
            sample_count: 16,
            asset_root: "assets".into(),
            capture_root: "captures".into(),
            skyboxes: vec![
                SkyboxConfig::new("Red", "RedSky", 160, 24, 24),
                SkyboxConfig::new("Green", "GreenSky", 24, 140, 48),
                SkyboxConfig::new("Blue", "BlueSky", 32, 64, 180),
                SkyboxConfig::new("Black", "BlackSky", 8, 8, 8),
                SkyboxConfig::new("Grass", "GrassSky", 96, 150, 72),
                SkyboxConfig::new("Galaxy", "GalaxySky", 28, 16, 56),
            ],
            model_position: Vec3::new(0., 0., -2.),
            model_radius: 0.5,
            model_maps: SurfaceMapPaths {
                diffuse: Some("Color.png".into()),
                normal: Some("Normal.png".into()),
                specular: Some("Specular.png".into()),
            },
            specular_exponent: 64.,
            reflectivity: 0.85,
            camera: CameraConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::default().with_asset_root(std::env::var_os(ASSET_ROOT_VAR))
    }

    fn with_asset_root(mut self, asset_root: Option<OsString>) -> Self {
        if let Some(root) = asset_root.filter(|root| !root.is_empty()) {
            self.asset_root = root.into();
        }
        self
    }

    #[inline]
    pub fn sky_directory(&self, sky: &SkyboxConfig) -> PathBuf {
        self.asset_root.join(sky.directory)
    }

    pub fn model_map_paths(&self) -> SurfaceMapPaths {
        let under_root = |path: &Option<PathBuf>| path.as_ref().map(|p| self.asset_root.join(p));
        SurfaceMapPaths {
            diffuse: under_root(&self.model_maps.diffuse),
            normal: under_root(&self.model_maps.normal),
            specular: under_root(&self.model_maps.specular),
        }
    }

    #[inline]
    pub fn capture_directory(&self, sky_name: &str) -> PathBuf {
        self.capture_root.join(sky_name)
    }
}
