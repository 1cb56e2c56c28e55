use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use palette::{LinSrgb, Srgb};
use rime_core::{
    render::{
        backend::CubeMapBackend,
        cube_map::{CubeMap, CubeMapBinding},
        image::Image,
        resource::ShaderData,
    },
    WgpuRenderer,
};
use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, Buffer,
    BufferBindingType, Device, FilterMode, Sampler, SamplerBindingType, SamplerDescriptor,
    ShaderStages, TextureFormat, TextureSampleType, TextureView, TextureViewDescriptor,
    TextureViewDimension,
};

const CUBE_MAP_ENTRIES: [BindGroupLayoutEntry; 2] = [
    // Cube Map
    BindGroupLayoutEntry {
        binding: 0,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::Cube,
            multisampled: false,
        },
        count: None,
    },
    // Sampler
    BindGroupLayoutEntry {
        binding: 1,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(SamplerBindingType::Filtering),
        count: None,
    },
];

fn cube_map_bind_entries(cube_map: &CubeMap<WgpuRenderer>) -> [BindGroupEntry<'_>; 2] {
    [
        BindGroupEntry {
            binding: 0,
            resource: BindingResource::TextureView(cube_map.texture().view()),
        },
        BindGroupEntry {
            binding: 1,
            resource: BindingResource::Sampler(cube_map.sampler()),
        },
    ]
}

/// Draws the active cube map behind everything.
pub struct SkyboxMaterial<B: CubeMapBackend> {
    environment: CubeMapBinding<B>,
}

impl<B: CubeMapBackend> Default for SkyboxMaterial<B> {
    fn default() -> Self {
        Self {
            environment: CubeMapBinding::default(),
        }
    }
}

impl<B: CubeMapBackend> SkyboxMaterial<B> {
    /// Returns `true` if the material now samples a different cube map.
    #[inline]
    pub fn set_environment(&mut self, cube_map: &CubeMap<B>) -> bool {
        self.environment.assign(cube_map)
    }

    #[inline]
    pub fn environment(&self) -> Option<&CubeMap<B>> {
        self.environment.get()
    }
}

impl SkyboxMaterial<WgpuRenderer> {
    pub fn create_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("skybox_material_layout"),
            entries: &CUBE_MAP_ENTRIES,
        })
    }

    pub fn create_bind_group(
        &self,
        device: &Device,
        layout: &BindGroupLayout,
    ) -> Option<BindGroup> {
        let cube_map = self.environment()?;
        Some(device.create_bind_group(&BindGroupDescriptor {
            label: Some("skybox_material_bind_group"),
            layout,
            entries: &cube_map_bind_entries(cube_map),
        }))
    }
}

/// The textures that shape a surface under the reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMap {
    /// Base colour, multiplied with the tint.
    Diffuse,
    /// Tangent space normals, +y up the texture.
    Normal,
    /// Highlight strength in the red channel.
    Specular,
}

impl SurfaceMap {
    pub const ALL: [SurfaceMap; 3] = [SurfaceMap::Diffuse, SurfaceMap::Normal, SurfaceMap::Specular];

    /// The texel that leaves the surface unchanged when the map is missing.
    pub fn neutral_texel(self) -> [u8; 4] {
        match self {
            SurfaceMap::Diffuse | SurfaceMap::Specular => [255; 4],
            SurfaceMap::Normal => [128, 128, 255, 255],
        }
    }

    /// Only the diffuse map holds colours, the others are raw data.
    pub fn format(self) -> TextureFormat {
        match self {
            SurfaceMap::Diffuse => TextureFormat::Rgba8UnormSrgb,
            SurfaceMap::Normal | SurfaceMap::Specular => TextureFormat::Rgba8Unorm,
        }
    }

    #[inline]
    pub fn binding(self) -> u32 {
        match self {
            SurfaceMap::Diffuse => 3,
            SurfaceMap::Normal => 4,
            SurfaceMap::Specular => 5,
        }
    }
}

/// Where to load each surface map from. `None` keeps the neutral texel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceMapPaths {
    pub diffuse: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub specular: Option<PathBuf>,
}

impl SurfaceMapPaths {
    #[inline]
    pub fn get(&self, map: SurfaceMap) -> Option<&Path> {
        match map {
            SurfaceMap::Diffuse => self.diffuse.as_deref(),
            SurfaceMap::Normal => self.normal.as_deref(),
            SurfaceMap::Specular => self.specular.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceMaps {
    pub diffuse: Image,
    pub normal: Image,
    pub specular: Image,
}

impl Default for SurfaceMaps {
    fn default() -> Self {
        Self {
            diffuse: neutral(SurfaceMap::Diffuse),
            normal: neutral(SurfaceMap::Normal),
            specular: neutral(SurfaceMap::Specular),
        }
    }
}

#[inline]
fn neutral(map: SurfaceMap) -> Image {
    Image::solid(1, 1, map.neutral_texel())
}

impl SurfaceMaps {
    /// Loads every map with a path. A map that cannot be read is replaced by
    /// its neutral texel and the error is logged.
    pub fn load(paths: &SurfaceMapPaths) -> Self {
        let load = |map: SurfaceMap| match paths.get(map) {
            None => neutral(map),
            Some(path) => Image::from_path(path).unwrap_or_else(|err| {
                log::warn!(
                    "{map:?} map {} unavailable, using a neutral texel instead: {err}",
                    path.display()
                );
                neutral(map)
            }),
        };

        Self {
            diffuse: load(SurfaceMap::Diffuse),
            normal: load(SurfaceMap::Normal),
            specular: load(SurfaceMap::Specular),
        }
    }

    #[inline]
    pub fn get(&self, map: SurfaceMap) -> &Image {
        match map {
            SurfaceMap::Diffuse => &self.diffuse,
            SurfaceMap::Normal => &self.normal,
            SurfaceMap::Specular => &self.specular,
        }
    }

    pub fn upload(&self, renderer: &WgpuRenderer) -> GpuSurfaceMaps {
        let view = |map: SurfaceMap| {
            self.get(map)
                .to_texture(renderer, map.format())
                .create_view(&TextureViewDescriptor::default())
        };

        GpuSurfaceMaps {
            diffuse: view(SurfaceMap::Diffuse),
            normal: view(SurfaceMap::Normal),
            specular: view(SurfaceMap::Specular),
            sampler: renderer.device.create_sampler(&SamplerDescriptor {
                label: Some("surface_map_sampler"),
                address_mode_u: AddressMode::Repeat,
                address_mode_v: AddressMode::Repeat,
                address_mode_w: AddressMode::Repeat,
                mag_filter: FilterMode::Linear,
                min_filter: FilterMode::Linear,
                mipmap_filter: FilterMode::Linear,
                ..Default::default()
            }),
        }
    }
}

pub struct GpuSurfaceMaps {
    pub diffuse: TextureView,
    pub normal: TextureView,
    pub specular: TextureView,
    pub sampler: Sampler,
}

impl GpuSurfaceMaps {
    #[inline]
    pub fn view(&self, map: SurfaceMap) -> &TextureView {
        match map {
            SurfaceMap::Diffuse => &self.diffuse,
            SurfaceMap::Normal => &self.normal,
            SurfaceMap::Specular => &self.specular,
        }
    }
}

const SURFACE_MAP_SAMPLER_BINDING: u32 = 6;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ReflectiveMaterialUniform {
    pub world: Mat4,
    pub tint: Vec4,
    pub specular_exponent: f32,
    pub reflectivity: f32,
    _padding: [f32; 2],
}

impl ShaderData for ReflectiveMaterialUniform {}

/// Mirror-like textured surface lit by a single directional light.
pub struct ReflectiveMaterial<B: CubeMapBackend> {
    pub tint: Srgb,
    pub maps: SurfaceMaps,
    pub specular_exponent: f32,
    /// 0 shows only the lit diffuse colour, 1 only the reflection.
    pub reflectivity: f32,
    environment: CubeMapBinding<B>,
}

impl<B: CubeMapBackend> Default for ReflectiveMaterial<B> {
    fn default() -> Self {
        Self {
            tint: Srgb::new(0.8, 0.8, 0.85),
            maps: SurfaceMaps::default(),
            specular_exponent: 64.,
            reflectivity: 0.85,
            environment: CubeMapBinding::default(),
        }
    }
}

impl<B: CubeMapBackend> ReflectiveMaterial<B> {
    #[inline]
    pub fn set_environment(&mut self, cube_map: &CubeMap<B>) -> bool {
        self.environment.assign(cube_map)
    }

    #[inline]
    pub fn environment(&self) -> Option<&CubeMap<B>> {
        self.environment.get()
    }

    pub fn uniform(&self, world: Mat4) -> ReflectiveMaterialUniform {
        let tint: LinSrgb = self.tint.into_linear();
        ReflectiveMaterialUniform {
            world,
            tint: Vec4::new(tint.red, tint.green, tint.blue, 1.),
            specular_exponent: self.specular_exponent,
            reflectivity: self.reflectivity.clamp(0., 1.),
            _padding: Default::default(),
        }
    }
}

fn surface_map_entry(map: SurfaceMap) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: map.binding(),
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            sample_type: TextureSampleType::Float { filterable: true },
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

impl ReflectiveMaterial<WgpuRenderer> {
    pub fn layout_entries() -> [BindGroupLayoutEntry; 7] {
        let [cube_map, sampler] = CUBE_MAP_ENTRIES;
        [
            cube_map,
            sampler,
            // Material Uniform
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: ReflectiveMaterialUniform::min_binding_size(),
                },
                count: None,
            },
            surface_map_entry(SurfaceMap::Diffuse),
            surface_map_entry(SurfaceMap::Normal),
            surface_map_entry(SurfaceMap::Specular),
            // Surface Map Sampler
            BindGroupLayoutEntry {
                binding: SURFACE_MAP_SAMPLER_BINDING,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ]
    }

    pub fn create_layout(device: &Device) -> BindGroupLayout {
        device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("reflective_material_layout"),
            entries: &Self::layout_entries(),
        })
    }

    pub fn create_bind_group(
        &self,
        device: &Device,
        layout: &BindGroupLayout,
        uniform: &Buffer,
        maps: &GpuSurfaceMaps,
    ) -> Option<BindGroup> {
        let cube_map = self.environment()?;
        let [texture, sampler] = cube_map_bind_entries(cube_map);
        let [diffuse, normal, specular] = SurfaceMap::ALL.map(|map| BindGroupEntry {
            binding: map.binding(),
            resource: BindingResource::TextureView(maps.view(map)),
        });

        Some(device.create_bind_group(&BindGroupDescriptor {
            label: Some("reflective_material_bind_group"),
            layout,
            entries: &[
                texture,
                sampler,
                BindGroupEntry {
                    binding: 2,
                    resource: uniform.as_entire_binding(),
                },
                diffuse,
                normal,
                specular,
                BindGroupEntry {
                    binding: SURFACE_MAP_SAMPLER_BINDING,
                    resource: BindingResource::Sampler(&maps.sampler),
                },
            ],
        }))
    }
}

#[cfg(test)]
mod test {
    use glam::Vec3;
    use rime_core::{
        render::{cube_map::CubeMapLoader, software::SoftwareBackend},
        util::cube::CubeFaces,
    };
    use uuid::Uuid;
    use wgpu::ShaderSource;

    use super::*;
    use crate::util;

    fn solid(
        loader: &CubeMapLoader<SoftwareBackend>,
        backend: &SoftwareBackend,
        color: [u8; 4],
    ) -> CubeMap<SoftwareBackend> {
        loader
            .load_images(backend, CubeFaces::from_fn(|_| Image::solid(4, 4, color)))
            .unwrap()
    }

    #[test]
    fn test_materials_share_one_cube_map() {
        let backend = SoftwareBackend::default();
        let loader = CubeMapLoader::new();
        let red = solid(&loader, &backend, [255, 0, 0, 255]);
        let green = solid(&loader, &backend, [0, 255, 0, 255]);

        let mut sky = SkyboxMaterial::default();
        let mut model = ReflectiveMaterial::default();
        assert!(sky.environment().is_none());

        assert!(sky.set_environment(&red));
        assert!(model.set_environment(&red));
        assert_eq!(red.ref_count(), 3);
        assert!(!sky.set_environment(&red));

        assert!(sky.set_environment(&green));
        assert!(model.set_environment(&green));
        assert_eq!(red.ref_count(), 1);
        assert_eq!(green.ref_count(), 3);

        drop(green);
        assert_eq!(backend.textures_released(), 0);
        assert_eq!(model.environment().map(CubeMap::face_size), Some(4));
        drop(sky);
        drop(model);
        assert_eq!(backend.textures_released(), 1);
    }

    #[test]
    fn test_reflective_uniform() {
        let material = ReflectiveMaterial::<SoftwareBackend> {
            tint: Srgb::new(1., 1., 1.),
            reflectivity: 2.,
            ..Default::default()
        };
        let world = Mat4::from_translation(Vec3::new(0., 0., -2.));
        let uniform = material.uniform(world);

        assert_eq!(uniform.world, world);
        assert_eq!(uniform.specular_exponent, 64.);
        assert_eq!(uniform.reflectivity, 1.);
        assert!(uniform.tint.abs_diff_eq(Vec4::ONE, 1e-5));
        assert_eq!(uniform.as_bytes().len(), 96);
    }

    #[test]
    fn test_surface_maps_default_to_neutral() {
        let maps = SurfaceMaps::default();
        for map in SurfaceMap::ALL {
            let image = maps.get(map);
            assert_eq!((image.width(), image.height()), (1, 1));
            assert!(image.is_solid(map.neutral_texel()));
        }
        assert_eq!(maps.normal.pixel(0, 0), [128, 128, 255, 255]);
        assert_eq!(SurfaceMaps::load(&SurfaceMapPaths::default()), maps);
    }

    #[test]
    fn test_surface_maps_load_with_fallback() {
        let dir = std::env::temp_dir().join(format!("rime_surface_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let diffuse = Image::solid(4, 2, [10, 20, 30, 255]);
        diffuse.save(dir.join("Color.png")).unwrap();
        std::fs::write(dir.join("Specular.png"), b"not an image").unwrap();

        let maps = SurfaceMaps::load(&SurfaceMapPaths {
            diffuse: Some(dir.join("Color.png")),
            normal: Some(dir.join("Missing.png")),
            specular: Some(dir.join("Specular.png")),
        });

        assert_eq!(maps.diffuse, diffuse);
        assert!(maps.normal.is_solid(SurfaceMap::Normal.neutral_texel()));
        assert!(maps.specular.is_solid(SurfaceMap::Specular.neutral_texel()));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_surface_map_formats() {
        assert_eq!(SurfaceMap::Diffuse.format(), TextureFormat::Rgba8UnormSrgb);
        assert_eq!(SurfaceMap::Normal.format(), TextureFormat::Rgba8Unorm);
        assert_eq!(SurfaceMap::Specular.format(), TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn test_reflective_layout() {
        let entries = ReflectiveMaterial::<WgpuRenderer>::layout_entries();
        let bindings = entries.iter().map(|e| e.binding).collect::<Vec<_>>();
        assert_eq!(bindings, [0, 1, 2, 3, 4, 5, 6]);

        assert!(matches!(
            entries[0].ty,
            BindingType::Texture {
                view_dimension: TextureViewDimension::Cube,
                ..
            }
        ));
        for map in SurfaceMap::ALL {
            assert!(matches!(
                entries[map.binding() as usize].ty,
                BindingType::Texture {
                    view_dimension: TextureViewDimension::D2,
                    ..
                }
            ));
        }
        assert!(matches!(entries[6].ty, BindingType::Sampler(_)));
        assert_eq!(
            entries[2].ty,
            BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(96),
            }
        );
    }

    #[test]
    fn test_reflective_layout_matches_shader() {
        let ShaderSource::Naga(module) =
            util::compose_shader("reflect.wgsl", util::REFLECT_SHADER).unwrap()
        else {
            panic!("expected a naga module");
        };

        let mut shader_bindings = module
            .global_variables
            .iter()
            .filter_map(|(_, var)| var.binding.as_ref())
            .filter(|binding| binding.group == 1)
            .map(|binding| binding.binding)
            .collect::<Vec<_>>();
        shader_bindings.sort_unstable();

        let layout_bindings = ReflectiveMaterial::<WgpuRenderer>::layout_entries().map(|e| e.binding);
        assert_eq!(shader_bindings, layout_bindings);
    }
}
