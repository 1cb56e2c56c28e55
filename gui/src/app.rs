use std::{path::Path, sync::Arc, time::Instant};

use glam::{UVec2, Vec2};
use rime_chest::{
    material::{ReflectiveMaterial, SurfaceMaps},
    mesh::Mesh,
    node::{ReflectiveNode, SkyboxNode},
};
use rime_core::{
    render::{
        cube_map::{CubeMapError, CubeMapLoader},
        flow::{NodeBuildError, RenderFlow},
        helper::{Camera, PerspectiveProjection, Transform},
        resource::{RenderTarget, TargetFormats},
        scene::GpuScene,
        skybox::{self, SkyboxFiles, SkyboxSet},
    },
    util::{self, cube::CubeFace},
    FrameCounter, RendererError, WgpuRenderer,
};
use thiserror::Error;
use wgpu::{
    Surface, SurfaceConfiguration, SurfaceError, Texture, TextureFormat, TextureUsages,
    TextureView, TextureViewDescriptor,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::OsError,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{config::AppConfig, scene::ControllableCamera};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to create window: {0}")]
    Window(#[from] OsError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error(transparent)]
    CubeMap(#[from] CubeMapError),
    #[error(transparent)]
    Node(#[from] NodeBuildError),
    #[error("The window surface is not supported by the adapter.")]
    UnsupportedSurface,
    #[error("No skybox configured.")]
    NoSkybox,
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

pub struct Application {
    config: AppConfig,
    state: Option<AppState>,
    error: Option<AppError>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: None,
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn finish(self) -> Result<(), AppError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match AppState::new(event_loop, &self.config) {
            Ok(state) => self.state = Some(state),
            Err(err) => {
                log::error!("{err}");
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::RedrawRequested => state.redraw(event_loop),
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => state.handle_keyboard(event_loop, &self.config, key, key_state, repeat),
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => state.main_camera.mouse_control(button, button_state),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        if let DeviceEvent::MouseMotion { delta } = event {
            state
                .main_camera
                .mouse_move(Vec2::new(delta.0 as f32, delta.1 as f32), state.delta);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

struct AppState {
    window: Arc<Window>,
    renderer: WgpuRenderer,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    sample_count: u32,
    depth: (Texture, TextureView),
    multisampled: Option<(Texture, TextureView)>,

    skies: SkyboxSet<WgpuRenderer>,
    scene: GpuScene,
    flow: RenderFlow,
    main_camera: ControllableCamera,

    last_draw: Instant,
    delta: f32,
    frame_counter: FrameCounter,
}

impl AppState {
    fn new(event_loop: &ActiveEventLoop, config: &AppConfig) -> Result<Self, AppError> {
        let window = Arc::new(
            event_loop.create_window(
                WindowAttributes::default()
                    .with_title(config.title.as_str())
                    .with_inner_size(PhysicalSize::new(
                        config.window_size.x,
                        config.window_size.y,
                    )),
            )?,
        );
        let dim = window_dim(window.inner_size());

        let (renderer, surface) = pollster::block_on(WgpuRenderer::for_surface(window.clone()))?;
        let surface_config = surface
            .get_default_config(&renderer.adapter, dim.x, dim.y)
            .ok_or(AppError::UnsupportedSurface)?;
        surface.configure(&renderer.device, &surface_config);

        let sample_count = renderer.sample_count(
            &[surface_config.format, DEPTH_FORMAT],
            config.sample_count,
        );
        if sample_count != config.sample_count {
            log::info!(
                "{}x multisampling unavailable, using {}x.",
                config.sample_count,
                sample_count
            );
        }
        let depth = create_depth(&renderer, dim, sample_count);
        let multisampled = create_multisampled(&renderer, &surface_config, sample_count);

        let loader = CubeMapLoader::new();
        let skies = config
            .skyboxes
            .iter()
            .map(|sky| {
                let cube_map = skybox::load_or_solid(
                    &loader,
                    &renderer,
                    config.sky_directory(sky),
                    sky.fallback_rgba(),
                )?;
                Ok((sky.name.to_owned(), cube_map))
            })
            .collect::<Result<Vec<_>, CubeMapError>>()?;
        let skies = SkyboxSet::new(skies).ok_or(AppError::NoSkybox)?;

        let mut scene = GpuScene::new(&renderer);
        scene.set_environment(skies.active());

        let mut material = ReflectiveMaterial::default();
        material.maps = SurfaceMaps::load(&config.model_map_paths());
        material.specular_exponent = config.specular_exponent;
        material.reflectivity = config.reflectivity;

        let mut flow = RenderFlow::default();
        flow.add(ReflectiveNode::new(
            Mesh::uv_sphere(config.model_radius, 64, 32),
            Transform::default().with_translation(config.model_position),
            material,
        ));
        flow.add(SkyboxNode::default());
        flow.build(
            &renderer,
            &scene,
            TargetFormats {
                color: surface_config.format,
                depth: DEPTH_FORMAT,
                sample_count,
            },
        )?;

        let main_camera = ControllableCamera::new(
            Camera {
                transform: Transform::default(),
                projection: PerspectiveProjection {
                    fov: config.camera.fov,
                    aspect_ratio: dim.x as f32 / dim.y as f32,
                    near: config.camera.near,
                    far: config.camera.far,
                },
            },
            config.camera,
        );

        Ok(Self {
            window,
            renderer,
            surface,
            surface_config,
            sample_count,
            depth,
            multisampled,
            skies,
            scene,
            flow,
            main_camera,
            last_draw: Instant::now(),
            delta: 0.,
            frame_counter: FrameCounter::default(),
        })
    }

    fn handle_keyboard(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: &AppConfig,
        key: KeyCode,
        state: ElementState,
        repeat: bool,
    ) {
        if state.is_pressed() {
            match key {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::ArrowLeft => {
                    self.skies.previous();
                }
                KeyCode::ArrowRight => {
                    self.skies.next();
                }
                KeyCode::F12 if !repeat => {
                    let dir = config.capture_directory(self.skies.active_name());
                    if let Err(err) = self.capture_faces(&dir) {
                        log::error!("Failed to capture sky faces: {err}");
                    }
                }
                _ => {}
            }
        }

        self.main_camera.keyboard_control(key, state);
    }

    /// Saves the top mip of every face of the active sky, named so the
    /// directory can be loaded back as a sky.
    fn capture_faces(&self, dir: &Path) -> Result<(), AppError> {
        std::fs::create_dir_all(dir)?;
        let texture = self.skies.active().texture();

        for face in CubeFace::ALL {
            let image = texture.read_face(&self.renderer, face, 0)?;
            image.save(dir.join(*SkyboxFiles::NAMES.get(face)))?;
        }

        log::info!("Saved sky faces to {}.", dir.display());
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        self.delta = (now - self.last_draw).as_secs_f32();
        self.last_draw = now;

        self.main_camera.update(self.delta);
        self.scene.write_camera(&self.renderer, self.main_camera.camera);
        self.scene.set_environment(self.skies.active());

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                self.surface.configure(&self.renderer.device, &self.surface_config);
                return;
            }
            Err(err) => {
                log::error!("Failed to acquire next frame: {err}");
                if matches!(err, SurfaceError::OutOfMemory) {
                    event_loop.exit();
                }
                return;
            }
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let target = match &self.multisampled {
            Some((_, multisampled)) => RenderTarget {
                color: multisampled,
                resolve: Some(&view),
                depth: &self.depth.1,
            },
            None => RenderTarget {
                color: &view,
                resolve: None,
                depth: &self.depth.1,
            },
        };
        self.flow.run(&self.renderer, &self.scene, &target);

        self.window.pre_present_notify();
        frame.present();
        self.frame_counter.update();
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }

        let dim = window_dim(size);
        self.surface_config.width = dim.x;
        self.surface_config.height = dim.y;
        self.surface.configure(&self.renderer.device, &self.surface_config);
        self.depth = create_depth(&self.renderer, dim, self.sample_count);
        self.multisampled =
            create_multisampled(&self.renderer, &self.surface_config, self.sample_count);
        self.main_camera.set_aspect_ratio(dim.x as f32 / dim.y as f32);
    }
}

#[inline]
fn window_dim(size: PhysicalSize<u32>) -> UVec2 {
    UVec2::new(size.width, size.height).max(UVec2::ONE)
}

fn create_depth(renderer: &WgpuRenderer, dim: UVec2, sample_count: u32) -> (Texture, TextureView) {
    util::create_texture(
        &renderer.device,
        dim.extend(1),
        DEPTH_FORMAT,
        TextureUsages::RENDER_ATTACHMENT,
        sample_count,
    )
}

/// The color target that resolves into the swapchain image, if multisampling.
fn create_multisampled(
    renderer: &WgpuRenderer,
    surface_config: &SurfaceConfiguration,
    sample_count: u32,
) -> Option<(Texture, TextureView)> {
    (sample_count > 1).then(|| {
        util::create_texture(
            &renderer.device,
            UVec2::new(surface_config.width, surface_config.height).extend(1),
            surface_config.format,
            TextureUsages::RENDER_ATTACHMENT,
            sample_count,
        )
    })
}
