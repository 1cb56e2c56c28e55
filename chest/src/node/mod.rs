mod reflect;
mod skybox;

pub use reflect::*;
pub use skybox::*;

#[cfg(test)]
mod test {
    use glam::{UVec3, Vec3};
    use rime_core::{
        render::{
            cube_map::CubeMapLoader,
            flow::RenderFlow,
            helper::{Camera, Transform},
            image::Image,
            resource::{RenderTarget, TargetFormats},
            scene::GpuScene,
        },
        util::{self, cube::CubeFaces},
        RendererError, WgpuRenderer,
    };
    use wgpu::{ErrorFilter, TextureFormat, TextureUsages};

    use super::*;
    use crate::{material::ReflectiveMaterial, mesh::Mesh};

    const SIZE: u32 = 64;
    const SKY: [u8; 4] = [255, 0, 0, 255];
    const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
    const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

    fn headless() -> Option<WgpuRenderer> {
        match pollster::block_on(WgpuRenderer::new()) {
            Ok(renderer) => Some(renderer),
            Err(RendererError::NoAdapter) => None,
            Err(err) => panic!("{err}"),
        }
    }

    fn render_frame(renderer: &WgpuRenderer, sample_count: u32) -> Image {
        let sky = CubeMapLoader::new()
            .load_images(renderer, CubeFaces::from_fn(|_| Image::solid(8, 8, SKY)))
            .unwrap();
        let mut scene = GpuScene::new(renderer);
        scene.set_environment(&sky);
        scene.write_camera(renderer, Camera::default());

        let mut flow = RenderFlow::default();
        flow.add(ReflectiveNode::new(
            Mesh::uv_sphere(0.5, 32, 16),
            Transform::default().with_translation(Vec3::new(0., 0., -2.)),
            ReflectiveMaterial::default(),
        ));
        flow.add(SkyboxNode::default());

        renderer.device.push_error_scope(ErrorFilter::Validation);
        flow.build(
            renderer,
            &scene,
            TargetFormats {
                color: COLOR_FORMAT,
                depth: DEPTH_FORMAT,
                sample_count,
            },
        )
        .unwrap();

        let dim = UVec3::new(SIZE, SIZE, 1);
        let (resolved, resolved_view) = util::create_texture(
            &renderer.device,
            dim,
            COLOR_FORMAT,
            TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            1,
        );
        let multisampled = (sample_count > 1).then(|| {
            util::create_texture(
                &renderer.device,
                dim,
                COLOR_FORMAT,
                TextureUsages::RENDER_ATTACHMENT,
                sample_count,
            )
        });
        let (_depth, depth_view) = util::create_texture(
            &renderer.device,
            dim,
            DEPTH_FORMAT,
            TextureUsages::RENDER_ATTACHMENT,
            sample_count,
        );

        let target = match &multisampled {
            Some((_, view)) => RenderTarget {
                color: view,
                resolve: Some(&resolved_view),
                depth: &depth_view,
            },
            None => RenderTarget {
                color: &resolved_view,
                resolve: None,
                depth: &depth_view,
            },
        };
        flow.run(renderer, &scene, &target);
        let error = pollster::block_on(renderer.device.pop_error_scope());
        assert!(error.is_none(), "{error:?}");

        let (_, raw) = pollster::block_on(util::read_rgba8_texture_layer(
            &renderer.device,
            &renderer.queue,
            &resolved,
            0,
            0,
        ))
        .unwrap();
        Image::from_raw(raw, SIZE, SIZE).unwrap()
    }

    #[test]
    fn test_sky_behind_reflective_model() {
        let Some(renderer) = headless() else {
            return;
        };
        let multisampled = renderer.sample_count(&[COLOR_FORMAT, DEPTH_FORMAT], 4);

        for sample_count in [1, multisampled] {
            let frame = render_frame(&renderer, sample_count);

            for (x, y) in [(0, 0), (SIZE - 1, 0), (0, SIZE - 1), (SIZE - 1, SIZE - 1)] {
                assert_eq!(frame.pixel(x, y), SKY, "corner ({x}, {y}), {sample_count}x");
            }

            // The sphere covers the center, tinted and lit on top of the red reflection.
            let [r, g, b, a] = frame.pixel(SIZE / 2, SIZE / 2);
            assert_ne!([r, g, b, a], SKY, "{sample_count}x");
            assert!(r > g && r > b, "{sample_count}x");
            assert!(g > 0 && b > 0, "{sample_count}x");
            assert_eq!(a, 255);
        }
    }
}
