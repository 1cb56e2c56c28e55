use glam::{Mat3, Mat4, Quat, Vec3};

use crate::render::resource::GpuCamera;

#[derive(Debug, Default, Clone, Copy)]
pub struct Camera {
    pub transform: Transform,
    pub projection: PerspectiveProjection,
}

impl From<Camera> for GpuCamera {
    fn from(camera: Camera) -> Self {
        let view = camera.transform.compute_matrix().inverse();
        let proj = camera.projection.compute_matrix();
        // Translation dropped so the sky stays at infinity.
        let sky_view = Mat4::from_mat3(Mat3::from_mat4(view));

        GpuCamera {
            view_proj: proj * view,
            sky_inv_view_proj: (proj * sky_view).inverse(),
            position_ws: camera.transform.translation.extend(1.),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerspectiveProjection {
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveProjection {
    fn default() -> Self {
        Self {
            fov: std::f32::consts::FRAC_PI_4,
            aspect_ratio: 1.,
            near: 0.1,
            far: 100.,
        }
    }
}

impl PerspectiveProjection {
    #[inline]
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    #[inline]
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    #[inline]
    pub fn local_neg_z(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    #[inline]
    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    #[inline]
    pub fn looking_at(mut self, target: Vec3, up: Vec3) -> Self {
        self.look_at(target, up);
        self
    }

    // From Bevy
    #[inline]
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let back = Vec3::normalize(self.translation - target);
        let right = up.cross(back).normalize();
        let up = back.cross(right);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, up, back));
    }
}
