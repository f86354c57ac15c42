// Camera and projection math
//
// Source space is right handed, y-up, +z out of the screen, +x right.
// Destination is Vulkan clip space: right handed, y-down, depth 0.0 (near) to 1.0 (far).

use glam::{Mat4, Vec3};

/// Right handed view matrix looking from `eye` towards `at`
#[rustfmt::skip]
pub fn look_at(eye: Vec3, at: Vec3, up: Vec3) -> Mat4 {
    let f = (at - eye).normalize();
    let r = f.cross(up).normalize();
    let u = r.cross(f);

    Mat4::from_cols_array(&[
        r.x, u.x, -f.x, 0.0,
        r.y, u.y, -f.y, 0.0,
        r.z, u.z, -f.z, 0.0,
        -r.dot(eye), -u.dot(eye), f.dot(eye), 1.0,
    ])
}

/// Perspective projection into Vulkan clip space (y flipped, depth in [0, 1])
#[rustfmt::skip]
pub fn perspective(vertical_fov: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Mat4 {
    let sy = 1.0 / (vertical_fov / 2.0).tan();
    let sx = sy / aspect_ratio;
    let nmf = z_near - z_far;

    Mat4::from_cols_array(&[
        sx, 0.0, 0.0, 0.0,
        0.0, -sy, 0.0, 0.0,
        0.0, 0.0, z_far / nmf, -1.0,
        0.0, 0.0, z_near * z_far / nmf, 0.0,
    ])
}

pub fn rotation_z(angle: f32) -> Mat4 {
    Mat4::from_rotation_z(angle)
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.0, 2.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        look_at(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect_ratio: f32) -> Mat4 {
        perspective(self.fov_y, aspect_ratio, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        assert!(a.abs_diff_eq(b, 1e-5), "\n{:?}\n!=\n{:?}", a, b);
    }

    #[test]
    fn look_at_matches_right_handed_view() {
        let eye = Vec3::new(2.0, 2.0, 2.0);
        let at = Vec3::ZERO;
        assert_mat_eq(look_at(eye, at, Vec3::Z), Mat4::look_at_rh(eye, at, Vec3::Z));
    }

    #[test]
    fn look_at_moves_eye_to_origin() {
        let eye = Vec3::new(1.0, -3.0, 5.0);
        let view = look_at(eye, Vec3::ZERO, Vec3::Y);
        let p = view * eye.extend(1.0);
        assert!(p.truncate().length() < 1e-5);

        // target ends up straight ahead, down -z
        let t = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(t.x.abs() < 1e-5 && t.y.abs() < 1e-5);
        assert!(t.z < 0.0);
    }

    #[test]
    fn perspective_flips_y_for_vulkan() {
        let fov = 45f32.to_radians();
        let mut expected = Mat4::perspective_rh(fov, 1.5, 0.1, 10.0);
        expected.y_axis = -expected.y_axis;
        assert_mat_eq(perspective(fov, 1.5, 0.1, 10.0), expected);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let proj = perspective(60f32.to_radians(), 1.0, 0.5, 20.0);

        let near = proj * Vec4::new(0.0, 0.0, -0.5, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -20.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);

        // points above the camera land in the upper (negative y) half
        let up = proj * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn rotation_z_quarter_turn() {
        let r = rotation_z(std::f32::consts::FRAC_PI_2);
        let v = r * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!((v - Vec4::new(0.0, 1.0, 0.0, 1.0)).length() < 1e-5);
        assert_mat_eq(r.transpose() * r, Mat4::IDENTITY);
    }

    #[test]
    fn vector_helpers() {
        let a = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.length_squared(), 25.0);
        assert_eq!(a.length(), 5.0);
        assert!((a.normalize().length() - 1.0).abs() < 1e-6);
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
        assert_eq!(Vec3::X.dot(Vec3::Y), 0.0);
        assert_eq!(a - Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 3.0, -1.0));
    }

    #[test]
    fn default_camera_is_finite() {
        let camera = Camera::default();
        let mvp = camera.projection(800.0 / 600.0) * camera.view();
        assert!(mvp.is_finite());
    }
}
