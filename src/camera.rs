use glam::{Mat4, Vec3};
use thiserror::Error;

/// Perspective camera used by the navbar and background scenes.
///
/// The camera assumes a right-handed system with +Y up and the +Z axis going
/// _out_ of the screen, so a camera at `(0, 0, 5)` looking at the origin sees
/// objects placed around `z = 0` and further back at negative `z`.
///
/// The following transforms points from local space to clip space:
///  `V_clip = M_projection * M_view * M_model * M_local`
#[derive(Clone, Debug)]
pub struct Camera {
    /// The position of the camera in world space.
    eye: Vec3,
    /// The target position the camera should look at.
    target: Vec3,
    /// A world space direction vector indicating which direction is considered
    /// straight up.
    world_up: Vec3,
    /// The ratio of the viewport width to its height.
    aspect: f32,
    /// The vertical field of view in degrees.
    fov_y_degrees: f32,
    /// Fragments closer than `z_near` will not be rendered.
    z_near: f32,
    /// Fragments further than `z_far` will not be rendered.
    z_far: f32,
    viewport_width: u32,
    viewport_height: u32,
}

impl Camera {
    /// Create a camera at `eye` looking down -Z at the origin.
    ///
    /// The aspect ratio is set to one if either the viewport width or height
    /// is zero, which keeps the projection matrix finite until the first real
    /// resize arrives.
    pub fn new(
        fov_y_degrees: f32,
        z_near: f32,
        z_far: f32,
        eye: Vec3,
        viewport_width: u32,
        viewport_height: u32,
    ) -> Self {
        assert!(fov_y_degrees > 0.0);
        assert!(z_near > 0.0);
        assert!(z_far > z_near);

        Self {
            eye,
            target: Vec3::ZERO,
            world_up: Vec3::Y,
            aspect: if viewport_width > 0 && viewport_height > 0 {
                viewport_width as f32 / viewport_height as f32
            } else {
                1.0
            },
            fov_y_degrees,
            z_near,
            z_far,
            viewport_width,
            viewport_height,
        }
    }

    /// Move the camera without changing where it looks.
    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    /// Aim the camera at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Get the camera's view matrix, which transforms world space into view
    /// space.
    pub fn view_matrix(&self) -> Mat4 {
        let target = if self.target == self.eye {
            // Degenerate; look down -Z instead of producing NaNs.
            self.eye - Vec3::Z
        } else {
            self.target
        };

        Mat4::look_at_rh(self.eye, target, self.world_up)
    }

    /// Get the camera's perspective projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.z_near,
            self.z_far,
        )
    }

    /// Get the camera's view projection matrix. The view projection matrix will
    /// transform points from world space to clip space.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Resize the camera's viewport and recompute the aspect ratio.
    pub fn set_viewport_size(
        &mut self,
        new_width: u32,
        new_height: u32,
    ) -> Result<(), InvalidCameraSize> {
        if new_width > 0 && new_height > 0 {
            self.aspect = new_width as f32 / new_height as f32;
            self.viewport_width = new_width;
            self.viewport_height = new_height;
            Ok(())
        } else {
            Err(InvalidCameraSize(new_width, new_height))
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_y_degrees(&self) -> f32 {
        self.fov_y_degrees
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }
}

#[derive(Debug, Error)]
#[error("camera viewport width and height must be larger than zero but width was {} and height was {}", .0, .1)]
pub struct InvalidCameraSize(pub u32, pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    fn test_camera() -> Camera {
        Camera::new(75.0, 0.1, 100.0, Vec3::new(0.0, 0.0, 5.0), 100, 200)
    }

    #[test]
    fn set_valid_viewport_size() {
        let mut camera = test_camera();
        assert_eq!(0.5, camera.aspect());

        assert!(camera.set_viewport_size(600, 300).is_ok());
        assert_eq!(2.0, camera.aspect());
        assert_eq!((600, 300), camera.viewport_size());
    }

    #[test]
    fn set_invalid_viewport_size() {
        let mut camera = test_camera();

        let err = camera.set_viewport_size(0, 100).unwrap_err();
        assert_eq!(0, err.0);
        assert_eq!(100, err.1);

        let err = camera.set_viewport_size(600, 0).unwrap_err();
        assert_eq!(600, err.0);
        assert_eq!(0, err.1);

        // A failed resize leaves the previous aspect intact.
        assert_eq!(0.5, camera.aspect());
    }

    #[test]
    fn zero_sized_viewport_still_projects() {
        let camera = Camera::new(75.0, 0.1, 100.0, Vec3::new(0.0, 0.0, 5.0), 0, 0);
        assert_eq!(1.0, camera.aspect());
        assert!(camera.view_projection_matrix().is_finite());
    }

    #[test]
    fn origin_projects_to_screen_center() {
        let camera = test_camera();
        let clip = camera.view_projection_matrix() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;

        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
