use crate::config::{CameraConfig, CameraControlUpdate};
use crate::render::pick::Ray;
use crate::render::Viewport;
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

/// Snapshot reported with every camera update.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub center: [f32; 3],
    pub alpha: f32,
    pub beta: f32,
    pub distance: f32,
}

/// Camera orbiting a center point. `alpha` is the elevation and `beta` the
/// heading, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub center: Vec3,
    pub distance: f32,
    pub alpha: f32,
    pub beta: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_alpha: f32,
    pub max_alpha: f32,
    pub rotate_sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_config(&CameraConfig::default())
    }
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        let mut camera = Self {
            center: Vec3::from_array(config.center),
            distance: config.distance,
            alpha: config.alpha,
            beta: config.beta,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_alpha: config.min_alpha,
            max_alpha: config.max_alpha,
            rotate_sensitivity: config.rotate_sensitivity,
            zoom_sensitivity: config.zoom_sensitivity,
            fov: config.fov,
            near: 0.1,
            far: 1000.0,
        };
        camera.clamp();
        camera
    }

    /// Apply the fields present in `update`.
    pub fn set_option(&mut self, update: &CameraControlUpdate) {
        if let Some(center) = update.center {
            self.center = Vec3::from_array(center);
        }
        if let Some(value) = update.min_distance {
            self.min_distance = value;
        }
        if let Some(value) = update.max_distance {
            self.max_distance = value;
        }
        if let Some(value) = update.min_alpha {
            self.min_alpha = value;
        }
        if let Some(value) = update.max_alpha {
            self.max_alpha = value;
        }
        if let Some(value) = update.distance {
            self.distance = value;
        }
        if let Some(value) = update.alpha {
            self.alpha = value;
        }
        if let Some(value) = update.beta {
            self.beta = value;
        }
        if let Some(value) = update.rotate_sensitivity {
            self.rotate_sensitivity = value;
        }
        if let Some(value) = update.zoom_sensitivity {
            self.zoom_sensitivity = value;
        }
        self.clamp();
    }

    pub fn state(&self) -> CameraState {
        CameraState {
            center: self.center.to_array(),
            alpha: self.alpha,
            beta: self.beta,
            distance: self.distance,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (alpha, beta) = (self.alpha.to_radians(), self.beta.to_radians());
        let offset = Vec3::new(
            beta.sin() * alpha.cos(),
            alpha.sin(),
            beta.cos() * alpha.cos(),
        );
        self.center + offset * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.center, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect.max(1e-3), self.near, self.far)
    }

    pub fn view_projection(&self, viewport: &Viewport) -> Mat4 {
        self.projection(viewport.aspect()) * self.view_matrix()
    }

    /// World-space ray through the pixel at (`x`, `y`), top-left origin.
    pub fn ray_from_screen(&self, x: f32, y: f32, viewport: &Viewport) -> Ray {
        let width = viewport.width.max(1) as f32;
        let height = viewport.height.max(1) as f32;
        let ndc = Vec2::new(
            2.0 * (x - viewport.x as f32) / width - 1.0,
            1.0 - 2.0 * (y - viewport.y as f32) / height,
        );
        let inverse = self.view_projection(viewport).inverse();
        let near = inverse.project_point3(ndc.extend(0.0));
        let far = inverse.project_point3(ndc.extend(1.0));
        Ray {
            origin: near,
            direction: (far - near).try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }

    /// Screen position of a world point, `None` when it is behind the camera.
    pub fn project(&self, point: Vec3, viewport: &Viewport) -> Option<Vec2> {
        let clip = self.view_projection(viewport) * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        Some(Vec2::new(
            viewport.x as f32 + (ndc.x + 1.0) * 0.5 * viewport.width as f32,
            viewport.y as f32 + (1.0 - ndc.y) * 0.5 * viewport.height as f32,
        ))
    }

    /// Orbit by a pointer drag of (`dx`, `dy`) pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.beta -= dx * self.rotate_sensitivity * 0.5;
        self.alpha += dy * self.rotate_sensitivity * 0.5;
        self.clamp();
    }

    /// Positive `delta` moves away from the center.
    pub fn zoom(&mut self, delta: f32) {
        self.distance *= 1.0 + delta * 0.1 * self.zoom_sensitivity;
        self.clamp();
    }

    fn clamp(&mut self) {
        if self.min_distance > self.max_distance {
            std::mem::swap(&mut self.min_distance, &mut self.max_distance);
        }
        if !self.distance.is_finite() {
            self.distance = self.min_distance;
        }
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);
        if self.min_alpha <= self.max_alpha {
            self.alpha = self.alpha.clamp(self.min_alpha, self.max_alpha);
        }
        wrap_degrees(&mut self.beta);
    }
}

fn wrap_degrees(angle: &mut f32) {
    if angle.is_finite() {
        *angle = (*angle + 180.0).rem_euclid(360.0) - 180.0;
    } else {
        *angle = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(200, 100, 1.0)
    }

    #[test]
    fn default_camera_looks_at_origin_from_distance() {
        let camera = OrbitCamera::default();
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 20.0)).length() < 1e-4);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn set_option_only_touches_given_fields_and_clamps() {
        let mut camera = OrbitCamera::default();
        camera.set_option(&CameraControlUpdate {
            distance: Some(500.0),
            beta: Some(190.0),
            ..CameraControlUpdate::default()
        });
        assert_eq!(camera.distance, 100.0);
        assert!((camera.beta + 170.0).abs() < 1e-4);
        assert_eq!(camera.alpha, 0.0);
        assert_eq!(camera.center, Vec3::ZERO);
    }

    #[test]
    fn rotate_keeps_finite_values() {
        let mut camera = OrbitCamera::default();
        camera.rotate(1.0e6, -4.0e6);
        assert!(camera.alpha >= camera.min_alpha && camera.alpha <= camera.max_alpha);
        assert!(camera.beta.is_finite());
        assert!(camera.eye().is_finite());
    }

    #[test]
    fn center_pixel_ray_passes_through_the_center() {
        let camera = OrbitCamera::default();
        let ray = camera.ray_from_screen(100.0, 50.0, &viewport());
        let to_center = (camera.center - ray.origin).normalize();
        assert!(ray.direction.dot(to_center) > 0.9999);
    }

    #[test]
    fn project_maps_center_to_viewport_middle() {
        let camera = OrbitCamera::default();
        let screen = camera.project(Vec3::ZERO, &viewport()).unwrap();
        assert!((screen - Vec2::new(100.0, 50.0)).length() < 1e-3);
        assert!(camera.project(Vec3::new(0.0, 0.0, 40.0), &viewport()).is_none());
    }
}
