//! Camera, projection and orbit controls.
//!
//! The camera orbits a fixed look-at target: dragging with the left mouse
//! button rotates around the target, the scroll wheel moves the camera
//! towards or away from it. The view/projection matrices are packed into
//! [`CameraUniform`] and uploaded once per frame.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use instant::Duration;
use winit::event::{MouseScrollDelta, WindowEvent};

/// wgpu clip space spans z in [0, 1] while cgmath produces OpenGL-style
/// [-1, 1], so every projection matrix is pre-multiplied with this.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Keep the orbit shy of the poles so the view matrix never degenerates.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.05;
const MIN_RADIUS: f32 = 1.0;
const MAX_RADIUS: f32 = 80.0;

/// A look-at camera described by its position and orbit target.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>>(position: P, target: P) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

/// Perspective projection. `resize` keeps the aspect ratio in sync with the
/// rendering surface; everything else stays fixed after construction.
#[derive(Clone, Copy, Debug)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Orbit controller: accumulates raw mouse deltas and scroll ticks between
/// frames and applies them to the camera on `update`.
#[derive(Debug)]
pub struct OrbitController {
    rotate_horizontal: f32,
    rotate_vertical: f32,
    scroll: f32,
    sensitivity: f32,
    zoom_speed: f32,
}

impl OrbitController {
    pub fn new(sensitivity: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_horizontal: 0.0,
            rotate_vertical: 0.0,
            scroll: 0.0,
            sensitivity,
            zoom_speed,
        }
    }

    pub fn handle_mouse(&mut self, mouse_dx: f64, mouse_dy: f64) {
        self.rotate_horizontal += mouse_dx as f32;
        self.rotate_vertical += mouse_dy as f32;
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        if let WindowEvent::MouseWheel { delta, .. } = event {
            self.handle_scroll(delta);
        }
    }

    pub fn handle_scroll(&mut self, delta: &MouseScrollDelta) {
        self.scroll += match delta {
            MouseScrollDelta::LineDelta(_, scroll) => *scroll * 2.0,
            MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
        };
    }

    /// Re-derive the camera position from spherical coordinates around the
    /// target, with the pending rotation and zoom applied. Consumes the
    /// accumulated input, so repeated calls without new input are a no-op.
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        let mut yaw = offset.x.atan2(offset.z);
        let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();

        yaw -= self.rotate_horizontal * self.sensitivity * dt;
        pitch += self.rotate_vertical * self.sensitivity * dt;
        pitch = pitch.clamp(-MAX_PITCH, MAX_PITCH);

        let radius = (radius - self.scroll * self.zoom_speed).clamp(MIN_RADIUS, MAX_RADIUS);

        let direction = Vector3::new(
            yaw.sin() * pitch.cos(),
            pitch.sin(),
            yaw.cos() * pitch.cos(),
        );
        camera.position = camera.target + direction * radius;

        self.rotate_horizontal = 0.0;
        self.rotate_vertical = 0.0;
        self.scroll = 0.0;
    }
}

/// The camera data as it lives on the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state bundled with its GPU-side resources.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Duration = Duration::from_millis(16);

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    fn demo_camera() -> Camera {
        Camera::new((0.0, 10.0, 20.0), (0.0, 5.0, 0.0))
    }

    #[test]
    fn projection_resize_tracks_aspect_ratio() {
        let mut projection = Projection::new(800, 600, cgmath::Deg(45.0), 0.1, 100.0);
        assert_close(projection.aspect, 800.0 / 600.0);

        projection.resize(1920, 1080);
        assert_close(projection.aspect, 1920.0 / 1080.0);
    }

    #[test]
    fn idle_controller_leaves_camera_in_place() {
        let mut camera = demo_camera();
        let mut controller = OrbitController::new(0.4, 1.0);

        for _ in 0..10 {
            controller.update(&mut camera, DT);
        }

        assert_close(camera.position.x, 0.0);
        assert_close(camera.position.y, 10.0);
        assert_close(camera.position.z, 20.0);
    }

    #[test]
    fn horizontal_orbit_preserves_distance_and_height() {
        let mut camera = demo_camera();
        let mut controller = OrbitController::new(0.4, 1.0);
        let radius = (camera.position - camera.target).magnitude();

        controller.handle_mouse(120.0, 0.0);
        controller.update(&mut camera, DT);

        assert_close((camera.position - camera.target).magnitude(), radius);
        assert_close(camera.position.y, 10.0);
        // The camera actually moved.
        assert!(camera.position.x.abs() > 1e-3);
    }

    #[test]
    fn orbit_input_is_consumed_on_update() {
        let mut camera = demo_camera();
        let mut controller = OrbitController::new(0.4, 1.0);

        controller.handle_mouse(120.0, 40.0);
        controller.update(&mut camera, DT);
        let after_first = camera.position;

        controller.update(&mut camera, DT);
        assert_close(camera.position.x, after_first.x);
        assert_close(camera.position.y, after_first.y);
        assert_close(camera.position.z, after_first.z);
    }

    #[test]
    fn scroll_zooms_towards_the_target() {
        let mut camera = demo_camera();
        let mut controller = OrbitController::new(0.4, 1.0);
        let radius = (camera.position - camera.target).magnitude();

        controller.handle_scroll(&MouseScrollDelta::LineDelta(0.0, 3.0));
        controller.update(&mut camera, DT);

        assert!((camera.position - camera.target).magnitude() < radius);
    }

    #[test]
    fn pitch_is_clamped_below_the_pole() {
        let mut camera = demo_camera();
        let mut controller = OrbitController::new(0.4, 1.0);

        controller.handle_mouse(0.0, 1.0e6);
        controller.update(&mut camera, DT);

        let offset = camera.position - camera.target;
        let pitch = (offset.y / offset.magnitude()).asin();
        assert!(pitch <= MAX_PITCH + 1e-4);
    }
}
