//! Orbit camera.
//!
//! The camera circles a target point at a distance, driven by pointer drags
//! (rotate/pan), scroll (zoom), and the window size (aspect). It produces the
//! view and projection matrices consumed by the model pipeline.

use cgmath::{perspective, Deg, InnerSpace, Matrix4, Point3, Vector3};

use crate::loader::Aabb;

/// cgmath produces OpenGL clip space (z in -1..1); wgpu expects z in 0..1.
#[rustfmt::skip]
const OPENGL_TO_WGPU: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Projection mode, toggled at runtime.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Projection {
    Perspective,
    Orthographic,
}

/// Active pointer drag mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DragMode {
    Rotate,
    Pan,
}

#[derive(Debug, Copy, Clone)]
struct Drag {
    mode: DragMode,
    last: (f32, f32),
}

const FOV_Y_DEG: f32 = 45.0;

/// Pitch stops just short of the poles so the up vector never degenerates.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug)]
pub struct Camera {
    target: Point3<f32>,
    yaw: f32,
    pitch: f32,
    distance: f32,

    /// Last valid aspect ratio; zero-sized viewports do not overwrite it.
    aspect: f32,

    projection: Projection,

    /// Bounding-sphere radius of the framed scene; drives clip planes and
    /// zoom clamps.
    scene_radius: f32,

    drag: Option<Drag>,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            target: Point3::new(0.0, 0.0, 0.0),
            yaw: std::f32::consts::FRAC_PI_4,
            pitch: 0.5,
            distance: 5.0,
            aspect: 1.0,
            projection: Projection::Perspective,
            scene_radius: 1.0,
            drag: None,
        }
    }

    /// Recomputes the aspect ratio for a new drawable size.
    ///
    /// A zero-sized viewport (minimized window) keeps the previous aspect so
    /// the matrices stay finite.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    /// Centers the view on `bounds` and backs off far enough to see all of it.
    pub fn frame_bounds(&mut self, bounds: &Aabb) {
        let c = bounds.center();
        self.target = Point3::new(c[0], c[1], c[2]);
        self.scene_radius = bounds.radius().max(1e-3);
        self.distance = self.scene_radius * 2.5;
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn toggle_projection(&mut self) {
        self.projection = match self.projection {
            Projection::Perspective => Projection::Orthographic,
            Projection::Orthographic => Projection::Perspective,
        };
    }

    // ── interaction ───────────────────────────────────────────────────────

    pub fn begin_drag(&mut self, mode: DragMode, x: f32, y: f32) {
        self.drag = Some(Drag { mode, last: (x, y) });
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Feeds a pointer position into the active drag, if any.
    pub fn drag_to(&mut self, x: f32, y: f32) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };

        let dx = x - drag.last.0;
        let dy = y - drag.last.1;
        drag.last = (x, y);

        let mode = drag.mode;
        match mode {
            DragMode::Rotate => {
                self.yaw -= dx * 0.01;
                self.pitch = (self.pitch + dy * 0.01).clamp(-PITCH_LIMIT, PITCH_LIMIT);
            }
            DragMode::Pan => {
                // Pan in the view plane, scaled so a drag tracks the model
                // roughly 1:1 regardless of zoom level.
                let scale = self.distance * 0.002;
                let (right, up) = self.view_basis();
                self.target += right * (-dx * scale) + up * (dy * scale);
            }
        }
    }

    /// Applies a scroll-wheel zoom step, in lines.
    pub fn zoom(&mut self, lines: f32) {
        let factor = 0.9f32.powf(lines);
        let min = self.scene_radius * 0.05;
        let max = self.scene_radius * 50.0;
        self.distance = (self.distance * factor).clamp(min, max);
    }

    // ── matrices ──────────────────────────────────────────────────────────

    fn eye(&self) -> Point3<f32> {
        let dir = Vector3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        );
        self.target + dir * self.distance
    }

    fn view_basis(&self) -> (Vector3<f32>, Vector3<f32>) {
        let forward = (self.target - self.eye()).normalize();
        let right = forward.cross(Vector3::unit_y()).normalize();
        let up = right.cross(forward);
        (right, up)
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        // Clip planes hug the scene's bounding sphere around the target.
        let near = (self.distance - 2.0 * self.scene_radius).max(self.distance * 0.01);
        let far = self.distance + 2.0 * self.scene_radius;

        let proj = match self.projection {
            Projection::Perspective => perspective(Deg(FOV_Y_DEG), self.aspect, near, far),
            Projection::Orthographic => {
                // Match the perspective frustum height at the target distance
                // so toggling keeps the model the same size on screen.
                let half_h = self.distance * (FOV_Y_DEG.to_radians() * 0.5).tan();
                let half_w = half_h * self.aspect;
                cgmath::ortho(-half_w, half_w, -half_h, half_h, near, far)
            }
        };

        OPENGL_TO_WGPU * proj
    }

    /// Combined projection * view matrix, ready for the vertex shader.
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite(m: &Matrix4<f32>) -> bool {
        let cols: [[f32; 4]; 4] = (*m).into();
        cols.iter().flatten().all(|v| v.is_finite())
    }

    fn unit_bounds() -> Aabb {
        Aabb {
            min: [-1.0, -1.0, -1.0],
            max: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn zero_viewport_keeps_matrices_finite() {
        let mut cam = Camera::new();
        cam.set_viewport(800, 600);
        let before = cam.aspect;

        cam.set_viewport(0, 600);
        cam.set_viewport(800, 0);
        assert_eq!(cam.aspect, before);
        assert!(finite(&cam.view_projection()));
    }

    #[test]
    fn frame_bounds_centers_target() {
        let mut cam = Camera::new();
        cam.frame_bounds(&Aabb {
            min: [2.0, 2.0, 2.0],
            max: [4.0, 4.0, 4.0],
        });
        assert_eq!(cam.target, Point3::new(3.0, 3.0, 3.0));
        assert!(cam.distance > cam.scene_radius);
    }

    #[test]
    fn zoom_clamps_to_scene_scale() {
        let mut cam = Camera::new();
        cam.frame_bounds(&unit_bounds());

        cam.zoom(1000.0);
        assert!(cam.distance >= cam.scene_radius * 0.05);

        cam.zoom(-1000.0);
        assert!(cam.distance <= cam.scene_radius * 50.0);
    }

    #[test]
    fn pitch_clamps_at_poles() {
        let mut cam = Camera::new();
        cam.begin_drag(DragMode::Rotate, 0.0, 0.0);
        cam.drag_to(0.0, 1e6);
        assert!(cam.pitch <= PITCH_LIMIT);
        assert!(finite(&cam.view_projection()));
    }

    #[test]
    fn drag_without_begin_is_a_no_op() {
        let mut cam = Camera::new();
        let yaw = cam.yaw;
        cam.drag_to(100.0, 100.0);
        assert_eq!(cam.yaw, yaw);
    }

    #[test]
    fn pan_moves_target() {
        let mut cam = Camera::new();
        cam.frame_bounds(&unit_bounds());
        let before = cam.target;

        cam.begin_drag(DragMode::Pan, 0.0, 0.0);
        cam.drag_to(50.0, 0.0);
        assert_ne!(cam.target, before);
    }

    #[test]
    fn projection_toggle_round_trips() {
        let mut cam = Camera::new();
        assert_eq!(cam.projection(), Projection::Perspective);
        cam.toggle_projection();
        assert_eq!(cam.projection(), Projection::Orthographic);
        assert!(finite(&cam.view_projection()));
        cam.toggle_projection();
        assert_eq!(cam.projection(), Projection::Perspective);
    }

    #[test]
    fn view_matrix_looks_at_target() {
        let mut cam = Camera::new();
        cam.frame_bounds(&unit_bounds());
        let v = cam.view_matrix();
        // The target must land on the view-space -Z axis.
        let t = v * cam.target.to_homogeneous();
        assert!(t.x.abs() < 1e-4);
        assert!(t.y.abs() < 1e-4);
        assert!(t.z < 0.0);
    }

    #[test]
    fn view_basis_is_orthonormal() {
        let cam = Camera::new();
        let (right, up) = cam.view_basis();
        assert!((right.magnitude() - 1.0).abs() < 1e-5);
        assert!((up.magnitude() - 1.0).abs() < 1e-5);
        assert!(right.dot(up).abs() < 1e-5);
    }
}
