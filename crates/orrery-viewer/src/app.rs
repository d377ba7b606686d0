//! The viewer application: owns the camera, model, and backdrop, and routes
//! window/input events into them.
//!
//! Bindings:
//! - left drag rotates, shift+left or right/middle drag pans
//! - scroll zooms
//! - `Space` re-frames the model, `P` toggles the projection
//! - `Escape` or `Q` exits

use std::path::Path;

use anyhow::{Context, Result};

use orrery_engine::core::{App, AppControl, FrameCtx};
use orrery_engine::input::{
    InputEvent, Key, MouseButton, MouseButtonState, PointerButtonEvent, PointerMoveEvent,
};

use crate::backdrop::Backdrop;
use crate::camera::{Camera, DragMode};
use crate::loader;
use crate::model::Model;

#[derive(Debug)]
pub struct Viewer {
    camera: Camera,
    model: Model,
    backdrop: Backdrop,

    /// Button that started the active drag; releases of other buttons are
    /// ignored so a stray click cannot cancel a drag in progress.
    drag_button: Option<MouseButton>,
}

impl Viewer {
    /// Loads `path` and builds a viewer framed on the model.
    pub fn new(path: &Path) -> Result<Self> {
        let mesh = loader::load_model(path)
            .with_context(|| format!("cannot open model {}", path.display()))?;

        log::info!(
            "loaded {}: {} triangles, bounds {:?} .. {:?}",
            path.display(),
            mesh.triangle_count(),
            mesh.bounds.min,
            mesh.bounds.max,
        );

        let mut camera = Camera::new();
        camera.frame_bounds(&mesh.bounds);

        Ok(Self {
            camera,
            model: Model::new(mesh),
            backdrop: Backdrop::default(),
            drag_button: None,
        })
    }

    fn handle_pointer(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state: MouseButtonState::Pressed,
                x,
                y,
                modifiers,
            }) => {
                if self.drag_button.is_some() {
                    return;
                }
                let mode = match button {
                    MouseButton::Left if !modifiers.shift => DragMode::Rotate,
                    MouseButton::Left | MouseButton::Right | MouseButton::Middle => DragMode::Pan,
                    _ => return,
                };
                self.drag_button = Some(*button);
                self.camera.begin_drag(mode, *x, *y);
            }

            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state: MouseButtonState::Released,
                ..
            }) => {
                if self.drag_button == Some(*button) {
                    self.drag_button = None;
                    self.camera.end_drag();
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.camera.drag_to(*x, *y);
            }

            InputEvent::PointerLeft => {
                self.drag_button = None;
                self.camera.end_drag();
            }

            _ => {}
        }
    }
}

impl App for Viewer {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        // Pointer events in arrival order, so a press/move/release sequence
        // inside one frame still produces the right drag.
        for ev in &ctx.input_frame.events {
            self.handle_pointer(ev);
        }

        if ctx.input_frame.scroll_lines != 0.0 {
            self.camera.zoom(ctx.input_frame.scroll_lines);
        }

        let pressed = &ctx.input_frame.keys_pressed;
        if pressed.contains(&Key::Escape) || pressed.contains(&Key::Q) {
            return AppControl::Exit;
        }
        if pressed.contains(&Key::Space) {
            self.camera.frame_bounds(&self.model.mesh().bounds);
        }
        if pressed.contains(&Key::P) {
            self.camera.toggle_projection();
            log::debug!("projection: {:?}", self.camera.projection());
        }

        // Covers resizes as well as the initial size.
        let size = ctx.gpu.size();
        self.camera.set_viewport(size.width, size.height);

        if size.width == 0 || size.height == 0 {
            // Minimized; nothing to draw and the surface cannot be acquired.
            return AppControl::Continue;
        }

        let (camera, model, backdrop) = (&self.camera, &mut self.model, &mut self.backdrop);

        ctx.render(
            wgpu::Color {
                r: 0.015,
                g: 0.017,
                b: 0.022,
                a: 1.0,
            },
            |rctx, rpass| {
                backdrop.draw(rctx, rpass);
                model.draw(rctx, rpass, camera);
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp_stl(tag: &str, facets: u32) -> std::path::PathBuf {
        let mut bytes = vec![0u8; 80];
        bytes.extend(facets.to_le_bytes());
        for i in 0..facets {
            let z = i as f32;
            for v in [0.0f32, 0.0, 1.0] {
                bytes.extend(v.to_le_bytes());
            }
            for vert in [[0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]] {
                for v in vert {
                    bytes.extend(v.to_le_bytes());
                }
            }
            bytes.extend(0u16.to_le_bytes());
        }

        let path = std::env::temp_dir().join(format!(
            "orrery-test-{}-{}.stl",
            std::process::id(),
            tag
        ));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn new_populates_all_components() {
        let path = write_temp_stl("populate", 2);
        let viewer = Viewer::new(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(viewer.model.mesh().triangle_count(), 2);
        assert!(viewer.drag_button.is_none());
    }

    #[test]
    fn new_fails_on_missing_file() {
        let err = Viewer::new(Path::new("/nonexistent/orrery-missing.stl")).unwrap_err();
        assert!(format!("{err:#}").contains("cannot open model"));
    }

    #[test]
    fn instances_own_independent_meshes() {
        let a_path = write_temp_stl("indep-a", 1);
        let b_path = write_temp_stl("indep-b", 3);

        let a = Viewer::new(&a_path).unwrap();
        let b = Viewer::new(&b_path).unwrap();

        std::fs::remove_file(&a_path).ok();
        std::fs::remove_file(&b_path).ok();

        assert_eq!(a.model.mesh().triangle_count(), 1);
        assert_eq!(b.model.mesh().triangle_count(), 3);
    }

    #[test]
    fn drag_release_of_other_button_keeps_drag() {
        let path = write_temp_stl("drag", 1);
        let mut viewer = Viewer::new(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let press = |button| {
            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state: MouseButtonState::Pressed,
                x: 0.0,
                y: 0.0,
                modifiers: Default::default(),
            })
        };
        let release = |button| {
            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state: MouseButtonState::Released,
                x: 0.0,
                y: 0.0,
                modifiers: Default::default(),
            })
        };

        viewer.handle_pointer(&press(MouseButton::Left));
        assert_eq!(viewer.drag_button, Some(MouseButton::Left));

        viewer.handle_pointer(&release(MouseButton::Right));
        assert_eq!(viewer.drag_button, Some(MouseButton::Left));
        assert!(viewer.camera.dragging());

        viewer.handle_pointer(&release(MouseButton::Left));
        assert_eq!(viewer.drag_button, None);
        assert!(!viewer.camera.dragging());
    }
}
