//! Previz - headless viewer host
//!
//! Opens a window, forwards pointer input to a [`Viewer`] driving the
//! headless backend and logs the events it emits.
//!
//! Usage: `previz <model.gltf|model.glb> [viewer.json]`

use previz_viewer::config::load_config_from_file;
use previz_viewer::{HeadlessRenderer, LoadOptions, ModelSource, Viewer, ViewerConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

struct DemoHost {
    window: Option<Arc<Window>>,
    viewer: Viewer<HeadlessRenderer>,
    cursor: (f32, f32),
}

impl DemoHost {
    fn new(viewer: Viewer<HeadlessRenderer>) -> Self {
        Self {
            window: None,
            viewer,
            cursor: (0.0, 0.0),
        }
    }

    fn redraw(&mut self) {
        let report = self.viewer.frame(Instant::now());
        for event in self.viewer.drain_events() {
            log::info!("{event}");
        }
        if let (Some(fps), Some(window)) = (report.fps, &self.window) {
            window.set_title(&format!("Previz - {:.0} fps ({:.2} ms)", fps.fps, fps.frame_ms));
        }
    }
}

impl ApplicationHandler for DemoHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title("Previz")
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };
        let size = window.inner_size();
        self.viewer.resize(size.width, size.height);
        self.viewer.start();
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.viewer.dispose();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    self.viewer.dispose();
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Window resized to {}x{}", new_size.width, new_size.height);
                self.viewer.resize(new_size.width, new_size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                self.viewer.pointer_move(self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let (x, y) = self.cursor;
                match state {
                    ElementState::Pressed => self.viewer.pointer_down(x, y),
                    ElementState::Released => {
                        self.viewer.pointer_up(x, y);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                self.viewer.wheel(-lines);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_disposed() {
            event_loop.exit();
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args = std::env::args().skip(1);
    let Some(model_path) = args.next() else {
        log::error!("Usage: previz <model.gltf|model.glb> [viewer.json]");
        return Ok(());
    };
    let config = match args.next() {
        Some(path) => load_config_from_file(Path::new(&path))?,
        None => ViewerConfig::default(),
    };

    let mut viewer = Viewer::new(HeadlessRenderer::new(), config);
    viewer.load_model(ModelSource::Url(model_path), LoadOptions::default());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut host = DemoHost::new(viewer);
    event_loop.run_app(&mut host)?;

    log::info!("Viewer closed");
    Ok(())
}
