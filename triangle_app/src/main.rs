//! Triangle demo application
//!
//! Opens a window and draws a colored quad through the engine's frame loop.
//! Settings are read from `daedalus.toml` when present.

use bytemuck::{Pod, Zeroable};
use daedalus_engine::prelude::*;
use daedalus_engine::foundation::logging;

const CONFIG_PATH: &str = "daedalus.toml";

/// Vertex layout matching `resources/shaders/vertex.vert`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 3],
}

const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-0.5, -0.5], color: [1.0, 0.0, 0.0] },
    Vertex { position: [0.5, -0.5], color: [0.0, 1.0, 0.0] },
    Vertex { position: [0.5, 0.5], color: [0.0, 0.0, 1.0] },
    Vertex { position: [-0.5, 0.5], color: [1.0, 1.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

struct TriangleApp {
    // Renderer before window: the surface must go before the window does
    renderer: Renderer,
    window: Window,
}

impl TriangleApp {
    fn new(config: &ApplicationConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mut window = Window::new(&config.window)?;

        let layout = VertexLayout::packed(&[AttributeType::Float2, AttributeType::Float3])?;
        let mut renderer = Renderer::new(&mut window, &config.renderer, &FsFileLoader, layout)?;
        renderer.upload_mesh(&QUAD_VERTICES, &QUAD_INDICES)?;

        Ok(Self { renderer, window })
    }

    fn run(&mut self) -> VulkanResult<()> {
        log::info!("Entering frame loop");

        while !self.window.should_close() {
            let (width, height) = self.window.drawable_size();
            let events = if width == 0 || height == 0 {
                // Minimised: nothing to draw until the window comes back
                self.window.wait_events()
            } else {
                self.window.poll_events()
            };

            for event in events {
                match event {
                    WindowEvent::Quit => log::info!("Quit requested"),
                    WindowEvent::Resized { width, height } => self.renderer.handle_resize(width, height),
                }
            }

            if self.window.should_close() {
                break;
            }

            if let FrameOutcome::Skipped = self.renderer.draw_frame()? {
                log::trace!("Frame skipped");
            }
        }

        self.renderer.wait_idle()
    }
}

fn main() {
    let config = match ApplicationConfig::load_or_default(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            logging::init_with_level("info");
            log::error!("Failed to load {}: {}", CONFIG_PATH, e);
            std::process::exit(1);
        }
    };
    logging::init_with_level(&config.engine.log_level);

    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut app = match TriangleApp::new(&config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run() {
        log::error!("Fatal rendering error: {}", e);
        drop(app);
        std::process::exit(1);
    }

    log::info!("Shutdown complete");
}
