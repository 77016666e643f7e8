//! Window management using GLFW
//!
//! The renderer only needs a narrow view of the window: the drawable size,
//! the instance extensions the platform requires, a surface, and a stream of
//! quit/resize events. [`WindowSystem`] captures that view; [`Window`] is the
//! GLFW implementation used by applications.

use ash::vk;
use thiserror::Error;

use crate::core::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialised
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The platform does not expose Vulkan presentation support
    #[error("Vulkan is not supported by the window system")]
    VulkanUnsupported,

    /// Surface creation returned an error code
    #[error("Failed to create Vulkan surface: {0:?}")]
    SurfaceCreation(vk::Result),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Events the frame loop reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked to close the window (close button or Escape)
    Quit,
    /// The drawable area changed size, in pixels
    Resized {
        /// New drawable width
        width: u32,
        /// New drawable height
        height: u32,
    },
}

/// Narrow window interface consumed by the graphics context and the frame loop
pub trait WindowSystem {
    /// Current drawable size in pixels; zero while minimised
    fn drawable_size(&self) -> (u32, u32);

    /// Instance extensions needed to present to this window
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Create a presentation surface for `instance`
    ///
    /// The caller owns the returned surface and must destroy it before the
    /// instance.
    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;

    /// Pump the platform event queue without blocking
    fn poll_events(&mut self) -> Vec<WindowEvent>;

    /// Block until at least one event arrives, then drain the queue
    fn wait_events(&mut self) -> Vec<WindowEvent>;

    /// Whether a quit has been requested
    fn should_close(&self) -> bool;
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Open a window configured for Vulkan (no client API)
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::VulkanUnsupported);
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(config.resizable));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Opened window '{}' ({}x{})", config.title, config.width, config.height);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    fn drain_events(&mut self) -> Vec<WindowEvent> {
        let mut translated = Vec::new();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::Close => translated.push(WindowEvent::Quit),
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    translated.push(WindowEvent::Quit);
                }
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    translated.push(WindowEvent::Resized {
                        width: width.max(0) as u32,
                        height: height.max(0) as u32,
                    });
                }
                _ => {}
            }
        }

        if translated.contains(&WindowEvent::Quit) {
            self.window.set_should_close(true);
        }
        translated
    }
}

impl WindowSystem for Window {
    fn drawable_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(WindowError::VulkanUnsupported)
    }

    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreation(result))
        }
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.poll_events();
        self.drain_events()
    }

    fn wait_events(&mut self) -> Vec<WindowEvent> {
        self.glfw.wait_events();
        self.drain_events()
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }
}
