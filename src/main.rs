// =============================================================================
// WHYNOT - Vulkan textured quad
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  App (winit event loop, window, input)                          │
// │    └── Renderer (swapchain, pipeline, buffers, frame loop)      │
// │          └── VulkanDevice (instance, surface, GPU, queues)      │
// └─────────────────────────────────────────────────────────────────┘
//
// =============================================================================

mod backend;
mod config;
mod geometry;
mod math;
mod renderer;
mod shader_watch;

use anyhow::Result;
use config::Config;
use renderer::{FrameStatus, Renderer};
use shader_watch::ShaderWatcher;
use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes},
};

fn main() -> Result<()> {
    let (config, notes) = Config::load();

    init_logging(&config);
    for (level, message) in notes {
        log::log!(level, "{}", message);
    }
    log::info!("Starting whynot");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    Ok(())
}

/// Initialize logging, optionally redirected to the configured log file
fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    // RUST_LOG overrides the default level
    builder.parse_env("RUST_LOG");

    if config.debug.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.debug.log_file)
        {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {}: {}", config.debug.log_file, e),
        }
    }

    builder.init();
}

/// Keys resolved from the config
struct KeyBindings {
    quit: Option<KeyCode>,
    fullscreen: Option<KeyCode>,
    reload_shaders: Option<KeyCode>,
}

impl KeyBindings {
    fn from_config(config: &Config) -> Self {
        let parse = |name: &str| {
            let key = config::parse_key(name);
            if key.is_none() {
                log::warn!("Unknown key binding '{}', ignoring", name);
            }
            key
        };
        Self {
            quit: parse(&config.controls.quit_key),
            fullscreen: parse(&config.controls.fullscreen_key),
            reload_shaders: parse(&config.controls.reload_shaders_key),
        }
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: the renderer must drop before the window it draws into.
struct App {
    config: Config,
    keys: KeyBindings,

    renderer: Option<Renderer>,
    shader_watcher: Option<ShaderWatcher>,
    window: Option<Arc<Window>>,
    is_fullscreen: bool,

    /// Error that stopped the event loop, reported from `main`
    fatal: Option<anyhow::Error>,

    start_time: Instant,
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    fn new(config: Config) -> Self {
        let is_fullscreen = config.window.fullscreen;
        let keys = KeyBindings::from_config(&config);
        let now = Instant::now();
        Self {
            config,
            keys,
            renderer: None,
            shader_watcher: None,
            window: None,
            is_fullscreen,
            fatal: None,
            start_time: now,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        if self.config.window.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let renderer = Renderer::new(&window, &self.config)?;

        if self.config.shaders.hot_reload {
            let shaders = [
                self.config.shaders.vertex.as_path(),
                self.config.shaders.fragment.as_path(),
            ];
            match ShaderWatcher::new(&shaders) {
                Ok(watcher) => self.shader_watcher = Some(watcher),
                Err(e) => log::warn!("Shader hot-reload disabled: {:#}", e),
            }
        }

        self.renderer = Some(renderer);
        self.window = Some(window);
        self.start_time = Instant::now();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn reload_shaders(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            if let Err(e) = renderer.reload_shaders() {
                log::error!("{:#}", e);
            }
        }
    }

    fn toggle_fullscreen(&mut self) {
        if let Some(ref window) = self.window {
            self.is_fullscreen = !self.is_fullscreen;

            if self.is_fullscreen {
                window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                log::info!("Entered fullscreen mode");
            } else {
                window.set_fullscreen(None);
                log::info!("Exited fullscreen mode");
            }
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self
            .shader_watcher
            .as_ref()
            .is_some_and(|watcher| watcher.take_changed())
        {
            self.reload_shaders();
        }

        let (Some(renderer), Some(window)) = (self.renderer.as_mut(), self.window.as_ref()) else {
            return;
        };

        let size = window.inner_size();
        let elapsed = self.start_time.elapsed().as_secs_f32();

        match renderer.draw(elapsed, (size.width, size.height)) {
            Ok(FrameStatus::Presented) => self.update_fps(),
            Ok(FrameStatus::Skipped) => {}
            Err(e) => self.fail(event_loop, e.context("Render error")),
        }
    }

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("Failed to initialize"));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize();
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                let PhysicalKey::Code(key) = event.physical_key else {
                    return;
                };

                if Some(key) == self.keys.quit {
                    log::info!("{:?} pressed, exiting...", key);
                    event_loop.exit();
                } else if Some(key) == self.keys.fullscreen {
                    self.toggle_fullscreen();
                } else if Some(key) == self.keys.reload_shaders {
                    self.reload_shaders();
                }
            }

            _ => {}
        }
    }

    /// Request continuous redraws so the quad keeps spinning
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref() {
            let _ = renderer.device().wait_idle();
        }
        // Drop GPU resources while the window is still alive
        self.renderer = None;
    }
}
