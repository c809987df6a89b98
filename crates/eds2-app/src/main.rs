// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use eds2_core::init_tracing;
use eds2_platform::{map_key, KeyCommand};
use eds2_render::{FrameOutcome, RenderSize, Renderer};
use eds2_render_vk::VkRenderer;
use eds2_scene::{test_scene, ControlAction, Demo, Refresh};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use eds2_platform::winit::{
    application::ApplicationHandler,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::ModifiersState,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowId},
};

mod config;

use config::{AppCfg, VsyncMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, default_value = "eds2.toml")]
    config: PathBuf,
    /// Override `[render] vsync_mode`
    #[arg(long, value_enum)]
    vsync_mode: Option<VsyncMode>,
}

/// Push whatever `refresh` asks for to the GPU side.
fn apply_refresh(
    renderer: &mut VkRenderer,
    demo: &mut Demo,
    refresh: Refresh,
) -> Result<()> {
    if refresh.contains(Refresh::UNIFORMS) {
        let aspect = renderer.size().aspect();
        renderer.update_uniforms(&demo.uniforms(aspect))?;
    }
    if refresh.contains(Refresh::COMMANDS) {
        renderer.record(demo).context("re-record")?;
    }
    Ok(())
}

struct App {
    cfg: AppCfg,
    demo: Demo,
    window: Option<Window>,
    renderer: Option<Box<VkRenderer>>,
    render_size: RenderSize,

    exiting: bool,
    frames: u32,
    last_fps_instant: Instant,
    last_update: Instant,

    paused: bool,
    modifiers: ModifiersState,
}

impl App {
    fn create_renderer(&self, window: &Window) -> Result<VkRenderer> {
        let wh = window.window_handle()?;
        let dh = window.display_handle()?;
        let mut r = VkRenderer::new(&wh, &dh, self.render_size, self.demo.scene().meshes())?;
        r.set_clear_color(self.cfg.render.clear_color);
        r.set_vsync(self.cfg.render.vsync);
        r.set_vsync_mode(self.cfg.render.vsync_mode.into());
        Ok(r)
    }

    fn refresh(&mut self, refresh: Refresh) {
        if refresh.is_empty() {
            return;
        }
        if let Some(r) = &mut self.renderer {
            if let Err(e) = apply_refresh(r, &mut self.demo, refresh) {
                error!("refresh {refresh:?} failed: {e:#}");
            }
        }
    }

    fn control(&mut self, action: ControlAction) {
        match self.demo.apply(action) {
            Ok(refresh) => self.refresh(refresh),
            Err(e) => warn!(?action, "control rejected: {e}"),
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        match self.demo.update(dt) {
            Ok(refresh) => self.refresh(refresh),
            Err(e) => error!("update failed: {e}"),
        }

        let Some(r) = &mut self.renderer else {
            return;
        };
        match r.render() {
            Ok(FrameOutcome::Presented) => {
                // count only frames that were actually rendered
                self.frames = self.frames.saturating_add(1);
            }
            Ok(FrameOutcome::Skipped) => {}
            Ok(FrameOutcome::NeedsRecord) => {
                self.refresh(Refresh::all());
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }
            Err(e) => error!("render error: {e:#}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match event_loop.create_window(
                Window::default_attributes().with_title("eds2: extended dynamic state 2"),
            ) {
                Ok(w) => w,
                Err(e) => {
                    error!("create_window: {e}");
                    event_loop.exit();
                    return;
                }
            };

            let size = window.inner_size();
            self.render_size = RenderSize {
                width: size.width.max(1),
                height: size.height.max(1),
            };

            match self.create_renderer(&window) {
                Ok(r) => {
                    info!(device = r.device_name(), "backend = vk");
                    self.renderer = Some(Box::new(r));
                }
                Err(e) => {
                    error!("vk init failed: {e:#}");
                    event_loop.exit();
                    return;
                }
            }
            info!("vsync cfg = {}", self.cfg.render.vsync);

            self.window = Some(window);
            self.refresh(Refresh::all());
        }

        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });

        self.paused = self.render_size.width == 0 || self.render_size.height == 0;
        info!("resumed → paused={}", self.paused);

        if !self.paused {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                self.render_size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                let now_paused = self.render_size.width == 0 || self.render_size.height == 0;
                if self.paused != now_paused {
                    self.paused = now_paused;
                    info!(
                        "Resized → {}x{} (paused={})",
                        self.render_size.width, self.render_size.height, self.paused
                    );
                }

                if !self.paused {
                    if let Some(r) = &mut self.renderer {
                        if let Err(e) = r.resize(self.render_size) {
                            error!("resize failed: {e:#}");
                        }
                    }
                    // aspect changed; commands are re-recorded on NeedsRecord
                    self.refresh(Refresh::UNIFORMS);
                    if let Some(w) = &self.window {
                        w.request_redraw();
                    }
                }
            }

            WindowEvent::Occluded(occluded) => {
                let now_paused =
                    occluded || self.render_size.width == 0 || self.render_size.height == 0;
                if self.paused != now_paused {
                    self.paused = now_paused;
                    info!("Occluded={} → paused={}", occluded, self.paused);
                }
            }

            WindowEvent::ModifiersChanged(m) => {
                self.modifiers = m.state();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match map_key(&event.logical_key, self.modifiers) {
                    Some(KeyCommand::Quit) => {
                        info!("Escape");
                        self.shutdown(event_loop);
                    }
                    Some(KeyCommand::Control(action)) => self.control(action),
                    None => {}
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                self.redraw();
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }

        if self.paused {
            // window-size=0 or occluded → sleep
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }

        // the animation needs a steady stream of frames; vsync paces them
        event_loop.set_control_flow(if self.cfg.render.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = config::load_cfg(&args.config);
    if let Some(mode) = args.vsync_mode {
        cfg.render.vsync_mode = mode;
    }
    let demo = Demo::new(test_scene(), &cfg.demo_config()).context("scene setup")?;

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let now = Instant::now();
    let mut app = App {
        cfg,
        demo,
        window: None,
        renderer: None,
        render_size: RenderSize {
            width: 1,
            height: 1,
        },
        exiting: false,
        frames: 0,
        last_fps_instant: now,
        last_update: now,
        paused: false,
        modifiers: ModifiersState::empty(),
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
