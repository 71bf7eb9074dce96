//! Warden studio: renders a small scene through the guardian's software
//! backend and presents it with wgpu.
//!
//! The static part of the scene is rendered once, captured with
//! `save_frame_buffer`, and restored every frame before the moving cube is
//! drawn over it. Resizing drops the capture.

mod scene;

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowId;

use warden_engine::backend::RenderBuffer;
use warden_engine::config::GsgConfig;
use warden_engine::coords::Vec3;
use warden_engine::core::{App, AppControl, FrameCtx};
use warden_engine::device::GpuInit;
use warden_engine::gsg::{Camera, ClearRequest, RenderRegion, SavedFrameBuffer};
use warden_engine::logging::{LoggingConfig, init_logging};
use warden_engine::window::{Runtime, RuntimeConfig};

use scene::DemoScene;

const CONFIG_PATH: &str = "warden.toml";

struct Studio {
    scene: DemoScene,
    cameras: HashMap<WindowId, Camera>,
    backgrounds: HashMap<WindowId, SavedFrameBuffer>,
    /// Windows whose capture predates their current size.
    stale: Vec<WindowId>,
}

impl Studio {
    fn new() -> Self {
        Self {
            scene: DemoScene::new(),
            cameras: HashMap::new(),
            backgrounds: HashMap::new(),
            stale: Vec::new(),
        }
    }
}

impl App for Studio {
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                AppControl::Exit
            }
            WindowEvent::CloseRequested => {
                self.cameras.remove(&window_id);
                // The guardian goes with the window and releases the capture's texture.
                self.backgrounds.remove(&window_id);
                AppControl::Continue
            }
            _ => AppControl::Continue,
        }
    }

    fn on_resize(&mut self, window_id: WindowId, width: u32, height: u32) {
        let aspect = width as f32 / height.max(1) as f32;
        let camera = Camera::perspective(50f32.to_radians(), aspect, 0.5, 40.0).looking_at(
            Vec3::new(0.0, 3.2, 8.0),
            Vec3::new(0.0, 0.6, 0.0),
            Vec3::Y,
        );
        self.cameras.insert(window_id, camera);
        self.stale.push(window_id);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let id = ctx.window.id;
        let Some(camera) = self.cameras.get(&id).copied() else {
            return AppControl::Continue;
        };
        if !ctx.gsg.activate() {
            log::error!("guardian for {id:?} lost its context");
            return AppControl::Exit;
        }
        let region = ctx.gsg.full_region();

        if let Some(pos) = self.stale.iter().position(|w| *w == id) {
            self.stale.swap_remove(pos);
            if let Some(old) = self.backgrounds.remove(&id) {
                ctx.gsg.discard_frame_buffer(old);
            }
        }

        match self.backgrounds.get(&id) {
            Some(saved) => ctx.gsg.restore_frame_buffer(saved),
            None => {
                let background = RenderRegion {
                    region,
                    clear: Some(ClearRequest::back_and_depth(self.scene.fog_color())),
                    camera,
                    scene: Rc::new(self.scene.background()),
                };
                if !ctx.gsg.render_frame(&[background]) {
                    return AppControl::Exit;
                }
                let saved = ctx.gsg.save_frame_buffer(RenderBuffer::BACK | RenderBuffer::DEPTH, region);
                log::info!("captured background {}x{}", region.width, region.height);
                self.backgrounds.insert(id, saved);
            }
        }

        let moving = RenderRegion { region, clear: None, camera, scene: Rc::new(self.scene.cube(ctx.elapsed)) };
        if !ctx.gsg.render_frame(&[moving]) {
            return AppControl::Exit;
        }

        if ctx.frame_index % 300 == 0 {
            log::debug!(
                "frame {}: {} textures prepared, {} guardian errors",
                ctx.frame_index,
                ctx.gsg.prepared_textures(),
                ctx.gsg.errors_reported()
            );
        }
        ctx.present()
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gsg = GsgConfig::load(CONFIG_PATH);
    log::info!("decal mode {:?}", gsg.decal_mode);

    let config = RuntimeConfig { title: "Warden Studio".to_string(), gsg, ..RuntimeConfig::default() };
    Runtime::run(config, GpuInit::default(), Studio::new())
}
