use winit::window::{Window, WindowId};

use crate::backend::soft::SoftBackend;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::gsg::GraphicsStateGuardian;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Drawable size in physical pixels; the framebuffer matches it.
    pub fn physical_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub gsg: &'a mut GraphicsStateGuardian<SoftBackend>,
    /// Seconds since the window opened.
    pub elapsed: f32,
    pub frame_index: u64,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Swaps the software framebuffer and puts the front plane on screen.
    pub fn present(&mut self) -> AppControl {
        let backend = self.gsg.backend_mut();
        backend.swap_buffers();
        let size = (backend.width(), backend.height());

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                let action = self.gpu.handle_surface_error(err);
                if action == SurfaceErrorAction::Fatal {
                    return AppControl::Exit;
                }
                return AppControl::Continue;
            }
        };

        if let Err(e) = self.gpu.present_rgba(&mut frame, size, self.gsg.backend().front_rgba()) {
            // Surface and framebuffer disagree for a frame after a resize.
            log::debug!("skipping present: {e:#}");
            return AppControl::Continue;
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);
        AppControl::Continue
    }
}
