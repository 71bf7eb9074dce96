//! GPU device, surface and presentation.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue, configures the window
//! surface, and blits the software framebuffer onto it each frame.

mod blit;
mod gpu;

pub use blit::FramebufferBlit;
pub use gpu::{Gpu, GpuFrame, GpuInit, SurfaceErrorAction};
