//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and windows. Each window gets a wgpu surface
//! and a guardian over a software framebuffer of the window's size.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
