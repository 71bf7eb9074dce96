//! Core engine-facing contracts.
//!
//! The interface between the runtime (platform loop) and applications: an
//! [`App`] is called once per frame per window with a [`FrameCtx`] holding
//! that window's guardian and GPU.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
