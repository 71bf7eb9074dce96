//! Warden engine crate.
//!
//! A graphics state guardian ([`gsg::GraphicsStateGuardian`]) that sits
//! between a scene traversal and an immediate-mode [`backend::Backend`],
//! plus the platform + GPU runtime the studio uses to put the result on
//! screen.

pub mod backend;
pub mod config;
pub mod coords;
pub mod gsg;
pub mod paint;
pub mod scene;

pub mod core;
pub mod device;
pub mod logging;
pub mod window;
