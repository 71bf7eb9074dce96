//! Coordinate types shared by the guardian and its backends.
//!
//! Framebuffer space:
//! - Integer pixels
//! - Origin bottom-left
//! - +X right, +Y up
//!
//! Vector and matrix math uses `glam`; the common types are re-exported here.

mod region;

pub use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
pub use region::Region;
