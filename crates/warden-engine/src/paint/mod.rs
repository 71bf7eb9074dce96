//! Color model shared by lights, materials, fog, clears and vertex colors.

pub mod color;

pub use color::Color;
