use crate::paint::Color;

/// Surface material. An absent ambient or diffuse color means "take it
/// from the vertex color".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Option<Color>,
    pub diffuse: Option<Color>,
    pub specular: Color,
    pub emission: Color,
    pub shininess: f32,
    pub local: bool,
    pub two_side: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: None,
            diffuse: None,
            specular: Color::BLACK,
            emission: Color::BLACK,
            shininess: 0.0,
            local: false,
            two_side: false,
        }
    }
}

impl Material {
    pub fn diffuse(color: Color) -> Self {
        Self { ambient: Some(color), diffuse: Some(color), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FogMode {
    Linear { start: f32, end: f32 },
    Exponential { density: f32 },
    ExponentialSquared { density: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub mode: FogMode,
    pub color: Color,
}

impl Fog {
    pub fn linear(start: f32, end: f32, color: Color) -> Self {
        Self { mode: FogMode::Linear { start, end }, color }
    }

    pub fn exponential(density: f32, color: Color) -> Self {
        Self { mode: FogMode::Exponential { density }, color }
    }
}
