use glam::{Vec3, Vec4};

use crate::paint::Color;

/// A logical light. Shared by identity (`Rc<Light>`): two lights with equal
/// parameters are still two lights.
#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Contributes to the global ambient term; occupies no slot.
    Ambient { color: Color },
    Point {
        color: Color,
        specular: Color,
        position: Vec3,
        /// Constant, linear, quadratic.
        attenuation: [f32; 3],
    },
    Directional {
        color: Color,
        specular: Color,
        /// Direction the light travels.
        direction: Vec3,
    },
    Spot {
        color: Color,
        specular: Color,
        position: Vec3,
        direction: Vec3,
        exponent: f32,
        /// Half-angle of the cone, in degrees.
        cutoff: f32,
        attenuation: [f32; 3],
    },
}

impl Light {
    pub fn ambient(color: Color) -> Self {
        Light::Ambient { color }
    }

    pub fn point(color: Color, position: Vec3) -> Self {
        Light::Point { color, specular: color, position, attenuation: [1.0, 0.0, 0.0] }
    }

    pub fn directional(color: Color, direction: Vec3) -> Self {
        Light::Directional { color, specular: color, direction }
    }

    pub fn spot(color: Color, position: Vec3, direction: Vec3, cutoff: f32) -> Self {
        Light::Spot {
            color,
            specular: color,
            position,
            direction,
            exponent: 0.0,
            cutoff,
            attenuation: [1.0, 0.0, 0.0],
        }
    }

    #[inline]
    pub fn is_ambient(&self) -> bool {
        matches!(self, Light::Ambient { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Light::Ambient { .. } => "ambient",
            Light::Point { .. } => "point",
            Light::Directional { .. } => "directional",
            Light::Spot { .. } => "spot",
        }
    }
}

/// A user clip plane `ax + by + cz + d = 0`; the positive side is kept.
/// Shared by identity like [`Light`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane {
    pub plane: Vec4,
}

impl ClipPlane {
    pub fn new(plane: Vec4) -> Self {
        Self { plane }
    }

    /// Plane through `point` keeping the half-space `normal` points into.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalize_or_zero();
        Self { plane: n.extend(-n.dot(point)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_from_point_normal_keeps_normal_side() {
        let p = ClipPlane::from_point_normal(Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        assert_eq!(p.plane, Vec4::new(0.0, 1.0, 0.0, -2.0));
        assert!(p.plane.dot(Vec4::new(0.0, 3.0, 0.0, 1.0)) > 0.0);
    }

    #[test]
    fn only_ambient_is_ambient() {
        assert!(Light::ambient(Color::WHITE).is_ambient());
        assert!(!Light::point(Color::WHITE, Vec3::ZERO).is_ambient());
        assert_eq!(Light::directional(Color::WHITE, Vec3::NEG_Z).kind_name(), "directional");
    }
}
