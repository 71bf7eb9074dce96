//! Demo scene: a fogged checker floor with a decal stripe, and a lit cube
//! spinning above it.

use std::rc::Rc;

use warden_engine::backend::PixelBuffer;
use warden_engine::coords::{Mat4, Vec2, Vec3};
use warden_engine::paint::Color;
use warden_engine::scene::{
    Attrib, Binding, CompareMode, FilterType, Fog, FogAttrib, Geom, GeomNode, Light, LightAttrib, Material,
    MaterialAttrib, SceneNode, Texture, TextureApplyMode, TextureAttrib, WrapMode,
};

const FLOOR_HALF: f32 = 4.0;
const CUBE_HALF: f32 = 0.6;

/// Shared scene resources; nodes are rebuilt from these each frame.
pub struct DemoScene {
    checker: Rc<Texture>,
    sun: Rc<Light>,
    sky: Rc<Light>,
    fog: Fog,
}

impl DemoScene {
    pub fn new() -> Self {
        Self {
            checker: Rc::new(
                Texture::new("checker", checker(64, 8))
                    .with_wrap(WrapMode::Repeat, WrapMode::Repeat)
                    .with_filters(FilterType::LinearMipmapLinear, FilterType::Linear),
            ),
            sun: Rc::new(Light::directional(Color::rgb(1.0, 0.95, 0.85), Vec3::new(-0.4, -1.0, -0.6))),
            sky: Rc::new(Light::ambient(Color::rgb(0.25, 0.27, 0.32))),
            fog: Fog::linear(6.0, 18.0, Color::rgb(0.55, 0.6, 0.68)),
        }
    }

    pub fn fog_color(&self) -> Color {
        self.fog.color
    }

    fn lights(&self) -> Attrib {
        Attrib::Light(LightAttrib::new([self.sun.clone(), self.sky.clone()]))
    }

    /// Everything that does not move: the floor and its decal.
    pub fn background(&self) -> SceneNode {
        let stripe = SceneNode::new("stripe")
            .with_attrib(Attrib::Texture(TextureAttrib::Off))
            .with_attrib(Attrib::Material(MaterialAttrib::On(Material::diffuse(Color::rgb(0.85, 0.2, 0.15)))))
            .with_geometry(GeomNode::new("stripe").with_geom(flat_quad(Vec2::new(-3.0, -0.3), Vec2::new(3.0, 0.3))));

        let floor = SceneNode::new("floor")
            .with_attrib(Attrib::Texture(TextureAttrib::On(self.checker.clone())))
            .with_attrib(Attrib::TextureApply(TextureApplyMode::Modulate))
            .with_attrib(Attrib::Material(MaterialAttrib::On(Material::diffuse(Color::WHITE))))
            .with_geometry(GeomNode::new("floor").with_geom(
                flat_quad(Vec2::splat(-FLOOR_HALF), Vec2::splat(FLOOR_HALF)).with_texcoords(
                    Binding::PerVertex,
                    vec![Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(4.0, 4.0), Vec2::new(0.0, 4.0)],
                ),
            ))
            .with_child(stripe)
            .as_decal();

        self.root("background").with_child(floor)
    }

    /// The cube at time `t` seconds.
    pub fn cube(&self, t: f32) -> SceneNode {
        let transform = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
            * Mat4::from_rotation_y(t * 0.8)
            * Mat4::from_rotation_x(t * 0.35);
        let cube = SceneNode::new("cube")
            .with_attrib(Attrib::Transform(transform))
            .with_attrib(Attrib::Material(MaterialAttrib::On(Material {
                specular: Color::rgb(0.6, 0.6, 0.6),
                shininess: 32.0,
                ..Material::diffuse(Color::rgb(0.95, 0.6, 0.15))
            })))
            .with_geometry(GeomNode::new("cube").with_geom(cube_geom(CUBE_HALF)));
        self.root("moving").with_child(cube)
    }

    fn root(&self, name: &str) -> SceneNode {
        SceneNode::new(name)
            .with_attrib(self.lights())
            .with_attrib(Attrib::Fog(FogAttrib::On(self.fog)))
            .with_attrib(Attrib::DepthTest(CompareMode::Less))
    }
}

/// Quad in the y = 0 plane facing +Y, from `min` to `max` in (x, z).
fn flat_quad(min: Vec2, max: Vec2) -> Geom {
    Geom::quads(vec![
        Vec3::new(min.x, 0.0, max.y),
        Vec3::new(max.x, 0.0, max.y),
        Vec3::new(max.x, 0.0, min.y),
        Vec3::new(min.x, 0.0, min.y),
    ])
    .with_normals(Binding::Overall, vec![Vec3::Y])
}

fn cube_geom(half: f32) -> Geom {
    // (normal, u, v) with u × v = normal, so every face winds outward.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut coords = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(6);
    for (n, u, v) in faces {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            coords.push((n + u * su + v * sv) * half);
        }
        normals.push(n);
    }
    Geom::quads(coords).with_normals(Binding::PerPrimitive, normals)
}

fn checker(size: u32, cells: u32) -> PixelBuffer {
    let cell = (size / cells).max(1);
    let mut bytes = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if ((x / cell) + (y / cell)) % 2 == 0 { 235 } else { 90 };
            bytes.extend_from_slice(&[v, v, v, 255]);
        }
    }
    PixelBuffer::rgba8(size, size, bytes)
}
