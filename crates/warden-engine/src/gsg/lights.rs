//! Light and clip-plane slots.
//!
//! Both resources go through a [`SlotPool`]: an item that keeps its slot
//! between issues is a cache hit and only has its enable flag touched.
//! Parameters are uploaded in view space, with the camera's view matrix
//! loaded as the modelview.

use std::rc::Rc;

use glam::Vec3;

use super::GraphicsStateGuardian;
use super::slots::{Assignment, SlotPool};
use crate::backend::{Backend, Capability, LightParams, MatrixMode};
use crate::paint::Color;
use crate::scene::{ClipPlaneAttrib, Light, LightAttrib};

/// Everything uploaded for one slot-based light.
pub(crate) fn light_params(light: &Light) -> LightParams {
    match *light {
        Light::Ambient { color } => LightParams { ambient: color, ..LightParams::default() },
        Light::Point { color, specular, position, attenuation } => LightParams {
            diffuse: color,
            specular,
            position: position.extend(1.0),
            attenuation,
            ..LightParams::default()
        },
        Light::Directional { color, specular, direction } => LightParams {
            diffuse: color,
            specular,
            // Toward the light.
            position: (-direction.normalize_or(Vec3::NEG_Z)).extend(0.0),
            ..LightParams::default()
        },
        Light::Spot { color, specular, position, direction, exponent, cutoff, attenuation } => LightParams {
            diffuse: color,
            specular,
            position: position.extend(1.0),
            spot_direction: direction,
            spot_exponent: exponent,
            spot_cutoff: cutoff,
            attenuation,
            ..LightParams::default()
        },
    }
}

/// Places every item of `active`, returning the slots that need an upload.
/// Items that find no slot are logged and dropped.
fn allocate<K: Clone + super::SlotIdentity>(pool: &mut SlotPool<K>, active: &[K], what: &str) -> Vec<(usize, K)> {
    pool.begin_pass();
    let mut uploads = Vec::new();
    for item in active {
        match pool.assign(item, active) {
            Some(Assignment::Hit(_)) => {}
            Some(Assignment::Bound(slot)) => uploads.push((slot, item.clone())),
            None => log::error!("all {} {what} slots in use; dropping one", pool.len()),
        }
    }
    uploads
}

impl<B: Backend> GraphicsStateGuardian<B> {
    pub fn issue_light(&mut self, attrib: &LightAttrib) {
        let mut ambient = Color::BLACK;
        let mut any_ambient = false;
        let mut active: Vec<Rc<Light>> = Vec::with_capacity(attrib.lights.len());
        for light in &attrib.lights {
            match **light {
                Light::Ambient { color } => {
                    ambient += color;
                    any_ambient = true;
                }
                _ => active.push(light.clone()),
            }
        }

        let uploads = allocate(&mut self.lights, &active, "light");
        if !uploads.is_empty() {
            self.in_view_space(|gsg| {
                for (slot, light) in &uploads {
                    log::trace!("light slot {slot} <- {}", light.kind_name());
                    gsg.backend.light(*slot, &light_params(light));
                }
            });
        }
        for slot in 0..self.lights.len() {
            let on = self.lights.is_claimed(slot);
            self.enable_light_slot(slot, on);
        }

        if self.lights.claimed_count() == 0 && !any_ambient {
            self.enable(Capability::LIGHTING, false);
        } else {
            self.enable(Capability::LIGHTING, true);
            self.set_light_model_ambient(Color { a: 1.0, ..ambient });
            self.lighting_enabled_this_frame = true;
        }
        self.report_errors();
    }

    pub fn issue_clip_plane(&mut self, attrib: &ClipPlaneAttrib) {
        let uploads = allocate(&mut self.clip_planes, &attrib.planes, "clip plane");
        if !uploads.is_empty() {
            self.in_view_space(|gsg| {
                for (slot, plane) in &uploads {
                    gsg.backend.clip_plane(*slot, plane.plane);
                }
            });
        }
        for slot in 0..self.clip_planes.len() {
            let on = self.clip_planes.is_claimed(slot);
            self.enable_clip_plane_slot(slot, on);
        }
        self.report_errors();
    }

    /// Runs `upload` with the bare view matrix as modelview, then puts the
    /// current transform back.
    fn in_view_space(&mut self, upload: impl FnOnce(&mut Self)) {
        self.load_matrix(MatrixMode::ModelView, self.view);
        upload(self);
        self.load_matrix(MatrixMode::ModelView, self.view * self.transform);
    }

    /// Slots currently enabled.
    pub fn enabled_light_slots(&self) -> usize {
        self.state.lights.iter().filter(|on| **on).count()
    }

    pub fn enabled_clip_planes(&self) -> usize {
        self.state.clip_planes.iter().filter(|on| **on).count()
    }

    /// Turns every light off, leaving slot bindings for the next frame's
    /// cache hits.
    pub(crate) fn disable_all_lights(&mut self) {
        for slot in 0..self.lights.len() {
            self.enable_light_slot(slot, false);
        }
        self.enable(Capability::LIGHTING, false);
        self.attribs.set(crate::scene::Attrib::Light(LightAttrib::default()));
    }
}
