//! Guardian configuration (`warden.toml` + `WARDEN_*` environment overrides).
//!
//! Read once when a guardian is built. Changing a loaded config afterwards
//! has no effect on guardians that already exist.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How coplanar decal geometry is layered over its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecalMode {
    /// Depth bias proportional to the nesting level.
    #[default]
    Offset,
    /// Three-pass: base redrawn with color writes masked off.
    Mask,
    /// Three-pass: base redrawn with a (zero, one) blend instead of a color mask.
    Blend,
}

impl DecalMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" => Some(Self::Offset),
            "mask" => Some(Self::Mask),
            "blend" => Some(Self::Blend),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsgConfig {
    #[serde(default)]
    pub decal_mode: DecalMode,
    /// Build mip chains for every texture, whatever its min filter says.
    #[serde(default)]
    pub force_mipmaps: bool,
    /// Never build mip chains; mip filters degrade to their base filter.
    /// `force_mipmaps` wins when both are set.
    #[serde(default)]
    pub ignore_mipmaps: bool,
    /// Fill mip levels with a per-level palette color. Debug builds only.
    #[serde(default)]
    pub show_mipmaps: bool,
    /// Ask the backend for the fastest perspective correction.
    #[serde(default)]
    pub cheap_textures: bool,
    #[serde(default = "default_true")]
    pub auto_normalize_lighting: bool,
    #[serde(default = "default_max_copy_texture_size")]
    pub max_copy_texture_size: u32,
    #[serde(default = "default_decal_offset_per_level")]
    pub decal_offset_per_level: f32,
}

fn default_true() -> bool { true }
fn default_max_copy_texture_size() -> u32 { 4096 }
fn default_decal_offset_per_level() -> f32 { -2.0 }

impl Default for GsgConfig {
    fn default() -> Self {
        Self {
            decal_mode: DecalMode::default(),
            force_mipmaps: false,
            ignore_mipmaps: false,
            show_mipmaps: false,
            cheap_textures: false,
            auto_normalize_lighting: true,
            max_copy_texture_size: default_max_copy_texture_size(),
            decal_offset_per_level: default_decal_offset_per_level(),
        }
    }
}

impl GsgConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Loads a config file, falling back to defaults when the file is
    /// missing or malformed. Environment overrides are applied on top.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text).unwrap_or_else(|e| {
                log::warn!("ignoring invalid config {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                log::warn!("no config at {} ({e}); using defaults", path.display());
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Applies `WARDEN_DECAL_MODE`, `WARDEN_FORCE_MIPMAPS`,
    /// `WARDEN_IGNORE_MIPMAPS` and `WARDEN_SHOW_MIPMAPS`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("WARDEN_DECAL_MODE") {
            match DecalMode::parse(&v) {
                Some(mode) => self.decal_mode = mode,
                None => log::warn!("WARDEN_DECAL_MODE: unknown mode {v:?}"),
            }
        }
        let flags = [
            ("WARDEN_FORCE_MIPMAPS", &mut self.force_mipmaps),
            ("WARDEN_IGNORE_MIPMAPS", &mut self.ignore_mipmaps),
            ("WARDEN_SHOW_MIPMAPS", &mut self.show_mipmaps),
        ];
        for (key, slot) in flags {
            if let Some(v) = lookup(key) {
                match parse_flag(&v) {
                    Some(b) => *slot = b,
                    None => log::warn!("{key}: expected a boolean, got {v:?}"),
                }
            }
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "#t" => Some(true),
        "0" | "false" | "no" | "off" | "#f" => Some(false),
        _ => None,
    }
}
