//! Scene-level modes to backend vocabulary. Pure functions, no state.
//!
//! Functions returning `Option` yield `None` for modes the backend has no
//! mapping for; callers log and keep their prior state.

use crate::backend::{
    AddressMode, BlendFactor, CompareFunction, CullFace, FilterMode, FogEquation, FogParams,
    PolygonMode, StencilOperation, TexEnvMode,
};
use crate::scene::{
    ColorBlendMode, CompareMode, CullFaceMode, FilterType, Fog, FogMode, RenderMode, StencilAction,
    TextureApplyMode, TransparencyMode, WrapMode,
};

/// Comparison for an enabled test, `None` when the mode disables it.
pub fn compare_function(mode: CompareMode) -> Option<CompareFunction> {
    Some(match mode {
        CompareMode::None => return None,
        CompareMode::Never => CompareFunction::Never,
        CompareMode::Less => CompareFunction::Less,
        CompareMode::Equal => CompareFunction::Equal,
        CompareMode::LessEqual => CompareFunction::LessEqual,
        CompareMode::Greater => CompareFunction::Greater,
        CompareMode::NotEqual => CompareFunction::NotEqual,
        CompareMode::GreaterEqual => CompareFunction::GreaterEqual,
        CompareMode::Always => CompareFunction::Always,
    })
}

pub fn stencil_operation(action: StencilAction) -> StencilOperation {
    match action {
        StencilAction::Keep => StencilOperation::Keep,
        StencilAction::Zero => StencilOperation::Zero,
        StencilAction::Replace => StencilOperation::Replace,
        StencilAction::Increment => StencilOperation::IncrementClamp,
        StencilAction::Decrement => StencilOperation::DecrementClamp,
        StencilAction::Invert => StencilOperation::Invert,
    }
}

/// Blending as a whole: off, or on with a factor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendPlan {
    Off,
    On(BlendFactor, BlendFactor),
}

pub const ALPHA_BLEND: BlendPlan = BlendPlan::On(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);

pub fn color_blend(mode: ColorBlendMode) -> Option<BlendPlan> {
    match mode {
        ColorBlendMode::None => Some(BlendPlan::Off),
        ColorBlendMode::Multiply => Some(BlendPlan::On(BlendFactor::Dst, BlendFactor::Zero)),
        ColorBlendMode::Add => Some(BlendPlan::On(BlendFactor::One, BlendFactor::One)),
        ColorBlendMode::MultiplyAdd => Some(BlendPlan::On(BlendFactor::Dst, BlendFactor::One)),
        ColorBlendMode::Alpha => Some(ALPHA_BLEND),
        ColorBlendMode::Unknown(_) => None,
    }
}

/// The four fixed-function axes a transparency mode drives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransparencyPlan {
    pub alpha_to_one: bool,
    pub alpha_to_coverage: bool,
    pub blend: BlendPlan,
    /// Alpha test function and reference when enabled.
    pub alpha_test: Option<(CompareFunction, f32)>,
}

pub fn transparency(mode: TransparencyMode) -> Option<TransparencyPlan> {
    let off = TransparencyPlan {
        alpha_to_one: false,
        alpha_to_coverage: false,
        blend: BlendPlan::Off,
        alpha_test: None,
    };
    Some(match mode {
        TransparencyMode::None => off,
        TransparencyMode::Alpha | TransparencyMode::AlphaSorted => TransparencyPlan { blend: ALPHA_BLEND, ..off },
        TransparencyMode::Multisample => TransparencyPlan { alpha_to_one: true, alpha_to_coverage: true, ..off },
        TransparencyMode::MultisampleMask => TransparencyPlan { alpha_to_coverage: true, ..off },
        TransparencyMode::Binary => TransparencyPlan { alpha_test: Some((CompareFunction::Equal, 1.0)), ..off },
        TransparencyMode::Unknown(_) => return None,
    })
}

/// Face to cull, `Some(None)` for culling off.
pub fn cull_face(mode: CullFaceMode) -> Option<Option<CullFace>> {
    match mode {
        CullFaceMode::None => Some(None),
        CullFaceMode::Clockwise => Some(Some(CullFace::Back)),
        CullFaceMode::CounterClockwise => Some(Some(CullFace::Front)),
        CullFaceMode::All => Some(Some(CullFace::FrontAndBack)),
        CullFaceMode::Unknown(_) => None,
    }
}

pub fn polygon_mode(mode: RenderMode) -> Option<PolygonMode> {
    match mode {
        RenderMode::Filled => Some(PolygonMode::Fill),
        RenderMode::Wireframe => Some(PolygonMode::Line),
        RenderMode::Unknown(_) => None,
    }
}

pub fn tex_env(mode: TextureApplyMode) -> TexEnvMode {
    match mode {
        TextureApplyMode::Modulate => TexEnvMode::Modulate,
        TextureApplyMode::Decal => TexEnvMode::Decal,
        TextureApplyMode::Blend => TexEnvMode::Blend,
        TextureApplyMode::Replace => TexEnvMode::Replace,
        TextureApplyMode::Add => TexEnvMode::Add,
    }
}

pub fn wrap_mode(mode: WrapMode) -> AddressMode {
    match mode {
        WrapMode::Clamp => AddressMode::ClampToEdge,
        WrapMode::Repeat => AddressMode::Repeat,
        WrapMode::Mirror => AddressMode::MirrorRepeat,
    }
}

/// Minification filter and mip filter.
///
/// `force` promotes everything to trilinear and wins over `ignore`, which
/// drops the mip filter and keeps linear if either half of the mode was.
pub fn min_filter(filter: FilterType, force: bool, ignore: bool) -> (FilterMode, Option<FilterMode>) {
    if force {
        return (FilterMode::Linear, Some(FilterMode::Linear));
    }
    if ignore {
        return (without_mipmaps(filter), None);
    }
    match filter {
        FilterType::Nearest => (FilterMode::Nearest, None),
        FilterType::Linear => (FilterMode::Linear, None),
        FilterType::NearestMipmapNearest => (FilterMode::Nearest, Some(FilterMode::Nearest)),
        FilterType::LinearMipmapNearest => (FilterMode::Linear, Some(FilterMode::Nearest)),
        FilterType::NearestMipmapLinear => (FilterMode::Nearest, Some(FilterMode::Linear)),
        FilterType::LinearMipmapLinear => (FilterMode::Linear, Some(FilterMode::Linear)),
    }
}

/// Magnification never uses mip levels. `force` makes it linear.
pub fn mag_filter(filter: FilterType, force: bool, ignore: bool) -> FilterMode {
    if force {
        return FilterMode::Linear;
    }
    if ignore {
        return without_mipmaps(filter);
    }
    match filter {
        FilterType::Nearest | FilterType::NearestMipmapNearest | FilterType::NearestMipmapLinear => {
            FilterMode::Nearest
        }
        FilterType::Linear | FilterType::LinearMipmapNearest | FilterType::LinearMipmapLinear => FilterMode::Linear,
    }
}

fn without_mipmaps(filter: FilterType) -> FilterMode {
    match filter {
        FilterType::Nearest | FilterType::NearestMipmapNearest => FilterMode::Nearest,
        _ => FilterMode::Linear,
    }
}

#[inline]
pub fn uses_mipmaps(filter: FilterType, force: bool, ignore: bool) -> bool {
    min_filter(filter, force, ignore).1.is_some()
}

pub fn fog(fog: &Fog) -> FogParams {
    let equation = match fog.mode {
        FogMode::Linear { start, end } => FogEquation::Linear { start, end },
        FogMode::Exponential { density } => FogEquation::Exp { density },
        FogMode::ExponentialSquared { density } => FogEquation::Exp2 { density },
    };
    FogParams { equation, color: fog.color }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;

    #[test]
    fn none_modes_disable() {
        assert_eq!(compare_function(CompareMode::None), None);
        assert_eq!(compare_function(CompareMode::LessEqual), Some(CompareFunction::LessEqual));
        assert_eq!(color_blend(ColorBlendMode::None), Some(BlendPlan::Off));
        assert_eq!(cull_face(CullFaceMode::None), Some(None));
    }

    #[test]
    fn color_blend_pairs() {
        assert_eq!(color_blend(ColorBlendMode::Multiply), Some(BlendPlan::On(BlendFactor::Dst, BlendFactor::Zero)));
        assert_eq!(color_blend(ColorBlendMode::Add), Some(BlendPlan::On(BlendFactor::One, BlendFactor::One)));
        assert_eq!(color_blend(ColorBlendMode::MultiplyAdd), Some(BlendPlan::On(BlendFactor::Dst, BlendFactor::One)));
        assert_eq!(color_blend(ColorBlendMode::Alpha), Some(ALPHA_BLEND));
        assert_eq!(color_blend(ColorBlendMode::Unknown(7)), None);
    }

    #[test]
    fn transparency_axes() {
        let binary = transparency(TransparencyMode::Binary).unwrap();
        assert_eq!(binary.alpha_test, Some((CompareFunction::Equal, 1.0)));
        assert_eq!(binary.blend, BlendPlan::Off);

        let ms = transparency(TransparencyMode::MultisampleMask).unwrap();
        assert!(ms.alpha_to_coverage && !ms.alpha_to_one);

        assert_eq!(transparency(TransparencyMode::AlphaSorted).unwrap().blend, ALPHA_BLEND);
        assert!(transparency(TransparencyMode::Unknown(3)).is_none());
    }

    #[test]
    fn force_mipmaps_wins_over_ignore() {
        assert_eq!(min_filter(FilterType::Nearest, true, true), (FilterMode::Linear, Some(FilterMode::Linear)));
        assert_eq!(min_filter(FilterType::LinearMipmapNearest, false, true), (FilterMode::Linear, None));
        assert!(uses_mipmaps(FilterType::NearestMipmapLinear, false, false));
        assert!(!uses_mipmaps(FilterType::Linear, false, false));
        assert_eq!(mag_filter(FilterType::NearestMipmapLinear, false, false), FilterMode::Nearest);
    }

    #[test]
    fn ignored_mipmaps_keep_any_linear_half() {
        assert_eq!(min_filter(FilterType::NearestMipmapLinear, false, true), (FilterMode::Linear, None));
        assert_eq!(min_filter(FilterType::NearestMipmapNearest, false, true), (FilterMode::Nearest, None));
        assert_eq!(mag_filter(FilterType::NearestMipmapLinear, false, true), FilterMode::Linear);
    }

    #[test]
    fn forced_mipmaps_magnify_linearly() {
        assert_eq!(mag_filter(FilterType::Nearest, true, false), FilterMode::Linear);
        assert_eq!(mag_filter(FilterType::Nearest, false, false), FilterMode::Nearest);
    }

    #[test]
    fn fog_equations() {
        let p = fog(&Fog::linear(1.0, 10.0, Color::BLACK));
        assert_eq!(p.equation, FogEquation::Linear { start: 1.0, end: 10.0 });
        assert_eq!(wrap_mode(WrapMode::Mirror), AddressMode::MirrorRepeat);
        assert_eq!(tex_env(TextureApplyMode::Decal), TexEnvMode::Decal);
        assert_eq!(stencil_operation(StencilAction::Increment), StencilOperation::IncrementClamp);
        assert_eq!(polygon_mode(RenderMode::Wireframe), Some(PolygonMode::Line));
    }
}
