use crate::lighting::ShadowAlgorithm;

use super::FrameRenderer;

/// Requested shader float precision. wgpu always compiles WGSL at full
/// precision, so this is only a hint kept for hosts that log or forward it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Precision {
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(val: PowerPreference) -> Self {
        match val {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Declarative renderer configuration.
///
/// `alpha`, `antialias`, `precision` and `power_preference` are consumed when a
/// renderer is created. The rest is applied to an existing renderer by
/// `apply_options`.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererOptions {
    pub alpha: bool,
    pub antialias: bool,
    pub precision: Precision,
    pub power_preference: PowerPreference,
    /// Explicit pixel ratio. When `None` the device ratio is used, capped at
    /// `MAX_DEFAULT_PIXEL_RATIO`.
    pub pixel_ratio: Option<f32>,
    pub shadow_map_enabled: bool,
    /// Shadow filtering; `PcfSoft` if left unset.
    pub shadow_map_algorithm: Option<ShadowAlgorithm>,
}

impl RendererOptions {
    pub const MAX_DEFAULT_PIXEL_RATIO: f32 = 1.5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_antialias(mut self, antialias: bool) -> Self {
        self.antialias = antialias;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_power_preference(mut self, power_preference: PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = Some(ratio);
        self
    }

    pub fn with_shadow_map(mut self, algorithm: Option<ShadowAlgorithm>) -> Self {
        self.shadow_map_enabled = true;
        self.shadow_map_algorithm = algorithm;
        self
    }

    /// The pixel ratio these options resolve to on a device with
    /// `device_ratio`.
    pub fn resolve_pixel_ratio(&self, device_ratio: f32) -> f32 {
        match self.pixel_ratio {
            Some(ratio) => ratio,
            None => device_ratio.min(Self::MAX_DEFAULT_PIXEL_RATIO),
        }
    }

    /// Number of MSAA samples the options ask for.
    pub fn sample_count(&self) -> u32 {
        if self.antialias {
            4
        } else {
            1
        }
    }
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: true,
            precision: Precision::High,
            power_preference: PowerPreference::HighPerformance,
            pixel_ratio: None,
            shadow_map_enabled: false,
            shadow_map_algorithm: None,
        }
    }
}

/// Viewport a renderer is configured for, in logical pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Width divided by height, or one when either is zero.
    pub fn aspect(&self) -> f32 {
        if self.width > 0 && self.height > 0 {
            self.width as f32 / self.height as f32
        } else {
            1.0
        }
    }
}

/// Configure size, pixel ratio and shadow mapping on `renderer`.
///
/// Shadow mapping is only ever switched on here. Options that leave it off do
/// not disable shadows a renderer already has enabled.
pub fn apply_options(renderer: &mut dyn FrameRenderer, options: &RendererOptions, viewport: Viewport) {
    renderer.set_size(viewport.width, viewport.height);
    renderer.set_pixel_ratio(options.resolve_pixel_ratio(viewport.device_pixel_ratio));

    if options.shadow_map_enabled {
        let shadow_map = renderer.shadow_map_mut();
        shadow_map.enabled = true;
        shadow_map.algorithm = options.shadow_map_algorithm.unwrap_or(ShadowAlgorithm::PcfSoft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::HeadlessRenderer;

    #[test]
    fn defaults_match_the_common_setup() {
        let options = RendererOptions::default();
        assert!(options.alpha);
        assert!(options.antialias);
        assert_eq!(Precision::High, options.precision);
        assert_eq!(PowerPreference::HighPerformance, options.power_preference);
        assert!(!options.shadow_map_enabled);
        assert_eq!(4, options.sample_count());
    }

    #[test]
    fn pixel_ratio_is_capped_unless_explicit() {
        let options = RendererOptions::default();
        assert_eq!(1.5, options.resolve_pixel_ratio(3.0));
        assert_eq!(1.0, options.resolve_pixel_ratio(1.0));
        assert_eq!(2.0, options.with_pixel_ratio(2.0).resolve_pixel_ratio(3.0));
    }

    #[test]
    fn apply_options_configures_renderer() {
        let mut renderer = HeadlessRenderer::new();
        let options = RendererOptions::new().with_shadow_map(None);

        apply_options(&mut renderer, &options, Viewport::new(800, 600, 2.0));

        assert_eq!((800, 600), renderer.size());
        assert_eq!(1.5, renderer.pixel_ratio());
        assert!(renderer.shadow_map().enabled);
        assert_eq!(ShadowAlgorithm::PcfSoft, renderer.shadow_map().algorithm);
    }

    #[test]
    fn explicit_shadow_algorithm_is_kept() {
        let mut renderer = HeadlessRenderer::new();
        let options = RendererOptions::new().with_shadow_map(Some(ShadowAlgorithm::Basic));

        apply_options(&mut renderer, &options, Viewport::new(10, 10, 1.0));
        assert_eq!(ShadowAlgorithm::Basic, renderer.shadow_map().algorithm);
    }
}
