//! Light nodes and their shadow state.
//!
//! Light variants are a closed sum type. Everything that depends on the kind of
//! light (its display name, whether it has a position, whether it can cast
//! shadows, which shadow camera it uses) is decided by an exhaustive match so a
//! new variant cannot silently fall through to a generic default.
use glam::Mat4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;

/// The concrete kind of a light along with any kind-specific parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
    Hemisphere { ground_color: Color },
    RectArea { width: f32, height: f32 },
    /// A light imported from an asset whose kind is not recognized.
    Unknown,
}

/// Discriminant of `LightKind` as exposed to the light panel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    #[serde(rename = "AmbientLight")]
    Ambient,
    #[serde(rename = "DirectionalLight")]
    Directional,
    #[serde(rename = "PointLight")]
    Point,
    #[serde(rename = "SpotLight")]
    Spot,
    #[serde(rename = "HemisphereLight")]
    Hemisphere,
    #[serde(rename = "RectAreaLight")]
    RectArea,
    #[serde(rename = "Light")]
    Light,
}

impl LightType {
    /// Name used when generating `"<Type> <n>"` names for unnamed lights.
    pub fn type_name(&self) -> &'static str {
        match self {
            LightType::Ambient => "AmbientLight",
            LightType::Directional => "DirectionalLight",
            LightType::Point => "PointLight",
            LightType::Spot => "SpotLight",
            LightType::Hemisphere => "HemisphereLight",
            LightType::RectArea => "RectAreaLight",
            LightType::Light => "Light",
        }
    }
}

impl std::fmt::Display for LightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

impl LightKind {
    pub fn light_type(&self) -> LightType {
        match self {
            LightKind::Ambient => LightType::Ambient,
            LightKind::Directional => LightType::Directional,
            LightKind::Point => LightType::Point,
            LightKind::Spot => LightType::Spot,
            LightKind::Hemisphere { .. } => LightType::Hemisphere,
            LightKind::RectArea { .. } => LightType::RectArea,
            LightKind::Unknown => LightType::Light,
        }
    }

    /// Ambient light illuminates everything equally and has no meaningful
    /// position.
    pub fn has_position(&self) -> bool {
        match self {
            LightKind::Ambient => false,
            LightKind::Directional
            | LightKind::Point
            | LightKind::Spot
            | LightKind::Hemisphere { .. }
            | LightKind::RectArea { .. }
            | LightKind::Unknown => true,
        }
    }

    /// Only directional, spot and point lights render shadow maps.
    pub fn can_cast_shadow(&self) -> bool {
        match self {
            LightKind::Directional | LightKind::Point | LightKind::Spot => true,
            LightKind::Ambient
            | LightKind::Hemisphere { .. }
            | LightKind::RectArea { .. }
            | LightKind::Unknown => false,
        }
    }

    /// The shadow camera a freshly created light of this kind starts with.
    fn default_shadow_camera(&self) -> Option<ShadowCamera> {
        match self {
            LightKind::Directional => Some(ShadowCamera::Orthographic {
                left: -5.0,
                right: 5.0,
                top: 5.0,
                bottom: -5.0,
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Spot => Some(ShadowCamera::Perspective {
                fov_y_degrees: 50.0,
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Point => Some(ShadowCamera::Perspective {
                fov_y_degrees: 90.0,
                near: 0.5,
                far: 500.0,
            }),
            LightKind::Ambient
            | LightKind::Hemisphere { .. }
            | LightKind::RectArea { .. }
            | LightKind::Unknown => None,
        }
    }
}

/// A light living in a scene graph. Position and visibility are properties of
/// the owning node, not of the light itself.
#[derive(Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
    /// Present only for kinds that can cast shadows.
    pub shadow: Option<LightShadow>,
}

impl Light {
    pub fn new(kind: LightKind, color: Color, intensity: f32) -> Self {
        let shadow = kind.default_shadow_camera().map(LightShadow::new);

        Self {
            kind,
            color,
            intensity,
            cast_shadow: false,
            shadow,
        }
    }

    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Ambient, color, intensity)
    }

    pub fn directional(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Directional, color, intensity)
    }

    pub fn point(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Point, color, intensity)
    }

    pub fn spot(color: Color, intensity: f32) -> Self {
        Self::new(LightKind::Spot, color, intensity)
    }

    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    /// True if this light is configured to cast shadows and is able to.
    pub fn casts_active_shadow(&self) -> bool {
        self.cast_shadow && self.shadow.is_some()
    }
}

/// Filtering algorithm used when sampling shadow maps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowAlgorithm {
    Basic,
    Pcf,
    #[default]
    PcfSoft,
}

/// A shadow depth map allocated by a renderer for one light.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowMap {
    pub resolution: u32,
    /// Incremented by the renderer each time the map is regenerated.
    pub generation: u64,
}

/// Projection used when rendering a light's shadow map.
#[derive(Clone, Debug, PartialEq)]
pub enum ShadowCamera {
    Orthographic {
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    },
    Perspective {
        fov_y_degrees: f32,
        near: f32,
        far: f32,
    },
}

impl ShadowCamera {
    /// Recompute the projection matrix for the current frustum parameters.
    pub fn projection_matrix(&self) -> Result<Mat4, ShadowCameraError> {
        match *self {
            ShadowCamera::Orthographic {
                left,
                right,
                top,
                bottom,
                near,
                far,
            } => {
                if !(right > left && top > bottom && far > near) {
                    return Err(ShadowCameraError::DegenerateFrustum { near, far });
                }

                Ok(Mat4::orthographic_rh(left, right, bottom, top, near, far))
            }
            ShadowCamera::Perspective {
                fov_y_degrees,
                near,
                far,
            } => {
                if !(near > 0.0 && far > near && fov_y_degrees > 0.0 && fov_y_degrees < 180.0) {
                    return Err(ShadowCameraError::DegenerateFrustum { near, far });
                }

                Ok(Mat4::perspective_rh(fov_y_degrees.to_radians(), 1.0, near, far))
            }
        }
    }

    pub fn set_near_far(&mut self, new_near: f32, new_far: f32) {
        match self {
            ShadowCamera::Orthographic { near, far, .. }
            | ShadowCamera::Perspective { near, far, .. } => {
                *near = new_near;
                *far = new_far;
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShadowCameraError {
    #[error("shadow camera frustum is degenerate (near {near}, far {far})")]
    DegenerateFrustum { near: f32, far: f32 },
}

/// Shadow configuration and cached shadow map for one light.
#[derive(Clone, Debug)]
pub struct LightShadow {
    pub map_size: u32,
    pub camera: ShadowCamera,
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
    /// Set when the shadow map must be re-rendered on the next frame.
    pub needs_update: bool,
    /// Cached depth map; `None` until a renderer allocates one and after it
    /// has been invalidated.
    pub map: Option<ShadowMap>,
    /// Last successfully computed projection of `camera`.
    pub projection: Mat4,
}

impl LightShadow {
    pub const DEFAULT_MAP_SIZE: u32 = 512;

    pub fn new(camera: ShadowCamera) -> Self {
        let projection = camera.projection_matrix().unwrap_or(Mat4::IDENTITY);

        Self {
            map_size: Self::DEFAULT_MAP_SIZE,
            camera,
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            needs_update: false,
            map: None,
            projection,
        }
    }

    /// Refresh the cached projection matrix from the shadow camera. On
    /// failure the previous projection is kept.
    pub fn update_projection_matrix(&mut self) -> Result<(), ShadowCameraError> {
        self.projection = self.camera.projection_matrix()?;
        Ok(())
    }

    /// Drop the cached shadow map so the renderer regenerates it.
    pub fn invalidate_map(&mut self) {
        self.map = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_shadow_capable_kinds_get_shadow_state() {
        assert!(Light::directional(Color::WHITE, 1.0).shadow.is_some());
        assert!(Light::spot(Color::WHITE, 1.0).shadow.is_some());
        assert!(Light::point(Color::WHITE, 1.0).shadow.is_some());
        assert!(Light::ambient(Color::WHITE, 1.0).shadow.is_none());
        assert!(Light::new(
            LightKind::Hemisphere {
                ground_color: Color::BLACK
            },
            Color::WHITE,
            1.0
        )
        .shadow
        .is_none());
    }

    #[test]
    fn unknown_kind_maps_to_generic_type() {
        assert_eq!(LightType::Light, LightKind::Unknown.light_type());
        assert_eq!("Light", LightKind::Unknown.light_type().type_name());
        assert!(!LightKind::Ambient.has_position());
        assert!(LightKind::Unknown.has_position());
    }

    #[test]
    fn degenerate_frustum_keeps_previous_projection() {
        let mut shadow = LightShadow::new(ShadowCamera::Perspective {
            fov_y_degrees: 50.0,
            near: 0.5,
            far: 25.0,
        });
        let before = shadow.projection;

        shadow.camera.set_near_far(10.0, 1.0);
        assert_eq!(
            Err(ShadowCameraError::DegenerateFrustum {
                near: 10.0,
                far: 1.0
            }),
            shadow.update_projection_matrix()
        );
        assert_eq!(before, shadow.projection);
    }

    #[test]
    fn light_type_serializes_with_panel_names() {
        let json = serde_json::to_string(&LightType::Directional).unwrap();
        assert_eq!("\"DirectionalLight\"", json);
    }
}
