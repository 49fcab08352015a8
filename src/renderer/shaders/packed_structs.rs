//! Rust structs with memory layouts that match their same named counterparts
//! in `lit.wgsl`.
//!
//! Structs are "packed": scalar parameters ride in the `.w` lane of vectors
//! wherever one is free. For example the packed light encodes its kind as
//! follows:
//!
//!   light.position.xyz = world position, or direction towards the light
//!   light.position.w   = kind (see `PackedLightKind`)
//!
//! Any change here must be mirrored in the shader or vice versa. All fields
//! are 16 byte aligned as uniform buffers require.
use glam::{Vec3, Vec4};

use crate::{
    lighting::{Light, LightKind},
    scene_graph::{MaterialKind, Mesh},
};

/// Most lights the lit shader evaluates per frame.
pub const MAX_LIGHTS: usize = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PackedLightKind {
    Ambient = 0,
    Directional = 1,
    Point = 2,
    Hemisphere = 3,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedLight {
    pub position: Vec4, // .w is the kind.
    pub color: Vec4,    // premultiplied by intensity, .w is unused.
    pub ground: Vec4,   // hemisphere ground color, premultiplied by intensity.
}

impl PackedLight {
    /// Pack `light` sitting at `world_position`. Directional and hemisphere
    /// lights point from the origin towards their position. Returns `None`
    /// for kinds the lit shader does not evaluate.
    pub fn pack(light: &Light, world_position: Vec3) -> Option<Self> {
        let radiance = light.color.0 * light.intensity;
        let direction = world_position.try_normalize().unwrap_or(Vec3::Y);

        let (kind, position, ground) = match &light.kind {
            LightKind::Ambient => (PackedLightKind::Ambient, Vec3::ZERO, Vec3::ZERO),
            LightKind::Directional => (PackedLightKind::Directional, direction, Vec3::ZERO),
            LightKind::Point | LightKind::Spot => {
                (PackedLightKind::Point, world_position, Vec3::ZERO)
            }
            LightKind::Hemisphere { ground_color } => (
                PackedLightKind::Hemisphere,
                direction,
                ground_color.0 * light.intensity,
            ),
            LightKind::RectArea { .. } | LightKind::Unknown => return None,
        };

        Some(Self {
            position: vec3_w(position, kind as u32 as f32),
            color: vec3_w(radiance, 0.0),
            ground: vec3_w(ground, 0.0),
        })
    }
}

/// Material values for one mesh.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedMaterial {
    pub color: Vec4,  // .w is opacity.
    pub params: Vec4, // (shading model, shininess, roughness, metalness).
    pub flags: Vec4,  // (receive shadow, double sided, unused, unused).
}

impl From<&Mesh> for PackedMaterial {
    fn from(mesh: &Mesh) -> Self {
        let material = &mesh.material;
        let (model, shininess, roughness, metalness) = match material.kind {
            MaterialKind::Basic => (0.0, 0.0, 1.0, 0.0),
            MaterialKind::Lambert => (1.0, 0.0, 1.0, 0.0),
            MaterialKind::Phong { shininess } => (2.0, shininess, 1.0, 0.0),
            MaterialKind::Standard {
                roughness,
                metalness,
            } => (3.0, 0.0, roughness, metalness),
        };
        let opacity = if material.transparent {
            material.opacity
        } else {
            1.0
        };

        Self {
            color: vec3_w(material.color.0, opacity),
            params: Vec4::new(model, shininess, roughness, metalness),
            flags: Vec4::new(
                if mesh.receive_shadow { 1.0 } else { 0.0 },
                if material.double_sided { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ),
        }
    }
}

/// Returns a new `Vec4` value that is the combination of a `Vec3` x, y and z
/// and an additional `w` value.
pub fn vec3_w(xyz: Vec3, w: f32) -> Vec4 {
    Vec4::new(xyz.x, xyz.y, xyz.z, w)
}
