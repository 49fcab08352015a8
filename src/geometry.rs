//! CPU side mesh geometry and procedural shapes.
//!
//! NOTES:
//! Triangle winding order is CCW when viewed from outside the shape.
//! Platonic solids use per-face vertices so they render with flat shading.
use std::f32::consts::{PI, TAU};

use glam::Vec3;

/// Mesh vertex, laid out to be uploaded to the GPU as is.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Triangle list geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// The shapes the scenes can build without loading a model.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuiltinShape {
    Icosahedron,
    Octahedron,
    Tetrahedron,
    Cube,
    Sphere,
    Torus,
    TorusKnot,
}

impl BuiltinShape {
    pub const ALL: [BuiltinShape; 7] = [
        BuiltinShape::Icosahedron,
        BuiltinShape::Torus,
        BuiltinShape::TorusKnot,
        BuiltinShape::Octahedron,
        BuiltinShape::Tetrahedron,
        BuiltinShape::Cube,
        BuiltinShape::Sphere,
    ];

    /// Build the shape at the size the background scene uses.
    pub fn build(&self) -> Geometry {
        match self {
            BuiltinShape::Icosahedron => Geometry::icosahedron(1.0),
            BuiltinShape::Octahedron => Geometry::octahedron(1.0),
            BuiltinShape::Tetrahedron => Geometry::tetrahedron(1.0),
            BuiltinShape::Cube => Geometry::cube(1.0),
            BuiltinShape::Sphere => Geometry::sphere(0.7, 8, 8),
            BuiltinShape::Torus => Geometry::torus(0.7, 0.3, 16, 48),
            BuiltinShape::TorusKnot => Geometry::torus_knot(0.6, 0.25, 64, 8, 2, 3),
        }
    }
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Distance from the origin to the farthest vertex.
    pub fn bounding_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| Vec3::from(v.position).length())
            .fold(0.0, f32::max)
    }

    /// Build flat shaded geometry from shared corner positions and triangle
    /// faces. Every face gets its own three vertices with the face normal.
    pub fn from_flat_faces(corners: &[Vec3], faces: &[[usize; 3]]) -> Self {
        let mut vertices = Vec::with_capacity(faces.len() * 3);
        let mut indices = Vec::with_capacity(faces.len() * 3);

        for face in faces {
            let [a, b, c] = face.map(|i| corners[i]);
            let normal = (b - a).cross(c - a).normalize_or_zero();

            for p in [a, b, c] {
                indices.push(vertices.len() as u32);
                vertices.push(Vertex {
                    position: p.to_array(),
                    normal: normal.to_array(),
                });
            }
        }

        Self { vertices, indices }
    }

    pub fn icosahedron(radius: f32) -> Self {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
        let corners = [
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ]
        .map(|p| p.normalize() * radius);

        let faces = [
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        Self::from_flat_faces(&corners, &faces)
    }

    pub fn octahedron(radius: f32) -> Self {
        let corners = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z].map(|p| p * radius);
        let faces = [
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];

        Self::from_flat_faces(&corners, &faces)
    }

    pub fn tetrahedron(radius: f32) -> Self {
        let corners = [
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
        ]
        .map(|p| p.normalize() * radius);
        let faces = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];

        Self::from_flat_faces(&corners, &faces)
    }

    /// Axis aligned cube with half extent `half_size`.
    pub fn cube(half_size: f32) -> Self {
        let h = half_size;
        let corners = [
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
        ];
        let faces = [
            [0, 1, 2],
            [0, 2, 3],
            [1, 5, 6],
            [1, 6, 2],
            [5, 4, 7],
            [5, 7, 6],
            [4, 0, 3],
            [4, 3, 7],
            [3, 2, 6],
            [3, 6, 7],
            [4, 5, 1],
            [4, 1, 0],
        ];

        Self::from_flat_faces(&corners, &faces)
    }

    /// UV sphere with smooth normals.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let phi = v * PI;

            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let theta = u * TAU;
                let normal = Vec3::new(
                    -theta.cos() * phi.sin(),
                    phi.cos(),
                    theta.sin() * phi.sin(),
                );

                vertices.push(Vertex {
                    position: (normal * radius).to_array(),
                    normal: normal.to_array(),
                });
            }
        }

        let row = width_segments + 1;

        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;

                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }

                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self { vertices, indices }
    }

    /// Torus lying in the XY plane.
    pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Self {
        Self::sweep_tube(radial_segments, tubular_segments, |u| {
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            let outward = Vec3::new(u.cos(), u.sin(), 0.0);
            (center, outward, Vec3::Z, tube)
        })
    }

    /// (p, q) torus knot.
    pub fn torus_knot(
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    ) -> Self {
        let (p, q) = (p as f32, q as f32);
        let curve = move |u: f32| {
            let cu = u.cos();
            let su = u.sin();
            let qu_over_p = q / p * u;
            let cs = qu_over_p.cos();

            Vec3::new(
                radius * (2.0 + cs) * 0.5 * cu,
                radius * (2.0 + cs) * su * 0.5,
                radius * qu_over_p.sin() * 0.5,
            )
        };

        Self::sweep_tube(radial_segments, tubular_segments, move |t| {
            let u = t * p;
            let p1 = curve(u);
            let p2 = curve(u + 0.01);
            let tangent = p2 - p1;
            let normal = (p2 + p1).normalize_or_zero();
            let binormal = tangent.cross(normal).normalize_or_zero();
            let normal = binormal.cross(tangent).normalize_or_zero();
            (p1, normal, binormal, tube)
        })
    }

    /// Sweep a circle of radius `tube` along a closed curve. `frame(u)` returns
    /// the curve point, the ring's normal and binormal directions and the tube
    /// radius for `u` in [0, 2π).
    fn sweep_tube<F>(radial_segments: u32, tubular_segments: u32, frame: F) -> Self
    where
        F: Fn(f32) -> (Vec3, Vec3, Vec3, f32),
    {
        let radial_segments = radial_segments.max(3);
        let tubular_segments = tubular_segments.max(3);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for j in 0..=tubular_segments {
            let u = j as f32 / tubular_segments as f32 * TAU;
            let (center, n, b, tube) = frame(u);

            for i in 0..=radial_segments {
                let v = i as f32 / radial_segments as f32 * TAU;
                let normal = (n * v.cos() + b * v.sin()).normalize_or_zero();

                vertices.push(Vertex {
                    position: (center + normal * tube).to_array(),
                    normal: normal.to_array(),
                });
            }
        }

        let row = radial_segments + 1;

        for j in 1..=tubular_segments {
            for i in 1..=radial_segments {
                let a = row * j + i - 1;
                let b = row * (j - 1) + i - 1;
                let c = row * (j - 1) + i;
                let d = row * j + i;

                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_indices_in_range(geometry: &Geometry) {
        let count = geometry.vertices.len() as u32;
        assert!(geometry.indices.iter().all(|&i| i < count));
        assert_eq!(0, geometry.indices.len() % 3);
    }

    #[test]
    fn platonic_solids_have_expected_faces() {
        assert_eq!(20, Geometry::icosahedron(1.0).triangle_count());
        assert_eq!(8, Geometry::octahedron(1.0).triangle_count());
        assert_eq!(4, Geometry::tetrahedron(1.0).triangle_count());
        assert_eq!(12, Geometry::cube(1.0).triangle_count());
    }

    #[test]
    fn flat_normals_point_outward() {
        for geometry in [
            Geometry::icosahedron(1.0),
            Geometry::octahedron(1.0),
            Geometry::tetrahedron(1.0),
            Geometry::cube(1.0),
        ] {
            for v in &geometry.vertices {
                let p = Vec3::from(v.position);
                let n = Vec3::from(v.normal);
                assert!(p.dot(n) > 0.0, "inward normal at {p:?}");
            }
        }
    }

    #[test]
    fn every_builtin_shape_is_well_formed() {
        for shape in BuiltinShape::ALL {
            let geometry = shape.build();
            assert!(geometry.triangle_count() > 0, "{shape:?}");
            assert_indices_in_range(&geometry);
            assert!(geometry.bounding_radius() > 0.0);
            assert!(geometry.bounding_radius() < 2.0, "{shape:?}");
        }
    }

    #[test]
    fn icosahedron_fits_radius() {
        let geometry = Geometry::icosahedron(2.5);
        assert!((geometry.bounding_radius() - 2.5).abs() < 1e-5);
    }
}
