use std::{path::Path, rc::Rc};

use glam::Vec3;
use tracing::warn;

use crate::{
    color::Color,
    geometry::{Geometry, Vertex},
    platform::load_as_string,
    scene_graph::{Material, Mesh, NodeDesc, NodeKind},
};

/// Color used for obj meshes without a usable material.
const FALLBACK_COLOR: u32 = 0xcccccc;

/// Options every obj file is loaded with. The conversion below relies on them.
pub(super) fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Parse an obj file into a group named `name` with one mesh child per obj
/// model. Material libraries are resolved relative to the obj file.
#[tracing::instrument(level = "info")]
pub async fn load_obj_subtree<P>(obj_file_path: P, name: &str) -> anyhow::Result<NodeDesc>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let obj_text = load_as_string(obj_file_path.as_ref()).await?;
    let mut obj_buf_reader = std::io::BufReader::new(std::io::Cursor::new(obj_text));
    let base_dir = obj_file_path
        .as_ref()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let (obj_models, obj_materials) =
        tobj::load_obj_buf_async(&mut obj_buf_reader, &load_options(), |mtl_file_path| {
            let mtl_path = base_dir.join(mtl_file_path);

            async move {
                match load_as_string(&mtl_path).await {
                    Ok(mtl_text) => tobj::load_mtl_buf(&mut std::io::BufReader::new(
                        std::io::Cursor::new(mtl_text),
                    )),
                    Err(error) => {
                        warn!(?mtl_path, %error, "failed to load material library");
                        Err(tobj::LoadError::OpenFileFailed)
                    }
                }
            }
        })
        .await?;

    // Missing materials only cost the model its colors.
    let obj_materials = obj_materials.unwrap_or_else(|error| {
        warn!(%error, "obj materials unavailable, using fallback colors");
        Vec::new()
    });

    Ok(subtree_from_models(name, &obj_models, &obj_materials))
}

/// Convert parsed obj models into a detached scene subtree.
pub(super) fn subtree_from_models(
    name: &str,
    obj_models: &[tobj::Model],
    obj_materials: &[tobj::Material],
) -> NodeDesc {
    let mut root = NodeDesc::group(name);

    for model in obj_models {
        let geometry = geometry_from_mesh(&model.mesh);

        if geometry.indices.is_empty() {
            continue;
        }

        let material = material_from_mtl(model.mesh.material_id.and_then(|i| obj_materials.get(i)));
        root = root.with_child(NodeDesc::new(
            model.name.clone(),
            NodeKind::Mesh(Mesh::new(Rc::new(geometry), material)),
        ));
    }

    root
}

/// Build geometry from a triangulated, single index obj mesh. Meshes without
/// normals are flat shaded.
pub(super) fn geometry_from_mesh(mesh: &tobj::Mesh) -> Geometry {
    let positions: Vec<Vec3> = mesh
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();

    let vertex_count = positions.len() as u32;
    let indices: Vec<u32> = mesh
        .indices
        .chunks_exact(3)
        .filter(|face| face.iter().all(|i| *i < vertex_count))
        .flatten()
        .copied()
        .collect();

    if mesh.normals.len() != mesh.positions.len() {
        let faces: Vec<[usize; 3]> = indices
            .chunks_exact(3)
            .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
            .collect();

        return Geometry::from_flat_faces(&positions, &faces);
    }

    let vertices = positions
        .iter()
        .zip(mesh.normals.chunks_exact(3))
        .map(|(p, n)| Vertex {
            position: p.to_array(),
            normal: Vec3::new(n[0], n[1], n[2]).normalize_or_zero().to_array(),
        })
        .collect();

    Geometry { vertices, indices }
}

/// Pick a material for an mtl definition. Materials with a specular color get
/// the glossier standard model, everything else is lambert.
pub(super) fn material_from_mtl(mtl: Option<&tobj::Material>) -> Material {
    let Some(mtl) = mtl else {
        return Material::lambert(Color::from_hex(FALLBACK_COLOR));
    };

    let color = mtl
        .diffuse
        .map(|[r, g, b]| Color::new(r, g, b))
        .unwrap_or_else(|| Color::from_hex(FALLBACK_COLOR));

    let specular = mtl
        .specular
        .map_or(0.0, |s| s.into_iter().fold(0.0, f32::max));

    let material = if specular > 0.0 {
        let roughness = 1.0 - (mtl.shininess.unwrap_or(0.0) / 100.0).clamp(0.0, 0.9);
        Material::standard(color, roughness, 0.1)
    } else {
        Material::lambert(color)
    };

    match mtl.dissolve {
        Some(opacity) if opacity < 1.0 => material.with_opacity(opacity),
        _ => material,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::MaterialKind;

    const QUAD_OBJ: &str = "mtllib quad.mtl\no Quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nusemtl shiny\nf 1 2 3 4\n";
    const MTL: &str = "newmtl shiny\nKd 1 0 0\nKs 0.5 0.5 0.5\nNs 50\nd 0.5\n";

    fn parse(obj: &str) -> (Vec<tobj::Model>, Vec<tobj::Material>) {
        let (models, materials) = tobj::load_obj_buf(
            &mut std::io::BufReader::new(std::io::Cursor::new(obj)),
            &load_options(),
            |_| tobj::load_mtl_buf(&mut std::io::BufReader::new(std::io::Cursor::new(MTL))),
        )
        .unwrap();

        (models, materials.unwrap_or_default())
    }

    #[test]
    fn quads_are_triangulated_with_flat_normals() {
        let (models, _) = parse(QUAD_OBJ);
        let geometry = geometry_from_mesh(&models[0].mesh);

        assert_eq!(2, geometry.triangle_count());
        assert!(geometry
            .vertices
            .iter()
            .all(|v| Vec3::from(v.normal).abs_diff_eq(Vec3::Z, 1e-6)));
    }

    #[test]
    fn specular_materials_become_standard() {
        let (models, materials) = parse(QUAD_OBJ);
        let subtree = subtree_from_models("quad", &models, &materials);

        assert_eq!("quad", subtree.name);
        assert_eq!(2, subtree.node_count());

        let NodeKind::Mesh(mesh) = &subtree.children[0].kind else {
            panic!("expected a mesh");
        };
        assert_eq!("Quad", subtree.children[0].name);
        assert!(matches!(
            mesh.material.kind,
            MaterialKind::Standard { roughness, .. } if (roughness - 0.5).abs() < 1e-6
        ));
        assert_eq!(0xff0000, mesh.material.color.to_hex());
        assert!(mesh.material.transparent);
        assert_eq!(0.5, mesh.material.opacity);
    }

    #[test]
    fn missing_material_falls_back_to_lambert() {
        let material = material_from_mtl(None);
        assert_eq!(MaterialKind::Lambert, material.kind);
        assert_eq!(FALLBACK_COLOR, material.color.to_hex());
    }

    #[test]
    fn out_of_range_faces_are_dropped() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2, 0, 1, 9],
            ..Default::default()
        };

        assert_eq!(1, geometry_from_mesh(&mesh).triangle_count());
    }
}
