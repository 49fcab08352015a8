//! Scene graph shared by the renderer, the light registry and the scenes.
//!
//! Nodes live in a slot map and refer to each other by `NodeId`, so ids held
//! by other systems (tweens, GPU mesh caches, registry fan out) go stale
//! safely when a subtree is removed.
use std::rc::Rc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use slotmap::{new_key_type, SlotMap};

use crate::{color::Color, geometry::Geometry, lighting::Light};

new_key_type! {
    pub struct NodeId;
}

/// Local transform of a node relative to its parent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_euler(
                EulerRot::XYZ,
                self.rotation.x,
                self.rotation.y,
                self.rotation.z,
            ),
            self.position,
        )
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Shading model of a material along with its model specific parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MaterialKind {
    /// Unlit.
    Basic,
    Lambert,
    Phong { shininess: f32 },
    Standard { roughness: f32, metalness: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub wireframe: bool,
    pub double_sided: bool,
}

impl Material {
    pub fn new(kind: MaterialKind, color: Color) -> Self {
        Self {
            kind,
            color,
            opacity: 1.0,
            transparent: false,
            wireframe: false,
            double_sided: false,
        }
    }

    pub fn basic(color: Color) -> Self {
        Self::new(MaterialKind::Basic, color)
    }

    pub fn lambert(color: Color) -> Self {
        Self::new(MaterialKind::Lambert, color)
    }

    pub fn phong(color: Color, shininess: f32) -> Self {
        Self::new(MaterialKind::Phong { shininess }, color)
    }

    pub fn standard(color: Color, roughness: f32, metalness: f32) -> Self {
        Self::new(
            MaterialKind::Standard {
                roughness,
                metalness,
            },
            color,
        )
    }

    /// Make the material alpha blended with the given opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = true;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    /// True for shading models that respond to the accent color picker.
    pub fn follows_accent_color(&self) -> bool {
        match self.kind {
            MaterialKind::Lambert | MaterialKind::Standard { .. } => true,
            MaterialKind::Basic | MaterialKind::Phong { .. } => false,
        }
    }
}

/// Baseline state captured when an animatable mesh is created. Procedural
/// motion is always computed as an offset from these values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnimParams {
    pub original_position: Vec3,
    pub original_rotation: Vec3,
    pub original_scale: f32,
    /// Radians per frame.
    pub rotation_speed: Vec3,
    /// Coarse grouping used to vary the motion between objects.
    pub group: u32,
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Rc<Geometry>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub anim: Option<AnimParams>,
}

impl Mesh {
    pub fn new(geometry: Rc<Geometry>, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
            anim: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// A detached node tree, typically produced by an asset loader, that can be
/// attached to a scene graph in one step.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            visible: true,
            kind,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this tree including itself.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeDesc::node_count).sum::<usize>()
    }
}

/// A tree of nodes with a single group root.
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            name: "Scene".to_string(),
            transform: Transform::IDENTITY,
            visible: true,
            kind: NodeKind::Group,
            parent: None,
            children: Vec::new(),
        });

        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Create a node under `parent`. Returns `None` if `parent` does not exist.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Option<NodeId> {
        self.attach(parent, NodeDesc::new(name, kind))
    }

    /// Insert a detached tree under `parent` and return the id of its top
    /// node. Returns `None` if `parent` does not exist.
    pub fn attach(&mut self, parent: NodeId, desc: NodeDesc) -> Option<NodeId> {
        if !self.nodes.contains_key(parent) {
            return None;
        }

        let NodeDesc {
            name,
            transform,
            visible,
            kind,
            children,
        } = desc;

        let id = self.nodes.insert(Node {
            name,
            transform,
            visible,
            kind,
            parent: Some(parent),
            children: Vec::with_capacity(children.len()),
        });

        self.nodes[parent].children.push(id);

        for child in children {
            self.attach(id, child);
        }

        Some(id)
    }

    /// Remove `id` and its descendants. Returns the removed ids in pre-order so
    /// callers can release resources tied to them. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root || !self.nodes.contains_key(id) {
            return Vec::new();
        }

        let removed = self.traverse_from(id);

        if let Some(parent) = self.nodes[id].parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }

        for node_id in &removed {
            self.nodes.remove(*node_id);
        }

        removed
    }

    /// Remove every node except the root and reset the root transform.
    pub fn clear(&mut self) -> Vec<NodeId> {
        let children = self.nodes[self.root].children.clone();
        let removed = children.into_iter().flat_map(|c| self.remove(c)).collect();

        self.nodes[self.root].transform = Transform::IDENTITY;
        removed
    }

    /// Pre-order list of every node id starting at the root.
    pub fn traverse(&self) -> Vec<NodeId> {
        self.traverse_from(self.root)
    }

    /// Pre-order list of node ids in the subtree rooted at `id`.
    pub fn traverse_from(&self, id: NodeId) -> Vec<NodeId> {
        let mut visited = Vec::new();
        let mut stack = vec![id];

        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(next) {
                visited.push(next);
                stack.extend(node.children.iter().rev());
            }
        }

        visited
    }

    /// First node in pre-order whose name is `name`.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    /// First node named `name` inside the subtree rooted at `id`.
    pub fn find_in_subtree(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.traverse_from(id)
            .into_iter()
            .find(|n| self.nodes[*n].name == name)
    }

    /// Transform from the node's local space to world space.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut next = Some(id);

        while let Some(current) = next {
            match self.nodes.get(current) {
                Some(node) => {
                    matrix = node.transform.to_matrix() * matrix;
                    next = node.parent;
                }
                None => break,
            }
        }

        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }

    /// True if the node and all of its ancestors are visible.
    pub fn is_visible_in_world(&self, id: NodeId) -> bool {
        let mut next = Some(id);

        while let Some(current) = next {
            match self.nodes.get(current) {
                Some(node) if node.visible => next = node.parent,
                _ => return false,
            }
        }

        true
    }

    /// All light nodes in pre-order.
    pub fn lights(&self) -> Vec<NodeId> {
        self.traverse()
            .into_iter()
            .filter(|id| matches!(self.nodes[*id].kind, NodeKind::Light(_)))
            .collect()
    }

    /// All mesh nodes in pre-order.
    pub fn meshes(&self) -> Vec<NodeId> {
        self.traverse()
            .into_iter()
            .filter(|id| matches!(self.nodes[*id].kind, NodeKind::Mesh(_)))
            .collect()
    }

    /// Light nodes in the subtree rooted at `id`.
    pub fn lights_in_subtree(&self, id: NodeId) -> Vec<NodeId> {
        self.traverse_from(id)
            .into_iter()
            .filter(|n| matches!(self.nodes[*n].kind, NodeKind::Light(_)))
            .collect()
    }

    /// Enable shadow casting and receiving on every mesh in the subtree. Rough
    /// surfaces hide shadow acne, so standard materials are clamped to a
    /// roughness of at least 0.2.
    pub fn configure_shadows_for_object(&mut self, id: NodeId, cast: bool, receive: bool) {
        for node_id in self.traverse_from(id) {
            if let Some(mesh) = self.nodes[node_id].mesh_mut() {
                mesh.cast_shadow = cast;
                mesh.receive_shadow = receive;

                if let MaterialKind::Standard { roughness, .. } = &mut mesh.material.kind {
                    *roughness = roughness.max(0.2);
                }
            }
        }
    }

    /// Give every mesh in the subtree a glossy standard material that renders
    /// shadows well. Unlit materials are upgraded, keeping color and opacity.
    pub fn configure_glossy_materials(&mut self, id: NodeId) {
        for node_id in self.traverse_from(id) {
            if let Some(mesh) = self.nodes[node_id].mesh_mut() {
                mesh.cast_shadow = true;
                mesh.receive_shadow = true;

                match mesh.material.kind {
                    MaterialKind::Basic | MaterialKind::Standard { .. } => {
                        mesh.material.kind = MaterialKind::Standard {
                            roughness: 0.4,
                            metalness: 0.6,
                        };
                    }
                    MaterialKind::Lambert | MaterialKind::Phong { .. } => {}
                }
            }
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_mesh(material: Material) -> NodeKind {
        NodeKind::Mesh(Mesh::new(Rc::new(Geometry::cube(0.5)), material))
    }

    #[test]
    fn attach_tree_and_find_by_name() {
        let mut graph = SceneGraph::new();
        let desc = NodeDesc::group("model")
            .with_child(NodeDesc::new("body", unit_mesh(Material::lambert(Color::WHITE))))
            .with_child(
                NodeDesc::group("arm")
                    .with_child(NodeDesc::new("hand", unit_mesh(Material::basic(Color::WHITE)))),
            );
        assert_eq!(4, desc.node_count());

        let model = graph.attach(graph.root(), desc).unwrap();
        assert_eq!(5, graph.len());

        let hand = graph.find_by_name("hand").unwrap();
        let arm = graph.find_by_name("arm").unwrap();
        assert_eq!(Some(arm), graph.get(hand).unwrap().parent());
        assert_eq!(Some(hand), graph.find_in_subtree(model, "hand"));
        assert_eq!(2, graph.meshes().len());
        assert!(graph.find_by_name("missing").is_none());
    }

    #[test]
    fn traverse_is_pre_order() {
        let mut graph = SceneGraph::new();
        let a = graph.add_child(graph.root(), "a", NodeKind::Group).unwrap();
        let a1 = graph.add_child(a, "a1", NodeKind::Group).unwrap();
        let b = graph.add_child(graph.root(), "b", NodeKind::Group).unwrap();

        assert_eq!(vec![graph.root(), a, a1, b], graph.traverse());
    }

    #[test]
    fn add_child_to_missing_parent_fails() {
        let mut graph = SceneGraph::new();
        let a = graph.add_child(graph.root(), "a", NodeKind::Group).unwrap();
        graph.remove(a);

        assert!(graph.add_child(a, "orphan", NodeKind::Group).is_none());
    }

    #[test]
    fn remove_drops_whole_subtree() {
        let mut graph = SceneGraph::new();
        let a = graph.add_child(graph.root(), "a", NodeKind::Group).unwrap();
        let a1 = graph.add_child(a, "a1", NodeKind::Group).unwrap();
        let b = graph.add_child(graph.root(), "b", NodeKind::Group).unwrap();

        assert_eq!(vec![a, a1], graph.remove(a));
        assert!(!graph.contains(a1));
        assert_eq!(&[b], graph.get(graph.root()).unwrap().children());

        // Root stays.
        assert!(graph.remove(graph.root()).is_empty());
        assert!(graph.contains(graph.root()));
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut graph = SceneGraph::new();
        graph.get_mut(graph.root()).unwrap().transform.position = Vec3::new(0.0, 1.0, 0.0);

        let parent = graph
            .attach(
                graph.root(),
                NodeDesc::group("parent").with_transform(Transform {
                    position: Vec3::new(1.0, 0.0, 0.0),
                    rotation: Vec3::ZERO,
                    scale: Vec3::splat(2.0),
                }),
            )
            .unwrap();
        let child = graph
            .attach(parent, NodeDesc::group("child").with_position(Vec3::new(0.0, 0.0, 1.0)))
            .unwrap();

        let p = graph.world_position(child);
        assert!((p - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let mut graph = SceneGraph::new();
        let a = graph.add_child(graph.root(), "a", NodeKind::Group).unwrap();
        let a1 = graph.add_child(a, "a1", NodeKind::Group).unwrap();
        assert!(graph.is_visible_in_world(a1));

        graph.get_mut(a).unwrap().visible = false;
        assert!(!graph.is_visible_in_world(a1));
    }

    #[test]
    fn configure_shadows_clamps_roughness() {
        let mut graph = SceneGraph::new();
        let model = graph
            .attach(
                graph.root(),
                NodeDesc::group("model")
                    .with_child(NodeDesc::new(
                        "smooth",
                        unit_mesh(Material::standard(Color::WHITE, 0.05, 0.0)),
                    ))
                    .with_child(NodeDesc::new(
                        "rough",
                        unit_mesh(Material::standard(Color::WHITE, 0.8, 0.0)),
                    )),
            )
            .unwrap();

        graph.configure_shadows_for_object(model, true, false);

        let roughness = |name: &str| {
            let mesh = graph.get(graph.find_by_name(name).unwrap()).unwrap().mesh().unwrap();
            assert!(mesh.cast_shadow);
            assert!(!mesh.receive_shadow);
            match mesh.material.kind {
                MaterialKind::Standard { roughness, .. } => roughness,
                _ => panic!("material kind changed"),
            }
        };

        assert_eq!(0.2, roughness("smooth"));
        assert_eq!(0.8, roughness("rough"));
    }

    #[test]
    fn glossy_materials_upgrade_unlit_meshes() {
        let mut graph = SceneGraph::new();
        let torus = graph
            .attach(
                graph.root(),
                NodeDesc::new(
                    "torus",
                    unit_mesh(Material::basic(Color::from_hex(0x66ccff)).with_opacity(0.5)),
                ),
            )
            .unwrap();

        graph.configure_glossy_materials(torus);

        let mesh = graph.get(torus).unwrap().mesh().unwrap();
        assert_eq!(
            MaterialKind::Standard {
                roughness: 0.4,
                metalness: 0.6
            },
            mesh.material.kind
        );
        assert_eq!(0.5, mesh.material.opacity);
        assert!(mesh.cast_shadow && mesh.receive_shadow);
    }

    #[test]
    fn clear_keeps_only_root() {
        let mut graph = SceneGraph::new();
        graph.add_child(graph.root(), "a", NodeKind::Group);
        graph.add_child(graph.root(), "b", NodeKind::Group);

        assert_eq!(2, graph.clear().len());
        assert!(graph.is_empty());
        assert_eq!(vec![graph.root()], graph.traverse());
    }
}
