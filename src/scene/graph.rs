use crate::scene::geometry::Geometry;
use crate::scene::material::MaterialId;
use crate::scene::skeleton::SkeletonId;
use glam::{Mat4, Quat, Vec3};

/// Index of a node inside the [`NodeGraph`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: MaterialId,
    pub skeleton: Option<SkeletonId>,
    /// Skeleton joint indices referenced by the geometry's joint attribute.
    pub joints: Vec<u32>,
    pub culling: bool,
    pub cast_shadow: bool,
    /// Set on sub-meshes produced by joint partitioning.
    pub original_mesh_name: Option<String>,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: MaterialId) -> Self {
        Self {
            geometry,
            material,
            skeleton: None,
            joints: Vec::new(),
            culling: true,
            cast_shadow: true,
            original_mesh_name: None,
        }
    }

    pub fn is_skinned(&self) -> bool {
        self.skeleton.is_some() && !self.joints.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub invisible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Mat4,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh: None,
            invisible: false,
            parent: None,
            children: Vec::new(),
            world: Mat4::IDENTITY,
        }
    }

    pub fn with_mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        let mut node = Self::new(name);
        node.mesh = Some(mesh);
        node
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }
}

/// Arena-backed node tree. Nodes are never removed; a model's graph is
/// dropped as a whole when the model is torn down.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new("root")
    }
}

impl NodeGraph {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(root_name)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.push(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn mesh(&self, id: NodeId) -> Option<&Mesh> {
        self.node(id).and_then(|node| node.mesh.as_ref())
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        self.node_mut(id).and_then(|node| node.mesh.as_mut())
    }

    /// Pre-order walk starting at (and including) `start`.
    pub fn descendants(&self, start: NodeId) -> Descendants<'_> {
        let stack = if start.0 < self.nodes.len() {
            vec![start]
        } else {
            Vec::new()
        };
        Descendants { graph: self, stack }
    }

    pub fn traverse(&self) -> Descendants<'_> {
        self.descendants(self.root)
    }

    pub fn mesh_nodes(&self) -> impl Iterator<Item = (NodeId, &Mesh)> + '_ {
        self.traverse()
            .filter_map(move |id| self.mesh(id).map(|mesh| (id, mesh)))
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        self.node(id).map(Node::world_matrix).unwrap_or(Mat4::IDENTITY)
    }

    /// Recompute world matrices top-down from the root.
    pub fn update_world_transforms(&mut self) {
        let order: Vec<NodeId> = self.traverse().collect();
        for id in order {
            let parent_world = self
                .nodes[id.0]
                .parent
                .map(|parent| self.nodes[parent.0].world)
                .unwrap_or(Mat4::IDENTITY);
            let node = &mut self.nodes[id.0];
            node.world = parent_world * node.transform.matrix();
        }
    }
}

pub struct Descendants<'a> {
    graph: &'a NodeGraph,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(node) = self.graph.node(id) {
            self.stack.extend(node.children.iter().rev().copied());
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_preorder_and_restartable() {
        let mut graph = NodeGraph::new("root");
        let a = graph.add_child(graph.root(), Node::new("a"));
        let b = graph.add_child(graph.root(), Node::new("b"));
        let a1 = graph.add_child(a, Node::new("a1"));

        let order: Vec<NodeId> = graph.traverse().collect();
        assert_eq!(order, vec![graph.root(), a, a1, b]);
        assert_eq!(graph.traverse().count(), 4);
        assert_eq!(graph.descendants(a).count(), 2);
    }

    #[test]
    fn world_transforms_compose_parent_first() {
        let mut graph = NodeGraph::new("root");
        let mut parent = Node::new("parent");
        parent.transform.translation = Vec3::new(1.0, 0.0, 0.0);
        let parent = graph.add_child(graph.root(), parent);
        let mut child = Node::new("child");
        child.transform.translation = Vec3::new(0.0, 2.0, 0.0);
        let child = graph.add_child(parent, child);

        graph.update_world_transforms();
        let origin = graph.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }
}
