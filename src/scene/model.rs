use crate::scene::geometry::Aabb;
use crate::scene::graph::{NodeGraph, NodeId};
use crate::scene::material::{Material, MaterialId};
use crate::scene::skeleton::Skeleton;
use crate::scene::texture::{Texture, TextureId};
use glam::Vec3;
use std::collections::BTreeMap;

/// Per-viewer install counter. Work scheduled against an older generation
/// targets a model that is no longer displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelGeneration(pub(crate) u64);

impl ModelGeneration {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The installed asset plus the indices derived from it.
#[derive(Debug)]
pub struct Model {
    generation: ModelGeneration,
    graph: NodeGraph,
    nodes: Vec<NodeId>,
    skeletons: Vec<Skeleton>,
    materials: Vec<Material>,
    textures: Vec<Texture>,
    material_map: BTreeMap<String, Vec<MaterialId>>,
}

impl Model {
    pub fn new(
        generation: ModelGeneration,
        graph: NodeGraph,
        nodes: Vec<NodeId>,
        skeletons: Vec<Skeleton>,
        materials: Vec<Material>,
        textures: Vec<Texture>,
    ) -> Self {
        let mut model = Self {
            generation,
            graph,
            nodes,
            skeletons,
            materials,
            textures,
            material_map: BTreeMap::new(),
        };
        model.rebuild_material_map();
        model
    }

    /// Group the materials referenced by the graph's meshes by name.
    /// Materials no mesh references are left out.
    pub fn rebuild_material_map(&mut self) {
        let mut map: BTreeMap<String, Vec<MaterialId>> = BTreeMap::new();
        for (_, mesh) in self.graph.mesh_nodes() {
            let Some(material) = self.materials.get(mesh.material.0) else {
                continue;
            };
            let ids = map.entry(material.name.clone()).or_default();
            if !ids.contains(&mesh.material) {
                ids.push(mesh.material);
            }
        }
        self.material_map = map;
    }

    pub fn generation(&self) -> ModelGeneration {
        self.generation
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    /// Flattened node list in the asset's own node order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id.0)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn material_map(&self) -> &BTreeMap<String, Vec<MaterialId>> {
        &self.material_map
    }

    pub fn materials_named(&self, name: &str) -> &[MaterialId] {
        self.material_map.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn material_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.material_map.keys().map(String::as_str)
    }

    pub fn mapped_materials(&self) -> impl Iterator<Item = MaterialId> + '_ {
        self.material_map.values().flatten().copied()
    }

    /// Mesh nodes whose material is one of `materials`.
    pub fn meshes_using(&self, materials: &[MaterialId]) -> Vec<NodeId> {
        self.graph
            .mesh_nodes()
            .filter(|(_, mesh)| materials.contains(&mesh.material))
            .map(|(id, _)| id)
            .collect()
    }

    /// Recompute world transforms, then skeleton joint matrices.
    pub fn update_pose(&mut self) {
        self.graph.update_world_transforms();
        for skeleton in &mut self.skeletons {
            skeleton.update(&self.graph);
        }
    }

    /// World-space vertex positions of a mesh node in the current pose.
    /// Skinned vertices are blended from the joint matrices, which already
    /// include the joints' world transforms.
    pub fn world_positions(&self, id: NodeId) -> Vec<Vec3> {
        let Some(mesh) = self.graph.mesh(id) else {
            return Vec::new();
        };
        let geometry = &mesh.geometry;
        let skeleton = mesh
            .skeleton
            .filter(|_| mesh.is_skinned())
            .and_then(|skeleton| self.skeletons.get(skeleton.0));
        let world = self.graph.world_matrix(id);

        (0..geometry.vertex_count())
            .map(|i| {
                let position = Vec3::from_array(geometry.positions[i]);
                let Some(skeleton) = skeleton else {
                    return world.transform_point3(position);
                };
                let (Some(joints), Some(weights)) = (geometry.joints.get(i), geometry.weights.get(i)) else {
                    return world.transform_point3(position);
                };
                let mut skinned = Vec3::ZERO;
                let mut total = 0.0;
                for k in 0..4 {
                    let matrix = mesh
                        .joints
                        .get(joints[k] as usize)
                        .and_then(|joint| skeleton.joint_matrices().get(*joint as usize));
                    if let (Some(matrix), true) = (matrix, weights[k] > 0.0) {
                        skinned += matrix.transform_point3(position) * weights[k];
                        total += weights[k];
                    }
                }
                if total > 0.0 {
                    skinned / total
                } else {
                    world.transform_point3(position)
                }
            })
            .collect()
    }

    /// World-space bounds of every visible mesh in the current pose.
    pub fn world_bounding_box(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for (id, mesh) in self.graph.mesh_nodes() {
            if self.graph.node(id).is_some_and(|node| node.invisible) {
                continue;
            }
            if mesh.is_skinned() {
                bounds.union(&Aabb::from_points(self.world_positions(id)));
            } else {
                let world = self.graph.world_matrix(id);
                bounds.union(&mesh.geometry.bounding_box().transformed(&world));
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::geometry::Geometry;
    use crate::scene::graph::{Mesh, Node};

    #[test]
    fn material_map_groups_instances_by_name() {
        let mut graph = NodeGraph::new("model");
        let materials = vec![
            Material::new("Body"),
            Material::new("Body"),
            Material::new("Eyes"),
            Material::new("Unused"),
        ];
        for (i, material) in [0usize, 1, 2, 0].into_iter().enumerate() {
            let mesh = Mesh::new(Geometry::default(), MaterialId(material));
            graph.add_child(graph.root(), Node::with_mesh(format!("mesh{i}"), mesh));
        }
        let model = Model::new(ModelGeneration(1), graph, Vec::new(), Vec::new(), materials, Vec::new());

        assert_eq!(model.materials_named("Body"), &[MaterialId(0), MaterialId(1)]);
        assert_eq!(model.materials_named("Eyes"), &[MaterialId(2)]);
        assert!(model.materials_named("Unused").is_empty());
        assert_eq!(model.material_names().collect::<Vec<_>>(), vec!["Body", "Eyes"]);
    }
}
