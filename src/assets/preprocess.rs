use crate::assets::{LoadOptions, ParsedAsset};
use crate::scene::{split_by_joints, Mesh, Node, NodeId, ShaderDefine, ShaderPrecision};
use std::collections::BTreeSet;

/// Normalize a parsed asset before it is installed. Only the asset is
/// touched.
pub fn preprocess(asset: &mut ParsedAsset, options: &LoadOptions, max_joints: usize) {
    split_skinned_meshes(asset, max_joints);

    let mesh_nodes: Vec<NodeId> = asset.graph.mesh_nodes().map(|(id, _)| id).collect();
    let mut transparent: BTreeSet<NodeId> = BTreeSet::new();
    for id in mesh_nodes {
        let Some(mesh) = asset.graph.mesh_mut(id) else {
            continue;
        };
        if options.regenerate_normal {
            mesh.geometry.generate_vertex_normals();
        }
        mesh.geometry.update_bounding_box();
        if let Some(double_sided) = options.double_sided {
            mesh.culling = !double_sided;
        }
        if asset
            .materials
            .get(mesh.material.index())
            .is_some_and(|material| material.transparent)
        {
            mesh.cast_shadow = false;
            transparent.insert(id);
        }
    }

    for material in &mut asset.materials {
        material.define(ShaderDefine::AlphaTest);
        material.define(ShaderDefine::DiffuseMapAlphaAlpha);
        if let Some(double_sided) = options.double_sided {
            material.set_defined(ShaderDefine::DoubleSided, double_sided);
        }
        material.precision = ShaderPrecision::Mediump;
        if let Some(cutoff) = options.alpha_cutoff {
            material.alpha_cutoff = cutoff;
        }
    }
    if !transparent.is_empty() {
        log::debug!("{} transparent meshes will not cast shadows", transparent.len());
    }
}

/// Replace skinned meshes whose joint palette exceeds `max_joints` with
/// child nodes that each stay within it.
fn split_skinned_meshes(asset: &mut ParsedAsset, max_joints: usize) {
    let oversized: Vec<NodeId> = asset
        .graph
        .mesh_nodes()
        .filter(|(_, mesh)| mesh.is_skinned() && mesh.joints.len() > max_joints)
        .map(|(id, _)| id)
        .collect();

    for id in oversized {
        let Some(node) = asset.graph.node_mut(id) else {
            continue;
        };
        let Some(mesh) = node.mesh.take() else {
            continue;
        };
        let name = node.name.clone();
        let pieces = split_by_joints(&mesh.geometry, &mesh.joints, max_joints);
        log::debug!(
            "Split mesh {name} ({} joints) into {} draws",
            mesh.joints.len(),
            pieces.len()
        );
        for (index, (geometry, palette)) in pieces.into_iter().enumerate() {
            let mut piece = Mesh {
                geometry,
                joints: palette,
                original_mesh_name: Some(name.clone()),
                ..mesh.clone()
            };
            piece.geometry.update_bounding_box();
            asset
                .graph
                .add_child(id, Node::with_mesh(format!("{name}_{index}"), piece));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, Material, MaterialId, NodeGraph, SkeletonId};

    fn skinned_strip(joint_count: u16) -> Mesh {
        // one triangle per joint, each fully weighted to that joint
        let mut positions = Vec::new();
        let mut joints = Vec::new();
        for j in 0..joint_count {
            let x = j as f32;
            positions.extend([[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]]);
            joints.extend([[j, 0, 0, 0]; 3]);
        }
        let count = positions.len();
        let mut geometry = Geometry::new(positions, None);
        geometry.joints = joints;
        geometry.weights = vec![[1.0, 0.0, 0.0, 0.0]; count];
        let mut mesh = Mesh::new(geometry, MaterialId(0));
        mesh.skeleton = Some(SkeletonId(0));
        mesh.joints = (0..joint_count as u32).collect();
        mesh
    }

    fn asset_with(mesh: Mesh, material: Material) -> ParsedAsset {
        let mut graph = NodeGraph::new("model");
        let root = graph.root();
        let node = graph.add_child(root, Node::with_mesh("body", mesh));
        ParsedAsset {
            graph,
            nodes: vec![node],
            materials: vec![material],
            mesh_count: 1,
            ..ParsedAsset::default()
        }
    }

    #[test]
    fn oversized_skins_are_split_within_limit() {
        let mut asset = asset_with(skinned_strip(20), Material::new("skin"));
        preprocess(&mut asset, &LoadOptions::default(), 15);

        let body = asset.nodes[0];
        assert!(asset.graph.mesh(body).is_none());
        let pieces: Vec<&Mesh> = asset.graph.mesh_nodes().map(|(_, mesh)| mesh).collect();
        assert_eq!(pieces.len(), 2);
        let triangles: usize = pieces.iter().map(|m| m.geometry.triangle_count()).sum();
        assert_eq!(triangles, 20);
        for piece in pieces {
            assert!(piece.joints.len() <= 15);
            assert_eq!(piece.original_mesh_name.as_deref(), Some("body"));
        }
    }

    #[test]
    fn small_skins_are_left_alone() {
        let mut asset = asset_with(skinned_strip(4), Material::new("skin"));
        preprocess(&mut asset, &LoadOptions::default(), 15);
        assert!(asset.graph.mesh(asset.nodes[0]).is_some());
    }

    #[test]
    fn options_drive_culling_and_material_defines() {
        let mut transparent = Material::new("glass");
        transparent.transparent = true;
        let mut asset = asset_with(skinned_strip(1), transparent);
        let options = LoadOptions {
            double_sided: Some(true),
            alpha_cutoff: Some(0.3),
            regenerate_normal: true,
            ..LoadOptions::default()
        };
        preprocess(&mut asset, &options, 15);

        let mesh = asset.graph.mesh(asset.nodes[0]).unwrap();
        assert!(!mesh.culling);
        assert!(!mesh.cast_shadow);
        assert_eq!(mesh.geometry.normals.len(), mesh.geometry.vertex_count());

        let material = &asset.materials[0];
        assert!(material.is_defined(ShaderDefine::AlphaTest));
        assert!(material.is_defined(ShaderDefine::DiffuseMapAlphaAlpha));
        assert!(material.is_defined(ShaderDefine::DoubleSided));
        assert_eq!(material.precision, ShaderPrecision::Mediump);
        assert_eq!(material.alpha_cutoff, 0.3);
    }

    #[test]
    fn unset_options_leave_culling() {
        let mut asset = asset_with(skinned_strip(1), Material::new("skin"));
        preprocess(&mut asset, &LoadOptions::default(), 15);
        let mesh = asset.graph.mesh(asset.nodes[0]).unwrap();
        assert!(mesh.culling && mesh.cast_shadow);
        assert!(!asset.materials[0].is_defined(ShaderDefine::DoubleSided));
    }
}
