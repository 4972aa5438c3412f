use crate::scene::graph::{NodeGraph, NodeId};
use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkeletonId(pub(crate) usize);

impl SkeletonId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub node: NodeId,
    pub inverse_bind: Mat4,
}

/// Joint list of one skin. `update` samples the current world pose of the
/// joint nodes; the resulting matrices map bind-space vertices to world.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub name: String,
    joints: Vec<Joint>,
    joint_matrices: Vec<Mat4>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>, joints: Vec<Joint>) -> Self {
        let joint_matrices = vec![Mat4::IDENTITY; joints.len()];
        Self {
            name: name.into(),
            joints,
            joint_matrices,
        }
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Expects world transforms of `graph` to be current.
    pub fn update(&mut self, graph: &NodeGraph) {
        for (matrix, joint) in self.joint_matrices.iter_mut().zip(&self.joints) {
            *matrix = graph.world_matrix(joint.node) * joint.inverse_bind;
        }
    }
}
