use glam::{Mat4, Vec2, Vec3};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bbox = Self::EMPTY;
        for point in points {
            bbox.expand(point);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.expand(other.min);
        self.expand(other.max);
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.max + self.min) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min, self.max);
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }

    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::from_points(self.corners().iter().map(|c| matrix.transform_point3(*c)))
    }
}

/// CPU-side vertex data for one mesh primitive. Attributes other than
/// positions are either empty or one entry per vertex.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub joints: Vec<[u16; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Option<Vec<u32>>,
    bounding_box: Aabb,
}

impl Geometry {
    pub fn new(positions: Vec<[f32; 3]>, indices: Option<Vec<u32>>) -> Self {
        let mut geometry = Self {
            positions,
            indices,
            ..Self::default()
        };
        geometry.update_bounding_box();
        geometry
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Triangles whose three indices all address a vertex.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        let count = self.positions.len();
        (0..self.triangle_count())
            .map(move |tri| match &self.indices {
                Some(indices) => [indices[tri * 3], indices[tri * 3 + 1], indices[tri * 3 + 2]],
                None => {
                    let base = (tri * 3) as u32;
                    [base, base + 1, base + 2]
                }
            })
            .filter(move |triangle| triangle.iter().all(|&index| (index as usize) < count))
    }

    /// Origin for an index past the vertex list.
    pub fn position(&self, index: u32) -> Vec3 {
        self.positions
            .get(index as usize)
            .map_or(Vec3::ZERO, |p| Vec3::from_array(*p))
    }

    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    pub fn update_bounding_box(&mut self) {
        self.bounding_box = Aabb::from_points(self.positions.iter().map(|p| Vec3::from_array(*p)));
    }

    pub fn has_tangents(&self) -> bool {
        self.tangents
            .as_ref()
            .is_some_and(|tangents| tangents.len() == self.positions.len())
    }

    /// Area-weighted smooth normals.
    pub fn generate_vertex_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.triangles() {
            let (pa, pb, pc) = (self.position(a), self.position(b), self.position(c));
            let face = (pb - pa).cross(pc - pa);
            normals[a as usize] += face;
            normals[b as usize] += face;
            normals[c as usize] += face;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
            .collect();
    }

    /// Per-vertex tangents from positions, normals and the first UV set.
    /// Returns false when the attributes needed are missing.
    pub fn generate_tangents(&mut self) -> bool {
        let count = self.positions.len();
        if self.uvs.len() != count {
            return false;
        }
        if self.normals.len() != count {
            self.generate_vertex_normals();
        }
        let mut tan = vec![Vec3::ZERO; count];
        let mut bitan = vec![Vec3::ZERO; count];
        for [a, b, c] in self.triangles() {
            let (pa, pb, pc) = (self.position(a), self.position(b), self.position(c));
            let (ua, ub, uc) = (
                Vec2::from_array(self.uvs[a as usize]),
                Vec2::from_array(self.uvs[b as usize]),
                Vec2::from_array(self.uvs[c as usize]),
            );
            let (e1, e2) = (pb - pa, pc - pa);
            let (d1, d2) = (ub - ua, uc - ua);
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (e1 * d2.y - e2 * d1.y) * r;
            let tdir = (e2 * d1.x - e1 * d2.x) * r;
            for index in [a, b, c] {
                tan[index as usize] += sdir;
                bitan[index as usize] += tdir;
            }
        }
        let tangents = (0..count)
            .map(|i| {
                let n = Vec3::from_array(self.normals[i]);
                let t = tan[i];
                // Gram-Schmidt orthogonalize
                let ortho = (t - n * n.dot(t)).try_normalize().unwrap_or(Vec3::X);
                let w = if n.cross(t).dot(bitan[i]) < 0.0 { -1.0 } else { 1.0 };
                [ortho.x, ortho.y, ortho.z, w]
            })
            .collect();
        self.tangents = Some(tangents);
        true
    }

    fn sub_geometry(&self, triangles: &[[u32; 3]]) -> Geometry {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut out = Geometry::default();
        let mut indices = Vec::with_capacity(triangles.len() * 3);
        let mut tangents = self.tangents.as_ref().map(|_| Vec::new());
        for triangle in triangles {
            if triangle.iter().any(|&index| index as usize >= self.positions.len()) {
                continue;
            }
            for &old in triangle {
                let i = old as usize;
                let Some(position) = self.positions.get(i) else {
                    continue;
                };
                let next = remap.len() as u32;
                let new = *remap.entry(old).or_insert_with(|| {
                    out.positions.push(*position);
                    if let Some(normal) = self.normals.get(i) {
                        out.normals.push(*normal);
                    }
                    if let Some(uv) = self.uvs.get(i) {
                        out.uvs.push(*uv);
                    }
                    if let (Some(dst), Some(src)) = (tangents.as_mut(), self.tangents.as_ref()) {
                        if let Some(tangent) = src.get(i) {
                            dst.push(*tangent);
                        }
                    }
                    if let Some(joint) = self.joints.get(i) {
                        out.joints.push(*joint);
                    }
                    if let Some(weight) = self.weights.get(i) {
                        out.weights.push(*weight);
                    }
                    next
                });
                indices.push(new);
            }
        }
        out.tangents = tangents;
        out.indices = Some(indices);
        out.update_bounding_box();
        out
    }

    fn triangle_joints(&self, triangle: &[u32; 3], palette: &[u32]) -> BTreeSet<u32> {
        let mut joints = BTreeSet::new();
        for &vertex in triangle {
            let i = vertex as usize;
            let (Some(joint), Some(weight)) = (self.joints.get(i), self.weights.get(i)) else {
                continue;
            };
            for k in 0..4 {
                if weight[k] > 0.0 {
                    if let Some(&skeleton_joint) = palette.get(joint[k] as usize) {
                        joints.insert(skeleton_joint);
                    }
                }
            }
        }
        joints
    }
}

/// Partition a skinned geometry into pieces that each reference at most
/// `max_joints` skeleton joints. Each returned geometry has its joint
/// attribute rewritten against the returned palette.
pub fn split_by_joints(
    geometry: &Geometry,
    palette: &[u32],
    max_joints: usize,
) -> Vec<(Geometry, Vec<u32>)> {
    let max_joints = max_joints.max(1);
    let mut remaining: Vec<[u32; 3]> = geometry.triangles().collect();
    let mut pieces = Vec::new();

    while !remaining.is_empty() {
        let mut used: BTreeSet<u32> = BTreeSet::new();
        let mut taken = Vec::new();
        let mut deferred = Vec::new();
        for triangle in remaining {
            let joints = geometry.triangle_joints(&triangle, palette);
            let union = used.union(&joints).count();
            if union <= max_joints || taken.is_empty() {
                if union > max_joints {
                    log::warn!(
                        "Triangle references {} joints, above the per-draw limit of {}",
                        joints.len(),
                        max_joints
                    );
                }
                used.extend(joints);
                taken.push(triangle);
            } else {
                deferred.push(triangle);
            }
        }
        remaining = deferred;

        let piece_palette: Vec<u32> = used.into_iter().collect();
        let lookup: HashMap<u32, u16> = piece_palette
            .iter()
            .enumerate()
            .map(|(local, &joint)| (joint, local as u16))
            .collect();
        let mut piece = geometry.sub_geometry(&taken);
        for (joint, weight) in piece.joints.iter_mut().zip(piece.weights.iter()) {
            for k in 0..4 {
                let skeleton_joint = palette.get(joint[k] as usize).copied();
                joint[k] = match skeleton_joint.and_then(|j| lookup.get(&j)) {
                    Some(&local) if weight[k] > 0.0 => local,
                    _ => 0,
                };
            }
        }
        pieces.push((piece, piece_palette));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(triangles: usize) -> Geometry {
        let mut positions = Vec::new();
        let mut joints = Vec::new();
        let mut weights = Vec::new();
        for tri in 0..triangles {
            let x = tri as f32;
            positions.extend([[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]]);
            for _ in 0..3 {
                joints.push([tri as u16, 0, 0, 0]);
                weights.push([1.0, 0.0, 0.0, 0.0]);
            }
        }
        let mut geometry = Geometry::new(positions, None);
        geometry.joints = joints;
        geometry.weights = weights;
        geometry
    }

    #[test]
    fn empty_geometry_has_empty_bounds() {
        let geometry = Geometry::new(Vec::new(), None);
        assert!(geometry.bounding_box().is_empty());
    }

    #[test]
    fn normals_point_out_of_a_ccw_triangle() {
        let mut geometry = Geometry::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            Some(vec![0, 1, 2]),
        );
        geometry.generate_vertex_normals();
        assert_eq!(geometry.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn triangles_past_the_vertex_list_are_ignored() {
        let mut geometry = Geometry::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            Some(vec![0, 1, 2, 0, 1, 7]),
        );
        geometry.uvs = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert_eq!(geometry.triangles().collect::<Vec<_>>(), vec![[0, 1, 2]]);
        assert_eq!(geometry.position(7), Vec3::ZERO);

        geometry.generate_vertex_normals();
        assert_eq!(geometry.normals[2], [0.0, 0.0, 1.0]);
        assert!(geometry.generate_tangents());

        let piece = geometry.sub_geometry(&[[0, 1, 7], [0, 1, 2]]);
        assert_eq!(piece.indices, Some(vec![0, 1, 2]));
        assert_eq!(piece.vertex_count(), 3);
    }

    #[test]
    fn tangents_need_uvs() {
        let mut geometry = Geometry::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
        );
        assert!(!geometry.generate_tangents());
        geometry.uvs = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(geometry.generate_tangents());
        assert!(geometry.has_tangents());
        let t = geometry.tangents.as_ref().unwrap()[0];
        assert!((t[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn split_keeps_every_piece_within_the_limit() {
        let geometry = strip(40);
        let palette: Vec<u32> = (0..40).collect();
        let pieces = split_by_joints(&geometry, &palette, 15);
        assert_eq!(pieces.len(), 3);
        let total: usize = pieces.iter().map(|(g, _)| g.triangle_count()).sum();
        assert_eq!(total, 40);
        for (piece, piece_palette) in &pieces {
            assert!(piece_palette.len() <= 15);
            for joint in &piece.joints {
                assert!((joint[0] as usize) < piece_palette.len());
            }
        }
    }
}
