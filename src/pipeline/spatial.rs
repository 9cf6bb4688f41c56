//! Spatial hierarchy and bounding geometry for records.
//!
//! Every record owns one node in a [`SceneGraph`]: a fresh child of a fresh
//! root, never shared. The pipeline only consumes the hierarchy through
//! [`SpatialHierarchy::lookup_transform`] to place a record's bounding box in
//! world space.

use crate::pipeline::id::SpatialNodeId;
use glam::{Mat4, Vec3};

/// Axis-aligned box in a record's own frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box spanning the origin to `size`, the usual extent of an image or volume.
    pub fn from_size(size: Vec3) -> Self {
        Self::new(Vec3::ZERO, size)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// The eight corners, ordered by (x, y, z) bit pattern.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Axis-aligned box enclosing all eight corners after `transform`.
    pub fn transformed(&self, transform: &Mat4) -> BoundingBox {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in self.corners() {
            let p = transform.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        BoundingBox { min, max }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

/// External collaborator supplying record transforms.
#[cfg_attr(test, mockall::automock)]
pub trait SpatialHierarchy {
    /// Create a node for a new record: a fresh child of a fresh root.
    fn attach(&mut self) -> SpatialNodeId;

    /// World transform of `node` (root-to-node composition).
    fn lookup_transform(&self, node: SpatialNodeId) -> Mat4;
}

#[derive(Debug, Clone)]
struct SceneNode {
    parent: Option<SpatialNodeId>,
    local: Mat4,
    children: u32,
}

/// Arena-backed transform hierarchy.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<SceneNode>>,
    live: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parentless node with identity transform.
    pub fn add_root(&mut self) -> SpatialNodeId {
        self.push(SceneNode {
            parent: None,
            local: Mat4::IDENTITY,
            children: 0,
        })
    }

    /// Add an identity-transform child under `parent`.
    pub fn add_child(&mut self, parent: SpatialNodeId) -> SpatialNodeId {
        if let Some(Some(p)) = self.nodes.get_mut(parent.index()) {
            p.children += 1;
        }
        self.push(SceneNode {
            parent: Some(parent),
            local: Mat4::IDENTITY,
            children: 0,
        })
    }

    fn push(&mut self, node: SceneNode) -> SpatialNodeId {
        let id = SpatialNodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    /// Replace the local transform of `node`. Returns `false` if it does not exist.
    pub fn set_transform(&mut self, node: SpatialNodeId, local: Mat4) -> bool {
        match self.nodes.get_mut(node.index()) {
            Some(Some(n)) => {
                n.local = local;
                true
            }
            _ => false,
        }
    }

    pub fn parent(&self, node: SpatialNodeId) -> Option<SpatialNodeId> {
        self.nodes
            .get(node.index())
            .and_then(|n| n.as_ref())
            .and_then(|n| n.parent)
    }

    pub fn contains(&self, node: SpatialNodeId) -> bool {
        matches!(self.nodes.get(node.index()), Some(Some(_)))
    }

    /// Remove a node; its parent goes too once it has no children left and is a root.
    pub fn remove(&mut self, node: SpatialNodeId) {
        let Some(removed) = self.nodes.get_mut(node.index()).and_then(Option::take) else {
            return;
        };
        self.live -= 1;
        if let Some(parent) = removed.parent {
            let orphaned_root = match self.nodes.get_mut(parent.index()) {
                Some(Some(p)) => {
                    p.children = p.children.saturating_sub(1);
                    p.children == 0 && p.parent.is_none()
                }
                _ => false,
            };
            if orphaned_root {
                self.remove(parent);
            }
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl SpatialHierarchy for SceneGraph {
    fn attach(&mut self) -> SpatialNodeId {
        let root = self.add_root();
        self.add_child(root)
    }

    fn lookup_transform(&self, node: SpatialNodeId) -> Mat4 {
        let mut world = Mat4::IDENTITY;
        let mut current = Some(node);
        while let Some(id) = current {
            match self.nodes.get(id.index()) {
                Some(Some(n)) => {
                    world = n.local * world;
                    current = n.parent;
                }
                _ => break,
            }
        }
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a:?} != {b:?}");
    }

    #[test]
    fn test_box_normalizes_corners() {
        let b = BoundingBox::new(Vec3::new(2.0, 0.0, 1.0), Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(b.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(2.0, 3.0, 1.0));
        assert!(b.contains_point(Vec3::new(1.0, 1.0, 0.5)));
        assert!(!b.contains_point(Vec3::new(3.0, 1.0, 0.5)));
    }

    #[test]
    fn test_translated_box() {
        let b = BoundingBox::from_size(Vec3::new(10.0, 20.0, 1.0));
        let t = Mat4::from_translation(Vec3::new(5.0, -5.0, 0.0));
        let moved = b.transformed(&t);
        assert_vec_eq(moved.min, Vec3::new(5.0, -5.0, 0.0));
        assert_vec_eq(moved.max, Vec3::new(15.0, 15.0, 1.0));
    }

    #[test]
    fn test_rotated_box_stays_axis_aligned() {
        let b = BoundingBox::from_size(Vec3::new(2.0, 1.0, 0.0));
        let t = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let rotated = b.transformed(&t);
        assert_vec_eq(rotated.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_vec_eq(rotated.max, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_attach_creates_private_root() {
        let mut graph = SceneGraph::new();
        let a = graph.attach();
        let b = graph.attach();
        assert_ne!(graph.parent(a), graph.parent(b));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_lookup_composes_parent_first() {
        let mut graph = SceneGraph::new();
        let node = graph.attach();
        let root = graph.parent(node).unwrap();
        graph.set_transform(root, Mat4::from_scale(Vec3::splat(2.0)));
        graph.set_transform(node, Mat4::from_translation(Vec3::X));

        let world = graph.lookup_transform(node);
        assert_vec_eq(world.transform_point3(Vec3::ZERO), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_remove_drops_orphaned_root() {
        let mut graph = SceneGraph::new();
        let node = graph.attach();
        let root = graph.parent(node).unwrap();
        graph.remove(node);
        assert!(!graph.contains(node));
        assert!(!graph.contains(root));
        assert!(graph.is_empty());
    }
}
