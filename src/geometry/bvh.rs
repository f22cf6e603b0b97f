use crate::geometry::Aabb;
use crate::math::Vec3;

const NULL: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct BvhNode {
    aabb: Aabb,
    /// Left child, or the item id when this is a leaf
    left: u32,
    /// `NULL` for leaves
    right: u32,
    parent: u32,
    height: i32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.right == NULL
    }
}

/// An AABB tree over integer item ids.
///
/// Trimeshes store one leaf per triangle. Insertion picks the sibling with the
/// lowest surface-area cost and refits ancestors on the way up.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<u32>,
    leaves: usize,
}

impl Bvh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree holding items `0..aabbs.len()`.
    pub fn from_aabbs(aabbs: &[Aabb]) -> Self {
        let mut bvh = Self::new();
        for (id, aabb) in aabbs.iter().enumerate() {
            bvh.insert(id as u32, *aabb);
        }
        bvh
    }

    pub fn insert(&mut self, id: u32, aabb: Aabb) {
        let leaf = self.allocate(BvhNode {
            aabb,
            left: id,
            right: NULL,
            parent: NULL,
            height: 0,
        });
        self.leaves += 1;

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let sibling = self.find_best_sibling(root, aabb);
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate(BvhNode {
            aabb: aabb.union(self.nodes[sibling as usize].aabb),
            left: sibling,
            right: leaf,
            parent: old_parent,
            height: 0,
        });
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL {
            self.root = Some(new_parent);
        } else {
            let parent = &mut self.nodes[old_parent as usize];
            if parent.left == sibling {
                parent.left = new_parent;
            } else {
                parent.right = new_parent;
            }
        }

        self.refit(new_parent);
    }

    /// Calls `callback` with every item whose box overlaps `aabb`.
    pub fn query_aabb(&self, aabb: Aabb, mut callback: impl FnMut(u32)) {
        if let Some(root) = self.root {
            self.visit_aabb(root, aabb, &mut callback);
        }
    }

    fn visit_aabb(&self, current: u32, aabb: Aabb, callback: &mut impl FnMut(u32)) {
        let n = &self.nodes[current as usize];
        if !n.aabb.overlaps(aabb) {
            return;
        }
        if n.is_leaf() {
            callback(n.left);
        } else {
            self.visit_aabb(n.left, aabb, callback);
            self.visit_aabb(n.right, aabb, callback);
        }
    }

    /// Calls `callback` with every item whose box a ray reaches within
    /// `max_distance` (in units of `direction`).
    pub fn query_ray(&self, origin: Vec3, direction: Vec3, max_distance: f64, mut callback: impl FnMut(u32)) {
        if let Some(root) = self.root {
            self.visit_ray(root, origin, direction, max_distance, &mut callback);
        }
    }

    fn visit_ray(&self, current: u32, origin: Vec3, direction: Vec3, max_distance: f64, callback: &mut impl FnMut(u32)) {
        let n = &self.nodes[current as usize];
        match n.aabb.ray_intersection(origin, direction) {
            Some((t_min, _)) if t_min <= max_distance => {}
            _ => return,
        }
        if n.is_leaf() {
            callback(n.left);
        } else {
            self.visit_ray(n.left, origin, direction, max_distance, callback);
            self.visit_ray(n.right, origin, direction, max_distance, callback);
        }
    }

    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn height(&self) -> i32 {
        self.root.map_or(0, |r| self.nodes[r as usize].height)
    }

    fn allocate(&mut self, node: BvhNode) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        index
    }

    fn find_best_sibling(&self, root: u32, leaf_aabb: Aabb) -> u32 {
        let mut best = root;
        let mut best_cost = leaf_aabb.union(self.nodes[root as usize].aabb).surface_area();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let n = &self.nodes[current as usize];
            let combined_cost = leaf_aabb.union(n.aabb).surface_area();

            if combined_cost < best_cost {
                best = current;
                best_cost = combined_cost;
            }

            if !n.is_leaf() {
                let inherited = combined_cost - n.aabb.surface_area();
                let left_cost =
                    leaf_aabb.union(self.nodes[n.left as usize].aabb).surface_area() + inherited;
                let right_cost =
                    leaf_aabb.union(self.nodes[n.right as usize].aabb).surface_area() + inherited;

                if left_cost < best_cost || right_cost < best_cost {
                    stack.push(n.left);
                    stack.push(n.right);
                }
            }
        }

        best
    }

    fn refit(&mut self, start: u32) {
        let mut current = start;

        while current != NULL {
            let (left, right) = {
                let n = &self.nodes[current as usize];
                (n.left, n.right)
            };
            let l = &self.nodes[left as usize];
            let r = &self.nodes[right as usize];
            let aabb = l.aabb.union(r.aabb);
            let height = 1 + l.height.max(r.height);

            let n = &mut self.nodes[current as usize];
            n.aabb = aabb;
            n.height = height;
            current = n.parent;
        }
    }
}
