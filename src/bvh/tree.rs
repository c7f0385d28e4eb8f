//! Dynamic bounding-volume hierarchy.
//!
//! Leaves carry a bound and a payload; branches carry the union of their two
//! children. Nodes live in an arena so a [`NodeHandle`] stays valid while
//! other leaves are inserted or deleted around it. Insertion picks a sibling
//! with the surface heuristic; deletion splices the sibling into the removed
//! parent's place. Neither rotates, so the tree is balanced only as well as
//! the insertion order allows.

use super::bound::Bound;
use super::vector::Vector;

/// Stable reference to a leaf.
///
/// Invalidated by [`Tree::delete`]; a stale handle never aliases a newer leaf
/// that happens to reuse the same arena slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: usize,
    generation: u32,
}

enum Kind<T> {
    Leaf(T),
    Branch([usize; 2]),
}

struct Node<B, T> {
    bound: B,
    parent: Option<usize>,
    generation: u32,
    kind: Kind<T>,
}

enum Slot<B, T> {
    Occupied(Node<B, T>),
    Vacant { next: Option<usize>, generation: u32 },
}

pub struct Tree<B, T> {
    slots: Vec<Slot<B, T>>,
    root: Option<usize>,
    free: Option<usize>,
    leaves: usize,
}

impl<B: Bound, T> Default for Tree<B, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bound, T> Tree<B, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            root: None,
            free: None,
            leaves: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.leaves
    }

    pub fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    // -----------------------------------------------------------------------
    // Arena
    // -----------------------------------------------------------------------

    fn node(&self, index: usize) -> &Node<B, T> {
        match &self.slots[index] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => panic!("bvh: dangling node index {index}"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<B, T> {
        match &mut self.slots[index] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => panic!("bvh: dangling node index {index}"),
        }
    }

    fn alloc(&mut self, bound: B, parent: Option<usize>, kind: Kind<T>) -> usize {
        match self.free {
            Some(index) => {
                let Slot::Vacant { next, generation } = self.slots[index] else {
                    panic!("bvh: free list points at an occupied slot");
                };
                self.free = next;
                self.slots[index] = Slot::Occupied(Node {
                    bound,
                    parent,
                    generation,
                    kind,
                });
                index
            }
            None => {
                self.slots.push(Slot::Occupied(Node {
                    bound,
                    parent,
                    generation: 0,
                    kind,
                }));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) -> Node<B, T> {
        let generation = self.node(index).generation.wrapping_add(1);
        let slot = std::mem::replace(
            &mut self.slots[index],
            Slot::Vacant {
                next: self.free,
                generation,
            },
        );
        self.free = Some(index);
        match slot {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    fn leaf_index(&self, handle: NodeHandle) -> Option<usize> {
        match self.slots.get(handle.index)? {
            Slot::Occupied(node)
                if node.generation == handle.generation && matches!(node.kind, Kind::Leaf(_)) =>
            {
                Some(handle.index)
            }
            _ => None,
        }
    }

    fn handle_of(&self, index: usize) -> NodeHandle {
        NodeHandle {
            index,
            generation: self.node(index).generation,
        }
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.leaf_index(handle).is_some()
    }

    pub fn bound(&self, handle: NodeHandle) -> Option<&B> {
        self.leaf_index(handle).map(|i| &self.node(i).bound)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        let index = self.leaf_index(handle)?;
        match &self.node(index).kind {
            Kind::Leaf(value) => Some(value),
            Kind::Branch(_) => None,
        }
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        let index = self.leaf_index(handle)?;
        match &mut self.node_mut(index).kind {
            Kind::Leaf(value) => Some(value),
            Kind::Branch(_) => None,
        }
    }

    /// Every leaf, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &B, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied(Node {
                bound,
                generation,
                kind: Kind::Leaf(value),
                ..
            }) => Some((
                NodeHandle {
                    index,
                    generation: *generation,
                },
                bound,
                value,
            )),
            _ => None,
        })
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Add a leaf and return its handle.
    pub fn insert(&mut self, bound: B, value: T) -> NodeHandle {
        let leaf = self.alloc(bound, None, Kind::Leaf(value));
        self.leaves += 1;

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return self.handle_of(leaf);
        };

        let sibling = self.pick_sibling(root, &bound);
        let old_parent = self.node(sibling).parent;
        let merged = self.node(sibling).bound.union(&bound);
        let branch = self.alloc(merged, old_parent, Kind::Branch([sibling, leaf]));
        self.node_mut(sibling).parent = Some(branch);
        self.node_mut(leaf).parent = Some(branch);

        match old_parent {
            Some(parent) => {
                self.replace_child(parent, sibling, branch);
                self.refit(Some(parent));
            }
            None => self.root = Some(branch),
        }

        self.handle_of(leaf)
    }

    /// Remove a leaf, returning its payload. Stale or foreign handles are
    /// ignored.
    pub fn delete(&mut self, handle: NodeHandle) -> Option<T> {
        let leaf = self.leaf_index(handle)?;
        let parent = self.node(leaf).parent;
        let value = match self.release(leaf).kind {
            Kind::Leaf(value) => value,
            Kind::Branch(_) => unreachable!(),
        };
        self.leaves -= 1;

        let Some(parent) = parent else {
            self.root = None;
            return Some(value);
        };

        let Kind::Branch(children) = self.node(parent).kind else {
            unreachable!()
        };
        let sibling = if children[0] == leaf {
            children[1]
        } else {
            children[0]
        };
        let grandparent = self.release(parent).parent;
        self.node_mut(sibling).parent = grandparent;

        match grandparent {
            Some(grandparent) => {
                self.replace_child(grandparent, parent, sibling);
                self.refit(Some(grandparent));
            }
            None => self.root = Some(sibling),
        }

        Some(value)
    }

    /// Move a payload to a new bound by deleting and reinserting it.
    ///
    /// Returns the fresh handle, or `None` if `handle` was stale.
    pub fn update(&mut self, handle: NodeHandle, bound: B) -> Option<NodeHandle> {
        let value = self.delete(handle)?;
        Some(self.insert(bound, value))
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let Kind::Branch(children) = &mut self.node_mut(parent).kind {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }

    fn refit(&mut self, mut index: Option<usize>) {
        while let Some(i) = index {
            let Kind::Branch([a, b]) = self.node(i).kind else {
                unreachable!()
            };
            let bound = self.node(a).bound.union(&self.node(b).bound);
            let node = self.node_mut(i);
            node.bound = bound;
            index = node.parent;
        }
    }

    /// Descend from `index` towards the cheapest sibling for a new leaf.
    fn pick_sibling(&self, mut index: usize, bound: &B) -> usize {
        while let Kind::Branch([a, b]) = self.node(index).kind {
            let current = &self.node(index).bound;
            let combined = current.union(bound).surface();
            // Cost of pairing the new leaf with this whole subtree.
            let here = combined + combined;
            // Every level below inherits the growth of this node's bound.
            let inherited = combined - current.surface();

            let cost_a = self.descend_cost(a, bound) + inherited;
            let cost_b = self.descend_cost(b, bound) + inherited;
            if here < cost_a && here < cost_b {
                break;
            }
            index = if cost_a < cost_b { a } else { b };
        }
        index
    }

    fn descend_cost(&self, index: usize, bound: &B) -> <B::Point as Vector>::Scalar {
        let node = self.node(index);
        let merged = node.bound.union(bound).surface();
        match node.kind {
            Kind::Leaf(_) => merged,
            Kind::Branch(_) => merged - node.bound.surface(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Visit every leaf whose bound contains `point`. Returning `false` from
    /// the visitor stops the traversal.
    pub fn find<F>(&self, point: B::Point, mut visitor: F)
    where
        F: FnMut(NodeHandle, &T) -> bool,
    {
        self.traverse(|bound| bound.within(point), &mut visitor);
    }

    /// Visit every leaf whose bound overlaps `region`.
    pub fn find_touching<F>(&self, region: &B, mut visitor: F)
    where
        F: FnMut(NodeHandle, &T) -> bool,
    {
        self.traverse(|bound| bound.touch(region), &mut visitor);
    }

    fn traverse<P, F>(&self, accept: P, visitor: &mut F)
    where
        P: Fn(&B) -> bool,
        F: FnMut(NodeHandle, &T) -> bool,
    {
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = self.node(index);
            if !accept(&node.bound) {
                continue;
            }
            match &node.kind {
                Kind::Leaf(value) => {
                    let handle = NodeHandle {
                        index,
                        generation: node.generation,
                    };
                    if !visitor(handle, value) {
                        return;
                    }
                }
                Kind::Branch([a, b]) => {
                    stack.push(*a);
                    stack.push(*b);
                }
            }
        }
    }

    /// Longest root-to-leaf path; zero for an empty tree.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Kind::Branch([a, b]) = self.node(index).kind {
                stack.push((a, depth + 1));
                stack.push((b, depth + 1));
            }
        }
        deepest
    }
}
