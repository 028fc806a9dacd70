//! Recursive group traversal
//!
//! Validation and translation both walk groups the same way: visit every
//! condition and nested group in order, then combine the children's results
//! at the enclosing group. `fold_group` is that walk, parameterized by a leaf
//! callback and a node callback.

use crate::condition::Condition;
use crate::group::{Group, GroupItem};
use std::fmt;

/// Position of a group inside a descriptor.
///
/// Indices are 1-based. The first index is the top-level group's position in
/// `QueryDescriptor::groups`; each following index is a nested group's
/// position inside its parent's `conditions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupPath {
    indices: Vec<usize>,
}

impl GroupPath {
    pub fn root(index: usize) -> Self {
        Self {
            indices: vec![index],
        }
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.indices.len() + 1);
        indices.extend_from_slice(&self.indices);
        indices.push(index);
        Self { indices }
    }

    /// Depth of the addressed group; top-level groups have depth 1
    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// Renders as `Group 2, Nested Group 1, Nested Group 3`
impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, index) in self.indices.iter().enumerate() {
            if position == 0 {
                write!(f, "Group {}", index)?;
            } else {
                write!(f, ", Nested Group {}", index)?;
            }
        }
        Ok(())
    }
}

/// Fold a group bottom-up.
///
/// `leaf` receives the enclosing group's path, the condition's 1-based position
/// in that group, and the condition. `node` receives the group's path, the
/// group, and the folded results of its children in order.
pub fn fold_group<'a, T, L, N>(group: &'a Group, path: &GroupPath, leaf: &mut L, node: &mut N) -> T
where
    L: FnMut(&GroupPath, usize, &'a Condition) -> T,
    N: FnMut(&GroupPath, &'a Group, Vec<T>) -> T,
{
    let mut children = Vec::with_capacity(group.conditions.len());

    for (position, item) in group.conditions.iter().enumerate() {
        let child = match item {
            GroupItem::Condition(condition) => leaf(path, position + 1, condition),
            GroupItem::Group(nested) => fold_group(nested, &path.child(position + 1), leaf, node),
        };
        children.push(child);
    }

    node(path, group, children)
}
