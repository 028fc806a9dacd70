use crate::condition::{Condition, Logic};
use serde::{Deserialize, Serialize};

/// Child of a group: a condition or another group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupItem {
    Group(Group),
    Condition(Condition),
}

impl From<Condition> for GroupItem {
    fn from(condition: Condition) -> Self {
        GroupItem::Condition(condition)
    }
}

impl From<Group> for GroupItem {
    fn from(group: Group) -> Self {
        GroupItem::Group(group)
    }
}

/// Boolean container of conditions and nested groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub conditions: Vec<GroupItem>,
    pub logic: Logic,
}

impl Group {
    pub fn new(logic: Logic, conditions: Vec<GroupItem>) -> Self {
        Self { conditions, logic }
    }

    /// Create AND group
    pub fn and(conditions: Vec<GroupItem>) -> Self {
        Self::new(Logic::And, conditions)
    }

    /// Create OR group
    pub fn or(conditions: Vec<GroupItem>) -> Self {
        Self::new(Logic::Or, conditions)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Nesting depth; a group without nested groups has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .conditions
            .iter()
            .filter_map(|item| match item {
                GroupItem::Group(group) => Some(group.depth()),
                GroupItem::Condition(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Number of groups in this subtree, this one included
    pub fn group_count(&self) -> usize {
        1 + self
            .conditions
            .iter()
            .map(|item| match item {
                GroupItem::Group(group) => group.group_count(),
                GroupItem::Condition(_) => 0,
            })
            .sum::<usize>()
    }

    /// All conditions in this subtree, depth first
    pub fn leaf_conditions(&self) -> Vec<&Condition> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Condition>) {
        for item in &self.conditions {
            match item {
                GroupItem::Condition(condition) => leaves.push(condition),
                GroupItem::Group(group) => group.collect_leaves(leaves),
            }
        }
    }
}
