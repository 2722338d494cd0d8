//! Deterministic context-menu layout.
//!
//! The menu for a node is a pure function of its action set: actions are
//! grouped by their integer `group` in first-occurrence order, sorted by
//! `(priority, name)` within each group, and groups are separated by a
//! single separator. Separators never lead, trail, or double up.
//! Disabled actions are included; rendering them greyed out is the host's
//! job.

use std::sync::Arc;

use super::NodeAction;

/// One rendered entry of a context menu.
pub enum MenuItem {
    /// An activatable (or visibly disabled) action.
    Action(Arc<NodeAction>),
    /// A divider between two groups.
    Separator,
}

impl MenuItem {
    /// Whether this item is a separator.
    pub fn is_separator(&self) -> bool {
        matches!(self, MenuItem::Separator)
    }
}

/// Builds menu layouts from action sets.
pub struct MenuBuilder;

impl MenuBuilder {
    /// Lay out the given actions as a menu.
    ///
    /// Group order follows the first occurrence of each group id in
    /// `actions`; order within a group is `(priority, name)` ascending.
    pub fn build(actions: &[Arc<NodeAction>]) -> Vec<MenuItem> {
        let mut groups: Vec<(i32, Vec<Arc<NodeAction>>)> = Vec::new();
        for action in actions {
            match groups.iter_mut().find(|(id, _)| *id == action.group()) {
                Some((_, members)) => members.push(action.clone()),
                None => groups.push((action.group(), vec![action.clone()])),
            }
        }

        for (_, members) in &mut groups {
            members.sort_by(|a, b| {
                a.priority()
                    .cmp(&b.priority())
                    .then_with(|| a.name().cmp(b.name()))
            });
        }

        let mut items = Vec::new();
        for (_, members) in groups {
            if !items.is_empty() {
                items.push(MenuItem::Separator);
            }
            items.extend(members.into_iter().map(MenuItem::Action));
        }
        items
    }
}
