//! Node actions and context-menu building.
//!
//! Each node carries an [`ActionSet`] of [`NodeAction`] value objects. The
//! session turns a set into a deterministic context menu through
//! [`MenuBuilder`](menu::MenuBuilder); primary activation (double click)
//! fires the set's primary action directly.

pub mod menu;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cloudscape_core::Signal;

use crate::logging::targets;
use crate::model::IconRef;

pub use menu::{MenuBuilder, MenuItem};

/// An activatable command attached to a node.
///
/// The grouping metadata (`group`, `priority`) drives menu layout; see
/// [`MenuBuilder`](menu::MenuBuilder). Listeners attach through
/// [`on_triggered`](Self::on_triggered) and run with per-listener fault
/// isolation: a panicking listener is logged and never propagates to the
/// caller of [`fire`](Self::fire).
pub struct NodeAction {
    name: String,
    /// Menu section. Actions sharing a group render together.
    group: i32,
    /// Order within the group (ascending, ties broken by name).
    priority: i32,
    enabled: AtomicBool,
    icon: Option<IconRef>,
    triggered: Signal<()>,
}

impl NodeAction {
    /// Create an enabled action in group 0 with priority 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: 0,
            priority: 0,
            enabled: AtomicBool::new(true),
            icon: None,
            triggered: Signal::new(),
        }
    }

    /// Set the menu group.
    pub fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    /// Set the in-group priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the initial enabled state.
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::Release);
        self
    }

    /// Set the menu icon.
    pub fn with_icon(mut self, icon: IconRef) -> Self {
        self.icon = Some(icon);
        self
    }

    /// The display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The menu group.
    pub fn group(&self) -> i32 {
        self.group
    }

    /// The in-group priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// The menu icon, if any.
    pub fn icon(&self) -> Option<&IconRef> {
        self.icon.as_ref()
    }

    /// Whether the action can currently be activated.
    ///
    /// Disabled actions stay visible in menus but [`fire`](Self::fire) on
    /// them is a no-op.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable the action.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// The activation signal.
    pub fn on_triggered(&self) -> &Signal<()> {
        &self.triggered
    }

    /// Activate the action, running every listener.
    ///
    /// No-op when disabled.
    pub fn fire(&self) {
        if !self.is_enabled() {
            tracing::trace!(
                target: targets::ACTION,
                action = %self.name,
                "ignoring fire on disabled action"
            );
            return;
        }
        self.triggered.emit(());
    }
}

/// The ordered action collection of one node.
#[derive(Default)]
pub struct ActionSet {
    actions: Vec<Arc<NodeAction>>,
    primary: Option<Arc<NodeAction>>,
}

impl ActionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action, preserving declaration order.
    pub fn with_action(mut self, action: Arc<NodeAction>) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an action and make it the primary (double-click) action.
    pub fn with_primary(mut self, action: Arc<NodeAction>) -> Self {
        self.primary = Some(action.clone());
        self.actions.push(action);
        self
    }

    /// The actions in declaration order.
    pub fn actions(&self) -> &[Arc<NodeAction>] {
        &self.actions
    }

    /// The primary action, if one was declared.
    pub fn primary(&self) -> Option<&Arc<NodeAction>> {
        self.primary.as_ref()
    }

    /// Whether the set has any actions (gates the context menu).
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_fire_runs_listeners() {
        let action = NodeAction::new("Refresh");
        let fired = Arc::new(Mutex::new(0));

        let fired_clone = fired.clone();
        action.on_triggered().connect(move |_| {
            *fired_clone.lock() += 1;
        });

        action.fire();
        action.fire();
        assert_eq!(*fired.lock(), 2);
    }

    #[test]
    fn test_fire_on_disabled_is_noop() {
        let action = NodeAction::new("Delete").with_enabled(false);
        let fired = Arc::new(Mutex::new(0));

        let fired_clone = fired.clone();
        action.on_triggered().connect(move |_| {
            *fired_clone.lock() += 1;
        });

        action.fire();
        assert_eq!(*fired.lock(), 0);

        action.set_enabled(true);
        action.fire();
        assert_eq!(*fired.lock(), 1);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        let action = NodeAction::new("Open");
        let fired = Arc::new(Mutex::new(0));

        action.on_triggered().connect(|_| panic!("listener fault"));
        let fired_clone = fired.clone();
        action.on_triggered().connect(move |_| {
            *fired_clone.lock() += 1;
        });

        action.fire(); // must not propagate the panic
        assert_eq!(*fired.lock(), 1);
    }

    #[test]
    fn test_action_set_primary() {
        let open = Arc::new(NodeAction::new("Open"));
        let delete = Arc::new(NodeAction::new("Delete"));

        let set = ActionSet::new()
            .with_primary(open.clone())
            .with_action(delete);

        assert!(set.has_actions());
        assert_eq!(set.actions().len(), 2);
        assert_eq!(set.primary().map(|a| a.name()), Some("Open"));
    }

    #[test]
    fn test_empty_set_gates_menu() {
        let set = ActionSet::new();
        assert!(!set.has_actions());
        assert!(set.primary().is_none());
    }
}
