// SPDX-License-Identifier: LGPL-3.0-only

//! Action group aggregating the actions of all connected menu shells.

use crate::handle::ShellHandle;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback run when an action is activated.
pub type ActionCallback = Arc<dyn Fn() + Send + Sync>;

/// Public description of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInfo {
    /// Action name, unique within the group.
    pub name: String,
    /// Whether the action can be activated.
    pub enabled: bool,
    /// Toggle state for check items.
    pub state: Option<bool>,
}

/// An invocable action contributed by a menu shell.
#[derive(Clone)]
pub struct Action {
    /// Description of the action.
    pub info: ActionInfo,
    callback: Option<ActionCallback>,
}

impl Action {
    /// Create an enabled stateless action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ActionInfo {
                name: name.into(),
                enabled: true,
                state: None,
            },
            callback: None,
        }
    }

    /// Set the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.info.enabled = enabled;
        self
    }

    /// Make this a toggle action with the given state.
    pub fn with_state(mut self, state: bool) -> Self {
        self.info.state = Some(state);
        self
    }

    /// Set the activation callback.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("info", &self.info).finish()
    }
}

/// Anything that exposes a list of invocable actions.
pub trait ActionSource: Send + Sync {
    /// Describe all actions.
    fn list_actions(&self) -> Vec<ActionInfo>;

    /// Activate an action by name. Returns `false` if it is unknown or disabled.
    fn activate(&self, name: &str) -> bool;
}

/// Additions and removals reported to group listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionsChange {
    /// Names of removed actions.
    pub removed: Vec<String>,
    /// Newly added actions.
    pub added: Vec<ActionInfo>,
    /// Toggle state changes.
    pub state_changes: Vec<(String, bool)>,
}

type ChangeListener = Arc<dyn Fn(&ActionsChange) + Send + Sync>;

#[derive(Default)]
struct GroupState {
    fallback: Option<Arc<dyn ActionSource>>,
    shells: IndexMap<ShellHandle, Vec<Action>>,
    listeners: Vec<(u64, ChangeListener)>,
    next_listener: u64,
}

/// Actions of all shells connected to one window, backed by an optional
/// fallback group discovered from a previous realization.
#[derive(Clone, Default)]
pub struct ActionGroup {
    state: Arc<Mutex<GroupState>>,
}

impl ActionGroup {
    /// Create a group delegating unknown names to `fallback`.
    pub fn new(fallback: Option<Arc<dyn ActionSource>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GroupState {
                fallback,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a fallback group is attached.
    pub fn has_fallback(&self) -> bool {
        self.lock().fallback.is_some()
    }

    /// Add the actions of a shell, replacing any previous contribution of it.
    pub fn connect_shell(&self, shell: ShellHandle, actions: Vec<Action>) {
        let change = {
            let mut state = self.lock();
            let removed = state
                .shells
                .insert(shell, actions.clone())
                .map(|old| old.into_iter().map(|a| a.info.name).collect())
                .unwrap_or_default();
            ActionsChange {
                removed,
                added: actions.into_iter().map(|a| a.info).collect(),
                state_changes: Vec::new(),
            }
        };
        self.notify(&change);
    }

    /// Remove all actions of a shell. Returns `false` if it contributed none.
    pub fn disconnect_shell(&self, shell: ShellHandle) -> bool {
        let removed = self.lock().shells.shift_remove(&shell);
        match removed {
            Some(actions) => {
                self.notify(&ActionsChange {
                    removed: actions.into_iter().map(|a| a.info.name).collect(),
                    ..Default::default()
                });
                true
            },
            None => false,
        }
    }

    /// Shells currently contributing actions, in connection order.
    pub fn shells(&self) -> Vec<ShellHandle> {
        self.lock().shells.keys().copied().collect()
    }

    /// Describe one action.
    pub fn describe(&self, name: &str) -> Option<ActionInfo> {
        self.list_actions().into_iter().find(|a| a.name == name)
    }

    /// Change the toggle state of an action owned by a shell.
    pub fn set_state(&self, name: &str, value: bool) -> bool {
        let changed = {
            let mut state = self.lock();
            let action = state
                .shells
                .values_mut()
                .flat_map(|actions| actions.iter_mut())
                .find(|a| a.info.name == name && a.info.state.is_some());
            match action {
                Some(action) if action.info.state != Some(value) => {
                    action.info.state = Some(value);
                    true
                },
                _ => false,
            }
        };
        if changed {
            self.notify(&ActionsChange {
                state_changes: vec![(name.to_string(), value)],
                ..Default::default()
            });
        }
        changed
    }

    /// Register a listener called after every change.
    pub fn connect_changed<F>(&self, listener: F) -> u64
    where
        F: Fn(&ActionsChange) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener registered with [ActionGroup::connect_changed].
    pub fn disconnect_changed(&self, id: u64) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    fn notify(&self, change: &ActionsChange) {
        let listeners: Vec<ChangeListener> =
            self.lock().listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(change);
        }
    }
}

impl ActionSource for ActionGroup {
    fn list_actions(&self) -> Vec<ActionInfo> {
        let (mut out, fallback) = {
            let state = self.lock();
            let own: Vec<ActionInfo> = state
                .shells
                .values()
                .flat_map(|actions| actions.iter().map(|a| a.info.clone()))
                .collect();
            (own, state.fallback.clone())
        };
        if let Some(fallback) = fallback {
            for info in fallback.list_actions() {
                if !out.iter().any(|a| a.name == info.name) {
                    out.push(info);
                }
            }
        }
        out
    }

    fn activate(&self, name: &str) -> bool {
        let (found, fallback) = {
            let state = self.lock();
            let found = state
                .shells
                .values()
                .flat_map(|actions| actions.iter())
                .find(|a| a.info.name == name)
                .map(|a| (a.info.enabled, a.callback.clone()));
            (found, state.fallback.clone())
        };
        match found {
            Some((true, callback)) => {
                if let Some(callback) = callback {
                    callback();
                }
                true
            },
            Some((false, _)) => {
                log::debug!("Ignoring activation of disabled action '{}'", name);
                false
            },
            None => fallback.map(|f| f.activate(name)).unwrap_or(false),
        }
    }
}

impl fmt::Debug for ActionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ActionGroup")
            .field("shells", &state.shells.keys().collect::<Vec<_>>())
            .field("fallback", &state.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<ActionInfo>);

    impl ActionSource for Fixed {
        fn list_actions(&self) -> Vec<ActionInfo> {
            self.0.clone()
        }

        fn activate(&self, name: &str) -> bool {
            self.0.iter().any(|a| a.name == name)
        }
    }

    #[test]
    fn test_activate_runs_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let group = ActionGroup::new(None);
        group.connect_shell(
            ShellHandle(1),
            vec![Action::new("open").with_callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        );

        assert!(group.activate("open"));
        assert!(!group.activate("missing"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_action_is_not_activated() {
        let group = ActionGroup::new(None);
        group.connect_shell(ShellHandle(1), vec![Action::new("quit").with_enabled(false)]);
        assert!(!group.activate("quit"));
    }

    #[test]
    fn test_fallback_is_shadowed_by_shell_actions() {
        let fallback = Fixed(vec![
            ActionInfo { name: "open".into(), enabled: false, state: None },
            ActionInfo { name: "about".into(), enabled: true, state: None },
        ]);
        let group = ActionGroup::new(Some(Arc::new(fallback)));
        group.connect_shell(ShellHandle(1), vec![Action::new("open")]);

        let names: Vec<_> = group.list_actions().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["open", "about"]);
        assert_eq!(group.describe("open").map(|a| a.enabled), Some(true));
        assert!(group.activate("about"));
    }

    #[test]
    fn test_disconnect_reports_removed_names() {
        let group = ActionGroup::new(None);
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = removed.clone();
        group.connect_changed(move |change| {
            sink.lock().unwrap().extend(change.removed.clone());
        });

        group.connect_shell(ShellHandle(3), vec![Action::new("a"), Action::new("b")]);
        assert!(group.disconnect_shell(ShellHandle(3)));
        assert!(!group.disconnect_shell(ShellHandle(3)));
        assert_eq!(*removed.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_set_state_only_on_toggles() {
        let group = ActionGroup::new(None);
        group.connect_shell(
            ShellHandle(1),
            vec![Action::new("wrap").with_state(false), Action::new("plain")],
        );
        assert!(group.set_state("wrap", true));
        assert!(!group.set_state("wrap", true));
        assert!(!group.set_state("plain", true));
        assert_eq!(group.describe("wrap").and_then(|a| a.state), Some(true));
    }
}
