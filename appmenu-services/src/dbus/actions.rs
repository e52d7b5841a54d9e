// SPDX-License-Identifier: LGPL-3.0-only

//! `org.gtk.Actions` object serving an [ActionGroup].

use appmenu_core::action::{ActionGroup, ActionInfo, ActionSource, ActionsChange};
use std::collections::HashMap;
use zbus::interface;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Signature};
use zbus::fdo;

/// Interface name of exported action groups.
pub const ACTIONS_INTERFACE: &str = "org.gtk.Actions";

/// `(enabled, parameter type, state)` of one action.
pub type ActionDescription = (bool, Signature, Vec<OwnedValue>);

/// Actions never take a parameter; boolean states are the only ones exported.
pub fn describe(info: &ActionInfo) -> ActionDescription {
    let state = info.state.map(OwnedValue::from).into_iter().collect();
    (info.enabled, Signature::Unit, state)
}

/// Parse a description back into an [ActionInfo].
pub fn parse_description(name: &str, description: &ActionDescription) -> ActionInfo {
    let (enabled, _, state) = description;
    ActionInfo {
        name: name.to_string(),
        enabled: *enabled,
        state: state.first().and_then(|v| bool::try_from(v).ok()),
    }
}

/// Arguments of the `Changed` signal for a group change.
pub fn change_arguments(
    change: &ActionsChange,
) -> (
    Vec<String>,
    HashMap<String, bool>,
    HashMap<String, OwnedValue>,
    HashMap<String, ActionDescription>,
) {
    let state_changes = change
        .state_changes
        .iter()
        .map(|(name, value)| (name.clone(), OwnedValue::from(*value)))
        .collect();
    let additions = change
        .added
        .iter()
        .map(|info| (info.name.clone(), describe(info)))
        .collect();
    (change.removed.clone(), HashMap::new(), state_changes, additions)
}

/// Exported action group.
pub struct ActionsObject {
    group: ActionGroup,
}

impl ActionsObject {
    /// Serve `group`.
    pub fn new(group: ActionGroup) -> Self {
        Self { group }
    }

    fn require(&self, name: &str) -> fdo::Result<ActionInfo> {
        self.group
            .describe(name)
            .ok_or_else(|| fdo::Error::InvalidArgs(format!("Unknown action '{}'", name)))
    }
}

#[interface(name = "org.gtk.Actions")]
impl ActionsObject {
    #[zbus(name = "List")]
    async fn list(&self) -> Vec<String> {
        self.group.list_actions().into_iter().map(|a| a.name).collect()
    }

    #[zbus(name = "Describe")]
    async fn describe(&self, action_name: &str) -> fdo::Result<ActionDescription> {
        self.require(action_name).map(|info| describe(&info))
    }

    #[zbus(name = "DescribeAll")]
    async fn describe_all(&self) -> HashMap<String, ActionDescription> {
        self.group
            .list_actions()
            .iter()
            .map(|info| (info.name.clone(), describe(info)))
            .collect()
    }

    /// Stateful actions flip their state after the callback ran.
    #[zbus(name = "Activate")]
    async fn activate(
        &self,
        action_name: &str,
        _parameter: Vec<OwnedValue>,
        _platform_data: HashMap<String, OwnedValue>,
    ) -> fdo::Result<()> {
        log::debug!("Actions.Activate {}", action_name);
        let info = self.require(action_name)?;
        if !self.group.activate(action_name) {
            return Ok(());
        }
        if let Some(state) = info.state {
            self.group.set_state(action_name, !state);
        }
        Ok(())
    }

    #[zbus(name = "SetState")]
    async fn set_state(
        &self,
        action_name: &str,
        value: OwnedValue,
        _platform_data: HashMap<String, OwnedValue>,
    ) -> fdo::Result<()> {
        self.require(action_name)?;
        let value = bool::try_from(&value)
            .map_err(|e| fdo::Error::InvalidArgs(format!("State of '{}': {}", action_name, e)))?;
        self.group.set_state(action_name, value);
        Ok(())
    }

    #[zbus(signal)]
    #[zbus(name = "Changed")]
    pub async fn changed(
        emitter: &SignalEmitter<'_>,
        removals: Vec<String>,
        enable_changes: HashMap<String, bool>,
        state_changes: HashMap<String, OwnedValue>,
        additions: HashMap<String, ActionDescription>,
    ) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use appmenu_core::action::Action;
    use appmenu_core::ShellHandle;

    #[test]
    fn test_describe_stateful_action() {
        let info = ActionInfo {
            name: "fullscreen".into(),
            enabled: false,
            state: Some(true),
        };
        let description = describe(&info);
        assert!(!description.0);
        assert_eq!(description.2.len(), 1);
        assert_eq!(parse_description("fullscreen", &description), info);
    }

    #[test]
    fn test_change_arguments() {
        let change = ActionsChange {
            removed: vec!["old".into()],
            added: vec![ActionInfo {
                name: "new".into(),
                enabled: true,
                state: None,
            }],
            state_changes: vec![("toggle".into(), false)],
        };
        let (removals, enables, states, additions) = change_arguments(&change);
        assert_eq!(removals, vec!["old"]);
        assert!(enables.is_empty());
        assert_eq!(states.get("toggle").and_then(|v| bool::try_from(v).ok()), Some(false));
        assert!(additions.get("new").is_some_and(|d| d.2.is_empty()));
    }

    #[test]
    fn test_unknown_action_is_invalid() {
        let group = ActionGroup::new(None);
        group.connect_shell(ShellHandle(1), vec![Action::new("quit")]);
        let object = ActionsObject::new(group);
        assert!(object.require("quit").is_ok());
        assert!(matches!(object.require("nope"), Err(fdo::Error::InvalidArgs(_))));
    }
}
