// SPDX-License-Identifier: LGPL-3.0-only

//! Adapters turning one native menu shell into a menu section and actions.

use crate::action::{Action, ActionGroup};
use crate::handle::ShellHandle;
use crate::model::{MenuItem, MenuSource, StaticMenu};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Wraps one menu shell into an exportable section plus a contribution to a
/// window's action group. Dropping the adapter releases it.
pub trait ShellAdapter: Send {
    /// The wrapped shell.
    fn shell(&self) -> ShellHandle;

    /// The section this shell contributes to the window menu.
    fn section(&self) -> Arc<dyn MenuSource>;

    /// Add this shell's actions to `group`.
    fn connect(&mut self, group: &ActionGroup);

    /// Remove this shell's actions from `group`.
    fn disconnect(&mut self, group: &ActionGroup);
}

/// Builds adapters for menu shells.
pub trait ShellAdapterFactory: Send + Sync {
    /// Create an adapter for `shell`.
    fn create(&self, shell: ShellHandle) -> Box<dyn ShellAdapter>;
}

/// Items and actions declared by a menu shell.
#[derive(Debug, Clone, Default)]
pub struct ShellTemplate {
    /// Items shown in the shell.
    pub items: Vec<MenuItem>,
    /// Actions referenced by the items.
    pub actions: Vec<Action>,
}

impl ShellTemplate {
    /// Create an empty template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item bound to an action of the same name.
    pub fn with_item(mut self, item: MenuItem, action: Option<Action>) -> Self {
        let item = match &action {
            Some(action) if item.action.is_none() => item.with_action(action.info.name.clone()),
            _ => item,
        };
        self.items.push(item);
        if let Some(action) = action {
            self.actions.push(action);
        }
        self
    }
}

/// Adapter over a [ShellTemplate].
pub struct TemplateShellAdapter {
    shell: ShellHandle,
    menu: Arc<StaticMenu>,
    actions: Vec<Action>,
    connected: bool,
}

impl TemplateShellAdapter {
    /// Create an adapter for `shell` from its template.
    pub fn new(shell: ShellHandle, template: ShellTemplate) -> Self {
        Self {
            shell,
            menu: Arc::new(StaticMenu::new(template.items)),
            actions: template.actions,
            connected: false,
        }
    }
}

impl ShellAdapter for TemplateShellAdapter {
    fn shell(&self) -> ShellHandle {
        self.shell
    }

    fn section(&self) -> Arc<dyn MenuSource> {
        self.menu.clone()
    }

    fn connect(&mut self, group: &ActionGroup) {
        group.connect_shell(self.shell, self.actions.clone());
        self.connected = true;
    }

    fn disconnect(&mut self, group: &ActionGroup) {
        group.disconnect_shell(self.shell);
        self.connected = false;
    }
}

impl Drop for TemplateShellAdapter {
    fn drop(&mut self) {
        if self.connected {
            log::warn!("Adapter for {} released while still connected", self.shell);
        }
    }
}

/// Factory handing out [TemplateShellAdapter]s from registered templates.
///
/// Shells without a registered template produce an empty section.
#[derive(Default)]
pub struct TemplateShellFactory {
    templates: Mutex<HashMap<ShellHandle, ShellTemplate>>,
}

impl TemplateShellFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the template of a shell.
    pub fn register(&self, shell: ShellHandle, template: ShellTemplate) {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(shell, template);
    }
}

impl ShellAdapterFactory for TemplateShellFactory {
    fn create(&self, shell: ShellHandle) -> Box<dyn ShellAdapter> {
        let template = self
            .templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&shell)
            .cloned()
            .unwrap_or_default();
        Box::new(TemplateShellAdapter::new(shell, template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSource;

    #[test]
    fn test_template_binds_action_names() {
        let template = ShellTemplate::new()
            .with_item(MenuItem::new("_Open"), Some(Action::new("open")))
            .with_item(MenuItem::new("Recent"), None);
        assert_eq!(template.items[0].action.as_deref(), Some("open"));
        assert_eq!(template.items[1].action, None);
        assert_eq!(template.actions.len(), 1);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let factory = TemplateShellFactory::new();
        factory.register(
            ShellHandle(9),
            ShellTemplate::new().with_item(MenuItem::new("Quit"), Some(Action::new("quit"))),
        );
        let group = ActionGroup::new(None);
        let mut adapter = factory.create(ShellHandle(9));
        assert_eq!(adapter.section().items().len(), 1);

        adapter.connect(&group);
        assert_eq!(group.list_actions().len(), 1);
        adapter.disconnect(&group);
        assert!(group.list_actions().is_empty());
    }

    #[test]
    fn test_unknown_shell_is_empty() {
        let factory = TemplateShellFactory::new();
        let adapter = factory.create(ShellHandle(1));
        assert!(adapter.section().items().is_empty());
    }
}
