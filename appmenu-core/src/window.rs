// SPDX-License-Identifier: LGPL-3.0-only

//! Per-window records and their export bookkeeping.
//!
//! A record is created the first time a realized window is looked up and
//! destroyed when the window unrealizes. Its identity (bus name and object
//! paths) is persisted on the window so a later realization resumes the same
//! export instead of publishing a second one.

use crate::action::ActionGroup;
use crate::adapter::ShellAdapter;
use crate::export::{ExportId, ExportService};
use crate::handle::{ShellHandle, WindowHandle};
use crate::model::{MenuModel, MenuSource, Section, SectionOrigin};
use crate::store::{
    object_path_for, KeyValueStore, PersistedIdentity, ACTION_GROUP_PATH_KEY,
    MENU_MODEL_PATH_KEY, UNIQUE_BUS_NAME_KEY,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// State attached to one realized toplevel window.
pub struct WindowRecord {
    window_id: u32,
    menu_model: MenuModel,
    menu_model_export_id: Option<ExportId>,
    action_group: ActionGroup,
    action_group_export_id: Option<ExportId>,
    old_model: Option<Arc<dyn MenuSource>>,
    shells: Vec<(ShellHandle, Box<dyn ShellAdapter>)>,
    exporter: Arc<dyn ExportService>,
}

impl WindowRecord {
    /// Process-local id assigned at creation.
    pub fn window_id(&self) -> u32 {
        self.window_id
    }

    /// The exported menu model.
    pub fn menu_model(&self) -> &MenuModel {
        &self.menu_model
    }

    /// The exported action group.
    pub fn action_group(&self) -> &ActionGroup {
        &self.action_group
    }

    /// Export handles of the menu model and the action group.
    ///
    /// Both are [Some] or both are [None].
    pub fn export_ids(&self) -> Option<(ExportId, ExportId)> {
        self.menu_model_export_id.zip(self.action_group_export_id)
    }

    /// Whether a previously exported menu model was adopted as first section.
    pub fn has_old_model(&self) -> bool {
        self.old_model.is_some()
    }

    /// Connected shells in connection order.
    pub fn shells(&self) -> Vec<ShellHandle> {
        self.shells.iter().map(|(shell, _)| *shell).collect()
    }

    /// Whether `shell` is connected to this window.
    pub fn contains_shell(&self, shell: ShellHandle) -> bool {
        self.shells.iter().any(|(s, _)| *s == shell)
    }

    /// Connect an adapter: its actions join the group and its section is
    /// appended after every existing section.
    pub(crate) fn attach_shell(&mut self, mut adapter: Box<dyn ShellAdapter>) {
        let shell = adapter.shell();
        adapter.connect(&self.action_group);
        let position = self
            .menu_model
            .append_section(Section::new(SectionOrigin::Shell(shell), adapter.section()));
        log::debug!(
            "Connected {} to window {} as section {}",
            shell,
            self.window_id,
            position
        );
        self.shells.push((shell, adapter));
    }

    /// Disconnect `shell`, removing its section and actions.
    ///
    /// Returns `false` when the shell was not connected.
    pub(crate) fn detach_shell(&mut self, shell: ShellHandle) -> bool {
        let Some(position) = self.shells.iter().position(|(s, _)| *s == shell) else {
            return false;
        };
        // The adopted model always occupies section 0.
        let index = usize::from(self.old_model.is_some()) + position;
        match self.menu_model.remove(index) {
            Some(section) if section.origin != SectionOrigin::Shell(shell) => log::warn!(
                "Window {} removed section {:?} while detaching {}",
                self.window_id,
                section.origin,
                shell
            ),
            Some(_) => {},
            None => log::warn!(
                "Window {} has no section {} for {}",
                self.window_id,
                index,
                shell
            ),
        }
        let (_, mut adapter) = self.shells.remove(position);
        adapter.disconnect(&self.action_group);
        log::debug!("Disconnected {} from window {}", shell, self.window_id);
        true
    }

    fn teardown(&mut self) {
        if let Some(id) = self.action_group_export_id.take() {
            self.exporter.unexport(id);
        }
        if let Some(id) = self.menu_model_export_id.take() {
            self.exporter.unexport(id);
        }
        for (_, mut adapter) in self.shells.drain(..) {
            adapter.disconnect(&self.action_group);
        }
        self.old_model = None;
    }
}

impl Drop for WindowRecord {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for WindowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRecord")
            .field("window_id", &self.window_id)
            .field("menu_model_export_id", &self.menu_model_export_id)
            .field("action_group_export_id", &self.action_group_export_id)
            .field("old_model", &self.old_model.is_some())
            .field("shells", &self.shells())
            .finish()
    }
}

/// Owns one [WindowRecord] per realized window.
pub struct WindowRegistry {
    records: HashMap<WindowHandle, WindowRecord>,
    next_window_id: u32,
    store: Arc<dyn KeyValueStore>,
    exporter: Arc<dyn ExportService>,
}

impl WindowRegistry {
    /// Create an empty registry using the given collaborators.
    pub fn new(store: Arc<dyn KeyValueStore>, exporter: Arc<dyn ExportService>) -> Self {
        Self {
            records: HashMap::new(),
            next_window_id: 0,
            store,
            exporter,
        }
    }

    /// The record of `window`, if one exists.
    pub fn get(&self, window: WindowHandle) -> Option<&WindowRecord> {
        self.records.get(&window)
    }

    /// Mutable access to the record of `window`, if one exists.
    pub fn get_mut(&mut self, window: WindowHandle) -> Option<&mut WindowRecord> {
        self.records.get_mut(&window)
    }

    /// Whether `window` has a record.
    pub fn contains(&self, window: WindowHandle) -> bool {
        self.records.contains_key(&window)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record exists.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Return the record of `window`, creating and exporting it on first use.
    pub fn get_or_create(&mut self, window: WindowHandle) -> &mut WindowRecord {
        match self.records.entry(window) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let window_id = self.next_window_id;
                self.next_window_id = window_id.wrapping_add(1);
                entry.insert(create_record(
                    window,
                    window_id,
                    self.store.as_ref(),
                    &self.exporter,
                ))
            },
        }
    }

    /// Tear down the record of `window`.
    ///
    /// Returns `false` when there was nothing to destroy.
    pub fn destroy(&mut self, window: WindowHandle) -> bool {
        match self.records.remove(&window) {
            Some(record) => {
                log::debug!("Destroying record {} of {}", record.window_id, window);
                drop(record);
                true
            },
            None => false,
        }
    }
}

fn create_record(
    window: WindowHandle,
    window_id: u32,
    store: &dyn KeyValueStore,
    exporter: &Arc<dyn ExportService>,
) -> WindowRecord {
    let identity = PersistedIdentity::load(store, window);

    let (old_group, old_menu) = match identity.bus_name.as_deref() {
        Some(bus_name) => (
            identity
                .action_group_path
                .as_deref()
                .and_then(|path| exporter.lookup_actions(bus_name, path)),
            identity
                .menu_model_path
                .as_deref()
                .and_then(|path| exporter.lookup_menu(bus_name, path)),
        ),
        None => (None, None),
    };
    if identity.bus_name.is_some() && old_menu.is_none() {
        log::debug!("No previous menu model to adopt for {}", window);
    }

    let menu_model = MenuModel::new();
    let action_group = ActionGroup::new(old_group);
    if let Some(old) = &old_menu {
        menu_model.append_section(Section::new(SectionOrigin::Previous, old.clone()));
    }

    let object_path = object_path_for(window_id);
    let menu_path = identity
        .menu_model_path
        .clone()
        .unwrap_or_else(|| object_path.clone());
    let action_path = identity
        .action_group_path
        .clone()
        .unwrap_or_else(|| object_path.clone());

    let menu_export = exporter.export_menu(&menu_path, &menu_model);
    let action_export = exporter.export_actions(&action_path, &action_group);
    let (menu_model_export_id, action_group_export_id) = match (menu_export, action_export) {
        (Ok(menu), Ok(actions)) => {
            log::debug!(
                "Exported window {} menu at {} and actions at {}",
                window_id,
                menu_path,
                action_path
            );
            (Some(menu), Some(actions))
        },
        (menu, actions) => {
            // Keep the pair consistent: a half export is withdrawn.
            for result in [menu, actions] {
                match result {
                    Ok(id) => exporter.unexport(id),
                    Err(err) => log::warn!("Window {} stays local: {}", window_id, err),
                }
            }
            (None, None)
        },
    };

    if identity.bus_name.is_none() {
        match exporter.current_connection_name() {
            Some(name) => store.set(window, UNIQUE_BUS_NAME_KEY, Some(&name)),
            None => log::debug!("No bus connection name to persist on {}", window),
        }
    }
    if identity.action_group_path.is_none() {
        store.set(window, ACTION_GROUP_PATH_KEY, Some(&object_path));
    }
    if identity.menu_model_path.is_none() {
        store.set(window, MENU_MODEL_PATH_KEY, Some(&object_path));
    }

    WindowRecord {
        window_id,
        menu_model,
        menu_model_export_id,
        action_group,
        action_group_export_id,
        old_model: old_menu,
        shells: Vec::new(),
        exporter: exporter.clone(),
    }
}
