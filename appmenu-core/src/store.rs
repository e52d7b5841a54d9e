// SPDX-License-Identifier: LGPL-3.0-only

//! Per-window string properties used to persist the exported identity.

use crate::handle::WindowHandle;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Property holding the unique bus name of the exporting connection.
pub const UNIQUE_BUS_NAME_KEY: &str = "_GTK_UNIQUE_BUS_NAME";

/// Property holding the object path of the exported action group.
pub const ACTION_GROUP_PATH_KEY: &str = "_UNITY_OBJECT_PATH";

/// Property holding the object path of the exported menu model.
pub const MENU_MODEL_PATH_KEY: &str = "_GTK_MENUBAR_OBJECT_PATH";

/// Base of freshly generated object paths, suffixed with the window id.
pub const OBJECT_PATH_BASE: &str = "/org/valapanel/appmenu/gtk/window";

/// Build the object path for a window id.
pub fn object_path_for(window_id: u32) -> String {
    format!("{}/{}", OBJECT_PATH_BASE, window_id)
}

/// Named string properties attached to a window.
///
/// Backends must tolerate a missing underlying channel: reads return [None]
/// and writes become no-ops.
pub trait KeyValueStore: Send + Sync {
    /// Read a property.
    fn get(&self, window: WindowHandle, key: &str) -> Option<String>;

    /// Write a property, or delete it when `value` is [None].
    fn set(&self, window: WindowHandle, key: &str, value: Option<&str>);
}

/// The three identity properties as read from a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedIdentity {
    /// Unique bus name of the connection that exported the window menu.
    pub bus_name: Option<String>,
    /// Object path of the action group.
    pub action_group_path: Option<String>,
    /// Object path of the menu model.
    pub menu_model_path: Option<String>,
}

impl PersistedIdentity {
    /// Read the identity properties of `window`.
    pub fn load(store: &dyn KeyValueStore, window: WindowHandle) -> Self {
        Self {
            bus_name: store.get(window, UNIQUE_BUS_NAME_KEY),
            action_group_path: store.get(window, ACTION_GROUP_PATH_KEY),
            menu_model_path: store.get(window, MENU_MODEL_PATH_KEY),
        }
    }
}

/// Process-local property store.
///
/// Used where no windowing-system channel exists, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<(WindowHandle, String), String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of properties set on a window.
    pub fn len_for(&self, window: WindowHandle) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(w, _)| *w == window)
            .count()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, window: WindowHandle, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(window, key.to_string()))
            .cloned()
    }

    fn set(&self, window: WindowHandle, key: &str, value: Option<&str>) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => {
                values.insert((window, key.to_string()), value.to_string());
            },
            None => {
                values.remove(&(window, key.to_string()));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_none_deletes() {
        let store = MemoryStore::new();
        let window = WindowHandle(1);
        store.set(window, MENU_MODEL_PATH_KEY, Some("/a"));
        assert_eq!(store.get(window, MENU_MODEL_PATH_KEY).as_deref(), Some("/a"));
        store.set(window, MENU_MODEL_PATH_KEY, None);
        assert_eq!(store.get(window, MENU_MODEL_PATH_KEY), None);
    }

    #[test]
    fn test_identity_is_per_window() {
        let store = MemoryStore::new();
        store.set(WindowHandle(1), UNIQUE_BUS_NAME_KEY, Some(":1.42"));

        let first = PersistedIdentity::load(&store, WindowHandle(1));
        let second = PersistedIdentity::load(&store, WindowHandle(2));
        assert_eq!(first.bus_name.as_deref(), Some(":1.42"));
        assert_eq!(second, PersistedIdentity::default());
    }

    #[test]
    fn test_object_path_for() {
        assert_eq!(object_path_for(3), "/org/valapanel/appmenu/gtk/window/3");
    }
}
