// SPDX-License-Identifier: LGPL-3.0-only

use super::actions::{change_arguments, ActionsObject};
use super::bus::SessionBus;
use super::menus::{root_change, MenusObject};
use super::remote::{fetch_menu, RemoteActions};
use appmenu_core::action::{ActionGroup, ActionSource};
use appmenu_core::error::{AppMenuError, Result};
use appmenu_core::export::{ExportId, ExportService};
use appmenu_core::model::{MenuModel, MenuSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zbus::blocking::Connection;
use zbus::block_on;
use zbus::zvariant::ObjectPath;

enum Exported {
    Menu(MenuModel),
    Actions(ActionGroup),
}

struct Export {
    path: String,
    object: Exported,
    listener: Option<u64>,
}

#[derive(Default)]
struct ServiceState {
    next_id: u32,
    exports: HashMap<ExportId, Export>,
}

/// Publishes menu models as `org.gtk.Menus` and action groups as
/// `org.gtk.Actions` objects on the session bus.
///
/// The bus is connected on the first export. Changes of an exported model or
/// group are announced with the `Changed` signal of its interface.
pub struct DbusExportService {
    bus: SessionBus,
    state: Mutex<ServiceState>,
}

impl DbusExportService {
    /// Create a service connecting to the session bus on demand.
    pub fn new() -> Self {
        Self::with_bus(SessionBus::new())
    }

    /// Create a service on an already opened connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self::with_bus(SessionBus::with_connection(connection))
    }

    fn with_bus(bus: SessionBus) -> Self {
        Self {
            bus,
            state: Mutex::new(ServiceState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live exports.
    pub fn export_count(&self) -> usize {
        self.lock().exports.len()
    }

    fn register(&self, path: &str, object: Exported, listener: Option<u64>) -> ExportId {
        let mut state = self.lock();
        let id = ExportId(state.next_id);
        state.next_id += 1;
        state.exports.insert(
            id,
            Export {
                path: path.to_string(),
                object,
                listener,
            },
        );
        id
    }

    fn is_own_name(&self, bus_name: &str) -> bool {
        self.current_connection_name().as_deref() == Some(bus_name)
    }

    fn local_object(&self, path: &str, menu: bool) -> Option<Exported> {
        self.lock()
            .exports
            .values()
            .filter(|e| e.path == path)
            .find_map(|e| match &e.object {
                Exported::Menu(model) if menu => Some(Exported::Menu(model.clone())),
                Exported::Actions(group) if !menu => Some(Exported::Actions(group.clone())),
                _ => None,
            })
    }
}

impl Default for DbusExportService {
    fn default() -> Self {
        Self::new()
    }
}

fn check_path(path: &str) -> Result<()> {
    ObjectPath::try_from(path)
        .map(|_| ())
        .map_err(|_| AppMenuError::InvalidObjectPath(path.to_string()))
}

fn export_failed(path: &str, reason: impl ToString) -> AppMenuError {
    AppMenuError::ExportFailed {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl ExportService for DbusExportService {
    fn export_menu(&self, path: &str, model: &MenuModel) -> Result<ExportId> {
        check_path(path)?;
        let conn = self.bus.connection()?;
        let server = conn.object_server();
        match server.at(path, MenusObject::new(model.clone())) {
            Ok(true) => {},
            Ok(false) => return Err(export_failed(path, "a menu model is already exported here")),
            Err(e) => return Err(export_failed(path, e)),
        }

        let listener = match server.interface::<_, MenusObject>(path) {
            Ok(iface) => {
                let emitter = iface.signal_emitter().clone();
                Some(model.connect_changed(move |model, change| {
                    let changes = vec![root_change(model, change)];
                    if let Err(err) = block_on(MenusObject::changed(&emitter, changes)) {
                        log::warn!("Failed to emit menu change: {err}");
                    }
                }))
            },
            Err(e) => {
                log::warn!("Menu model at {} will not announce changes: {}", path, e);
                None
            },
        };
        log::debug!("Exported menu model at {}", path);
        Ok(self.register(path, Exported::Menu(model.clone()), listener))
    }

    fn export_actions(&self, path: &str, group: &ActionGroup) -> Result<ExportId> {
        check_path(path)?;
        let conn = self.bus.connection()?;
        let server = conn.object_server();
        match server.at(path, ActionsObject::new(group.clone())) {
            Ok(true) => {},
            Ok(false) => return Err(export_failed(path, "an action group is already exported here")),
            Err(e) => return Err(export_failed(path, e)),
        }

        let listener = match server.interface::<_, ActionsObject>(path) {
            Ok(iface) => {
                let emitter = iface.signal_emitter().clone();
                Some(group.connect_changed(move |change| {
                    let (removals, enables, states, additions) = change_arguments(change);
                    let signal =
                        ActionsObject::changed(&emitter, removals, enables, states, additions);
                    if let Err(err) = block_on(signal) {
                        log::warn!("Failed to emit action change: {err}");
                    }
                }))
            },
            Err(e) => {
                log::warn!("Action group at {} will not announce changes: {}", path, e);
                None
            },
        };
        log::debug!("Exported action group at {}", path);
        Ok(self.register(path, Exported::Actions(group.clone()), listener))
    }

    fn unexport(&self, id: ExportId) {
        let Some(export) = self.lock().exports.remove(&id) else {
            log::warn!("Unexport of unknown {}", id);
            return;
        };
        let server = self.bus.peek().map(|conn| conn.object_server().clone());
        let removed = match &export.object {
            Exported::Menu(model) => {
                if let Some(listener) = export.listener {
                    model.disconnect_changed(listener);
                }
                server.map(|s| s.remove::<MenusObject, _>(export.path.as_str()))
            },
            Exported::Actions(group) => {
                if let Some(listener) = export.listener {
                    group.disconnect_changed(listener);
                }
                server.map(|s| s.remove::<ActionsObject, _>(export.path.as_str()))
            },
        };
        if let Some(Err(e)) = removed {
            log::warn!("Failed to unexport {} at {}: {}", id, export.path, e);
        }
    }

    fn lookup_actions(&self, bus_name: &str, path: &str) -> Option<Arc<dyn ActionSource>> {
        if self.is_own_name(bus_name) {
            return match self.local_object(path, false) {
                Some(Exported::Actions(group)) => Some(Arc::new(group)),
                _ => None,
            };
        }
        let conn = self.bus.connection().ok()?;
        match RemoteActions::connect(&conn, bus_name, path) {
            Ok(remote) => Some(Arc::new(remote)),
            Err(e) => {
                log::debug!("No action group of {} at {}: {}", bus_name, path, e);
                None
            },
        }
    }

    fn lookup_menu(&self, bus_name: &str, path: &str) -> Option<Arc<dyn MenuSource>> {
        if self.is_own_name(bus_name) {
            return match self.local_object(path, true) {
                Some(Exported::Menu(model)) => Some(Arc::new(model)),
                _ => None,
            };
        }
        let conn = self.bus.connection().ok()?;
        match fetch_menu(&conn, bus_name, path) {
            Ok(menu) => Some(Arc::new(menu)),
            Err(e) => {
                log::debug!("No menu model of {} at {}: {}", bus_name, path, e);
                None
            },
        }
    }

    fn current_connection_name(&self) -> Option<String> {
        let conn = self.bus.connection().ok()?;
        conn.unique_name().map(|name| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_is_rejected_before_connecting() {
        let service = DbusExportService::new();
        let model = MenuModel::new();
        assert!(matches!(
            service.export_menu("not/a/path", &model),
            Err(AppMenuError::InvalidObjectPath(_))
        ));
        assert!(matches!(
            service.export_actions("/trailing/", &ActionGroup::new(None)),
            Err(AppMenuError::InvalidObjectPath(_))
        ));
        assert_eq!(service.export_count(), 0);
    }

    #[test]
    fn test_unknown_unexport_is_ignored() {
        let service = DbusExportService::new();
        service.unexport(ExportId(99));
        assert_eq!(service.export_count(), 0);
    }
}
