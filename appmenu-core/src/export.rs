// SPDX-License-Identifier: LGPL-3.0-only

//! Object export service interface and an in-process implementation.

use crate::action::{ActionGroup, ActionSource};
use crate::error::{AppMenuError, Result};
use crate::model::{MenuModel, MenuSource};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle of a live export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExportId(pub u32);

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "export #{}", self.0)
    }
}

/// Process-wide facility publishing menu models and action groups.
///
/// Calls are fire-and-forget from the caller's point of view. Lookups that
/// cannot be resolved return [None] instead of an error.
pub trait ExportService: Send + Sync {
    /// Publish a menu model at `path`.
    fn export_menu(&self, path: &str, model: &MenuModel) -> Result<ExportId>;

    /// Publish an action group at `path`.
    fn export_actions(&self, path: &str, group: &ActionGroup) -> Result<ExportId>;

    /// Withdraw a previous export.
    fn unexport(&self, id: ExportId);

    /// Discover an action group exported by `bus_name` at `path`.
    fn lookup_actions(&self, bus_name: &str, path: &str) -> Option<Arc<dyn ActionSource>>;

    /// Discover a menu model exported by `bus_name` at `path`.
    fn lookup_menu(&self, bus_name: &str, path: &str) -> Option<Arc<dyn MenuSource>>;

    /// Unique name of this process' connection, if connected.
    fn current_connection_name(&self) -> Option<String>;
}

enum Exported {
    Menu(String, MenuModel),
    Actions(String, ActionGroup),
}

impl Exported {
    fn path(&self) -> &str {
        match self {
            Exported::Menu(path, _) | Exported::Actions(path, _) => path,
        }
    }
}

#[derive(Default)]
struct LocalState {
    next_id: u32,
    live: HashMap<ExportId, Exported>,
    unexported: Vec<ExportId>,
    remote_menus: HashMap<(String, String), Arc<dyn MenuSource>>,
    remote_actions: HashMap<(String, String), Arc<dyn ActionSource>>,
}

/// Export service living entirely inside the process.
///
/// Serves as the degraded mode when no bus is reachable and as the test
/// double for the registries. Objects exported here can be looked up again
/// under [LocalExportService::connection_name].
pub struct LocalExportService {
    name: String,
    available: AtomicBool,
    state: Mutex<LocalState>,
}

impl LocalExportService {
    /// Create a service answering to `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: AtomicBool::new(true),
            state: Mutex::new(LocalState {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name this service answers lookups for.
    pub fn connection_name(&self) -> &str {
        &self.name
    }

    /// Simulate losing or regaining the bus.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make a menu model discoverable as if another connection exported it.
    pub fn publish_remote_menu(&self, bus_name: &str, path: &str, menu: Arc<dyn MenuSource>) {
        self.lock()
            .remote_menus
            .insert((bus_name.to_string(), path.to_string()), menu);
    }

    /// Make an action group discoverable as if another connection exported it.
    pub fn publish_remote_actions(&self, bus_name: &str, path: &str, group: Arc<dyn ActionSource>) {
        self.lock()
            .remote_actions
            .insert((bus_name.to_string(), path.to_string()), group);
    }

    /// Paths of live menu exports, sorted.
    pub fn menu_paths(&self) -> Vec<String> {
        self.live_paths(|e| matches!(e, Exported::Menu(..)))
    }

    /// Paths of live action group exports, sorted.
    pub fn action_paths(&self) -> Vec<String> {
        self.live_paths(|e| matches!(e, Exported::Actions(..)))
    }

    fn live_paths(&self, filter: impl Fn(&Exported) -> bool) -> Vec<String> {
        let mut paths: Vec<String> = self
            .lock()
            .live
            .values()
            .filter(|e| filter(e))
            .map(|e| e.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    /// The menu model exported at `path`, if any.
    pub fn menu_at(&self, path: &str) -> Option<MenuModel> {
        self.lock().live.values().find_map(|e| match e {
            Exported::Menu(p, model) if p == path => Some(model.clone()),
            _ => None,
        })
    }

    /// Number of live exports.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// How many times `id` was unexported.
    pub fn unexport_count(&self, id: ExportId) -> usize {
        self.lock().unexported.iter().filter(|u| **u == id).count()
    }

    /// Total number of unexport calls.
    pub fn total_unexports(&self) -> usize {
        self.lock().unexported.len()
    }

    fn insert(&self, path: &str, exported: Exported) -> Result<ExportId> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AppMenuError::BusUnavailable(self.name.clone()));
        }
        let mut state = self.lock();
        let clash = state.live.values().any(|e| {
            e.path() == path && std::mem::discriminant(e) == std::mem::discriminant(&exported)
        });
        if clash {
            return Err(AppMenuError::ExportFailed {
                path: path.to_string(),
                reason: "an object is already exported at this path".to_string(),
            });
        }
        let id = ExportId(state.next_id);
        state.next_id += 1;
        state.live.insert(id, exported);
        Ok(id)
    }
}

impl Default for LocalExportService {
    fn default() -> Self {
        Self::new(":local.1")
    }
}

impl ExportService for LocalExportService {
    fn export_menu(&self, path: &str, model: &MenuModel) -> Result<ExportId> {
        self.insert(path, Exported::Menu(path.to_string(), model.clone()))
    }

    fn export_actions(&self, path: &str, group: &ActionGroup) -> Result<ExportId> {
        self.insert(path, Exported::Actions(path.to_string(), group.clone()))
    }

    fn unexport(&self, id: ExportId) {
        let mut state = self.lock();
        state.unexported.push(id);
        if state.live.remove(&id).is_none() {
            log::warn!("Unexport of unknown {}", id);
        }
    }

    fn lookup_actions(&self, bus_name: &str, path: &str) -> Option<Arc<dyn ActionSource>> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        let state = self.lock();
        if let Some(remote) = state
            .remote_actions
            .get(&(bus_name.to_string(), path.to_string()))
        {
            return Some(remote.clone());
        }
        if bus_name != self.name {
            return None;
        }
        state.live.values().find_map(|e| match e {
            Exported::Actions(p, group) if p == path => {
                Some(Arc::new(group.clone()) as Arc<dyn ActionSource>)
            },
            _ => None,
        })
    }

    fn lookup_menu(&self, bus_name: &str, path: &str) -> Option<Arc<dyn MenuSource>> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        let state = self.lock();
        if let Some(remote) = state
            .remote_menus
            .get(&(bus_name.to_string(), path.to_string()))
        {
            return Some(remote.clone());
        }
        if bus_name != self.name {
            return None;
        }
        state.live.values().find_map(|e| match e {
            Exported::Menu(p, model) if p == path => {
                Some(Arc::new(model.clone()) as Arc<dyn MenuSource>)
            },
            _ => None,
        })
    }

    fn current_connection_name(&self) -> Option<String> {
        self.available
            .load(Ordering::SeqCst)
            .then(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_and_unexport() {
        let service = LocalExportService::default();
        let model = MenuModel::new();
        let id = service.export_menu("/w/0", &model).unwrap();
        assert_eq!(service.menu_paths(), vec!["/w/0".to_string()]);
        assert!(service.menu_at("/w/0").unwrap().ptr_eq(&model));

        service.unexport(id);
        assert!(service.menu_paths().is_empty());
        assert_eq!(service.unexport_count(id), 1);
    }

    #[test]
    fn test_menu_and_actions_share_a_path() {
        let service = LocalExportService::default();
        service.export_menu("/w/0", &MenuModel::new()).unwrap();
        service.export_actions("/w/0", &ActionGroup::new(None)).unwrap();
        assert!(service.export_menu("/w/0", &MenuModel::new()).is_err());
    }

    #[test]
    fn test_unavailable_bus() {
        let service = LocalExportService::default();
        service.set_available(false);
        assert!(matches!(
            service.export_menu("/w/0", &MenuModel::new()),
            Err(AppMenuError::BusUnavailable(_))
        ));
        assert!(service.current_connection_name().is_none());
    }

    #[test]
    fn test_lookup_only_answers_own_name() {
        let service = LocalExportService::new(":1.5");
        service.export_menu("/w/0", &MenuModel::new()).unwrap();
        assert!(service.lookup_menu(":1.5", "/w/0").is_some());
        assert!(service.lookup_menu(":1.6", "/w/0").is_none());
        assert!(service.lookup_actions(":1.5", "/w/0").is_none());
    }
}
