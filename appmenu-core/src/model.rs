// SPDX-License-Identifier: LGPL-3.0-only

//! Exported menu model built from independent sections.

use crate::handle::ShellHandle;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A single entry of an exported menu.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuItem {
    /// Display label, with the toolkit's mnemonic underscores preserved.
    pub label: Option<String>,
    /// Name of the action activated by this item.
    pub action: Option<String>,
    /// Keyboard accelerator in toolkit notation (e.g. `<Control>n`).
    pub accel: Option<String>,
    /// Items of the submenu opened by this entry.
    pub submenu: Vec<MenuItem>,
}

impl MenuItem {
    /// Create an item with a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    /// Set the action name.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the accelerator.
    pub fn with_accel(mut self, accel: impl Into<String>) -> Self {
        self.accel = Some(accel.into());
        self
    }

    /// Append an item to the submenu.
    pub fn with_submenu_item(mut self, item: MenuItem) -> Self {
        self.submenu.push(item);
        self
    }

    /// Check if this item opens a submenu.
    pub fn has_submenu(&self) -> bool {
        !self.submenu.is_empty()
    }
}

/// Anything that can provide the items of one section.
pub trait MenuSource: Send + Sync {
    /// Current items of this source.
    fn items(&self) -> Vec<MenuItem>;
}

/// Where a section of a window menu came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOrigin {
    /// A menu model discovered on the bus from a previous realization.
    Previous,
    /// The contribution of a connected menu shell.
    Shell(ShellHandle),
}

/// One independently addressable slice of a menu model.
#[derive(Clone)]
pub struct Section {
    /// Source of this section.
    pub origin: SectionOrigin,
    /// Provider of the section items.
    pub source: Arc<dyn MenuSource>,
}

impl Section {
    /// Create a new section.
    pub fn new(origin: SectionOrigin, source: Arc<dyn MenuSource>) -> Self {
        Self { origin, source }
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section").field("origin", &self.origin).finish()
    }
}

/// A change of the section list: `removed` sections at `position` were
/// replaced by `added` new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelChange {
    /// Index of the first affected section.
    pub position: usize,
    /// Number of sections removed.
    pub removed: usize,
    /// Number of sections added.
    pub added: usize,
}

type ChangeListener = Arc<dyn Fn(&MenuModel, ModelChange) + Send + Sync>;

#[derive(Default)]
struct ModelState {
    sections: Vec<Section>,
    revision: u32,
    listeners: Vec<(u64, ChangeListener)>,
    next_listener: u64,
}

/// A menu made of sections. Cloning yields another handle to the same model.
#[derive(Clone, Default)]
pub struct MenuModel {
    state: Arc<Mutex<ModelState>>,
}

impl MenuModel {
    /// Create an empty menu model.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sections.
    pub fn n_sections(&self) -> usize {
        self.lock().sections.len()
    }

    /// Revision counter, bumped on every change.
    pub fn revision(&self) -> u32 {
        self.lock().revision
    }

    /// Snapshot of all sections in order.
    pub fn sections(&self) -> Vec<Section> {
        self.lock().sections.clone()
    }

    /// Origins of all sections in order.
    pub fn origins(&self) -> Vec<SectionOrigin> {
        self.lock().sections.iter().map(|s| s.origin).collect()
    }

    /// Append a section and return its index.
    pub fn append_section(&self, section: Section) -> usize {
        let position = {
            let mut state = self.lock();
            state.sections.push(section);
            state.revision = state.revision.wrapping_add(1).max(1);
            state.sections.len() - 1
        };
        self.notify(ModelChange {
            position,
            removed: 0,
            added: 1,
        });
        position
    }

    /// Remove the section at `position`.
    ///
    /// Returns [None] when the index is out of range.
    pub fn remove(&self, position: usize) -> Option<Section> {
        let removed = {
            let mut state = self.lock();
            if position >= state.sections.len() {
                return None;
            }
            state.revision = state.revision.wrapping_add(1).max(1);
            state.sections.remove(position)
        };
        self.notify(ModelChange {
            position,
            removed: 1,
            added: 0,
        });
        Some(removed)
    }

    /// Register a listener called after every change of the section list.
    pub fn connect_changed<F>(&self, listener: F) -> u64
    where
        F: Fn(&MenuModel, ModelChange) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = state.next_listener;
        state.next_listener += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener registered with [MenuModel::connect_changed].
    pub fn disconnect_changed(&self, id: u64) {
        self.lock().listeners.retain(|(lid, _)| *lid != id);
    }

    fn notify(&self, change: ModelChange) {
        // Listeners run unlocked so they can read the model back.
        let listeners: Vec<ChangeListener> =
            self.lock().listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(self, change);
        }
    }

    /// Check whether two handles point at the same model.
    pub fn ptr_eq(&self, other: &MenuModel) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl MenuSource for MenuModel {
    fn items(&self) -> Vec<MenuItem> {
        self.sections()
            .iter()
            .flat_map(|section| section.source.items())
            .collect()
    }
}

impl fmt::Debug for MenuModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MenuModel")
            .field("sections", &state.sections)
            .field("revision", &state.revision)
            .finish()
    }
}

/// A fixed list of items.
#[derive(Debug, Clone, Default)]
pub struct StaticMenu {
    items: Vec<MenuItem>,
}

impl StaticMenu {
    /// Create a static menu from items.
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }
}

impl MenuSource for StaticMenu {
    fn items(&self) -> Vec<MenuItem> {
        self.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn section(origin: SectionOrigin, label: &str) -> Section {
        Section::new(origin, Arc::new(StaticMenu::new(vec![MenuItem::new(label)])))
    }

    #[test]
    fn test_sections_keep_append_order() {
        let model = MenuModel::new();
        assert_eq!(model.append_section(section(SectionOrigin::Previous, "a")), 0);
        assert_eq!(model.append_section(section(SectionOrigin::Shell(ShellHandle(7)), "b")), 1);

        let labels: Vec<_> = model.items().into_iter().filter_map(|i| i.label).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert_eq!(
            model.origins(),
            vec![SectionOrigin::Previous, SectionOrigin::Shell(ShellHandle(7))]
        );
    }

    #[test]
    fn test_remove_out_of_range() {
        let model = MenuModel::new();
        assert!(model.remove(0).is_none());
        assert_eq!(model.revision(), 0);
    }

    #[test]
    fn test_listeners_see_changes() {
        let model = MenuModel::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let id = model.connect_changed(move |m, change| {
            // The model is readable from inside the listener.
            assert!(m.n_sections() <= 1);
            assert_eq!(change.position, 0);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        model.append_section(section(SectionOrigin::Previous, "a"));
        model.remove(0);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        model.disconnect_changed(id);
        model.append_section(section(SectionOrigin::Previous, "a"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
