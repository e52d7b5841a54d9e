// SPDX-License-Identifier: LGPL-3.0-only

//! State behind the lifecycle hooks, kept consistent across every event.

use crate::adapter::ShellAdapterFactory;
use crate::dispatch::{Allocation, Measure};
use crate::export::ExportService;
use crate::handle::{ShellHandle, WindowHandle};
use crate::hijack::WindowKind;
use crate::policy::{MenubarDisplay, ShellDisplayPolicy, ShellSurface};
use crate::shell::MenuShellRegistry;
use crate::store::KeyValueStore;
use crate::window::WindowRegistry;
use std::sync::Arc;

/// Reacts to toolkit lifecycle events by keeping the exported menus of every
/// window in sync with the menu bars realized inside it.
///
/// All entry points can be driven directly, without any class table, which is
/// how the synchronization logic is tested.
pub struct MenuMirror {
    windows: WindowRegistry,
    shells: MenuShellRegistry,
    policy: ShellDisplayPolicy,
}

impl MenuMirror {
    /// Create a mirror from its collaborators.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        exporter: Arc<dyn ExportService>,
        factory: Arc<dyn ShellAdapterFactory>,
        display: Arc<dyn MenubarDisplay>,
    ) -> Self {
        Self {
            windows: WindowRegistry::new(store, exporter),
            shells: MenuShellRegistry::new(factory),
            policy: ShellDisplayPolicy::new(display),
        }
    }

    /// The window registry.
    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    /// The menu shell registry.
    pub fn shells(&self) -> &MenuShellRegistry {
        &self.shells
    }

    /// The display policy.
    pub fn policy(&self) -> &ShellDisplayPolicy {
        &self.policy
    }

    /// A toplevel window acquired its surface.
    pub fn window_realized(&mut self, window: WindowHandle, kind: WindowKind) {
        match kind {
            WindowKind::DragAndDrop => log::debug!("Skipping drag icon {}", window),
            WindowKind::Normal | WindowKind::Application => {
                self.windows.get_or_create(window);
            },
        }
    }

    /// A toplevel window released its surface.
    pub fn window_unrealized(&mut self, window: WindowHandle) {
        if self.windows.destroy(window) {
            self.shells.forget_window(window);
        }
    }

    /// A menu shell acquired its surface inside `toplevel`.
    pub fn shell_realized(&mut self, shell: ShellHandle, toplevel: Option<WindowHandle>) {
        self.policy.watch(shell);
        match toplevel {
            Some(window) => self.shells.connect(&mut self.windows, window, shell),
            None => log::debug!("{} realized outside of a window", shell),
        }
    }

    /// A menu shell is about to release its surface.
    pub fn shell_unrealized(&mut self, shell: ShellHandle, toplevel: Option<WindowHandle>) {
        self.policy.unwatch(shell);
        match toplevel.or_else(|| self.shells.owner(shell)) {
            Some(window) => self.shells.disconnect(&mut self.windows, window, shell),
            None => log::debug!("{} unrealized without an owner", shell),
        }
    }

    /// A menu shell widget was destroyed.
    pub fn shell_destroyed(&mut self, shell: ShellHandle) {
        self.policy.unwatch(shell);
        if let Some(owner) = self.shells.owner(shell) {
            self.shells.disconnect(&mut self.windows, owner, shell);
        }
        self.shells.remove(shell);
    }

    /// Collapse `allocation` if the host shows the menu of `shell`.
    pub fn collapse_allocation(&self, shell: ShellHandle, allocation: &mut Allocation) -> bool {
        self.policy.collapse(shell, allocation)
    }

    /// Zero `measure` if the host shows the menu of `shell`.
    pub fn override_measure(&self, shell: ShellHandle, measure: &mut Measure) -> bool {
        self.policy.override_measure(shell, measure)
    }

    /// The host display mode changed: re-negotiate every watched shell.
    pub fn display_changed<S: ShellSurface + ?Sized>(&self, surface: &S) {
        self.policy.refresh(surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TemplateShellFactory;
    use crate::export::LocalExportService;
    use crate::policy::DisplayFlag;
    use crate::store::MemoryStore;

    fn mirror() -> MenuMirror {
        MenuMirror::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalExportService::default()),
            Arc::new(TemplateShellFactory::new()),
            Arc::new(DisplayFlag::default()),
        )
    }

    #[test]
    fn test_drag_icons_get_no_record() {
        let mut mirror = mirror();
        mirror.window_realized(WindowHandle(1), WindowKind::DragAndDrop);
        mirror.window_realized(WindowHandle(2), WindowKind::Application);
        assert!(!mirror.windows().contains(WindowHandle(1)));
        assert!(mirror.windows().contains(WindowHandle(2)));
    }

    #[test]
    fn test_window_unrealize_releases_shells() {
        let mut mirror = mirror();
        mirror.window_realized(WindowHandle(1), WindowKind::Normal);
        mirror.shell_realized(ShellHandle(5), Some(WindowHandle(1)));
        mirror.window_unrealized(WindowHandle(1));

        assert!(mirror.windows().is_empty());
        assert_eq!(mirror.shells().owner(ShellHandle(5)), None);
    }

    #[test]
    fn test_shell_destroyed_while_connected() {
        let mut mirror = mirror();
        mirror.shell_realized(ShellHandle(5), Some(WindowHandle(1)));
        mirror.shell_destroyed(ShellHandle(5));

        assert!(mirror.windows().get(WindowHandle(1)).unwrap().shells().is_empty());
        assert!(mirror.shells().get(ShellHandle(5)).is_none());
        assert!(!mirror.policy().is_watched(ShellHandle(5)));
    }

    #[test]
    fn test_unrealize_without_toplevel_uses_owner() {
        let mut mirror = mirror();
        mirror.shell_realized(ShellHandle(5), Some(WindowHandle(1)));
        mirror.shell_unrealized(ShellHandle(5), None);
        assert_eq!(mirror.windows().get(WindowHandle(1)).unwrap().menu_model().n_sections(), 0);
    }

    #[test]
    fn test_shell_cycle_leaves_no_record() {
        let mut mirror = mirror();
        mirror.window_realized(WindowHandle(1), WindowKind::Normal);
        mirror.shell_realized(ShellHandle(5), Some(WindowHandle(1)));
        mirror.shell_unrealized(ShellHandle(5), Some(WindowHandle(1)));
        mirror.shell_destroyed(ShellHandle(5));

        assert!(mirror.shells().is_empty());
        assert!(mirror.windows().get(WindowHandle(1)).unwrap().shells().is_empty());
    }
}
