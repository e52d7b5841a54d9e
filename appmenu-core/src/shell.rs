// SPDX-License-Identifier: LGPL-3.0-only

//! Menu shell records and the connect/disconnect protocol.

use crate::adapter::ShellAdapterFactory;
use crate::handle::{ShellHandle, WindowHandle};
use crate::window::WindowRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// State attached to one menu shell widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellRecord {
    /// Window currently claiming the shell.
    ///
    /// Stored as a handle so it never keeps the window record alive.
    pub owning_window: Option<WindowHandle>,
}

/// Owns one [ShellRecord] per menu shell and moves shells between windows.
pub struct MenuShellRegistry {
    records: HashMap<ShellHandle, ShellRecord>,
    factory: Arc<dyn ShellAdapterFactory>,
}

impl MenuShellRegistry {
    /// Create an empty registry building adapters with `factory`.
    pub fn new(factory: Arc<dyn ShellAdapterFactory>) -> Self {
        Self {
            records: HashMap::new(),
            factory,
        }
    }

    /// The record of `shell`, if one was created.
    pub fn get(&self, shell: ShellHandle) -> Option<&ShellRecord> {
        self.records.get(&shell)
    }

    /// Number of shell records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no shell record exists.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Window currently claiming `shell`.
    pub fn owner(&self, shell: ShellHandle) -> Option<WindowHandle> {
        self.records.get(&shell).and_then(|r| r.owning_window)
    }

    /// Return the record of `shell`, creating an unclaimed one on first use.
    pub fn get_or_create(&mut self, shell: ShellHandle) -> &mut ShellRecord {
        self.records.entry(shell).or_default()
    }

    /// Claim `shell` for `window`.
    ///
    /// A shell claimed by another window is fully disconnected from it first.
    pub fn connect(&mut self, windows: &mut WindowRegistry, window: WindowHandle, shell: ShellHandle) {
        let owner = self.get_or_create(shell).owning_window;
        match owner {
            Some(owner) if owner == window && windows.contains(window) => return,
            Some(owner) => self.disconnect(windows, owner, shell),
            None => {},
        }

        let record = windows.get_or_create(window);
        if !record.contains_shell(shell) {
            record.attach_shell(self.factory.create(shell));
        }
        self.get_or_create(shell).owning_window = Some(window);
    }

    /// Release `shell` from the window claiming it.
    ///
    /// The recorded owner wins over `window` when they disagree.
    pub fn disconnect(&mut self, windows: &mut WindowRegistry, window: WindowHandle, shell: ShellHandle) {
        let record = self.get_or_create(shell);
        let Some(owner) = record.owning_window.take() else {
            log::warn!("{} was disconnected from {} but no window claims it", shell, window);
            return;
        };
        if owner != window {
            log::warn!(
                "{} is claimed by {} but was disconnected from {}",
                shell,
                owner,
                window
            );
        }

        match windows.get_mut(owner) {
            Some(window_record) => {
                if !window_record.detach_shell(shell) {
                    log::warn!("{} was not connected to {}", shell, owner);
                }
            },
            None => log::debug!("{} has no record left to detach {}", owner, shell),
        }
    }

    /// Clear every claim held by a window whose record is gone.
    pub fn forget_window(&mut self, window: WindowHandle) {
        for record in self.records.values_mut() {
            if record.owning_window == Some(window) {
                record.owning_window = None;
            }
        }
    }

    /// Drop the record of a destroyed shell widget.
    pub fn remove(&mut self, shell: ShellHandle) -> Option<ShellRecord> {
        self.records.remove(&shell)
    }
}
