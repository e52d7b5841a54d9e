// SPDX-License-Identifier: LGPL-3.0-only

//! Opaque handles naming toolkit objects.
//!
//! The core never owns toolkit objects. It refers to them by identity and the
//! embedding layer reports their destruction explicitly.

use std::fmt;

/// Identity of any toolkit widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u64);

/// Identity of a toplevel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u64);

/// Identity of a menu-shell widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShellHandle(pub u64);

impl WidgetId {
    /// View this widget as a toplevel window.
    pub fn as_window(self) -> WindowHandle {
        WindowHandle(self.0)
    }

    /// View this widget as a menu shell.
    pub fn as_shell(self) -> ShellHandle {
        ShellHandle(self.0)
    }
}

impl From<WindowHandle> for WidgetId {
    fn from(window: WindowHandle) -> Self {
        WidgetId(window.0)
    }
}

impl From<ShellHandle> for WidgetId {
    fn from(shell: ShellHandle) -> Self {
        WidgetId(shell.0)
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget {:#x}", self.0)
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window {:#x}", self.0)
    }
}

impl fmt::Display for ShellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu shell {:#x}", self.0)
    }
}
