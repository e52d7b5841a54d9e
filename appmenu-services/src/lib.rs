// SPDX-License-Identifier: LGPL-3.0-only
//! Platform collaborators for appmenu => See `appmenu` crate.
//!
//! Implements the property store and export service interfaces of
//! `appmenu-core` on top of X11 and the session bus, and loads settings
//! from the XDG directories.

pub mod settings;

#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "dbus")]
pub mod dbus;

pub use settings::SettingsRegistry;

#[cfg(feature = "x11")]
pub use x11::{X11PropertyStore, XidResolver};

#[cfg(feature = "dbus")]
pub use dbus::DbusExportService;
