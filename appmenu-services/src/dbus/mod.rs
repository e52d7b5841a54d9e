// SPDX-License-Identifier: LGPL-3.0-only
//! Session bus export of menu models and action groups.
//!
//! Menus follow the `org.gtk.Menus` protocol and action groups the
//! `org.gtk.Actions` protocol, so existing global menu hosts can import them
//! unchanged. Objects exported by other connections can be read back through
//! [DbusExportService]'s lookups.

mod actions;
mod bus;
mod menus;
mod remote;
mod service;

pub use actions::{ActionDescription, ActionsObject, ACTIONS_INTERFACE};
pub use bus::SessionBus;
pub use menus::{MenuChange, MenuContent, MenuRow, MenusObject, ACTION_PREFIX, MENUS_INTERFACE};
pub use remote::{fetch_menu, RemoteActions};
pub use service::DbusExportService;
