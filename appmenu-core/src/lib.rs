// SPDX-License-Identifier: LGPL-3.0-only
#![warn(missing_docs)]

//! Core library for appmenu => See `appmenu` crate.
//!
//! Contains the lifecycle interception table, the window and menu-shell
//! registries and the traits the platform collaborators implement.

/// Contains the [AppMenuError](error::AppMenuError) type.
pub mod error;

/// Contains opaque handles for toolkit objects.
pub mod handle;

/// Contains the exported menu model and its sections.
pub mod model;

/// Contains the aggregated action group.
pub mod action;

/// Contains the per-window key/value property store interface.
pub mod store;

/// Contains the object export service interface.
pub mod export;

/// Contains the menu-shell adapter interface.
pub mod adapter;

/// Contains the per-window registry and export bookkeeping.
pub mod window;

/// Contains the per-menu-shell registry and the connect/disconnect protocol.
pub mod shell;

/// Contains the policy hiding menu bars the host already displays.
pub mod policy;

/// Contains the class dispatch table the lifecycle hooks are installed into.
pub mod dispatch;

/// Contains the lifecycle interceptor and its installation.
pub mod hijack;

/// Contains the [MenuMirror](mirror::MenuMirror) tying registries to lifecycle events.
pub mod mirror;

/// Contains the [Settings](config::Settings) struct.
pub mod config;

pub use error::AppMenuError;
pub use handle::{ShellHandle, WidgetId, WindowHandle};
pub use mirror::MenuMirror;
