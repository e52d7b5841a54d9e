// SPDX-License-Identifier: LGPL-3.0-only
#![warn(missing_docs)]

//! Mirror toolkit menu bars into exported menu models for global menu hosts.
//!
//! The lifecycle hooks live in [core], the platform collaborators (session
//! bus export, X11 window properties, settings files) in [services].

pub use appmenu_core as core;
pub use appmenu_services as services;

/// A "prelude" for toolkits integrating appmenu.
///
/// Importing this module brings into scope the types needed to install the
/// lifecycle hooks and feed them menu bars.
///
/// ```rust
/// use appmenu::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::action::{Action, ActionGroup, ActionSource};
    pub use crate::core::adapter::{
        ShellAdapter, ShellAdapterFactory, ShellTemplate, TemplateShellFactory,
    };
    pub use crate::core::config::Settings;
    pub use crate::core::dispatch::{Allocation, Call, ClassTable, Measure, Operation, Orientation};
    pub use crate::core::export::{ExportService, LocalExportService};
    pub use crate::core::hijack::{
        install, install_global, InstallOutcome, Toolkit, ToolkitClasses, WindowKind,
    };
    pub use crate::core::model::{MenuItem, MenuModel, MenuSource};
    pub use crate::core::policy::{DisplayFlag, MenubarDisplay, ShellSurface};
    pub use crate::core::store::{KeyValueStore, MemoryStore};
    pub use crate::core::{AppMenuError, MenuMirror, ShellHandle, WidgetId, WindowHandle};

    pub use crate::services::SettingsRegistry;
    #[cfg(feature = "dbus")]
    pub use crate::services::DbusExportService;
    #[cfg(feature = "x11")]
    pub use crate::services::X11PropertyStore;
}
