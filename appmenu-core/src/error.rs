// SPDX-License-Identifier: LGPL-3.0-only

//! Errors reported by collaborators and installation.

use thiserror::Error;

/// Errors that can occur while exporting menus or installing hooks.
///
/// None of these ever escape a lifecycle callback: the core logs them and
/// keeps the window working without an exported menu.
#[derive(Debug, Error)]
pub enum AppMenuError {
    /// The session bus could not be reached.
    #[error("Session bus unavailable: {0}")]
    BusUnavailable(String),

    /// Exporting an object failed.
    #[error("Failed to export {path}: {reason}")]
    ExportFailed {
        /// Object path the export was attempted at.
        path: String,
        /// Backend specific reason.
        reason: String,
    },

    /// An object path was not a valid bus object path.
    #[error("Invalid object path: {0}")]
    InvalidObjectPath(String),

    /// The property store could not be accessed.
    #[error("Property store error: {0}")]
    Store(String),

    /// Hooks were already installed into the class table.
    #[error("Lifecycle hooks are already installed")]
    AlreadyInstalled,

    /// A class required for installation is not registered.
    #[error("Unknown widget class: {0}")]
    UnknownClass(String),
}

/// Result alias used by collaborator traits.
pub type Result<T> = std::result::Result<T, AppMenuError>;
