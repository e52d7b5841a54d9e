// SPDX-License-Identifier: LGPL-3.0-only

use appmenu_core::error::{AppMenuError, Result};
use std::sync::{Mutex, PoisonError};
use zbus::blocking::Connection;

/// Lazily opened session bus connection.
///
/// A failed attempt is not remembered, the next caller tries again.
#[derive(Default)]
pub struct SessionBus {
    connection: Mutex<Option<Connection>>,
}

impl SessionBus {
    /// Create a handle without connecting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already open connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self {
            connection: Mutex::new(Some(connection)),
        }
    }

    /// The connection, opening it on first use.
    pub fn connection(&self) -> Result<Connection> {
        let mut slot = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }
        let connection = Connection::session().map_err(|e| {
            log::warn!("Failed to connect to the session bus: {}", e);
            AppMenuError::BusUnavailable(e.to_string())
        })?;
        log::info!(
            "Connected to the session bus as {}",
            connection
                .unique_name()
                .map(|n| n.to_string())
                .unwrap_or_default()
        );
        *slot = Some(connection.clone());
        Ok(connection)
    }

    /// The connection if it was opened already.
    pub fn peek(&self) -> Option<Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
