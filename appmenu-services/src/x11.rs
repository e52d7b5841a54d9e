// SPDX-License-Identifier: LGPL-3.0-only
//! Window properties on X11.

use appmenu_core::error::{AppMenuError, Result};
use appmenu_core::store::KeyValueStore;
use appmenu_core::WindowHandle;
use std::ffi::{c_int, c_uchar, c_ulong, c_void, CString};
use x11_dl::xlib::{Display, PropModeReplace, XErrorEvent, Xlib};

const UTF8_STRING: &str = "UTF8_STRING";

// Longest value read back, in 32-bit units.
const MAX_PROPERTY_LENGTH: i64 = 4096;

unsafe extern "C" fn log_x_error(_display: *mut Display, event: *mut XErrorEvent) -> c_int {
    if let Some(event) = event.as_ref() {
        log::warn!(
            "X11 error {} on resource {:#x} (request {})",
            event.error_code,
            event.resourceid,
            event.request_code
        );
    }
    0
}

/// Maps a window handle to the XID of its X11 window.
pub type XidResolver = Box<dyn Fn(WindowHandle) -> Option<c_ulong> + Send + Sync>;

fn handle_as_xid(window: WindowHandle) -> Option<c_ulong> {
    c_ulong::try_from(window.0).ok()
}

/// Stores window properties as `UTF8_STRING` properties of X11 windows.
///
/// A display is opened per call. Without a reachable display reads return
/// [None] and writes are dropped.
///
/// Window handles are taken to be XIDs unless a resolver is installed with
/// [X11PropertyStore::with_resolver]. Windows the resolver does not know
/// read as unset and ignore writes.
pub struct X11PropertyStore {
    xlib: Option<Xlib>,
    display_name: Option<CString>,
    resolver: XidResolver,
}

impl X11PropertyStore {
    /// Use the display named by `$DISPLAY`.
    pub fn new() -> Self {
        Self {
            xlib: load_xlib(),
            display_name: None,
            resolver: Box::new(handle_as_xid),
        }
    }

    /// Use an explicit display name such as `:1`.
    pub fn with_display(name: &str) -> Result<Self> {
        let display_name = CString::new(name)
            .map_err(|e| AppMenuError::Store(format!("Invalid display name {:?}: {}", name, e)))?;
        Ok(Self {
            xlib: load_xlib(),
            display_name: Some(display_name),
            resolver: Box::new(handle_as_xid),
        })
    }

    /// Translate window handles to XIDs with `resolver`.
    pub fn with_resolver(
        mut self,
        resolver: impl Fn(WindowHandle) -> Option<c_ulong> + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    fn xid(&self, window: WindowHandle) -> Option<c_ulong> {
        let xid = (self.resolver)(window);
        if xid.is_none() {
            log::debug!("{} has no X11 window", window);
        }
        xid
    }

    fn with_display_connection<R>(
        &self,
        f: impl FnOnce(&Xlib, *mut Display) -> R,
    ) -> Result<R> {
        let xlib = self
            .xlib
            .as_ref()
            .ok_or_else(|| AppMenuError::Store("X11 library not available".to_string()))?;
        let name = self
            .display_name
            .as_ref()
            .map_or(std::ptr::null(), |n| n.as_ptr());
        unsafe {
            let display = (xlib.XOpenDisplay)(name);
            if display.is_null() {
                return Err(AppMenuError::Store("Failed to open X11 display".to_string()));
            }
            // A vanished window must not take the process down.
            let previous = (xlib.XSetErrorHandler)(Some(log_x_error));
            let out = f(xlib, display);
            (xlib.XSync)(display, 0);
            (xlib.XSetErrorHandler)(previous);
            (xlib.XCloseDisplay)(display);
            Ok(out)
        }
    }
}

impl Default for X11PropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn load_xlib() -> Option<Xlib> {
    match Xlib::open() {
        Ok(xlib) => Some(xlib),
        Err(e) => {
            log::warn!("Failed to load X11 library: {e}");
            None
        },
    }
}

unsafe fn intern(xlib: &Xlib, display: *mut Display, name: &str, only_if_exists: bool) -> Option<c_ulong> {
    let name = CString::new(name).ok()?;
    let atom = (xlib.XInternAtom)(display, name.as_ptr(), c_int::from(only_if_exists));
    (atom != 0).then_some(atom)
}

impl KeyValueStore for X11PropertyStore {
    fn get(&self, window: WindowHandle, key: &str) -> Option<String> {
        let xid = self.xid(window)?;
        let result = self.with_display_connection(|xlib, display| unsafe {
            let property = intern(xlib, display, key, true)?;
            let utf8 = intern(xlib, display, UTF8_STRING, false)?;

            let mut actual_type: c_ulong = 0;
            let mut actual_format: c_int = 0;
            let mut n_items: c_ulong = 0;
            let mut bytes_after: c_ulong = 0;
            let mut data: *mut c_uchar = std::ptr::null_mut();
            let status = (xlib.XGetWindowProperty)(
                display,
                xid,
                property,
                0,
                MAX_PROPERTY_LENGTH as _,
                0,
                utf8,
                &mut actual_type,
                &mut actual_format,
                &mut n_items,
                &mut bytes_after,
                &mut data,
            );
            if data.is_null() {
                return None;
            }
            let value = (status == 0 && actual_type == utf8 && actual_format == 8).then(|| {
                let bytes = std::slice::from_raw_parts(data, n_items as usize);
                String::from_utf8_lossy(bytes).into_owned()
            });
            (xlib.XFree)(data as *mut c_void);
            value
        });
        match result {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Reading {} of {}: {}", key, window, e);
                None
            },
        }
    }

    fn set(&self, window: WindowHandle, key: &str, value: Option<&str>) {
        let Some(xid) = self.xid(window) else {
            return;
        };
        let result = self.with_display_connection(|xlib, display| unsafe {
            let Some(property) = intern(xlib, display, key, false) else {
                log::warn!("Failed to intern X11 atom {}", key);
                return;
            };
            match value {
                Some(value) => {
                    let Some(utf8) = intern(xlib, display, UTF8_STRING, false) else {
                        log::warn!("Failed to intern X11 atom {}", UTF8_STRING);
                        return;
                    };
                    (xlib.XChangeProperty)(
                        display,
                        xid,
                        property,
                        utf8,
                        8,
                        PropModeReplace,
                        value.as_ptr(),
                        value.len() as c_int,
                    );
                },
                None => {
                    (xlib.XDeleteProperty)(display, xid, property);
                },
            }
        });
        if let Err(e) = result {
            log::warn!("Failed to set {} on {}: {}", key, window, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display_is_tolerated() {
        let store = X11PropertyStore::with_display(":4242").unwrap();
        store.set(WindowHandle(1), "_GTK_MENUBAR_OBJECT_PATH", Some("/a"));
        assert_eq!(store.get(WindowHandle(1), "_GTK_MENUBAR_OBJECT_PATH"), None);
    }

    #[test]
    fn test_resolver_translates_handles() {
        let store = X11PropertyStore::with_display(":4242")
            .unwrap()
            .with_resolver(|window| (window.0 < 100).then(|| 0x3a00000 + window.0 as c_ulong));
        assert_eq!(store.xid(WindowHandle(7)), Some(0x3a00007));
        assert_eq!(store.xid(WindowHandle(100)), None);
        store.set(WindowHandle(100), "_GTK_UNIQUE_BUS_NAME", Some(":1.1"));
        assert_eq!(store.get(WindowHandle(100), "_GTK_UNIQUE_BUS_NAME"), None);

        assert_eq!(X11PropertyStore::new().xid(WindowHandle(0x4000001)), Some(0x4000001));
    }

    #[test]
    fn test_display_name_with_nul_is_rejected() {
        assert!(matches!(
            X11PropertyStore::with_display(":0\0"),
            Err(AppMenuError::Store(_))
        ));
    }
}
