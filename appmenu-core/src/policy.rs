// SPDX-License-Identifier: LGPL-3.0-only

//! Hides native menu bars while the host environment displays them.

use crate::dispatch::{Allocation, Measure};
use crate::handle::ShellHandle;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Rectangle the drawing surface of a hidden shell is moved to.
pub const OFFSCREEN: Allocation = Allocation {
    x: -1,
    y: -1,
    width: 1,
    height: 1,
};

/// Answers whether the host currently renders the menu of a shell.
pub trait MenubarDisplay: Send + Sync {
    /// Whether the host shows the global menu for `shell`.
    fn shell_shows_menubar(&self, shell: ShellHandle) -> bool;
}

/// Surface operations the policy needs from the toolkit.
pub trait ShellSurface {
    /// Move and resize the drawing surface of `shell`.
    fn move_resize_surface(&self, shell: ShellHandle, area: Allocation);

    /// Schedule a new size negotiation for `shell`.
    fn queue_resize(&self, shell: ShellHandle);
}

/// A single host-wide "shell shows menu bar" switch.
#[derive(Debug, Default)]
pub struct DisplayFlag(AtomicBool);

impl DisplayFlag {
    /// Create the flag with an initial value.
    pub fn new(shown: bool) -> Self {
        Self(AtomicBool::new(shown))
    }

    /// Current value.
    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the value, returning whether it changed.
    pub fn set(&self, shown: bool) -> bool {
        self.0.swap(shown, Ordering::SeqCst) != shown
    }
}

impl MenubarDisplay for DisplayFlag {
    fn shell_shows_menubar(&self, _shell: ShellHandle) -> bool {
        self.get()
    }
}

/// Collapses the layout of shells whose menu the host displays.
///
/// The host answer is queried on every call and never cached.
pub struct ShellDisplayPolicy {
    display: Arc<dyn MenubarDisplay>,
    watched: BTreeSet<ShellHandle>,
}

impl ShellDisplayPolicy {
    /// Create a policy consulting `display`.
    pub fn new(display: Arc<dyn MenubarDisplay>) -> Self {
        Self {
            display,
            watched: BTreeSet::new(),
        }
    }

    /// Whether the native rendering of `shell` is suppressed right now.
    pub fn hides(&self, shell: ShellHandle) -> bool {
        self.display.shell_shows_menubar(shell)
    }

    /// Replace `allocation` with an empty one if `shell` is hidden.
    ///
    /// Returns whether the allocation was collapsed.
    pub fn collapse(&self, shell: ShellHandle, allocation: &mut Allocation) -> bool {
        if !self.hides(shell) {
            return false;
        }
        *allocation = Allocation::ZERO;
        true
    }

    /// Park the drawing surface of `shell` outside the visible area.
    pub fn move_offscreen<S: ShellSurface + ?Sized>(&self, shell: ShellHandle, surface: &S) {
        surface.move_resize_surface(shell, OFFSCREEN);
    }

    /// Zero both sizes of a measurement if `shell` is hidden.
    pub fn override_measure(&self, shell: ShellHandle, measure: &mut Measure) -> bool {
        if !self.hides(shell) {
            return false;
        }
        measure.minimum = 0;
        measure.natural = 0;
        true
    }

    /// Start re-negotiating `shell` when the display mode changes.
    pub fn watch(&mut self, shell: ShellHandle) {
        self.watched.insert(shell);
    }

    /// Stop watching `shell`.
    pub fn unwatch(&mut self, shell: ShellHandle) {
        self.watched.remove(&shell);
    }

    /// Whether `shell` is watched.
    pub fn is_watched(&self, shell: ShellHandle) -> bool {
        self.watched.contains(&shell)
    }

    /// Queue a resize of every watched shell.
    pub fn refresh<S: ShellSurface + ?Sized>(&self, surface: &S) {
        for shell in &self.watched {
            surface.queue_resize(*shell);
        }
    }
}

impl fmt::Debug for ShellDisplayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellDisplayPolicy")
            .field("watched", &self.watched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Orientation;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Surfaces {
        moves: RefCell<Vec<(ShellHandle, Allocation)>>,
        resizes: RefCell<Vec<ShellHandle>>,
    }

    impl ShellSurface for Surfaces {
        fn move_resize_surface(&self, shell: ShellHandle, area: Allocation) {
            self.moves.borrow_mut().push((shell, area));
        }

        fn queue_resize(&self, shell: ShellHandle) {
            self.resizes.borrow_mut().push(shell);
        }
    }

    #[test]
    fn test_collapse_follows_flag() {
        let flag = Arc::new(DisplayFlag::new(false));
        let policy = ShellDisplayPolicy::new(flag.clone());
        let mut allocation = Allocation::new(0, 0, 640, 24);

        assert!(!policy.collapse(ShellHandle(1), &mut allocation));
        assert_eq!(allocation, Allocation::new(0, 0, 640, 24));

        flag.set(true);
        assert!(policy.collapse(ShellHandle(1), &mut allocation));
        assert_eq!(allocation, Allocation::ZERO);
    }

    #[test]
    fn test_measure_is_zeroed_when_hidden() {
        let policy = ShellDisplayPolicy::new(Arc::new(DisplayFlag::new(true)));
        let mut measure = Measure::new(Orientation::Horizontal, None);
        measure.minimum = 80;
        measure.natural = 120;
        assert!(policy.override_measure(ShellHandle(1), &mut measure));
        assert_eq!((measure.minimum, measure.natural), (0, 0));
    }

    #[test]
    fn test_refresh_only_watched() {
        let mut policy = ShellDisplayPolicy::new(Arc::new(DisplayFlag::default()));
        let surfaces = Surfaces::default();
        policy.watch(ShellHandle(1));
        policy.watch(ShellHandle(2));
        policy.unwatch(ShellHandle(1));

        policy.refresh(&surfaces);
        assert_eq!(*surfaces.resizes.borrow(), vec![ShellHandle(2)]);

        policy.move_offscreen(ShellHandle(2), &surfaces);
        assert_eq!(*surfaces.moves.borrow(), vec![(ShellHandle(2), OFFSCREEN)]);
    }

    #[test]
    fn test_flag_set_reports_change() {
        let flag = DisplayFlag::new(false);
        assert!(flag.set(true));
        assert!(!flag.set(true));
        assert!(flag.shell_shows_menubar(ShellHandle(5)));
    }
}
