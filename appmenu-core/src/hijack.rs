// SPDX-License-Identifier: LGPL-3.0-only

//! Lifecycle interception.
//!
//! The [Interceptor] captures the implementations found in a [ClassTable]
//! and replaces them with wrappers that run the menu mirror and then chain to
//! what was captured. A slot is only replaced while it still holds the
//! captured implementation, so installing twice or over someone else's
//! override is a no-op.

use crate::config::Settings;
use crate::dispatch::{same_handler, Call, ClassId, ClassTable, Handler, Operation};
use crate::error::{AppMenuError, Result};
use crate::handle::{WidgetId, WindowHandle};
use crate::mirror::MenuMirror;
use crate::policy::ShellSurface;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Kind of a toplevel window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// An ordinary toplevel.
    Normal,
    /// A window owned by an application object, realized through its own class.
    Application,
    /// The icon window of a drag-and-drop operation.
    DragAndDrop,
}

/// Queries the wrappers need to make about live toolkit objects.
pub trait Toolkit: ShellSurface {
    /// Kind of `widget` if it is a toplevel window.
    fn window_kind(&self, widget: WidgetId) -> Option<WindowKind>;

    /// Toplevel window containing `widget`.
    fn toplevel(&self, widget: WidgetId) -> Option<WindowHandle>;

    /// Whether `widget` is a menu bar or another menu shell.
    fn is_menu_shell(&self, widget: WidgetId) -> bool;
}

/// The toolkit classes hooks are installed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolkitClasses {
    /// Root widget class, whose allocate collapsed menu bars chain to.
    pub widget: ClassId,
    /// Toplevel window class.
    pub window: ClassId,
    /// Application window class, if the toolkit has one.
    pub application_window: Option<ClassId>,
    /// Menu bar class.
    pub menu_bar: ClassId,
}

impl ToolkitClasses {
    /// Resolve the classes by name.
    pub fn from_names(
        table: &ClassTable,
        widget: &str,
        window: &str,
        application_window: Option<&str>,
        menu_bar: &str,
    ) -> Result<Self> {
        Ok(Self {
            widget: table.require(widget)?,
            window: table.require(window)?,
            application_window: application_window.map(|name| table.require(name)).transpose()?,
            menu_bar: table.require(menu_bar)?,
        })
    }
}

/// What [install] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Hooks were installed into this many slots.
    Installed(usize),
    /// The program is excluded by the settings.
    Excluded,
    /// The environment disabled the mechanism.
    Disabled,
}

/// Captured implementations, keyed by class and operation.
///
/// An empty captured slot means there is no original to chain to.
#[derive(Default)]
pub struct Interceptor {
    captured: HashMap<(ClassId, Operation), Option<Handler>>,
}

impl Interceptor {
    /// Create an interceptor with nothing captured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the current implementation of `op` on `class`.
    ///
    /// Capturing the same slot twice would capture a wrapper, so it fails.
    pub fn capture(&mut self, table: &ClassTable, class: ClassId, op: Operation) -> Result<()> {
        if self.captured.contains_key(&(class, op)) {
            return Err(AppMenuError::AlreadyInstalled);
        }
        self.captured.insert((class, op), table.slot(class, op));
        Ok(())
    }

    /// Whether `op` on `class` was captured.
    pub fn is_captured(&self, class: ClassId, op: Operation) -> bool {
        self.captured.contains_key(&(class, op))
    }

    /// The captured implementation.
    pub fn original(&self, class: ClassId, op: Operation) -> Option<Handler> {
        self.captured.get(&(class, op)).cloned().flatten()
    }

    /// Put `replacement` on `class` and every descendant still holding the
    /// captured implementation. `None` empties those slots.
    ///
    /// Returns the number of slots replaced.
    pub fn hijack(
        &self,
        table: &mut ClassTable,
        class: ClassId,
        op: Operation,
        replacement: Option<Handler>,
    ) -> usize {
        let Some(base) = self.captured.get(&(class, op)) else {
            log::error!("{:?} of {:?} was never captured", op, class);
            return 0;
        };
        let mut replaced = 0;
        for target in std::iter::once(class).chain(table.descendants(class)) {
            if same_handler(table.slot(target, op).as_ref(), base.as_ref()) {
                table.set_slot(target, op, replacement.clone());
                replaced += 1;
            }
        }
        replaced
    }
}

fn chain(original: &Option<Handler>, widget: WidgetId, call: &mut Call) {
    if let Some(original) = original {
        original(widget, call);
    }
}

fn with_mirror<R>(mirror: &RefCell<MenuMirror>, f: impl FnOnce(&mut MenuMirror) -> R) -> Option<R> {
    match mirror.try_borrow_mut() {
        Ok(mut mirror) => Some(f(&mut mirror)),
        Err(_) => {
            log::error!("Menu mirror re-entered from a lifecycle hook");
            None
        },
    }
}

fn window_realize(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
    skip_application: bool,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        let Some(kind) = toolkit.window_kind(widget) else {
            log::error!("Window realize invoked on non-window {}", widget);
            return;
        };
        chain(&original, widget, call);
        if kind == WindowKind::Application && skip_application {
            return;
        }
        with_mirror(&mirror, |m| m.window_realized(widget.as_window(), kind));
    })
}

fn application_window_realize(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if toolkit.window_kind(widget) != Some(WindowKind::Application) {
            log::error!("Application window realize invoked on {}", widget);
            return;
        }
        chain(&original, widget, call);
        with_mirror(&mirror, |m| {
            m.window_realized(widget.as_window(), WindowKind::Application)
        });
    })
}

fn window_unrealize(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if toolkit.window_kind(widget).is_none() {
            log::error!("Window unrealize invoked on non-window {}", widget);
            return;
        }
        chain(&original, widget, call);
        with_mirror(&mirror, |m| m.window_unrealized(widget.as_window()));
    })
}

fn is_menu_shell(toolkit: &dyn Toolkit, widget: WidgetId, call: &Call) -> bool {
    let shell = toolkit.is_menu_shell(widget);
    if !shell {
        log::error!("Menu bar {:?} invoked on non-shell {}", call.operation(), widget);
    }
    shell
}

fn menu_bar_realize(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if !is_menu_shell(&*toolkit, widget, call) {
            return;
        }
        chain(&original, widget, call);
        let toplevel = toolkit.toplevel(widget);
        with_mirror(&mirror, |m| m.shell_realized(widget.as_shell(), toplevel));
    })
}

fn menu_bar_unrealize(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if !is_menu_shell(&*toolkit, widget, call) {
            return;
        }
        let toplevel = toolkit.toplevel(widget);
        with_mirror(&mirror, |m| m.shell_unrealized(widget.as_shell(), toplevel));
        chain(&original, widget, call);
    })
}

fn menu_bar_destroy(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if !is_menu_shell(&*toolkit, widget, call) {
            return;
        }
        with_mirror(&mirror, |m| m.shell_destroyed(widget.as_shell()));
        chain(&original, widget, call);
    })
}

fn menu_bar_size_allocate(
    original: Option<Handler>,
    base: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if !is_menu_shell(&*toolkit, widget, call) {
            return;
        }
        let Call::SizeAllocate(allocation) = call else {
            log::error!("Size allocate invoked with {:?} on {}", call, widget);
            return;
        };
        let shell = widget.as_shell();
        let collapsed = mirror
            .try_borrow()
            .map(|m| m.collapse_allocation(shell, allocation))
            .unwrap_or(false);
        if !collapsed {
            chain(&original, widget, call);
            return;
        }
        match &base {
            Some(_) => chain(&base, widget, call),
            None => chain(&original, widget, call),
        }
        if let Ok(m) = mirror.try_borrow() {
            m.policy().move_offscreen(shell, &*toolkit);
        }
    })
}

fn menu_bar_measure(
    original: Option<Handler>,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if !is_menu_shell(&*toolkit, widget, call) {
            return;
        }
        if !matches!(call, Call::Measure(_)) {
            log::error!("Size request invoked with {:?} on {}", call, widget);
            return;
        }
        chain(&original, widget, call);
        if let (Call::Measure(measure), Ok(m)) = (call, mirror.try_borrow()) {
            m.override_measure(widget.as_shell(), measure);
        }
    })
}

/// Capture the lifecycle slots of `classes` and install the mirror hooks.
///
/// Must run once, before the toolkit dispatches any lifecycle event.
pub fn install(
    table: &mut ClassTable,
    classes: &ToolkitClasses,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
    settings: &Settings,
    program: &str,
) -> Result<InstallOutcome> {
    if !settings.proxy_enabled() {
        log::info!("Menu export disabled by the environment");
        return Ok(InstallOutcome::Disabled);
    }
    if settings.is_excluded(program) {
        log::info!("Menu export disabled for {}", program);
        return Ok(InstallOutcome::Excluded);
    }
    if table.is_intercepted() {
        return Err(AppMenuError::AlreadyInstalled);
    }

    let mut interceptor = Interceptor::new();
    interceptor.capture(table, classes.widget, Operation::SizeAllocate)?;
    interceptor.capture(table, classes.window, Operation::Realize)?;
    interceptor.capture(table, classes.window, Operation::Unrealize)?;
    if let Some(application_window) = classes.application_window {
        interceptor.capture(table, application_window, Operation::Realize)?;
    }
    let menu_bar = classes.menu_bar;
    for op in [
        Operation::Realize,
        Operation::Unrealize,
        Operation::SizeAllocate,
        Operation::Destroy,
    ]
    .into_iter()
    .chain(Operation::MEASURE)
    {
        interceptor.capture(table, menu_bar, op)?;
    }

    let mut installed = 0;
    // Application windows first, so the generic window wrapper never lands
    // on a class that shares the window implementation.
    if let Some(application_window) = classes.application_window {
        let hook = application_window_realize(
            interceptor.original(application_window, Operation::Realize),
            mirror.clone(),
            toolkit.clone(),
        );
        installed += interceptor.hijack(table, application_window, Operation::Realize, Some(hook));
    }
    let hook = window_realize(
        interceptor.original(classes.window, Operation::Realize),
        mirror.clone(),
        toolkit.clone(),
        classes.application_window.is_some(),
    );
    installed += interceptor.hijack(table, classes.window, Operation::Realize, Some(hook));
    let hook = window_unrealize(
        interceptor.original(classes.window, Operation::Unrealize),
        mirror.clone(),
        toolkit.clone(),
    );
    installed += interceptor.hijack(table, classes.window, Operation::Unrealize, Some(hook));

    let hook = menu_bar_realize(
        interceptor.original(menu_bar, Operation::Realize),
        mirror.clone(),
        toolkit.clone(),
    );
    installed += interceptor.hijack(table, menu_bar, Operation::Realize, Some(hook));
    let hook = menu_bar_unrealize(
        interceptor.original(menu_bar, Operation::Unrealize),
        mirror.clone(),
        toolkit.clone(),
    );
    installed += interceptor.hijack(table, menu_bar, Operation::Unrealize, Some(hook));
    let hook = menu_bar_destroy(
        interceptor.original(menu_bar, Operation::Destroy),
        mirror.clone(),
        toolkit.clone(),
    );
    installed += interceptor.hijack(table, menu_bar, Operation::Destroy, Some(hook));
    let hook = menu_bar_size_allocate(
        interceptor.original(menu_bar, Operation::SizeAllocate),
        interceptor.original(classes.widget, Operation::SizeAllocate),
        mirror.clone(),
        toolkit.clone(),
    );
    installed += interceptor.hijack(table, menu_bar, Operation::SizeAllocate, Some(hook));
    for op in Operation::MEASURE {
        let hook = menu_bar_measure(interceptor.original(menu_bar, op), mirror.clone(), toolkit.clone());
        installed += interceptor.hijack(table, menu_bar, op, Some(hook));
    }
    // Emptied on every menu bar class, subclass overrides included.
    for class in std::iter::once(menu_bar).chain(table.descendants(menu_bar)) {
        if table.slot(class, Operation::HierarchyChanged).is_some() {
            table.set_slot(class, Operation::HierarchyChanged, None);
            installed += 1;
        }
    }

    table.mark_intercepted();
    log::info!("Installed {} lifecycle hooks for {}", installed, program);
    Ok(InstallOutcome::Installed(installed))
}

thread_local! {
    static GLOBAL_TABLE: RefCell<ClassTable> = RefCell::new(ClassTable::new());
}

/// Run `f` on the class table of the GUI thread.
pub fn with_global_table<R>(f: impl FnOnce(&mut ClassTable) -> R) -> R {
    GLOBAL_TABLE.with(|table| f(&mut table.borrow_mut()))
}

/// [install] into the class table of the GUI thread.
///
/// The table lives as long as the thread and is never torn down.
pub fn install_global(
    classes: &ToolkitClasses,
    mirror: Rc<RefCell<MenuMirror>>,
    toolkit: Rc<dyn Toolkit>,
    settings: &Settings,
    program: &str,
) -> Result<InstallOutcome> {
    with_global_table(|table| install(table, classes, mirror, toolkit, settings, program))
}

/// Dispatch `call` through the class table of the GUI thread.
///
/// The table is not borrowed while the handler runs.
pub fn dispatch_global(class: ClassId, widget: WidgetId, call: &mut Call) -> bool {
    match with_global_table(|table| table.slot(class, call.operation())) {
        Some(handler) => {
            handler(widget, call);
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn tagged(log: Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Handler {
        Rc::new(move |_: WidgetId, _: &mut Call| log.borrow_mut().push(tag))
    }

    #[test]
    fn test_hijack_reaches_inheriting_descendants_only() {
        let mut table = ClassTable::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let base = table.register_class("Base", None).unwrap();
        table.set_slot(base, Operation::Realize, Some(tagged(calls.clone(), "base")));
        let inherits = table.register_class("Inherits", Some(base)).unwrap();
        let overrides = table.register_class("Overrides", Some(base)).unwrap();
        table.set_slot(overrides, Operation::Realize, Some(tagged(calls.clone(), "own")));
        let grandchild = table.register_class("Grandchild", Some(inherits)).unwrap();

        let mut interceptor = Interceptor::new();
        interceptor.capture(&table, base, Operation::Realize).unwrap();
        let original = interceptor.original(base, Operation::Realize);
        let log = calls.clone();
        let wrapper: Handler = Rc::new(move |widget: WidgetId, call: &mut Call| {
            log.borrow_mut().push("wrapper");
            chain(&original, widget, call);
        });

        assert_eq!(interceptor.hijack(&mut table, base, Operation::Realize, Some(wrapper.clone())), 3);
        // A second pass finds only wrappers and changes nothing.
        assert_eq!(interceptor.hijack(&mut table, base, Operation::Realize, Some(wrapper)), 0);

        table.invoke(grandchild, WidgetId(1), &mut Call::Realize);
        table.invoke(overrides, WidgetId(2), &mut Call::Realize);
        assert_eq!(*calls.borrow(), vec!["wrapper", "base", "own"]);
    }

    #[test]
    fn test_empty_original_is_not_chained() {
        let mut table = ClassTable::new();
        let class = table.register_class("Bare", None).unwrap();
        let mut interceptor = Interceptor::new();
        interceptor.capture(&table, class, Operation::Unrealize).unwrap();
        assert!(interceptor.original(class, Operation::Unrealize).is_none());

        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let original = interceptor.original(class, Operation::Unrealize);
        let wrapper: Handler = Rc::new(move |widget: WidgetId, call: &mut Call| {
            counter.set(counter.get() + 1);
            chain(&original, widget, call);
        });
        assert_eq!(interceptor.hijack(&mut table, class, Operation::Unrealize, Some(wrapper)), 1);
        assert!(table.invoke(class, WidgetId(1), &mut Call::Unrealize));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_capture_twice_fails() {
        let mut table = ClassTable::new();
        let class = table.register_class("A", None).unwrap();
        let mut interceptor = Interceptor::new();
        interceptor.capture(&table, class, Operation::Realize).unwrap();
        assert!(matches!(
            interceptor.capture(&table, class, Operation::Realize),
            Err(AppMenuError::AlreadyInstalled)
        ));
    }

    #[test]
    fn test_hijack_without_capture_does_nothing() {
        let mut table = ClassTable::new();
        let class = table.register_class("A", None).unwrap();
        let interceptor = Interceptor::new();
        assert_eq!(interceptor.hijack(&mut table, class, Operation::Realize, None), 0);
    }
}
