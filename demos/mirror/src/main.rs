use appmenu::core::dispatch::{ClassId, Handler};
use appmenu::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

const WINDOW: WindowHandle = WindowHandle(0x4000001);
const MENU_BAR: ShellHandle = ShellHandle(0x4000010);

/// A toolkit without any real widgets: it only knows which widget is which.
#[derive(Default)]
struct DemoToolkit {
    kinds: HashMap<WidgetId, WindowKind>,
    parents: HashMap<WidgetId, WindowHandle>,
}

impl ShellSurface for DemoToolkit {
    fn move_resize_surface(&self, shell: ShellHandle, area: Allocation) {
        log::info!("Moving {} surface to {:?}", shell, area);
    }

    fn queue_resize(&self, shell: ShellHandle) {
        log::info!("Resize queued for {}", shell);
    }
}

impl Toolkit for DemoToolkit {
    fn window_kind(&self, widget: WidgetId) -> Option<WindowKind> {
        self.kinds.get(&widget).copied()
    }

    fn toplevel(&self, widget: WidgetId) -> Option<WindowHandle> {
        self.parents.get(&widget).copied()
    }

    // Only menu bars are registered with a parent.
    fn is_menu_shell(&self, widget: WidgetId) -> bool {
        self.parents.contains_key(&widget)
    }
}

fn base(name: &'static str) -> Handler {
    Rc::new(move |widget: WidgetId, call: &mut Call| {
        if let Call::Measure(measure) = call {
            measure.minimum = 24;
            measure.natural = 24;
        }
        log::debug!("{} default {:?} on {}", name, call.operation(), widget);
    })
}

fn register_classes() -> Result<ToolkitClasses, AppMenuError> {
    appmenu::core::hijack::with_global_table(|table| {
        let widget = table.register_class("Widget", None)?;
        for op in [
            Operation::Realize,
            Operation::Unrealize,
            Operation::SizeAllocate,
            Operation::HierarchyChanged,
            Operation::Destroy,
        ]
        .into_iter()
        .chain(Operation::MEASURE)
        {
            table.set_slot(widget, op, Some(base("Widget")));
        }
        table.register_class("Window", Some(widget))?;
        table.register_class("MenuBar", Some(widget))?;
        ToolkitClasses::from_names(table, "Widget", "Window", None, "MenuBar")
    })
}

fn exporter(use_bus: bool) -> Arc<dyn ExportService> {
    if use_bus {
        #[cfg(feature = "dbus")]
        return Arc::new(DbusExportService::new());
        #[cfg(not(feature = "dbus"))]
        log::warn!("Built without session bus support, exporting in-process");
    }
    Arc::new(LocalExportService::default())
}

fn file_menu() -> ShellTemplate {
    let quit = Action::new("quit").with_callback(|| log::info!("Quit activated"));
    ShellTemplate::new()
        .with_item(
            MenuItem::new("_File")
                .with_submenu_item(MenuItem::new("_New").with_action("new").with_accel("<Control>n"))
                .with_submenu_item(MenuItem::new("_Quit").with_action("quit").with_accel("<Control>q")),
            Some(quit),
        )
        .with_item(
            MenuItem::new("_Help").with_submenu_item(MenuItem::new("_About").with_action("about")),
            Some(Action::new("about")),
        )
}

fn dispatch(class: ClassId, widget: impl Into<WidgetId>, mut call: Call) -> Call {
    if !appmenu::core::hijack::dispatch_global(class, widget.into(), &mut call) {
        log::warn!("Nothing handles {:?}", call.operation());
    }
    call
}

fn main() {
    env_logger::init();

    let use_bus = std::env::args().any(|arg| arg == "--bus");
    let settings = match smol::block_on(SettingsRegistry::new()) {
        Ok(registry) => registry.into_settings(),
        Err(e) => {
            log::warn!("Using default settings: {e}");
            Settings::default()
        },
    };

    let classes = match register_classes() {
        Ok(classes) => classes,
        Err(e) => {
            log::error!("Failed to register demo classes: {e}");
            return;
        },
    };

    let factory = Arc::new(TemplateShellFactory::new());
    factory.register(MENU_BAR, file_menu());
    let display = Arc::new(DisplayFlag::new(settings.shows_menubar()));
    let mirror = Rc::new(RefCell::new(MenuMirror::new(
        Arc::new(MemoryStore::new()),
        exporter(use_bus),
        factory,
        display.clone(),
    )));

    let mut toolkit = DemoToolkit::default();
    toolkit.kinds.insert(WINDOW.into(), WindowKind::Normal);
    toolkit.parents.insert(MENU_BAR.into(), WINDOW);
    let toolkit = Rc::new(toolkit);

    let program = std::env::args()
        .next()
        .and_then(|path| {
            std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "mirror".to_string());
    match install_global(&classes, mirror.clone(), toolkit.clone(), &settings, &program) {
        Ok(InstallOutcome::Installed(slots)) => log::info!("Hooked {} slots", slots),
        Ok(outcome) => {
            log::info!("Menus stay in the window: {:?}", outcome);
            return;
        },
        Err(e) => {
            log::error!("Failed to install hooks: {e}");
            return;
        },
    }

    dispatch(classes.window, WINDOW, Call::Realize);
    dispatch(classes.menu_bar, MENU_BAR, Call::Realize);

    if let Some(record) = mirror.borrow().windows().get(WINDOW) {
        let labels: Vec<String> = record
            .menu_model()
            .items()
            .into_iter()
            .filter_map(|item| item.label)
            .collect();
        log::info!("{} exports {:?}", WINDOW, labels);
    }

    let allocation = dispatch(
        classes.menu_bar,
        MENU_BAR,
        Call::SizeAllocate(Allocation::new(0, 0, 640, 24)),
    );
    log::info!("Menu bar allocation: {:?}", allocation);

    if display.set(!display.get()) {
        mirror.borrow().display_changed(&*toolkit);
    }
    let height = dispatch(
        classes.menu_bar,
        MENU_BAR,
        Call::Measure(Measure::new(Orientation::Vertical, None)),
    );
    log::info!("Menu bar height request: {:?}", height);

    dispatch(classes.menu_bar, MENU_BAR, Call::Unrealize);
    dispatch(classes.window, WINDOW, Call::Unrealize);
    dispatch(classes.menu_bar, MENU_BAR, Call::Destroy);
    log::info!(
        "{} windows and {} menu bars left",
        mirror.borrow().windows().len(),
        mirror.borrow().shells().len()
    );
}
