// SPDX-License-Identifier: LGPL-3.0-only

//! Per-class dispatch table for widget lifecycle operations.
//!
//! Every class owns its own copy of the slots. A subclass copies its parent's
//! slots when it is registered and does not see later changes to the parent,
//! which is what makes propagating an interception to subclasses necessary.

use crate::error::{AppMenuError, Result};
use crate::handle::WidgetId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identity of a registered widget class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Lifecycle operations that can be dispatched through a [ClassTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// The widget acquires its drawing surface.
    Realize,
    /// The widget releases its drawing surface.
    Unrealize,
    /// The widget receives its final rectangle.
    SizeAllocate,
    /// Minimum and natural width.
    PreferredWidth,
    /// Minimum and natural height.
    PreferredHeight,
    /// Minimum and natural width for a given height.
    WidthForHeight,
    /// Minimum and natural height for a given width.
    HeightForWidth,
    /// The widget moved to another toplevel.
    HierarchyChanged,
    /// The widget is being destroyed.
    Destroy,
}

impl Operation {
    /// The four size-request operations.
    pub const MEASURE: [Operation; 4] = [
        Operation::PreferredWidth,
        Operation::PreferredHeight,
        Operation::WidthForHeight,
        Operation::HeightForWidth,
    ];
}

/// Axis of a size request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Width.
    Horizontal,
    /// Height.
    Vertical,
}

/// A widget rectangle in its parent's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Allocation {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl Allocation {
    /// The empty rectangle at the origin.
    pub const ZERO: Allocation = Allocation {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    /// Create a rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Result slots of a size request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    /// Requested axis.
    pub orientation: Orientation,
    /// Size along the other axis, for the height-for-width variants.
    pub for_size: Option<i32>,
    /// Minimum size, filled in by the handler.
    pub minimum: i32,
    /// Natural size, filled in by the handler.
    pub natural: i32,
}

impl Measure {
    /// Create an unanswered request.
    pub fn new(orientation: Orientation, for_size: Option<i32>) -> Self {
        Self {
            orientation,
            for_size,
            minimum: 0,
            natural: 0,
        }
    }

    /// The operation answering this request.
    pub fn operation(&self) -> Operation {
        match (self.orientation, self.for_size) {
            (Orientation::Horizontal, None) => Operation::PreferredWidth,
            (Orientation::Vertical, None) => Operation::PreferredHeight,
            (Orientation::Horizontal, Some(_)) => Operation::WidthForHeight,
            (Orientation::Vertical, Some(_)) => Operation::HeightForWidth,
        }
    }
}

/// Arguments and results of one dispatched operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// See [Operation::Realize].
    Realize,
    /// See [Operation::Unrealize].
    Unrealize,
    /// See [Operation::SizeAllocate].
    SizeAllocate(Allocation),
    /// One of the [Operation::MEASURE] operations.
    Measure(Measure),
    /// See [Operation::HierarchyChanged].
    HierarchyChanged,
    /// See [Operation::Destroy].
    Destroy,
}

impl Call {
    /// The slot this call is dispatched through.
    pub fn operation(&self) -> Operation {
        match self {
            Call::Realize => Operation::Realize,
            Call::Unrealize => Operation::Unrealize,
            Call::SizeAllocate(_) => Operation::SizeAllocate,
            Call::Measure(measure) => measure.operation(),
            Call::HierarchyChanged => Operation::HierarchyChanged,
            Call::Destroy => Operation::Destroy,
        }
    }
}

/// Implementation stored in a slot.
pub type Handler = Rc<dyn Fn(WidgetId, &mut Call)>;

/// Check whether two optional slots hold the same implementation.
///
/// Two empty slots are considered equal.
pub fn same_handler(a: Option<&Handler>, b: Option<&Handler>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
        _ => false,
    }
}

struct ClassEntry {
    name: String,
    parent: Option<ClassId>,
    children: Vec<ClassId>,
    slots: HashMap<Operation, Handler>,
}

/// Registered widget classes and their slots.
#[derive(Default)]
pub struct ClassTable {
    classes: IndexMap<String, ClassEntry>,
    intercepted: bool,
}

impl ClassTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, class: ClassId) -> Option<&ClassEntry> {
        self.classes.get_index(class.0 as usize).map(|(_, e)| e)
    }

    fn entry_mut(&mut self, class: ClassId) -> Option<&mut ClassEntry> {
        self.classes.get_index_mut(class.0 as usize).map(|(_, e)| e)
    }

    /// Register a class, copying the current slots of its parent.
    ///
    /// Registering an existing name returns the existing class.
    pub fn register_class(&mut self, name: &str, parent: Option<ClassId>) -> Result<ClassId> {
        if let Some(index) = self.classes.get_index_of(name) {
            return Ok(ClassId(index as u32));
        }
        let slots = match parent {
            Some(parent) => self
                .entry(parent)
                .map(|p| p.slots.clone())
                .ok_or_else(|| AppMenuError::UnknownClass(format!("parent of {}", name)))?,
            None => HashMap::new(),
        };
        let id = ClassId(self.classes.len() as u32);
        self.classes.insert(
            name.to_string(),
            ClassEntry {
                name: name.to_string(),
                parent,
                children: Vec::new(),
                slots,
            },
        );
        if let Some(parent) = parent.and_then(|p| self.entry_mut(p)) {
            parent.children.push(id);
        }
        Ok(id)
    }

    /// Find a class by name.
    pub fn find(&self, name: &str) -> Option<ClassId> {
        self.classes.get_index_of(name).map(|i| ClassId(i as u32))
    }

    /// Find a class by name or fail with [AppMenuError::UnknownClass].
    pub fn require(&self, name: &str) -> Result<ClassId> {
        self.find(name)
            .ok_or_else(|| AppMenuError::UnknownClass(name.to_string()))
    }

    /// Name of a class.
    pub fn name(&self, class: ClassId) -> Option<&str> {
        self.entry(class).map(|e| e.name.as_str())
    }

    /// Parent of a class.
    pub fn parent(&self, class: ClassId) -> Option<ClassId> {
        self.entry(class).and_then(|e| e.parent)
    }

    /// Whether `class` is `ancestor` or derives from it.
    pub fn is_a(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// All classes derived from `class`, depth first, in registration order.
    pub fn descendants(&self, class: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        let mut stack: Vec<ClassId> = match self.entry(class) {
            Some(entry) => entry.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(entry) = self.entry(next) {
                stack.extend(entry.children.iter().rev().copied());
            }
        }
        out
    }

    /// Current implementation of an operation on a class.
    pub fn slot(&self, class: ClassId, op: Operation) -> Option<Handler> {
        self.entry(class).and_then(|e| e.slots.get(&op).cloned())
    }

    /// Store an implementation on `class` only, or empty the slot.
    pub fn set_slot(&mut self, class: ClassId, op: Operation, handler: Option<Handler>) {
        let Some(entry) = self.entry_mut(class) else {
            log::error!("Cannot set {:?} on unregistered class {:?}", op, class);
            return;
        };
        match handler {
            Some(handler) => {
                entry.slots.insert(op, handler);
            },
            None => {
                entry.slots.remove(&op);
            },
        }
    }

    /// Dispatch `call` on `widget` through the slot of `class`.
    ///
    /// Returns `false` if the slot is empty.
    pub fn invoke(&self, class: ClassId, widget: WidgetId, call: &mut Call) -> bool {
        match self.slot(class, call.operation()) {
            Some(handler) => {
                handler(widget, call);
                true
            },
            None => false,
        }
    }

    pub(crate) fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    pub(crate) fn mark_intercepted(&mut self) {
        self.intercepted = true;
    }
}

impl fmt::Debug for ClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassTable")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("intercepted", &self.intercepted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(counter: Rc<Cell<u32>>) -> Handler {
        Rc::new(move |_: WidgetId, _: &mut Call| counter.set(counter.get() + 1))
    }

    #[test]
    fn test_subclass_copies_slots_at_registration() {
        let mut table = ClassTable::new();
        let hits = Rc::new(Cell::new(0));
        let base = table.register_class("Widget", None).unwrap();
        table.set_slot(base, Operation::Realize, Some(counting(hits.clone())));
        let child = table.register_class("Window", Some(base)).unwrap();

        assert!(same_handler(
            table.slot(base, Operation::Realize).as_ref(),
            table.slot(child, Operation::Realize).as_ref()
        ));

        // Later changes on the parent are not seen by the child.
        table.set_slot(base, Operation::Realize, None);
        assert!(table.invoke(child, WidgetId(1), &mut Call::Realize));
        assert!(!table.invoke(base, WidgetId(1), &mut Call::Realize));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_descendants_are_depth_first() {
        let mut table = ClassTable::new();
        let a = table.register_class("A", None).unwrap();
        let b = table.register_class("B", Some(a)).unwrap();
        let c = table.register_class("C", Some(a)).unwrap();
        let d = table.register_class("D", Some(b)).unwrap();
        assert_eq!(table.descendants(a), vec![b, d, c]);
        assert!(table.is_a(d, a));
        assert!(!table.is_a(c, b));
    }

    #[test]
    fn test_register_is_idempotent_and_checks_parent() {
        let mut table = ClassTable::new();
        let a = table.register_class("A", None).unwrap();
        assert_eq!(table.register_class("A", None).unwrap(), a);
        assert!(matches!(
            table.register_class("B", Some(ClassId(42))),
            Err(AppMenuError::UnknownClass(_))
        ));
        assert!(table.require("B").is_err());
    }

    #[test]
    fn test_measure_operation() {
        assert_eq!(
            Call::Measure(Measure::new(Orientation::Vertical, Some(10))).operation(),
            Operation::HeightForWidth
        );
        assert_eq!(
            Call::Measure(Measure::new(Orientation::Horizontal, None)).operation(),
            Operation::PreferredWidth
        );
    }
}
