// SPDX-License-Identifier: LGPL-3.0-only

//! `org.gtk.Menus` object serving a [MenuModel].
//!
//! Group 0 holds a single menu whose rows link to one section each. The
//! sections live in a content group numbered after the model revision, so a
//! subscriber holding a stale group id simply gets nothing back. Submenus are
//! numbered after the sections inside the same content group.

use appmenu_core::model::{MenuItem, MenuModel, ModelChange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use zbus::interface;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{OwnedValue, Str, Structure};

/// Interface name of exported menu models.
pub const MENUS_INTERFACE: &str = "org.gtk.Menus";

/// Prefix of action names referencing the exported action group.
pub const ACTION_PREFIX: &str = "unity.";

pub(crate) const SECTION_LINK: &str = ":section";
pub(crate) const SUBMENU_LINK: &str = ":submenu";

/// Attributes of one menu row.
pub type MenuRow = HashMap<String, OwnedValue>;

/// Rows of one menu: `(group, menu, rows)`.
pub type MenuContent = (u32, u32, Vec<MenuRow>);

/// A change of one menu: `(group, menu, position, removed, added rows)`.
pub type MenuChange = (u32, u32, u32, u32, Vec<MenuRow>);

pub(crate) fn link(group: u32, menu: u32) -> Option<OwnedValue> {
    OwnedValue::try_from(Structure::from((group, menu))).ok()
}

fn text(value: &str) -> OwnedValue {
    OwnedValue::from(Str::from(value.to_string()))
}

fn item_rows(
    items: &[MenuItem],
    group: u32,
    next_menu: &mut u32,
    submenus: &mut Vec<MenuContent>,
) -> Vec<MenuRow> {
    items
        .iter()
        .map(|item| {
            let mut row = MenuRow::new();
            if let Some(label) = &item.label {
                row.insert("label".into(), text(label));
            }
            if let Some(action) = &item.action {
                row.insert("action".into(), text(&format!("{}{}", ACTION_PREFIX, action)));
            }
            if let Some(accel) = &item.accel {
                row.insert("accel".into(), text(accel));
            }
            if item.has_submenu() {
                let menu = *next_menu;
                *next_menu += 1;
                let rows = item_rows(&item.submenu, group, next_menu, submenus);
                submenus.push((group, menu, rows));
                if let Some(value) = link(group, menu) {
                    row.insert(SUBMENU_LINK.into(), value);
                }
            }
            row
        })
        .collect()
}

/// Rows of the root menu, one section link per section.
pub fn root_rows(n_sections: usize, content_group: u32) -> Vec<MenuRow> {
    (0..n_sections as u32)
        .map(|k| {
            let mut row = MenuRow::new();
            if let Some(value) = link(content_group, k) {
                row.insert(SECTION_LINK.into(), value);
            }
            row
        })
        .collect()
}

/// All menus of the content group for the given section contents.
pub fn content_menus(sections: &[Vec<MenuItem>], content_group: u32) -> Vec<MenuContent> {
    let mut next_menu = sections.len() as u32;
    let mut submenus = Vec::new();
    let mut menus: Vec<MenuContent> = sections
        .iter()
        .enumerate()
        .map(|(k, items)| {
            let rows = item_rows(items, content_group, &mut next_menu, &mut submenus);
            (content_group, k as u32, rows)
        })
        .collect();
    menus.append(&mut submenus);
    menus
}

fn content_group(model: &MenuModel) -> u32 {
    model.revision().max(1)
}

fn section_items(model: &MenuModel) -> Vec<Vec<MenuItem>> {
    model
        .sections()
        .iter()
        .map(|section| section.source.items())
        .collect()
}

/// The root menu replacement announced after `change`.
pub fn root_change(model: &MenuModel, change: ModelChange) -> MenuChange {
    let n_sections = model.n_sections();
    let previous = (n_sections + change.removed).saturating_sub(change.added);
    (
        0,
        0,
        0,
        previous as u32,
        root_rows(n_sections, content_group(model)),
    )
}

/// Exported menu model.
pub struct MenusObject {
    model: MenuModel,
    subscriptions: AtomicUsize,
}

impl MenusObject {
    /// Serve `model`.
    pub fn new(model: MenuModel) -> Self {
        Self {
            model,
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Number of group subscriptions not yet ended.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::Relaxed)
    }

    fn contents(&self, groups: &[u32]) -> Vec<MenuContent> {
        let group = content_group(&self.model);
        let mut out = Vec::new();
        if groups.contains(&0) {
            out.push((0, 0, root_rows(self.model.n_sections(), group)));
        }
        if groups.contains(&group) {
            out.extend(content_menus(&section_items(&self.model), group));
        }
        out
    }
}

#[interface(name = "org.gtk.Menus")]
impl MenusObject {
    #[zbus(name = "Start")]
    async fn start(&self, groups: Vec<u32>) -> Vec<MenuContent> {
        log::debug!("Menus.Start groups={:?}", groups);
        self.subscriptions.fetch_add(groups.len(), Ordering::Relaxed);
        self.contents(&groups)
    }

    #[zbus(name = "End")]
    async fn end(&self, groups: Vec<u32>) {
        log::debug!("Menus.End groups={:?}", groups);
        let ended = groups.len();
        let _ = self
            .subscriptions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(ended))
            });
    }

    #[zbus(signal)]
    #[zbus(name = "Changed")]
    pub async fn changed(emitter: &SignalEmitter<'_>, changes: Vec<MenuChange>) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use appmenu_core::model::{Section, SectionOrigin, StaticMenu};
    use appmenu_core::ShellHandle;
    use std::sync::Arc;
    use zbus::zvariant::Value;

    fn as_text(row: &MenuRow, key: &str) -> Option<String> {
        match row.get(key).map(|v| &**v) {
            Some(Value::Str(s)) => Some(s.as_str().to_string()),
            _ => None,
        }
    }

    fn as_link(row: &MenuRow, key: &str) -> Option<(u32, u32)> {
        let value = row.get(key)?.try_clone().ok()?;
        Structure::try_from(value)
            .ok()
            .and_then(|s| <(u32, u32)>::try_from(s).ok())
    }

    #[test]
    fn test_root_links_every_section() {
        let rows = root_rows(2, 7);
        assert_eq!(rows.len(), 2);
        assert_eq!(as_link(&rows[0], SECTION_LINK), Some((7, 0)));
        assert_eq!(as_link(&rows[1], SECTION_LINK), Some((7, 1)));
    }

    #[test]
    fn test_submenus_numbered_after_sections() {
        let sections = vec![
            vec![MenuItem::new("_File")
                .with_submenu_item(MenuItem::new("_Open").with_action("open").with_accel("<Control>o"))],
            vec![MenuItem::new("_Help")],
        ];
        let menus = content_menus(&sections, 3);
        assert_eq!(menus.len(), 3);

        let (_, _, file_rows) = &menus[0];
        assert_eq!(as_text(&file_rows[0], "label").as_deref(), Some("_File"));
        assert_eq!(as_link(&file_rows[0], SUBMENU_LINK), Some((3, 2)));

        let (group, menu, sub_rows) = &menus[2];
        assert_eq!((*group, *menu), (3, 2));
        assert_eq!(as_text(&sub_rows[0], "action").as_deref(), Some("unity.open"));
        assert_eq!(as_text(&sub_rows[0], "accel").as_deref(), Some("<Control>o"));
    }

    #[test]
    fn test_start_serves_root_and_content_groups() {
        let model = MenuModel::new();
        model.append_section(Section::new(
            SectionOrigin::Shell(ShellHandle(1)),
            Arc::new(StaticMenu::new(vec![MenuItem::new("Edit")])),
        ));
        let object = MenusObject::new(model.clone());
        let group = content_group(&model);

        assert_eq!(object.contents(&[0]).len(), 1);
        assert_eq!(object.contents(&[0, group]).len(), 2);
        assert!(object.contents(&[group + 100]).is_empty());
    }

    #[test]
    fn test_root_change_reports_previous_length() {
        let model = MenuModel::new();
        model.append_section(Section::new(
            SectionOrigin::Previous,
            Arc::new(StaticMenu::default()),
        ));
        let change = ModelChange {
            position: 0,
            removed: 0,
            added: 1,
        };
        let (group, menu, position, removed, rows) = root_change(&model, change);
        assert_eq!((group, menu, position, removed), (0, 0, 0, 0));
        assert_eq!(rows.len(), 1);
    }
}
