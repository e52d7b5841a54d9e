// SPDX-License-Identifier: LGPL-3.0-only

//! Menus and action groups exported by another connection.

use super::actions::{parse_description, ActionDescription, ACTIONS_INTERFACE};
use super::menus::{MenuContent, MenuRow, ACTION_PREFIX, MENUS_INTERFACE, SECTION_LINK, SUBMENU_LINK};
use appmenu_core::action::{ActionInfo, ActionSource};
use appmenu_core::model::{MenuItem, StaticMenu};
use std::collections::{HashMap, HashSet};
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::{OwnedValue, Structure, Value};

// Links nested deeper than this are ignored.
const MAX_DEPTH: usize = 16;

fn row_text(row: &MenuRow, key: &str) -> Option<String> {
    match row.get(key).map(|v| &**v) {
        Some(Value::Str(s)) => Some(s.as_str().to_string()),
        _ => None,
    }
}

fn row_link(row: &MenuRow, key: &str) -> Option<(u32, u32)> {
    match row.get(key).map(|v| &**v) {
        Some(Value::Structure(s)) => link_fields(s),
        _ => None,
    }
}

fn link_fields(structure: &Structure<'_>) -> Option<(u32, u32)> {
    match structure.fields() {
        [Value::U32(group), Value::U32(menu)] => Some((*group, *menu)),
        _ => None,
    }
}

/// Build the item tree of `(group, menu)` out of fetched menu contents.
///
/// Section links are flattened into the enclosing menu.
pub fn items_from_contents(
    contents: &HashMap<(u32, u32), Vec<MenuRow>>,
    group: u32,
    menu: u32,
) -> Vec<MenuItem> {
    collect_items(contents, group, menu, 0)
}

fn collect_items(
    contents: &HashMap<(u32, u32), Vec<MenuRow>>,
    group: u32,
    menu: u32,
    depth: usize,
) -> Vec<MenuItem> {
    let Some(rows) = contents.get(&(group, menu)) else {
        return Vec::new();
    };
    if depth > MAX_DEPTH {
        log::warn!("Menu {}/{} is nested too deeply", group, menu);
        return Vec::new();
    }
    let mut items = Vec::new();
    for row in rows {
        if let Some((g, m)) = row_link(row, SECTION_LINK) {
            items.extend(collect_items(contents, g, m, depth + 1));
            continue;
        }
        let submenu = row_link(row, SUBMENU_LINK)
            .map(|(g, m)| collect_items(contents, g, m, depth + 1))
            .unwrap_or_default();
        items.push(MenuItem {
            label: row_text(row, "label"),
            action: row_text(row, "action")
                .map(|a| a.strip_prefix(ACTION_PREFIX).map(str::to_string).unwrap_or(a)),
            accel: row_text(row, "accel"),
            submenu,
        });
    }
    items
}

fn linked_groups(rows: &[MenuRow]) -> impl Iterator<Item = u32> + '_ {
    rows.iter().flat_map(|row| {
        [SECTION_LINK, SUBMENU_LINK]
            .into_iter()
            .filter_map(move |key| row_link(row, key).map(|(g, _)| g))
    })
}

/// Fetch the whole menu tree exported at `path` by `bus_name`.
///
/// The tree is taken as a snapshot: the subscription is ended as soon as
/// every linked group was read.
pub fn fetch_menu(conn: &Connection, bus_name: &str, path: &str) -> zbus::Result<StaticMenu> {
    let proxy = Proxy::new(conn, bus_name, path, MENUS_INTERFACE)?;
    let mut contents: HashMap<(u32, u32), Vec<MenuRow>> = HashMap::new();
    let mut subscribed: HashSet<u32> = HashSet::new();
    let mut pending = vec![0u32];
    while !pending.is_empty() {
        subscribed.extend(pending.iter().copied());
        let reply: Vec<MenuContent> = proxy.call("Start", &(pending.clone(),))?;
        pending.clear();
        for (group, menu, rows) in reply {
            for linked in linked_groups(&rows) {
                if !subscribed.contains(&linked) && !pending.contains(&linked) {
                    pending.push(linked);
                }
            }
            contents.insert((group, menu), rows);
        }
    }
    let groups: Vec<u32> = subscribed.into_iter().collect();
    if let Err(e) = proxy.call::<_, _, ()>("End", &(groups,)) {
        log::debug!("Ending subscription of {} at {}: {}", bus_name, path, e);
    }
    Ok(StaticMenu::new(items_from_contents(&contents, 0, 0)))
}

/// Action group exported by another connection.
///
/// Every query is a bus round trip, failures read as an empty group.
pub struct RemoteActions {
    proxy: Proxy<'static>,
}

impl RemoteActions {
    /// Connect to the group at `path` of `bus_name`, checking that it answers.
    pub fn connect(conn: &Connection, bus_name: &str, path: &str) -> zbus::Result<Self> {
        let proxy = Proxy::new_owned(
            conn.clone(),
            bus_name.to_string(),
            path.to_string(),
            ACTIONS_INTERFACE,
        )?;
        let remote = Self { proxy };
        remote.describe_all()?;
        Ok(remote)
    }

    fn describe_all(&self) -> zbus::Result<HashMap<String, ActionDescription>> {
        self.proxy.call("DescribeAll", &())
    }
}

impl ActionSource for RemoteActions {
    fn list_actions(&self) -> Vec<ActionInfo> {
        match self.describe_all() {
            Ok(all) => {
                let mut infos: Vec<ActionInfo> = all
                    .iter()
                    .map(|(name, description)| parse_description(name, description))
                    .collect();
                infos.sort_by(|a, b| a.name.cmp(&b.name));
                infos
            },
            Err(e) => {
                log::warn!("Failed to list remote actions: {}", e);
                Vec::new()
            },
        }
    }

    fn activate(&self, name: &str) -> bool {
        let parameter: Vec<OwnedValue> = Vec::new();
        let platform_data: HashMap<String, OwnedValue> = HashMap::new();
        match self
            .proxy
            .call::<_, _, ()>("Activate", &(name, parameter, platform_data))
        {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to activate remote action '{}': {}", name, e);
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbus::menus::{content_menus, root_rows};

    fn contents_of(sections: &[Vec<MenuItem>], group: u32) -> HashMap<(u32, u32), Vec<MenuRow>> {
        let mut contents = HashMap::new();
        contents.insert((0, 0), root_rows(sections.len(), group));
        for (g, m, rows) in content_menus(sections, group) {
            contents.insert((g, m), rows);
        }
        contents
    }

    #[test]
    fn test_sections_are_flattened_and_prefix_stripped() {
        let file = MenuItem::new("_File")
            .with_submenu_item(MenuItem::new("_Quit").with_action("quit").with_accel("<Control>q"));
        let help = MenuItem::new("_Help");
        let contents = contents_of(&[vec![file.clone()], vec![help.clone()]], 5);

        assert_eq!(items_from_contents(&contents, 0, 0), vec![file, help]);
    }

    #[test]
    fn test_unknown_menu_is_empty() {
        let contents = contents_of(&[vec![MenuItem::new("A")]], 2);
        assert!(items_from_contents(&contents, 9, 0).is_empty());
    }

    #[test]
    fn test_foreign_actions_keep_prefix() {
        let mut row = MenuRow::new();
        row.insert("action".into(), OwnedValue::from(zbus::zvariant::Str::from("app.about")));
        let mut contents = HashMap::new();
        contents.insert((0, 0), vec![row]);
        let items = items_from_contents(&contents, 0, 0);
        assert_eq!(items[0].action.as_deref(), Some("app.about"));
    }
}
