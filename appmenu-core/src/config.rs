// SPDX-License-Identifier: LGPL-3.0-only

//! Runtime settings of the menu export and the per-program exclusion rules.

use serde::Deserialize;

/// Environment variable switching the whole mechanism off.
pub const MENUPROXY_ENV: &str = "UBUNTU_MENUPROXY";

/// Programs that draw their own menus and must never be exported.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "budgie-panel",
    "gnome-panel",
    "indicator-applet",
    "mate-panel",
    "notify-osd",
    "plank",
    "tilda",
    "vala-panel",
    "xfce4-panel",
    "glade-previewer",
];

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    appmenu: Settings,
}

/// Settings of the menu export, read from the `[appmenu]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Programs whose menus are not exported. `*` matches every program.
    pub blacklist: Vec<String>,
    /// Programs exported even when blacklisted.
    pub whitelist: Vec<String>,
    /// Initial value of the host "shell shows menu bar" flag.
    pub shell_shows_menubar: Option<bool>,
}

impl Settings {
    /// Parse settings from a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<SettingsFile>(source).map(|file| file.appmenu)
    }

    /// Merge `other` over these settings.
    ///
    /// Lists are combined, scalar values of `other` win when present.
    pub fn merge(&mut self, other: Settings) {
        for name in other.blacklist {
            if !self.blacklist.contains(&name) {
                self.blacklist.push(name);
            }
        }
        for name in other.whitelist {
            if !self.whitelist.contains(&name) {
                self.whitelist.push(name);
            }
        }
        if other.shell_shows_menubar.is_some() {
            self.shell_shows_menubar = other.shell_shows_menubar;
        }
    }

    /// Whether the host initially shows the menu bar.
    pub fn shows_menubar(&self) -> bool {
        self.shell_shows_menubar.unwrap_or(false)
    }

    /// Check if the menus of `program` must stay inside its windows.
    pub fn is_excluded(&self, program: &str) -> bool {
        if self.whitelist.iter().any(|p| p == program) {
            return false;
        }
        DEFAULT_BLACKLIST.contains(&program)
            || self.blacklist.iter().any(|p| p == "*" || p == program)
    }

    /// Whether the environment leaves the mechanism enabled.
    pub fn proxy_enabled(&self) -> bool {
        proxy_enabled_for(std::env::var(MENUPROXY_ENV).ok().as_deref())
    }
}

/// Interpret a value of [MENUPROXY_ENV]. Unset means enabled.
pub fn proxy_enabled_for(value: Option<&str>) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off"),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_appmenu_table() {
        let settings = Settings::from_toml(
            r#"
            [appmenu]
            blacklist = ["emacs"]
            whitelist = ["gedit"]
            shell_shows_menubar = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.blacklist, vec!["emacs"]);
        assert_eq!(settings.whitelist, vec!["gedit"]);
        assert!(settings.shows_menubar());
    }

    #[test]
    fn test_missing_table_is_default() {
        let settings = Settings::from_toml("[other]\nkey = 1\n").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.shows_menubar());
    }

    #[test]
    fn test_exclusion_rules() {
        let mut settings = Settings::default();
        assert!(settings.is_excluded("xfce4-panel"));
        assert!(!settings.is_excluded("gedit"));

        settings.blacklist.push("*".into());
        settings.whitelist.push("gedit".into());
        assert!(settings.is_excluded("inkscape"));
        assert!(!settings.is_excluded("gedit"));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut base = Settings {
            blacklist: vec!["a".into()],
            shell_shows_menubar: Some(true),
            ..Default::default()
        };
        base.merge(Settings {
            blacklist: vec!["a".into(), "b".into()],
            ..Default::default()
        });
        assert_eq!(base.blacklist, vec!["a", "b"]);
        assert_eq!(base.shell_shows_menubar, Some(true));

        base.merge(Settings {
            shell_shows_menubar: Some(false),
            ..Default::default()
        });
        assert!(!base.shows_menubar());
    }

    #[test]
    fn test_proxy_switch() {
        assert!(proxy_enabled_for(None));
        assert!(proxy_enabled_for(Some("1")));
        assert!(!proxy_enabled_for(Some("0")));
        assert!(!proxy_enabled_for(Some(" Off ")));
    }
}
