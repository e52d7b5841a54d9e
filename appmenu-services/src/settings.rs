// SPDX-License-Identifier: LGPL-3.0-only
use anyhow::Result;
use appmenu_core::config::Settings;
use smol::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

/// Prefix of the XDG directories settings are read from.
pub const XDG_PREFIX: &str = "appmenu-0";

/// Name of the settings file.
pub const SETTINGS_FILE: &str = "appmenu.toml";

/// Registry for the menu export settings.
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    settings: Settings,
}

impl SettingsRegistry {
    /// Create a new SettingsRegistry and load settings from standard locations.
    pub async fn new() -> Result<Self> {
        let mut registry = Self::default();
        registry.load().await?;
        Ok(registry)
    }

    /// Load settings from standard locations in precedence order.
    ///
    /// Order (later overrides earlier):
    /// 1. System Data: /usr/share/appmenu-0/appmenu.toml (and XDG_DATA_DIRS)
    /// 2. System Config: /etc/xdg/appmenu-0/appmenu.toml (and XDG_CONFIG_DIRS)
    /// 3. User Config: ~/.config/appmenu-0/appmenu.toml (XDG_CONFIG_HOME)
    pub async fn load(&mut self) -> Result<()> {
        let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;

        for path in xdg_dirs.find_data_files(SETTINGS_FILE).rev() {
            self.load_file(&path).await;
        }

        for path in xdg_dirs.find_config_files(SETTINGS_FILE).rev() {
            self.load_file(&path).await;
        }

        let user_config_path = xdg_dirs.get_config_home().join(SETTINGS_FILE);
        if user_config_path.exists() {
            self.load_file(&user_config_path).await;
        }

        Ok(())
    }

    async fn load_file(&mut self, path: &Path) {
        log::info!("Loading appmenu settings from: {:?}", path);
        match fs::read_to_string(path).await {
            Ok(content) => match Settings::from_toml(&content) {
                Ok(loaded) => self.settings.merge(loaded),
                Err(e) => log::error!("Failed to parse settings file {:?}: {}", path, e),
            },
            Err(e) => log::warn!("Failed to read settings file {:?}: {}", path, e),
        }
    }

    /// Load settings from custom paths, reporting the outcome of each file.
    pub async fn load_from_paths_async(&mut self, paths: Vec<PathBuf>) -> Vec<Result<()>> {
        let mut results = Vec::new();
        for path in paths {
            let result = async {
                let content = fs::read_to_string(&path)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to read settings file {:?}: {}", path, e))?;
                let loaded = Settings::from_toml(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse settings file {:?}: {}", path, e))?;
                self.settings.merge(loaded);
                Ok(())
            }
            .await;
            results.push(result);
        }
        results
    }

    /// Reset to defaults and re-run the full load.
    pub async fn reload_async(&mut self) -> Result<()> {
        *self = Self::default();
        self.load().await
    }

    /// The merged settings.
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Take the merged settings out of the registry.
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_file_overrides_flag() {
        let mut registry = SettingsRegistry::default();
        registry.settings.merge(Settings::from_toml("[appmenu]\nshell_shows_menubar = true\n").unwrap());
        registry.settings.merge(Settings::from_toml("[appmenu]\nshell_shows_menubar = false\n").unwrap());
        assert!(!registry.get().shows_menubar());
    }
}
