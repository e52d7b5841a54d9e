use appmenu_services::SettingsRegistry;
use std::fs;

fn test_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn test_load_from_paths_merges_in_order() {
    let dir = test_dir("appmenu_settings_test_merge");
    let system = dir.join("system.toml");
    let user = dir.join("user.toml");
    fs::write(
        &system,
        "[appmenu]\nblacklist = [\"emacs\"]\nshell_shows_menubar = true\n",
    )
    .unwrap();
    fs::write(
        &user,
        "[appmenu]\nwhitelist = [\"emacs\"]\nshell_shows_menubar = false\n",
    )
    .unwrap();

    let mut registry = SettingsRegistry::default();
    let results = registry.load_from_paths_async(vec![system, user]).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let settings = registry.get();
    assert_eq!(settings.blacklist, vec!["emacs"]);
    assert!(!settings.shows_menubar());
    assert!(!settings.is_excluded("emacs"));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_bad_files_are_reported_and_skipped() {
    let dir = test_dir("appmenu_settings_test_bad");
    let broken = dir.join("broken.toml");
    let good = dir.join("good.toml");
    fs::write(&broken, "[appmenu\nblacklist = ").unwrap();
    fs::write(&good, "[appmenu]\nblacklist = [\"*\"]\n").unwrap();

    let mut registry = SettingsRegistry::default();
    let results = registry
        .load_from_paths_async(vec![dir.join("missing.toml"), broken, good])
        .await;
    assert!(results[0].is_err());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    assert!(registry.get().is_excluded("anything"));

    fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_defaults_without_files() {
    let registry = SettingsRegistry::default();
    let settings = registry.into_settings();
    assert!(settings.blacklist.is_empty());
    assert!(!settings.shows_menubar());
    assert!(settings.is_excluded("xfce4-panel"));
}
