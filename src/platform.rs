// Platform paths for the gateway's settings file and SQLite database.
//
// - Linux:   $XDG_CONFIG_HOME/vocab-gateway, $XDG_DATA_HOME/vocab-gateway
// - macOS:   ~/Library/Application Support/VocabGateway (both)
// - Windows: %APPDATA%/VocabGateway (both)

use std::env;
use std::path::PathBuf;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    match env::var(var) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("vocab-gateway"),
        _ => {
            let home = env::var("HOME").unwrap_or_else(|_| String::from("/tmp"));
            fallback
                .iter()
                .fold(PathBuf::from(home), |p, part| p.join(part))
                .join("vocab-gateway")
        }
    }
}

#[cfg(target_os = "macos")]
fn app_support_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
        .join("Library")
        .join("Application Support")
        .join("VocabGateway")
}

#[cfg(target_os = "windows")]
fn appdata_dir() -> PathBuf {
    let appdata = env::var("APPDATA")
        .unwrap_or_else(|_| String::from("C:\\Users\\Default\\AppData\\Roaming"));
    PathBuf::from(appdata).join("VocabGateway")
}

/// Directory holding `settings.json`.
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        app_support_dir()
    }
    #[cfg(target_os = "windows")]
    {
        appdata_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        xdg_dir("XDG_CONFIG_HOME", &[".config"])
    }
}

/// Directory holding the SQLite database.
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        app_support_dir()
    }
    #[cfg(target_os = "windows")]
    {
        appdata_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        xdg_dir("XDG_DATA_HOME", &[".local", "share"])
    }
}
