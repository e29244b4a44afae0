use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> Option<PathBuf> {
  std::env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> Option<PathBuf> {
  let config_home = match std::env::var_os("XDG_CONFIG_HOME") {
    Some(dir) if !dir.is_empty() => PathBuf::from(dir),
    _ => home_dir()?.join(".config"),
  };
  Some(config_home.join(APP_NAME))
}

/// Default location of the pipeline configuration file.
pub fn config_file() -> Option<PathBuf> {
  config_dir().map(|dir| dir.join("config.toml"))
}
