use std::path::PathBuf;

const APP_DIR: &str = "feedwall";

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/feedwall/ (XDG standard)
    // instead of macOS Application Support for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        if let Some(dir) = portable_dir("data") {
            return dir;
        }

        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Some(dir) = portable_dir("config") {
            return dir;
        }
    }

    #[cfg(unix)]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join(APP_DIR);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".config")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn log_path() -> PathBuf {
    data_dir().join("feedwall.log")
}

/// Portable installs keep their data beside the executable.
#[cfg(windows)]
fn portable_dir(name: &str) -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let dir = exe_path.parent()?.join(name);
    dir.exists().then_some(dir)
}
