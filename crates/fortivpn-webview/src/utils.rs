use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Platform-relative path from the home directory to the browser profile directory.
#[cfg(target_os = "linux")]
const PROFILE_SUBPATH: &str = ".local/share/openfortivpn-webview/profile";

#[cfg(target_os = "macos")]
const PROFILE_SUBPATH: &str = "Library/Application Support/openfortivpn-webview/profile";

#[cfg(target_os = "windows")]
const PROFILE_SUBPATH: &str = "AppData/Roaming/openfortivpn-webview/profile";

/// Profile directory below a given home directory.
pub fn user_data_dir_in(home: &Path) -> PathBuf {
    home.join(PROFILE_SUBPATH)
}

/// Returns a platform-appropriate user data directory for the browser profile.
///
/// - **Linux:** `~/.local/share/openfortivpn-webview/profile`
/// - **macOS:** `~/Library/Application Support/openfortivpn-webview/profile`
/// - **Windows:** `%USERPROFILE%\AppData\Roaming\openfortivpn-webview\profile`
///
/// Creates the directory if it does not already exist. Cookies and cache
/// persist there between runs, so an SSO session can be reused.
pub fn get_user_data_dir() -> Result<PathBuf, Box<dyn Error>> {
    let home_dir = env::var("HOME").or_else(|_| env::var("USERPROFILE"))?;
    let user_data_dir = user_data_dir_in(Path::new(&home_dir));

    if !user_data_dir.exists() {
        std::fs::create_dir_all(&user_data_dir)?;
        log::info!("User data directory created at: {:?}", user_data_dir);
    }

    Ok(user_data_dir)
}

/// Removes a profile directory: cookies, cache, history and local storage.
pub fn wipe_dir(path: &Path) -> Result<bool, Box<dyn Error>> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
        log::info!("Wiped profile directory: {:?}", path);
        return Ok(true);
    }
    Ok(false)
}

/// Completely removes the user data directory
pub fn wipe_user_data_dir() -> Result<(), Box<dyn Error>> {
    let path = get_user_data_dir()?;
    wipe_dir(&path)?;
    Ok(())
}
