//! Per-OS locations and the ffmpeg lookup.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const APP_DIR: &str = "lvl";

/// `--use-system-deps`: skip the ffmpeg shipped next to `lvl`.
static PATH_ONLY_FFMPEG: AtomicBool = AtomicBool::new(false);

pub fn set_use_system_deps(path_only: bool) {
    PATH_ONLY_FFMPEG.store(path_only, Ordering::Relaxed);
}

pub fn should_use_system_deps() -> bool {
    PATH_ONLY_FFMPEG.load(Ordering::Relaxed)
}

/// `~/<parts>/lvl` on Unix, macOS included, so the log and config sit in the
/// same XDG-style places everywhere.
#[cfg(unix)]
fn home_app_dir(parts: &[&str]) -> PathBuf {
    let mut dir = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    dir.extend(parts);
    dir.join(APP_DIR)
}

/// Log file lives here.
pub fn data_dir() -> PathBuf {
    #[cfg(unix)]
    {
        home_app_dir(&[".local", "share"])
    }
    #[cfg(not(unix))]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// `config.toml` lives here.
pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        home_app_dir(&[".config"])
    }
    #[cfg(not(unix))]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// ffmpeg `-f` for the default audio input.
pub fn default_input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(windows) {
        "dshow"
    } else {
        "pulse"
    }
}

/// ffmpeg `-i` for the default audio input.
pub fn default_input_device() -> &'static str {
    if cfg!(target_os = "macos") {
        ":0"
    } else {
        "default"
    }
}

fn ffmpeg_file_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Places to look for ffmpeg, best first: `FFMPEG_PATH`, the directory of
/// the running executable and its `external/` subdirectory (unless
/// `path_only`), then every `PATH` entry.
pub fn ffmpeg_candidates(
    env_override: Option<&OsStr>,
    exe_dir: Option<&Path>,
    path_var: Option<&OsStr>,
    path_only: bool,
) -> Vec<PathBuf> {
    let name = ffmpeg_file_name();
    let mut out: Vec<PathBuf> = env_override.map(PathBuf::from).into_iter().collect();
    if !path_only {
        if let Some(dir) = exe_dir {
            out.push(dir.join(name));
            out.push(dir.join("external").join(name));
        }
    }
    if let Some(path_var) = path_var {
        out.extend(std::env::split_paths(path_var).map(|dir| dir.join(name)));
    }
    out
}

/// First existing ffmpeg among [`ffmpeg_candidates`] for this process.
pub fn find_ffmpeg_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok();
    let env_override = std::env::var_os("FFMPEG_PATH");
    let path_var = std::env::var_os("PATH");
    ffmpeg_candidates(
        env_override.as_deref(),
        exe.as_deref().and_then(Path::parent),
        path_var.as_deref(),
        should_use_system_deps(),
    )
    .into_iter()
    .find(|p| p.is_file())
}
