// Locating the daemon binary from the CLI

use std::path::{Path, PathBuf};

/// File name of the daemon executable on this platform
pub fn daemon_binary_name() -> &'static str {
    if cfg!(windows) {
        "snoozed.exe"
    } else {
        "snoozed"
    }
}

/// Search each directory of a PATH-style list for `binary_name`
fn find_on_path(path_var: &std::ffi::OsStr, binary_name: &str) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(binary_name))
        .find(|candidate| candidate.is_file())
}

fn sibling_of(exe: &Path, binary_name: &str) -> Option<PathBuf> {
    let candidate = exe.parent()?.join(binary_name);
    candidate.is_file().then_some(candidate)
}

/// Resolve the `snoozed` binary path for the current process.
///
/// Resolution order:
/// 1) `SNOOZE_DAEMON_BIN` environment variable
/// 2) Next to `current_exe()` (installed pair / cargo target dir)
/// 3) Directories on `PATH`
pub fn resolve_daemon_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("SNOOZE_DAEMON_BIN") {
        let explicit = PathBuf::from(explicit);
        if explicit.is_file() {
            return Some(explicit);
        }
    }

    let name = daemon_binary_name();

    if let Some(candidate) = std::env::current_exe()
        .ok()
        .and_then(|exe| sibling_of(&exe, name))
    {
        return Some(candidate);
    }

    std::env::var_os("PATH").and_then(|path_var| find_on_path(&path_var, name))
}
