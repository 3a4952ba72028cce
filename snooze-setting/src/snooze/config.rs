// Environment configuration helpers for the daemon and CLI
// Handles platform-specific paths for sockets, PID files, state and the live settings file

use std::path::PathBuf;
use std::time::Duration;

/// How often the daemon scans for expired snoozes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for daemon paths and settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing runtime files (socket, PID)
    pub runtime_dir: PathBuf,
    /// Directory for storing persistent state (state.json)
    pub state_dir: PathBuf,
    /// Path to the Unix socket
    pub socket_path: PathBuf,
    /// Path to the daemon PID file
    pub pid_file: PathBuf,
    /// Live settings file the snoozes are applied to
    pub settings_file: PathBuf,
    /// Period of the expiry sweep
    pub sweep_interval: Duration,
}

impl Config {
    /// Create configuration using default paths
    pub fn default_paths() -> Self {
        let runtime_dir = Self::default_runtime_dir();
        let state_dir = Self::default_state_dir();

        Self {
            socket_path: runtime_dir.join("daemon.sock"),
            pid_file: runtime_dir.join("daemon.pid"),
            runtime_dir,
            state_dir,
            settings_file: Self::default_settings_file(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default_paths();

        // SNOOZE_DAEMON_DIR overrides BOTH runtime_dir and state_dir
        if let Ok(override_dir) = std::env::var("SNOOZE_DAEMON_DIR") {
            let base = PathBuf::from(override_dir);
            config.socket_path = base.join("daemon.sock");
            config.pid_file = base.join("daemon.pid");
            config.runtime_dir = base.clone();
            config.state_dir = base;
        }

        if let Ok(settings_file) = std::env::var("SNOOZE_SETTINGS_FILE") {
            config.settings_file = PathBuf::from(settings_file);
        }

        if let Some(secs) = std::env::var("SNOOZE_SWEEP_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.sweep_interval = Duration::from_secs(secs);
        }

        config
    }

    /// Get the default runtime directory (socket + pid)
    fn default_runtime_dir() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            // Linux: prefer XDG_RUNTIME_DIR if set, else fall back to state_dir
            if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
                PathBuf::from(runtime_dir).join("snooze-setting")
            } else {
                Self::default_state_dir()
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            Self::default_state_dir()
        }
    }

    /// Get the default state directory (state.json)
    fn default_state_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".snooze-setting"))
            .unwrap_or_else(|| PathBuf::from("/tmp/snooze-setting"))
    }

    /// The editor's user-level settings file
    fn default_settings_file() -> PathBuf {
        dirs::config_dir()
            .map(|c| c.join("Code").join("User").join("settings.json"))
            .unwrap_or_else(|| Self::default_state_dir().join("settings.json"))
    }

    /// Get the runtime directory (socket + pid)
    pub fn runtime_dir(&self) -> &PathBuf {
        &self.runtime_dir
    }

    /// Get the state directory
    pub fn state_dir(&self) -> &PathBuf {
        &self.state_dir
    }

    /// Get the durable state file path
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    /// Ensure both runtime and state directories exist with appropriate permissions
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;

        // Create runtime directory with 0700 permissions on Unix
        std::fs::create_dir_all(&self.runtime_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.runtime_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(())
    }

    /// Write the daemon PID to the PID file
    pub fn write_pid(&self) -> std::io::Result<()> {
        self.ensure_dirs()?;
        std::fs::write(&self.pid_file, std::process::id().to_string())
    }

    /// Read the daemon PID from the PID file
    pub fn read_pid(&self) -> Option<u32> {
        std::fs::read_to_string(&self.pid_file)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Remove the PID file
    pub fn remove_pid(&self) -> std::io::Result<()> {
        if self.pid_file.exists() {
            std::fs::remove_file(&self.pid_file)
        } else {
            Ok(())
        }
    }

    /// Remove the socket file
    pub fn remove_socket(&self) -> std::io::Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
        } else {
            Ok(())
        }
    }

    /// Check if the daemon socket exists (indicating daemon may be running)
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    /// Check if a process with the stored PID is still running
    #[cfg(unix)]
    pub fn is_daemon_running(&self) -> bool {
        if let Some(pid) = self.read_pid() {
            // Signal 0 only checks that the process exists
            unsafe { libc::kill(pid as i32, 0) == 0 }
        } else {
            false
        }
    }

    #[cfg(not(unix))]
    pub fn is_daemon_running(&self) -> bool {
        self.socket_exists()
    }
}
