use super::polling::{wait_for_file_content, WaitError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Paths a test daemon runs against
#[derive(Debug, Clone)]
pub struct DaemonEnv {
    pub daemon_dir: PathBuf,
    pub settings_file: PathBuf,
    pub sweep_secs: Option<u64>,
}

impl DaemonEnv {
    pub fn new(root: &Path) -> Self {
        Self {
            daemon_dir: root.join("daemon"),
            settings_file: root.join("settings.json"),
            sweep_secs: None,
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.daemon_dir.join("state.json")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.daemon_dir.join("daemon.sock")
    }

    /// The same environment the CLI and daemon read in `Config::from_env`
    pub fn apply(&self, command: &mut Command) {
        command
            .env("SNOOZE_DAEMON_DIR", &self.daemon_dir)
            .env("SNOOZE_SETTINGS_FILE", &self.settings_file);
        if let Some(secs) = self.sweep_secs {
            command.env("SNOOZE_SWEEP_SECS", secs.to_string());
        }
    }
}

/// Kills the daemon on drop unless it already exited.
pub struct DaemonGuard {
    child: Child,
}

impl DaemonGuard {
    pub fn start(env: &DaemonEnv) -> Result<Self, DaemonError> {
        let mut command = Command::new(env!("CARGO_BIN_EXE_snoozed"));
        env.apply(&mut command);
        let child = command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(DaemonError::SpawnFailed)?;

        let guard = Self { child };
        println!(
            "Started snoozed (pid {}) in {}",
            guard.pid(),
            env.daemon_dir.display()
        );

        wait_for_file_content(
            env.daemon_dir.join("daemon.pid"),
            |content| content.trim().parse::<u32>().is_ok(),
            READY_TIMEOUT,
        )
        .map_err(DaemonError::ReadyTimeout)?;

        // The pid file is written before the socket is bound
        let deadline = Instant::now() + READY_TIMEOUT;
        while !env.socket_path().exists() {
            if Instant::now() >= deadline {
                return Err(DaemonError::SocketMissing(env.socket_path()));
            }
            thread::sleep(Duration::from_millis(20));
        }

        Ok(guard)
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the process to exit on its own
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(_)) = self.child.try_wait() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        false
    }

    /// Send SIGTERM, the signal a service manager would use
    #[cfg(unix)]
    pub fn terminate(&self) {
        unsafe {
            libc::kill(self.pid() as i32, libc::SIGTERM);
        }
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        if let Err(err) = self.child.kill() {
            eprintln!("Failed to terminate snoozed pid {}: {}", self.child.id(), err);
            return;
        }

        let _ = self.child.wait();
    }
}

pub fn start_daemon(env: &DaemonEnv) -> Result<DaemonGuard, DaemonError> {
    DaemonGuard::start(env)
}

#[derive(Debug)]
pub enum DaemonError {
    SpawnFailed(std::io::Error),
    ReadyTimeout(WaitError),
    SocketMissing(PathBuf),
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed(err) => write!(f, "failed to spawn daemon: {}", err),
            Self::ReadyTimeout(err) => write!(f, "daemon never became ready: {}", err),
            Self::SocketMissing(path) => write!(f, "daemon socket never appeared at {}", path.display()),
        }
    }
}

impl std::error::Error for DaemonError {}
