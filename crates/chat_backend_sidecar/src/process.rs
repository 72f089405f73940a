//! Discovery and supervision of the local sidecar process.

use std::env::consts::EXE_SUFFIX;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use sidecar_api::{SidecarApiConfig, SidecarApiError, SidecarClient};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use wait_timeout::ChildExt;

/// File name (without platform suffix) of a bundled sidecar executable,
/// looked up in a `sidecar/` directory next to the running executable.
pub const SIDECAR_BINARY_NAME: &str = "chat-sidecar";

/// Development entry point, relative to a search root.
pub const SIDECAR_SCRIPT: &str = "sidecar/main.py";

pub const PYTHON_INTERPRETERS: [&str; 3] = ["python3.12", "python3", "python"];

pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const HEALTH_POLL_ATTEMPTS: u32 = 60;

const STOP_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SidecarProcessError {
    #[error("no bundled sidecar found and {script} is missing (searched: {searched})")]
    NotFound { script: &'static str, searched: String },

    #[error("no working Python interpreter found to run {script}")]
    NoInterpreter { script: PathBuf },

    #[error("failed to spawn sidecar {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sidecar exited before becoming healthy ({status})")]
    Exited { status: ExitStatus },

    #[error("sidecar failed to become healthy within {waited:?}")]
    Unhealthy { waited: Duration },

    #[error("failed to inspect sidecar process: {0}")]
    Wait(#[source] io::Error),

    #[error(transparent)]
    Api(#[from] SidecarApiError),
}

/// How to start the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarLaunch {
    /// Self-contained executable shipped next to the client.
    Bundled(PathBuf),
    /// Development script run through a Python interpreter.
    Script { interpreter: String, script: PathBuf },
}

impl SidecarLaunch {
    pub fn program(&self) -> PathBuf {
        match self {
            Self::Bundled(path) => path.clone(),
            Self::Script { interpreter, .. } => PathBuf::from(interpreter),
        }
    }

    pub fn command(&self, port: u16) -> Command {
        let mut command = Command::new(self.program());
        if let Self::Script { script, .. } = self {
            command.arg(script);
        }
        command.arg("--port").arg(port.to_string());
        command
    }
}

/// Where to look for the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarLocator {
    /// Directory holding the `sidecar/` bundle, usually the executable's.
    pub bundle_dir: Option<PathBuf>,
    /// Roots searched in order for [`SIDECAR_SCRIPT`].
    pub script_roots: Vec<PathBuf>,
    /// Interpreters probed in order with `--version`.
    pub interpreters: Vec<String>,
}

impl SidecarLocator {
    /// Locator for the running executable: bundle next to the executable,
    /// then `extra_root`, then the working directory and its two parents.
    pub fn from_environment(extra_root: Option<PathBuf>) -> Self {
        let bundle_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(Path::to_path_buf));

        let mut script_roots: Vec<PathBuf> = extra_root.into_iter().collect();
        script_roots.extend([PathBuf::from("."), PathBuf::from(".."), PathBuf::from("../..")]);

        Self {
            bundle_dir,
            script_roots,
            interpreters: PYTHON_INTERPRETERS.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn bundled_binary(&self) -> Option<PathBuf> {
        let candidate = self
            .bundle_dir
            .as_ref()?
            .join("sidecar")
            .join(format!("{SIDECAR_BINARY_NAME}{EXE_SUFFIX}"));
        candidate.is_file().then_some(candidate)
    }

    pub fn script(&self) -> Option<PathBuf> {
        self.script_roots
            .iter()
            .map(|root| root.join(SIDECAR_SCRIPT))
            .find(|candidate| candidate.is_file())
            .map(|candidate| candidate.canonicalize().unwrap_or(candidate))
    }

    /// Resolves a launch plan. A bundled binary wins over the script.
    pub fn locate(&self) -> Result<SidecarLaunch, SidecarProcessError> {
        if let Some(binary) = self.bundled_binary() {
            return Ok(SidecarLaunch::Bundled(binary));
        }

        let script = self.script().ok_or_else(|| SidecarProcessError::NotFound {
            script: SIDECAR_SCRIPT,
            searched: self
                .script_roots
                .iter()
                .map(|root| root.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

        let interpreter = self
            .interpreters
            .iter()
            .find(|interpreter| interpreter_works(interpreter))
            .ok_or_else(|| SidecarProcessError::NoInterpreter {
                script: script.clone(),
            })?;

        Ok(SidecarLaunch::Script {
            interpreter: interpreter.clone(),
            script,
        })
    }
}

fn interpreter_works(interpreter: &str) -> bool {
    Command::new(interpreter)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Running sidecar child. Stopped on drop.
#[derive(Debug)]
pub struct SidecarProcess {
    child: Option<Child>,
    port: u16,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl SidecarProcess {
    pub fn spawn(launch: &SidecarLaunch, port: u16) -> Result<Self, SidecarProcessError> {
        let child = launch
            .command(port)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SidecarProcessError::Spawn {
                program: launch.program(),
                source,
            })?;
        info!(pid = child.id(), port, "sidecar spawned");
        Ok(Self::from_child(child, port))
    }

    /// Supervises an already running child listening on `port`.
    pub fn from_child(child: Child, port: u16) -> Self {
        Self {
            child: Some(child),
            port,
            poll_interval: HEALTH_POLL_INTERVAL,
            poll_attempts: HEALTH_POLL_ATTEMPTS,
        }
    }

    /// Locates, spawns, and waits for a healthy sidecar on `port`.
    pub async fn launch(locator: &SidecarLocator, port: u16) -> Result<Self, SidecarProcessError> {
        let launch = locator.locate()?;
        debug!(?launch, "launching sidecar");
        let mut process = Self::spawn(&launch, port)?;
        let client = SidecarClient::new(SidecarApiConfig::for_port(port))?;
        process.wait_until_healthy(&client).await?;
        Ok(process)
    }

    #[must_use]
    pub fn with_health_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts.max(1);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Polls `GET /health` until it succeeds. Fails early if the child exits.
    pub async fn wait_until_healthy(
        &mut self,
        client: &SidecarClient,
    ) -> Result<(), SidecarProcessError> {
        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait().map_err(SidecarProcessError::Wait)? {
                    return Err(SidecarProcessError::Exited { status });
                }
            }

            if client.is_healthy().await {
                info!(port = self.port, attempt, "sidecar is healthy");
                return Ok(());
            }
            trace!(attempt, "sidecar not healthy yet");
        }

        Err(SidecarProcessError::Unhealthy {
            waited: self.poll_interval * self.poll_attempts,
        })
    }

    /// Kills the child and reaps it. Idempotent.
    pub fn stop(&mut self) -> Result<(), SidecarProcessError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if child
            .try_wait()
            .map_err(SidecarProcessError::Wait)?
            .is_some()
        {
            return Ok(());
        }

        let _ = child.kill();
        match child
            .wait_timeout(STOP_WAIT)
            .map_err(SidecarProcessError::Wait)?
        {
            Some(status) => debug!(%status, "sidecar stopped"),
            None => warn!(pid = child.id(), "sidecar did not exit after kill"),
        }
        Ok(())
    }
}

impl Drop for SidecarProcess {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(%error, "failed to stop sidecar");
        }
    }
}
