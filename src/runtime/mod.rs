//! Container runtime abstraction.
//!
//! Handlers and log sessions only talk to the runtime through
//! [`ContainerRuntime`]. The production implementation lives in
//! [`docker`] and wraps a shared bollard client.

pub mod docker;

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::io::AsyncBufRead;

/// Number of backlog lines requested when a log session starts.
pub const BACKLOG_LINES: u32 = 50;

/// Port the game server listens on inside the container.
pub const SERVER_PORT: u16 = 25565;

/// Mount point of the world data directory inside the container.
pub const DATA_DIR: &str = "/data";

/// Environment every new server starts with, ahead of caller entries.
pub const DEFAULT_ENV: [&str; 3] = ["EULA=TRUE", "UID=1000", "GID=1000"];

/// Raw byte stream in the engine's framed log layout.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    DockerApi(#[from] bollard::errors::Error),
}

/// Failure of [`ContainerRuntime::create_and_start`], tagged with the step
/// that failed.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("failed to pull image: {0}")]
    Pull(RuntimeError),
    #[error("failed to create container: {0}")]
    Create(RuntimeError),
    #[error("container {id} created but failed to start: {source}")]
    Start { id: String, source: RuntimeError },
}

/// A container as reported by the runtime, before any reshaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContainer {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
}

/// Everything needed to create a new server container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub image: String,
    pub host_port: u16,
    pub env: BTreeMap<String, String>,
    pub data_path: Option<String>,
}

impl ServerSpec {
    /// Default variables followed by caller entries as `KEY=value`.
    pub fn environment(&self) -> Vec<String> {
        DEFAULT_ENV
            .iter()
            .map(|entry| entry.to_string())
            .chain(self.env.iter().map(|(k, v)| format!("{}={}", k, v)))
            .collect()
    }

    /// Bind mount for the world data, if a host directory was given.
    pub fn data_bind(&self) -> Option<String> {
        self.data_path
            .as_ref()
            .map(|path| format!("{}:{}", path, DATA_DIR))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStreamOptions {
    pub show_stdout: bool,
    pub show_stderr: bool,
    pub follow: bool,
    pub tail_lines: u32,
}

impl Default for LogStreamOptions {
    fn default() -> Self {
        Self {
            show_stdout: true,
            show_stderr: true,
            follow: true,
            tail_lines: BACKLOG_LINES,
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self, include_stopped: bool)
    -> Result<Vec<RawContainer>, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create the container and return its id.
    async fn create_container(&self, spec: &ServerSpec) -> Result<String, RuntimeError>;

    async fn open_log_stream(
        &self,
        id: &str,
        options: LogStreamOptions,
    ) -> Result<LogStream, RuntimeError>;

    async fn create_and_start(&self, spec: &ServerSpec) -> Result<String, CreateError> {
        self.pull_image(&spec.image)
            .await
            .map_err(CreateError::Pull)?;
        let id = self
            .create_container(spec)
            .await
            .map_err(CreateError::Create)?;
        match self.start_container(&id).await {
            Ok(()) => Ok(id),
            Err(source) => Err(CreateError::Start { id, source }),
        }
    }
}
