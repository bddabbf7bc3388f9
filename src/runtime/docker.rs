//! Docker implementation of [`ContainerRuntime`] using bollard.
//!
//! The client is created once at startup and shared by every handler and
//! log session. bollard's `Docker` is safe for concurrent use, so no extra
//! locking is needed around it.

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{
    ContainerCreateBody, ContainerSummary, HostConfig, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateContainerOptionsBuilder, CreateImageOptions,
    CreateImageOptionsBuilder, InspectContainerOptions, InspectContainerOptionsBuilder,
    ListContainersOptions, ListContainersOptionsBuilder, LogsOptions,
    LogsOptionsBuilder, StartContainerOptions, StartContainerOptionsBuilder, StopContainerOptions,
    StopContainerOptionsBuilder,
};
use bytes::{BufMut, Bytes, BytesMut};
use futures::TryStreamExt;
use futures_util::StreamExt;

use super::{
    ContainerRuntime, LogStream, LogStreamOptions, RawContainer, RuntimeError, SERVER_PORT,
    ServerSpec,
};
use crate::logs::frame::{STDIN_DISCRIMINATOR, StreamOrigin, frame_header};

static DOCKER_CLIENT: OnceLock<Docker> = OnceLock::new();

/// Connect to the Docker daemon and check that it answers.
///
/// Uses the default connection method (`DOCKER_HOST`, otherwise the Unix
/// socket on Linux/macOS and the named pipe on Windows).
pub async fn connect() -> Result<&'static Docker, RuntimeError> {
    if let Some(docker) = DOCKER_CLIENT.get() {
        return Ok(docker);
    }
    let docker = Docker::connect_with_local_defaults()?;
    let version = docker.version().await?;
    log::info!(
        "Connected to Docker {} (API {})",
        version.version.as_deref().unwrap_or("unknown"),
        version.api_version.as_deref().unwrap_or("unknown")
    );
    Ok(DOCKER_CLIENT.get_or_init(|| docker))
}

pub struct DockerRuntime {
    docker: &'static Docker,
    stop_timeout: Option<i32>,
}

impl DockerRuntime {
    pub fn new(docker: &'static Docker, stop_timeout: Option<i32>) -> Self {
        Self {
            docker,
            stop_timeout,
        }
    }
}

impl From<ContainerSummary> for RawContainer {
    fn from(summary: ContainerSummary) -> Self {
        Self {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
            image: summary.image.unwrap_or_default(),
            state: summary
                .state
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            status: summary.status.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(
        &self,
        include_stopped: bool,
    ) -> Result<Vec<RawContainer>, RuntimeError> {
        let options: ListContainersOptions = ListContainersOptionsBuilder::new()
            .all(include_stopped)
            .build();

        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.into_iter().map(RawContainer::from).collect())
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        let options: StartContainerOptions = StartContainerOptionsBuilder::new().build();

        self.docker
            .start_container(id, Some(options))
            .await
            .inspect_err(|e| log::error!("Failed to start container {}: {}", id, e))?;

        log::info!("Container {} started", id);
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        log::info!("Stopping container: {}", id);
        let mut builder = StopContainerOptionsBuilder::new();
        if let Some(timeout) = self.stop_timeout {
            builder = builder.t(timeout);
        }
        let options: StopContainerOptions = builder.build();

        self.docker
            .stop_container(id, Some(options))
            .await
            .inspect_err(|e| log::warn!("Failed to stop container {}: {}", id, e))?;

        log::info!("Container {} stopped", id);
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        log::info!("Pulling image: {}", image);
        let (name, tag) = parse_image_reference(image);

        let options: CreateImageOptions = CreateImageOptionsBuilder::new()
            .from_image(name)
            .tag(tag)
            .build();

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        log::debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    log::error!("Failed to pull image {}: {}", image, e);
                    return Err(e.into());
                }
            }
        }

        log::info!("Image {} pulled successfully", image);
        Ok(())
    }

    async fn create_container(&self, spec: &ServerSpec) -> Result<String, RuntimeError> {
        log::info!("Creating container: {}", spec.name);

        let container_port = format!("{}/tcp", SERVER_PORT);
        let exposed_ports: HashMap<String, HashMap<(), ()>> =
            HashMap::from([(container_port.clone(), HashMap::new())]);
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::from([(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.host_port.to_string()),
            }]),
        )]);

        let host_config = HostConfig {
            binds: spec.data_bind().map(|bind| vec![bind]),
            port_bindings: Some(port_bindings),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            tty: Some(true),
            open_stdin: Some(true),
            env: Some(spec.environment()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options: CreateContainerOptions =
            CreateContainerOptionsBuilder::new().name(&spec.name).build();

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .inspect_err(|e| log::error!("Failed to create container {}: {}", spec.name, e))?;

        for warning in &response.warnings {
            log::warn!("Docker warning for {}: {}", spec.name, warning);
        }
        log::info!("Container {} created with id {}", spec.name, response.id);
        Ok(response.id)
    }

    async fn open_log_stream(
        &self,
        id: &str,
        options: LogStreamOptions,
    ) -> Result<LogStream, RuntimeError> {
        // Fail fast on unknown containers. The log endpoint only reports
        // this once the stream is polled.
        let inspect: InspectContainerOptions = InspectContainerOptionsBuilder::new().build();
        self.docker.inspect_container(id, Some(inspect)).await?;

        let options: LogsOptions = LogsOptionsBuilder::new()
            .stdout(options.show_stdout)
            .stderr(options.show_stderr)
            .follow(options.follow)
            .tail(&options.tail_lines.to_string())
            .build();

        let mut encoder = FrameEncoder::default();
        let stream = self
            .docker
            .logs(id, Some(options))
            .map_ok(move |output| encoder.encode(output))
            .map_err(std::io::Error::other);

        Ok(Box::pin(Box::pin(stream).into_async_read()))
    }
}

/// Re-frames bollard's demultiplexed output into newline delimited records,
/// each carrying the 8 byte header.
///
/// A header is written at the start of every line rather than once per
/// chunk, since TTY output arrives in arbitrary chunks. The header's size
/// field stays zero so it can never contain a newline byte.
#[derive(Debug, Default)]
struct FrameEncoder {
    /// Discriminator of the line still waiting for its newline.
    open_line: Option<u8>,
}

impl FrameEncoder {
    fn encode(&mut self, output: LogOutput) -> Bytes {
        let (discriminator, message) = match output {
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                (StreamOrigin::Stdout.discriminator(), message)
            }
            LogOutput::StdErr { message } => (StreamOrigin::Stderr.discriminator(), message),
            LogOutput::StdIn { message } => (STDIN_DISCRIMINATOR, message),
        };

        let mut buf = BytesMut::with_capacity(message.len() + 16);
        // A line from another stream never continues the open one.
        if self.open_line.is_some_and(|open| open != discriminator) {
            buf.put_u8(b'\n');
            self.open_line = None;
        }
        for segment in message.split_inclusive(|b| *b == b'\n') {
            if self.open_line.is_none() {
                buf.put_slice(&frame_header(discriminator));
            }
            buf.put_slice(segment);
            self.open_line = (!segment.ends_with(b"\n")).then_some(discriminator);
        }
        buf.freeze()
    }
}

/// Parse an image reference into (image, tag) components
fn parse_image_reference(image: &str) -> (&str, &str) {
    // Handle digest references (image@sha256:...)
    if let Some(at_pos) = image.find('@') {
        return (&image[..at_pos], &image[at_pos..]);
    }

    // A colon followed by a slash belongs to a registry port
    // (localhost:5000/myimage), not a tag.
    if let Some(colon_pos) = image.rfind(':') {
        let after_colon = &image[colon_pos + 1..];
        if !after_colon.contains('/') {
            return (&image[..colon_pos], after_colon);
        }
    }

    (image, "latest")
}
