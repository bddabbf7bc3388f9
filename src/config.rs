use std::{net::SocketAddr, path::PathBuf};

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("static"))
}

fn default_image() -> String {
    "itzg/minecraft-server".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Directory with the web UI. Set to an empty string to disable.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
    /// Image used when a create request does not name one.
    #[serde(default = "default_image")]
    pub default_image: String,
    /// Seconds Docker waits before killing a stopping container.
    #[serde(default)]
    pub stop_timeout: Option<i32>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            static_dir: default_static_dir(),
            default_image: default_image(),
            stop_timeout: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PanelConfig {
    /// Load the config named on the command line and apply CLI overrides.
    pub fn try_init() -> Result<Self, ConfigError> {
        let args = crate::cli::get_cli_args();
        let mut config = match &args.config {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.clone(), e))?;
                log::debug!("Loaded config from {:?}", path);
                Self::try_init_from_string(&contents)?
            }
            None => Self::default(),
        };
        if let Some(listen) = args.listen {
            config.listen = listen;
        }
        Ok(config)
    }

    fn try_init_from_string(val: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(val)?;
        if config
            .static_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            config.static_dir = None;
        }
        Ok(config)
    }
}
