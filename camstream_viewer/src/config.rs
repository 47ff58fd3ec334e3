use anyhow::Context;
use camstream::{CameraRef, SessionConfig, StreamEndpoint};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 480,
            height: 360,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewerConfig {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub surface: SurfaceSize,
    pub cameras: Vec<CameraRef>,
}

fn default_server() -> String {
    StreamEndpoint::DEFAULT_BASE.to_string()
}

impl ViewerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&config).with_context(|| format!("Invalid camera list {}", path.display()))
    }

    pub fn parse(config: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(config).context("Failed to parse camera list toml")?;
        anyhow::ensure!(!config.cameras.is_empty(), "No cameras configured");
        anyhow::ensure!(
            config.surface.width > 0 && config.surface.height > 0,
            "Surface must not be empty"
        );
        let mut seen = HashSet::new();
        for camera in &config.cameras {
            anyhow::ensure!(
                seen.insert(&camera.id),
                "Camera {} is listed twice",
                camera.id
            );
        }
        Ok(config)
    }
}
