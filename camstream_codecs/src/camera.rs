use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CameraId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for CameraId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Static description of a camera, as served by the camera CRUD endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRef {
    pub id: CameraId,
    pub name: String,
    /// Capture frame rate target
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Where the server side captures from, e.g. an rtsp url
    #[serde(default, alias = "stream_url")]
    pub stream_source: Option<String>,
}

fn default_fps() -> u32 {
    25
}

impl CameraRef {
    pub fn new(id: impl Into<CameraId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fps: default_fps(),
            stream_source: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn camera_record_from_json() {
        let json = r#"{
            "id": "cam-1",
            "name": "Ana Giris",
            "stream_url": "rtsp://192.168.1.100:554/stream1"
        }"#;
        let camera: CameraRef = serde_json::from_str(json).unwrap();
        assert_eq!(camera.id.as_str(), "cam-1");
        assert_eq!(camera.fps, 25);
        assert_eq!(
            camera.stream_source.as_deref(),
            Some("rtsp://192.168.1.100:554/stream1")
        );
    }
}
