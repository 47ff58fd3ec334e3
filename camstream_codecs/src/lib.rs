pub mod camera;
pub mod frame;
pub mod payload;
pub mod telemetry;

pub use crate::camera::{CameraId, CameraRef};
pub use crate::frame::{DecodeError, Frame, FrameDecoder};
pub use crate::payload::Payload;
pub use crate::telemetry::{TelemetryParser, TelemetryRecord};

pub type Fps = f64;
