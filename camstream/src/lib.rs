pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod sink;
pub mod state;
pub mod transport;

pub use camstream_codecs::{CameraId, CameraRef, Fps, Frame, Payload, TelemetryRecord};
pub use config::SessionConfig;
pub use error::{RegistryError, SessionError, TransportError};
pub use registry::{Released, SessionRegistry};
pub use session::{SessionHandle, SessionWatch, StreamSession};
pub use sink::{ListenerId, Listeners, RenderSink, SessionListener};
pub use state::{SessionSnapshot, SessionState};
pub use transport::{Connector, StreamEndpoint, Transport, WsConnector};

#[cfg(test)]
mod mock;
