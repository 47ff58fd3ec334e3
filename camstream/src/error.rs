use camstream_codecs::CameraId;

/// Failure of the duplex connection. Fatal to the session that observes it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid stream address: {0}")]
    Address(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to receive: {0}")]
    Receive(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("failed to close connection: {0}")]
    Shutdown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a session for camera {0} is already running")]
    AlreadyRunning(CameraId),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session task for camera {camera} did not finish: {source}")]
    Join {
        camera: CameraId,
        #[source]
        source: tokio::task::JoinError,
    },
}
