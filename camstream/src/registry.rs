use crate::{
    config::SessionConfig,
    error::{RegistryError, SessionError},
    session::{SessionHandle, SessionWatch, StreamSession},
    sink::{ListenerId, Listeners, RenderSink, SessionListener},
    state::{SessionSnapshot, SessionState},
    transport::Connector,
};
use camstream_codecs::{CameraId, CameraRef};
use futures::future::join_all;
use std::{collections::HashMap, sync::Arc};

/// What a session hands back when it is removed from the registry.
pub type Released = (CameraId, Result<Box<dyn RenderSink>, SessionError>);

/// Supervises at most one live session per camera.
///
/// Owned by whoever owns the view of the cameras: create it with
/// [`SessionRegistry::new`] and end it with [`SessionRegistry::stop_all`].
/// Dropping the registry also tears every session down, without waiting.
pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    listeners: Listeners,
    sessions: HashMap<CameraId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            listeners: Listeners::default(),
            sessions: HashMap::default(),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        self.listeners.register(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    /// Fails with [`RegistryError::AlreadyRunning`] while a non-terminal
    /// session exists for the camera. A terminal one is replaced.
    pub fn start(
        &mut self,
        camera: CameraRef,
        sink: Box<dyn RenderSink>,
    ) -> Result<SessionWatch, RegistryError> {
        if let Some(existing) = self.sessions.get(&camera.id) {
            if !existing.state().is_terminal() {
                tracing::warn!(camera = %camera.id, "Refusing to start a second session");
                return Err(RegistryError::AlreadyRunning(camera.id));
            }
            tracing::info!(camera = %camera.id, "Replacing {} session", existing.state());
        }

        tracing::info!(camera = %camera.id, "Starting session for {:?}", camera.name);
        let id = camera.id.clone();
        let handle = StreamSession::spawn(
            camera,
            Arc::clone(&self.connector),
            sink,
            self.listeners.clone(),
            self.config.clone(),
        );
        let watch = handle.watch();
        self.sessions.insert(id, handle);
        Ok(watch)
    }

    /// Returns `Ok(None)` if nothing was registered for the camera.
    pub async fn stop(
        &mut self,
        camera: &CameraId,
    ) -> Result<Option<Box<dyn RenderSink>>, SessionError> {
        match self.sessions.remove(camera) {
            Some(handle) => {
                tracing::info!(camera = %camera, "Stopping session");
                handle.stop().await.map(Some)
            }
            None => {
                tracing::debug!(camera = %camera, "No session to stop");
                Ok(None)
            }
        }
    }

    /// Stop every session concurrently and wait until all of them are terminal.
    pub async fn stop_all(&mut self) -> Vec<Released> {
        tracing::info!("Stopping {} sessions", self.sessions.len());
        let stopping = self
            .sessions
            .drain()
            .map(|(camera, handle)| async move { (camera, handle.stop().await) });
        join_all(stopping).await
    }

    /// Remove sessions that already reached a terminal state.
    pub async fn reap(&mut self) -> Vec<Released> {
        let finished: Vec<CameraId> = self
            .sessions
            .iter()
            .filter(|(_, handle)| handle.state().is_terminal())
            .map(|(camera, _)| camera.clone())
            .collect();
        let mut released = Vec::with_capacity(finished.len());
        for camera in finished {
            if let Some(handle) = self.sessions.remove(&camera) {
                released.push((camera, handle.stop().await));
            }
        }
        released
    }

    pub fn state(&self, camera: &CameraId) -> Option<SessionState> {
        self.sessions.get(camera).map(SessionHandle::state)
    }

    pub fn snapshot(&self, camera: &CameraId) -> Option<SessionSnapshot> {
        self.sessions.get(camera).map(SessionHandle::snapshot)
    }

    pub fn is_running(&self, camera: &CameraId) -> bool {
        self.state(camera).is_some_and(|state| !state.is_terminal())
    }

    /// Cameras with a non-terminal session.
    pub fn active(&self) -> impl Iterator<Item = &CameraId> {
        self.sessions
            .iter()
            .filter(|(_, handle)| !handle.state().is_terminal())
            .map(|(camera, _)| camera)
    }

    /// Number of live sessions. Terminal sessions keep their entry, and with it
    /// their sink and final snapshot, until [`SessionRegistry::reap`],
    /// [`SessionRegistry::stop`] or a new `start` releases it.
    pub fn len(&self) -> usize {
        self.active().count()
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }
}
