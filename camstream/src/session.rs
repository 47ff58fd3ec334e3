use crate::{
    config::SessionConfig,
    error::{SessionError, TransportError},
    sink::{Listeners, RenderSink},
    state::{SessionSnapshot, SessionState},
    transport::{Connector, Transport},
};
use camstream_codecs::{CameraId, CameraRef, FrameDecoder, Payload, TelemetryParser};
use std::{fmt, sync::Arc};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

/// One camera's connection lifecycle.
///
/// The session owns its transport exclusively. While `Connecting` the handle
/// is the pending connect future; while `Streaming` and `Closing` it is the
/// open transport. Terminal states hold nothing.
pub struct StreamSession {
    camera: CameraRef,
    config: SessionConfig,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    sink: Box<dyn RenderSink>,
    listeners: Listeners,
    attached: bool,
    snapshot: Publisher,
    frames: FrameDecoder,
    telemetry: TelemetryParser,
}

/// Publishes the session snapshot. A session dropped before reaching a terminal
/// state, e.g. by a panicking sink, is reported as `Failed`. Must stay declared
/// after `transport` in [`StreamSession`] so the transport is gone by then.
struct Publisher {
    camera: CameraId,
    tx: watch::Sender<SessionSnapshot>,
}

impl Publisher {
    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) {
        self.tx.send_modify(f);
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        let abandoned = self.tx.send_if_modified(|s| {
            if s.state.is_terminal() {
                return false;
            }
            s.state = SessionState::Failed;
            true
        });
        if abandoned {
            tracing::warn!(camera = %self.camera, "Session task ended without reaching a terminal state");
        }
    }
}

enum Inbound {
    Stop,
    Payload(Option<Result<Payload, TransportError>>),
}

impl StreamSession {
    /// Start a session on the current runtime. It begins in `Idle` and moves to
    /// `Connecting` as soon as the task is polled.
    pub fn spawn(
        camera: CameraRef,
        connector: Arc<dyn Connector>,
        sink: Box<dyn RenderSink>,
        listeners: Listeners,
        config: SessionConfig,
    ) -> SessionHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (snapshot, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let id = camera.id.clone();
        let session = Self {
            camera,
            config,
            state: SessionState::Idle,
            transport: None,
            sink,
            listeners,
            attached: true,
            snapshot: Publisher {
                camera: id.clone(),
                tx: snapshot,
            },
            frames: FrameDecoder,
            telemetry: TelemetryParser,
        };
        let task = tokio::spawn(session.run(connector, stop_rx));
        SessionHandle {
            camera: id,
            stop_tx: Some(stop_tx),
            snapshot: snapshot_rx,
            task,
        }
    }

    async fn run(
        mut self,
        connector: Arc<dyn Connector>,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> Box<dyn RenderSink> {
        self.transition(SessionState::Connecting);

        // Dropping the handle counts as a stop request.
        let connected = tokio::select! {
            biased;
            _ = &mut stop_rx => None,
            result = connector.connect(&self.camera) => Some(result),
        };

        match connected {
            None => self.shutdown().await,
            Some(Err(e)) => self.fail(e),
            Some(Ok(transport)) => {
                self.transport = Some(transport);
                self.transition(SessionState::Streaming);
                self.stream(&mut stop_rx).await;
            }
        }
        self.sink
    }

    async fn stream(&mut self, stop_rx: &mut oneshot::Receiver<()>) {
        loop {
            let Some(transport) = self.transport.as_mut() else {
                return;
            };
            let inbound = tokio::select! {
                biased;
                _ = &mut *stop_rx => Inbound::Stop,
                next = transport.next_payload() => Inbound::Payload(next),
            };
            match inbound {
                Inbound::Stop => {
                    self.shutdown().await;
                    return;
                }
                Inbound::Payload(Some(Ok(payload))) => self.dispatch(payload),
                Inbound::Payload(Some(Err(e))) => {
                    self.fail(e);
                    return;
                }
                Inbound::Payload(None) => {
                    self.fail(TransportError::Closed);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, payload: Payload) {
        let camera = &self.camera.id;
        match payload {
            Payload::Binary(bytes) => match self.frames.decode(&bytes) {
                Ok(frame) => {
                    self.sink.render(camera, frame);
                    self.snapshot.update(|s| s.frames_rendered += 1);
                }
                Err(e) => {
                    tracing::debug!(camera = %camera, "Dropping frame of {} bytes: {e}", bytes.len());
                    self.snapshot.update(|s| s.frames_dropped += 1);
                }
            },
            Payload::Text(text) => {
                let record = self.telemetry.parse(&text);
                if let Some(fps) = record.fps() {
                    self.snapshot.update(|s| s.last_observed_fps = fps);
                    self.listeners.notify(|l| l.on_stats_update(camera, fps));
                }
                if let Some(plate) = record.plate_number() {
                    tracing::info!(camera = %camera, "Recognized plate {plate}");
                    self.snapshot
                        .update(|s| s.last_recognized_plate = Some(plate.to_string()));
                    self.listeners.notify(|l| l.on_plate_event(camera, plate));
                }
                if record.is_unknown() {
                    tracing::trace!(camera = %camera, "Ignoring telemetry {text}");
                }
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        debug_assert!(
            self.transport.is_none() || next.holds_transport(),
            "{next} session still holds a transport"
        );
        debug_assert!(
            next != SessionState::Streaming || self.transport.is_some(),
            "streaming without a transport"
        );
        tracing::info!(camera = %self.camera.id, "Session {} -> {next}", self.state);
        self.state = next;
        self.snapshot.update(|s| s.state = next);
        if self.attached {
            let camera = &self.camera.id;
            self.listeners.notify(|l| l.on_state_change(camera, next));
        }
    }

    fn fail(&mut self, error: TransportError) {
        tracing::warn!(camera = %self.camera.id, "Transport failed: {error}");
        self.transport = None;
        let camera = &self.camera.id;
        self.listeners.notify(|l| l.on_error(camera, &error));
        self.transition(SessionState::Failed);
    }

    /// Caller initiated teardown. Listeners are detached first, so nothing
    /// fires once a stop has been observed.
    async fn shutdown(&mut self) {
        self.attached = false;
        self.transition(SessionState::Closing);
        if let Some(mut transport) = self.transport.take() {
            match tokio::time::timeout(self.config.close_timeout, transport.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(camera = %self.camera.id, "{e}"),
                Err(_) => tracing::warn!(
                    camera = %self.camera.id,
                    "Transport did not close within {:?}, dropping it",
                    self.config.close_timeout
                ),
            }
        }
        self.transition(SessionState::Closed);
    }
}

/// Control side of a spawned [`StreamSession`].
pub struct SessionHandle {
    camera: CameraId,
    stop_tx: Option<oneshot::Sender<()>>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<Box<dyn RenderSink>>,
}

impl SessionHandle {
    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            camera: self.camera.clone(),
            snapshot: self.snapshot.clone(),
        }
    }

    /// Request teardown and wait for the session to reach a terminal state.
    /// Hands the render sink back to the caller.
    pub async fn stop(self) -> Result<Box<dyn RenderSink>, SessionError> {
        let SessionHandle {
            camera,
            stop_tx,
            task,
            ..
        } = self;
        if let Some(stop_tx) = stop_tx {
            // Already finished sessions have dropped their receiver.
            let _ = stop_tx.send(());
        }
        task.await
            .map_err(|source| SessionError::Join { camera, source })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("camera", &self.camera)
            .field("state", &self.state())
            .finish()
    }
}

/// Read-only view of a session, usable after the session has ended.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    camera: CameraId,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionWatch {
    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    /// Wait until the session reaches a state matching `f`. Returns the final
    /// snapshot if the session goes away first.
    pub async fn wait_for(&mut self, f: impl Fn(SessionState) -> bool) -> SessionSnapshot {
        if let Ok(snapshot) = self.snapshot.wait_for(|s| f(s.state)).await {
            return snapshot.clone();
        }
        self.snapshot.borrow().clone()
    }
}
