//! Keeps the configured cameras on screen, restarting failed ones when asked to.

use crate::{config::ViewerConfig, surface::Surface};
use camstream::{
    CameraId, CameraRef, Connector, Fps, RegistryError, SessionListener, SessionRegistry,
    SessionState, TransportError,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;

/// Logs telemetry and reports failed cameras back to the supervisor.
struct TelemetryLog {
    failures: mpsc::UnboundedSender<CameraId>,
}

impl SessionListener for TelemetryLog {
    fn on_stats_update(&self, camera: &CameraId, fps: Fps) {
        tracing::debug!(camera = %camera, "{fps} FPS");
    }

    fn on_plate_event(&self, camera: &CameraId, plate_number: &str) {
        tracing::info!(camera = %camera, "Plate {plate_number}");
    }

    fn on_state_change(&self, camera: &CameraId, state: SessionState) {
        tracing::debug!(camera = %camera, "Now {state}");
        if state == SessionState::Failed {
            let _ = self.failures.send(camera.clone());
        }
    }

    fn on_error(&self, camera: &CameraId, error: &TransportError) {
        tracing::warn!(camera = %camera, "Camera not running: {error}");
    }
}

enum Wakeup {
    Failed(CameraId),
    Retry(CameraId),
}

pub struct Supervisor {
    registry: SessionRegistry,
    cameras: HashMap<CameraId, (CameraRef, Surface)>,
    retry_after: Duration,
    failures: mpsc::UnboundedReceiver<CameraId>,
    retry_tx: mpsc::UnboundedSender<CameraId>,
    retries: mpsc::UnboundedReceiver<CameraId>,
}

impl Supervisor {
    /// Start one session per configured camera, each drawing onto its own surface.
    /// A zero `retry_after` leaves failed cameras down.
    pub fn start(
        connector: Arc<dyn Connector>,
        config: &ViewerConfig,
        retry_after: Duration,
    ) -> Result<Self, RegistryError> {
        let mut registry = SessionRegistry::new(connector, config.session.clone());
        let (failures_tx, failures) = mpsc::unbounded_channel();
        registry.subscribe(Arc::new(TelemetryLog {
            failures: failures_tx,
        }));

        let mut cameras = HashMap::new();
        for camera in &config.cameras {
            let surface = Surface::new(config.surface.width, config.surface.height);
            registry.start(camera.clone(), Box::new(surface.sink()))?;
            cameras.insert(camera.id.clone(), (camera.clone(), surface));
        }

        let (retry_tx, retries) = mpsc::unbounded_channel();
        Ok(Self {
            registry,
            cameras,
            retry_after,
            failures,
            retry_tx,
            retries,
        })
    }

    /// Returns once no camera is left running. Never returns while retrying.
    pub async fn run(&mut self) {
        loop {
            let wakeup = tokio::select! {
                Some(camera) = self.failures.recv() => Wakeup::Failed(camera),
                Some(camera) = self.retries.recv() => Wakeup::Retry(camera),
                else => return,
            };
            match wakeup {
                Wakeup::Failed(camera) if !self.retry_after.is_zero() => {
                    self.schedule_retry(camera);
                }
                Wakeup::Failed(_) => {
                    if self.registry.is_empty() {
                        tracing::warn!("No camera left running");
                        return;
                    }
                }
                Wakeup::Retry(camera) => self.restart(&camera),
            }
        }
    }

    fn schedule_retry(&self, camera: CameraId) {
        tracing::info!(
            camera = %camera,
            "Restarting in {}",
            humantime::format_duration(self.retry_after)
        );
        let retry_after = self.retry_after;
        let retry_tx = self.retry_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(retry_after).await;
            let _ = retry_tx.send(camera);
        });
    }

    fn restart(&mut self, camera: &CameraId) {
        let Some((camera, surface)) = self.cameras.get(camera) else {
            return;
        };
        match self.registry.start(camera.clone(), Box::new(surface.sink())) {
            Ok(_) => {}
            Err(RegistryError::AlreadyRunning(id)) => {
                tracing::info!(camera = %id, "Already running again");
            }
        }
    }

    /// Stop every session and hand back the surfaces.
    pub async fn shutdown(mut self) -> HashMap<CameraId, Surface> {
        for camera in self.cameras.keys() {
            if let Some(snapshot) = self.registry.snapshot(camera) {
                tracing::info!(
                    camera = %camera,
                    "{} frames rendered, {} dropped, last plate {:?}",
                    snapshot.frames_rendered,
                    snapshot.frames_dropped,
                    snapshot.last_recognized_plate
                );
            }
        }
        for (camera, released) in self.registry.stop_all().await {
            if let Err(e) = released {
                tracing::warn!(camera = %camera, "{e}");
            }
        }
        self.cameras
            .into_iter()
            .map(|(id, (_, surface))| (id, surface))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use camstream::Transport;
    use tokio_test::assert_ok;

    struct Refusing {
        attempts: mpsc::UnboundedSender<CameraId>,
    }

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(
            &self,
            camera: &CameraRef,
        ) -> Result<Box<dyn Transport>, TransportError> {
            let _ = self.attempts.send(camera.id.clone());
            Err(TransportError::Connect("refused".to_string()))
        }
    }

    fn refusing() -> (Arc<dyn Connector>, mpsc::UnboundedReceiver<CameraId>) {
        let (attempts, rx) = mpsc::unbounded_channel();
        (Arc::new(Refusing { attempts }), rx)
    }

    fn config() -> ViewerConfig {
        assert_ok!(ViewerConfig::parse(
            r#"
            [[cameras]]
            id = "gate"
            name = "Gate"
            "#,
        ))
    }

    #[tokio::test]
    async fn gives_up_without_retry_delay() {
        let (connector, mut attempts) = refusing();
        let mut supervisor = assert_ok!(Supervisor::start(connector, &config(), Duration::ZERO));

        assert_ok!(tokio::time::timeout(Duration::from_secs(2), supervisor.run()).await);
        assert_eq!(attempts.try_recv(), Ok(CameraId::from("gate")));
        assert!(attempts.try_recv().is_err());

        let surfaces = supervisor.shutdown().await;
        assert!(surfaces.contains_key(&CameraId::from("gate")));
    }

    #[tokio::test]
    async fn restarts_failed_camera_after_delay() {
        let (connector, mut attempts) = refusing();
        let retry_after = Duration::from_millis(20);
        let mut supervisor = assert_ok!(Supervisor::start(connector, &config(), retry_after));
        let started = tokio::time::Instant::now();

        tokio::select! {
            () = supervisor.run() => panic!("supervisor gave up on a camera it should retry"),
            result = tokio::time::timeout(Duration::from_secs(2), async {
                for _ in 0..3 {
                    assert_eq!(attempts.recv().await, Some(CameraId::from("gate")));
                }
            }) => assert_ok!(result),
        }
        assert!(started.elapsed() >= retry_after * 2);

        supervisor.shutdown().await;
    }
}
