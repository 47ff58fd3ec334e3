//! In-memory transport and recording observers for tests.

use crate::{
    error::TransportError,
    sink::{RenderSink, SessionListener},
    state::SessionState,
    transport::{Connector, Transport},
};
use async_trait::async_trait;
use camstream_codecs::{CameraId, CameraRef, Fps, Frame, Payload};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::{collections::HashMap, io::Cursor, sync::Mutex, time::Duration};
use tokio::sync::mpsc;

pub(crate) type Feed = mpsc::UnboundedSender<Result<Payload, TransportError>>;
type Inbox = mpsc::UnboundedReceiver<Result<Payload, TransportError>>;

pub(crate) fn png(width: u32, height: u32) -> Payload {
    let image = RgbImage::from_pixel(width, height, Rgb([10, 200, 10]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    Payload::from(buffer.into_inner())
}

struct ChannelTransport {
    inbox: Inbox,
    stuck_close: bool,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_payload(&mut self) -> Option<Result<Payload, TransportError>> {
        self.inbox.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.stuck_close {
            std::future::pending::<()>().await;
        }
        self.inbox.close();
        Ok(())
    }
}

enum Route {
    Open(ChannelTransport),
    Refuse(TransportError),
    Hang,
}

/// Hands out one pre-arranged route per camera connect.
#[derive(Default)]
pub(crate) struct ChannelConnector {
    routes: Mutex<HashMap<CameraId, Route>>,
}

impl ChannelConnector {
    fn route(&self, camera: &str, route: Route) {
        self.routes
            .lock()
            .unwrap()
            .insert(CameraId::from(camera), route);
    }

    pub(crate) fn feed(&self, camera: &str) -> Feed {
        let (tx, inbox) = mpsc::unbounded_channel();
        self.route(
            camera,
            Route::Open(ChannelTransport {
                inbox,
                stuck_close: false,
            }),
        );
        tx
    }

    pub(crate) fn feed_with_stuck_close(&self, camera: &str) -> Feed {
        let (tx, inbox) = mpsc::unbounded_channel();
        self.route(
            camera,
            Route::Open(ChannelTransport {
                inbox,
                stuck_close: true,
            }),
        );
        tx
    }

    pub(crate) fn refuse(&self, camera: &str, error: TransportError) {
        self.route(camera, Route::Refuse(error));
    }

    pub(crate) fn hang(&self, camera: &str) {
        self.route(camera, Route::Hang);
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, camera: &CameraRef) -> Result<Box<dyn Transport>, TransportError> {
        let route = self.routes.lock().unwrap().remove(&camera.id);
        match route {
            Some(Route::Open(transport)) => Ok(Box::new(transport)),
            Some(Route::Refuse(error)) => Err(error),
            Some(Route::Hang) => std::future::pending().await,
            None => Err(TransportError::Connect(format!("no route to {}", camera.id))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Frame(CameraId, (u32, u32)),
    Stats(CameraId, Fps),
    Plate(CameraId, String),
    State(CameraId, SessionState),
    Error(CameraId, TransportError),
}

impl Event {
    pub(crate) fn camera(&self) -> &CameraId {
        match self {
            Event::Frame(c, _)
            | Event::Stats(c, _)
            | Event::Plate(c, _)
            | Event::State(c, _)
            | Event::Error(c, _) => c,
        }
    }
}

/// Forwards every callback into a channel, usable as sink and as listener.
#[derive(Debug, Clone)]
pub(crate) struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

pub(crate) fn recorder() -> (Recorder, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder { tx }, rx)
}

impl RenderSink for Recorder {
    fn render(&mut self, camera: &CameraId, frame: Frame) {
        let _ = self.tx.send(Event::Frame(camera.clone(), frame.dimensions()));
    }
}

impl SessionListener for Recorder {
    fn on_stats_update(&self, camera: &CameraId, fps: Fps) {
        let _ = self.tx.send(Event::Stats(camera.clone(), fps));
    }

    fn on_plate_event(&self, camera: &CameraId, plate_number: &str) {
        let _ = self
            .tx
            .send(Event::Plate(camera.clone(), plate_number.to_string()));
    }

    fn on_state_change(&self, camera: &CameraId, state: SessionState) {
        let _ = self.tx.send(Event::State(camera.clone(), state));
    }

    fn on_error(&self, camera: &CameraId, error: &TransportError) {
        let _ = self.tx.send(Event::Error(camera.clone(), error.clone()));
    }
}

/// A sink that panics on the first frame.
pub(crate) struct PanickingSink;

impl RenderSink for PanickingSink {
    fn render(&mut self, camera: &CameraId, _frame: Frame) {
        panic!("sink for {camera} gave up");
    }
}

pub(crate) async fn next_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}
