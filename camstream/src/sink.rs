use crate::{error::TransportError, state::SessionState};
use camstream_codecs::{CameraId, Fps, Frame};
use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

/// Receives decoded frames for display.
///
/// A sink is moved into exactly one session and handed back when that session
/// ends. Frames are passed by value and not retained by the session.
pub trait RenderSink: Send {
    fn render(&mut self, camera: &CameraId, frame: Frame);
}

impl<F> RenderSink for F
where
    F: FnMut(&CameraId, Frame) + Send,
{
    fn render(&mut self, camera: &CameraId, frame: Frame) {
        self(camera, frame)
    }
}

/// Telemetry and lifecycle callbacks. All methods default to doing nothing.
pub trait SessionListener: Send + Sync {
    fn on_stats_update(&self, _camera: &CameraId, _fps: Fps) {}

    fn on_plate_event(&self, _camera: &CameraId, _plate_number: &str) {}

    fn on_state_change(&self, _camera: &CameraId, _state: SessionState) {}

    /// Fired once, right before a session enters `Failed`.
    fn on_error(&self, _camera: &CameraId, _error: &TransportError) {}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<dyn SessionListener>)>,
}

/// Shared, explicitly managed set of listeners.
#[derive(Clone, Default)]
pub struct Listeners(Arc<RwLock<ListenerSet>>);

impl Listeners {
    pub fn register(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        let mut set = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(set.next_id);
        set.next_id += 1;
        set.entries.push((id, listener));
        id
    }

    /// Returns whether the listener was registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut set = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let before = set.entries.len();
        set.entries.retain(|(existing, _)| *existing != id);
        set.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `f` on every listener. The set is copied first, so listeners may
    /// register or unregister from inside a callback.
    pub(crate) fn notify(&self, f: impl Fn(&dyn SessionListener)) {
        let current: Vec<Arc<dyn SessionListener>> = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in current {
            f(listener.as_ref());
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}
