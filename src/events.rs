//! Structured record of the failures the scenes recover from on their own.
//!
//! Nothing in the decorative layer returns an error to its caller. Instead each
//! recovered failure is logged and queued here so hosts and tests can observe
//! it with `drain_events`.
use crate::lighting::ShadowCameraError;

#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    /// A light mutation named a light the registry does not know.
    UnknownLight { name: String },
    /// A color string could not be parsed. `target` is the light name, or
    /// `"accent"` for the scene accent color.
    InvalidColor { target: String, value: String },
    /// A shadow camera projection could not be recomputed; the previous
    /// projection stays in use.
    ShadowCameraUpdateFailed {
        light: String,
        error: ShadowCameraError,
    },
    /// An asset failed to load and contributes nothing to the scene.
    AssetLoadFailed { path: String, error: String },
    /// A completion arrived for a request the scene never issued or already
    /// completed.
    UnexpectedAsset { id: u64 },
    /// A resize was ignored because a dimension was zero.
    InvalidViewport { width: u32, height: u32 },
}

/// FIFO of `SceneEvent`s. Pushing an event also logs it.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SceneEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SceneEvent) {
        tracing::warn!(?event, "recovered from scene failure");
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
